//! Core protocol types: identities, game vocabulary, and the envelope
//! that every frame travels in.
//!
//! Room-scoped commands and events live in [`crate::command`] and
//! [`crate::event`]; this module holds what both sides share.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::{ClientCommand, ProtocolError, ServerEvent};

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Operator-chosen identifier of a room, 1 to 32 characters.
///
/// Deserialization goes through [`RoomId::new`], so a decoded frame can
/// never carry an invalid id.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct RoomId(String);

impl RoomId {
    /// Maximum length in characters.
    pub const MAX_LEN: usize = 32;

    /// Validates and wraps a room id.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidId`] for an empty or overlong id.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        check_id_len("room", &id, Self::MAX_LEN)?;
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for RoomId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RoomId> for String {
    fn from(id: RoomId) -> Self {
        id.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of a participant, unique within a room, 1 to 64 characters.
///
/// Produced by the server's authenticator during the handshake; clients
/// never choose another participant's id.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Maximum length in characters.
    pub const MAX_LEN: usize = 64;

    /// Validates and wraps a participant id.
    ///
    /// # Errors
    /// Returns [`ProtocolError::InvalidId`] for an empty or overlong id.
    pub fn new(id: impl Into<String>) -> Result<Self, ProtocolError> {
        let id = id.into();
        check_id_len("participant", &id, Self::MAX_LEN)?;
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = ProtocolError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn check_id_len(
    kind: &'static str,
    id: &str,
    max: usize,
) -> Result<(), ProtocolError> {
    let len = id.chars().count();
    if len == 0 || len > max {
        return Err(ProtocolError::InvalidId {
            kind,
            value: id.to_owned(),
            max,
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Game vocabulary
// ---------------------------------------------------------------------------

/// A participant's role within one room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// The privileged participant who controls progression.
    Host,
    /// Everyone else.
    Player,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Player => write!(f, "player"),
        }
    }
}

/// Which game a room runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum GameMode {
    /// 75-ball bingo.
    Bingo,
    /// Round-based quiz.
    Quiz,
}

impl fmt::Display for GameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bingo => write!(f, "bingo"),
            Self::Quiz => write!(f, "quiz"),
        }
    }
}

/// The named state of a room's state machine.
///
/// Bingo rooms move through `Waiting → Active ⇄ PausedForConfirmation →
/// Ended`; quiz rooms through `Waiting → QuestionActive ⇄ RoundReview →
/// Complete`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Phase {
    /// Roster open, readiness being collected.
    Waiting,
    /// Bingo: numbers are being called.
    Active,
    /// Bingo: a win claim awaits host confirmation; no draws.
    PausedForConfirmation,
    /// Bingo: terminal.
    Ended,
    /// Quiz: questions are being issued in the current round.
    QuestionActive,
    /// Quiz: the current round's questions are exhausted.
    RoundReview,
    /// Quiz: terminal.
    Complete,
}

impl Phase {
    /// Returns `true` for `Ended` and `Complete`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Ended | Self::Complete)
    }

    /// Returns `true` while new participants may join.
    pub fn is_joinable(self) -> bool {
        self == Self::Waiting
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "Waiting",
            Self::Active => "Active",
            Self::PausedForConfirmation => "PausedForConfirmation",
            Self::Ended => "Ended",
            Self::QuestionActive => "QuestionActive",
            Self::RoundReview => "RoundReview",
            Self::Complete => "Complete",
        };
        f.write_str(name)
    }
}

/// Why a bingo room is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PauseReason {
    /// A `line` claim is pending.
    AwaitingLineConfirmation,
    /// A `fullHouse` claim is pending.
    AwaitingFullhouseConfirmation,
}

/// Bingo win categories, in the order they are normally won.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum WinCategory {
    /// Any complete row, column or diagonal.
    Line,
    /// All 25 cells.
    FullHouse,
}

impl WinCategory {
    /// The pause reason recorded while a claim of this category is pending.
    pub fn pause_reason(self) -> PauseReason {
        match self {
            Self::Line => PauseReason::AwaitingLineConfirmation,
            Self::FullHouse => PauseReason::AwaitingFullhouseConfirmation,
        }
    }
}

impl fmt::Display for WinCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Line => write!(f, "line"),
            Self::FullHouse => write!(f, "fullHouse"),
        }
    }
}

/// Connection state of a roster entry as seen by peers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Liveness {
    /// Bound to a live connection.
    Connected,
    /// Connection dropped; waiting for a rebind.
    GracePeriod,
    /// Gone for good. Only the host is kept in the roster in this state.
    Removed,
}

/// Whether the evaluator checks claimed cards against the call history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimVerification {
    /// The host is the referee; claims are recorded as proposed.
    #[default]
    HostTrusted,
    /// Every claimant's card must satisfy the category using only
    /// numbers already called.
    AgainstHistory,
}

/// Whether `fullHouse` may be claimed before `line` is confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FullHouseOrdering {
    /// Nobody may claim full house before the line is confirmed.
    Strict,
    /// Players must wait for the line; the host may skip it.
    #[default]
    HostMayBypass,
    /// No ordering between categories.
    Free,
}

// ---------------------------------------------------------------------------
// Bingo card
// ---------------------------------------------------------------------------

/// Cards are `CARD_SIZE × CARD_SIZE`.
pub const CARD_SIZE: usize = 5;
/// Balls are numbered `1..=BALL_COUNT`.
pub const BALL_COUNT: u8 = 75;
/// Each column draws from a band of this many consecutive numbers.
pub const COLUMN_SPAN: u8 = 15;

/// A 5×5 bingo card. `rows[r][c]` is the number in row `r`, column `c`;
/// column `c` only holds numbers from [`BingoCard::column_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BingoCard {
    /// Numbers by row.
    pub rows: [[u8; CARD_SIZE]; CARD_SIZE],
}

impl BingoCard {
    /// The band of numbers column `col` draws from (`1..=15`, `16..=30`, ...).
    pub fn column_range(col: usize) -> RangeInclusive<u8> {
        let low = col as u8 * COLUMN_SPAN + 1;
        low..=low + COLUMN_SPAN - 1
    }

    /// Returns `true` if `number` appears anywhere on the card.
    pub fn contains(&self, number: u8) -> bool {
        self.numbers().any(|n| n == number)
    }

    /// Iterates over all 25 numbers, row by row.
    pub fn numbers(&self) -> impl Iterator<Item = u8> + '_ {
        self.rows.iter().flatten().copied()
    }

    /// The twelve lines of the card: five rows, five columns and both
    /// diagonals.
    pub fn lines(&self) -> Vec<[u8; CARD_SIZE]> {
        let mut lines = Vec::with_capacity(2 * CARD_SIZE + 2);
        lines.extend(self.rows.iter().copied());
        for c in 0..CARD_SIZE {
            lines.push(std::array::from_fn(|r| self.rows[r][c]));
        }
        lines.push(std::array::from_fn(|i| self.rows[i][i]));
        lines.push(std::array::from_fn(|i| self.rows[i][CARD_SIZE - 1 - i]));
        lines
    }

    /// Returns `true` if `category` is complete when only numbers for
    /// which `covered` returns `true` count.
    pub fn satisfies(
        &self,
        category: WinCategory,
        covered: impl Fn(u8) -> bool,
    ) -> bool {
        match category {
            WinCategory::Line => self
                .lines()
                .iter()
                .any(|line| line.iter().all(|&n| covered(n))),
            WinCategory::FullHouse => self.numbers().all(covered),
        }
    }
}

// ---------------------------------------------------------------------------
// Room settings (client-supplied on creation)
// ---------------------------------------------------------------------------

/// One quiz question as supplied by the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    /// Question text.
    pub text: String,
    /// Answer options; may be empty for spoken questions.
    #[serde(default)]
    pub options: Vec<String>,
    /// Index into `options` of the correct answer, if the server should
    /// score answers.
    #[serde(default)]
    pub correct_option: Option<usize>,
}

/// Quiz shape requested on room creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSettings {
    /// Number of rounds.
    pub total_rounds: u32,
    /// Questions per round.
    pub questions_per_round: u32,
    /// Countdown per question, in seconds.
    pub time_limit_secs: u32,
    /// Questions in play order; missing entries fall back to a numbered
    /// placeholder the host reads out.
    #[serde(default)]
    pub questions: Vec<QuizQuestion>,
}

/// Optional overrides a host sends with `CreateRoom`. Anything left
/// `None` falls back to the server defaults.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomSettings {
    /// Roster cap, host excluded.
    pub max_players: Option<usize>,
    /// Autoplay draw interval.
    pub autoplay_interval_ms: Option<u64>,
    /// Claim verification policy.
    pub claim_verification: Option<ClaimVerification>,
    /// Line/full-house ordering policy.
    pub full_house_ordering: Option<FullHouseOrdering>,
    /// Propose claims automatically when marks complete a line.
    pub auto_claim: Option<bool>,
    /// Maximum participants named in one claim.
    pub max_claimants: Option<usize>,
    /// Room lifetime; once elapsed anyone may end the game.
    pub expires_in_secs: Option<u64>,
    /// Quiz shape; required for quiz rooms unless the server default fits.
    pub quiz: Option<QuizSettings>,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Who should receive an outbound event from a room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    /// Every bound participant.
    All,
    /// One participant.
    Participant(ParticipantId),
    /// The host only.
    Host,
    /// Everyone except one participant.
    AllExcept(ParticipantId),
}

// ---------------------------------------------------------------------------
// System messages
// ---------------------------------------------------------------------------

/// A live room as listed by `ListRooms`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomListEntry {
    /// Room id.
    pub room_id: RoomId,
    /// Game mode.
    pub mode: GameMode,
    /// Current phase.
    pub phase: Phase,
    /// Roster size, host included.
    pub participant_count: usize,
    /// Roster cap, host excluded.
    pub max_players: usize,
}

/// Connection-level messages that are not scoped to one room's
/// state machine.
///
/// Serialized with an internal `"type"` tag, e.g.
/// `{"type":"Heartbeat","client_time":5000}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SystemMessage {
    /// Client → Server: first frame on every connection.
    Handshake {
        /// Must equal the server's protocol version.
        version: u32,
        /// Credential handed to the authenticator.
        token: Option<String>,
    },

    /// Server → Client: handshake accepted.
    HandshakeAck {
        /// The identity this connection acts as.
        participant_id: ParticipantId,
        /// Milliseconds since the connection was accepted.
        server_time: u64,
    },

    /// Either direction: graceful goodbye.
    Disconnect {
        /// Human-readable reason.
        reason: String,
    },

    /// Client → Server: keep-alive.
    Heartbeat {
        /// Client clock, echoed back.
        client_time: u64,
    },

    /// Server → Client: keep-alive reply.
    HeartbeatAck {
        /// Echo of the heartbeat's client time.
        client_time: u64,
        /// Server clock.
        server_time: u64,
    },

    /// Client → Server: create a room with the sender as host. The
    /// connection is bound to the new room on success.
    CreateRoom {
        /// Operator-chosen id.
        room_id: RoomId,
        /// Game mode.
        mode: GameMode,
        /// Host display name.
        host_name: String,
        /// Overrides of the server defaults.
        #[serde(default)]
        settings: RoomSettings,
    },

    /// Server → Client: room created.
    RoomCreated {
        /// The new room's id.
        room_id: RoomId,
    },

    /// Client → Server: list live rooms.
    ListRooms,

    /// Server → Client: reply to `ListRooms`.
    RoomList {
        /// Live rooms.
        rooms: Vec<RoomListEntry>,
    },

    /// Server → Client: connection-level failure, HTTP-like code
    /// (400 bad request, 401 unauthorized, 404 not found, 409 conflict).
    Error {
        /// Status code.
        code: u16,
        /// Human-readable message.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// What an envelope carries.
///
/// Adjacently tagged: `{"type":"Command","data":{"room_id":"bgo-1",
/// "command":{"type":"drawNumber"}}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    /// Connection-level message.
    System(SystemMessage),
    /// Client → Server: a command for one room.
    Command {
        /// Target room.
        room_id: RoomId,
        /// The command.
        command: ClientCommand,
    },
    /// Server → Client: an event from one room.
    Event {
        /// Source room.
        room_id: RoomId,
        /// The event.
        event: ServerEvent,
    },
}

/// The outer frame for every message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Per-connection sequence number, assigned by the sender.
    pub seq: u64,
    /// Sender clock in milliseconds.
    pub timestamp: u64,
    /// The message.
    pub payload: Payload,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card() -> BingoCard {
        BingoCard {
            rows: [
                [1, 16, 31, 46, 61],
                [2, 17, 32, 47, 62],
                [3, 18, 33, 48, 63],
                [4, 19, 34, 49, 64],
                [5, 20, 35, 50, 65],
            ],
        }
    }

    // =====================================================================
    // Ids
    // =====================================================================

    #[test]
    fn test_room_id_new_accepts_bounds() {
        assert!(RoomId::new("a").is_ok());
        assert!(RoomId::new("r".repeat(32)).is_ok());
    }

    #[test]
    fn test_room_id_new_rejects_empty_and_overlong() {
        assert!(matches!(
            RoomId::new(""),
            Err(ProtocolError::InvalidId { kind: "room", .. })
        ));
        assert!(RoomId::new("r".repeat(33)).is_err());
    }

    #[test]
    fn test_room_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&RoomId::new("bgo-1").unwrap()).unwrap();
        assert_eq!(json, "\"bgo-1\"");
    }

    #[test]
    fn test_participant_id_deserialize_validates_length() {
        let ok: ParticipantId = serde_json::from_str("\"alice\"").unwrap();
        assert_eq!(ok.as_str(), "alice");
        let err = serde_json::from_str::<ParticipantId>("\"\"");
        assert!(err.is_err());
    }

    // =====================================================================
    // Vocabulary
    // =====================================================================

    #[test]
    fn test_win_category_wire_names() {
        assert_eq!(serde_json::to_string(&WinCategory::Line).unwrap(), "\"line\"");
        assert_eq!(
            serde_json::to_string(&WinCategory::FullHouse).unwrap(),
            "\"fullHouse\""
        );
    }

    #[test]
    fn test_pause_reason_wire_names() {
        assert_eq!(
            serde_json::to_string(&PauseReason::AwaitingLineConfirmation).unwrap(),
            "\"awaiting-line-confirmation\""
        );
        assert_eq!(
            serde_json::to_string(&WinCategory::FullHouse.pause_reason()).unwrap(),
            "\"awaiting-fullhouse-confirmation\""
        );
    }

    #[test]
    fn test_phase_terminal_and_joinable() {
        assert!(Phase::Ended.is_terminal());
        assert!(Phase::Complete.is_terminal());
        assert!(!Phase::PausedForConfirmation.is_terminal());
        assert!(Phase::Waiting.is_joinable());
        assert!(!Phase::Active.is_joinable());
    }

    #[test]
    fn test_policies_default_to_observed_behavior() {
        assert_eq!(ClaimVerification::default(), ClaimVerification::HostTrusted);
        assert_eq!(FullHouseOrdering::default(), FullHouseOrdering::HostMayBypass);
    }

    // =====================================================================
    // BingoCard
    // =====================================================================

    #[test]
    fn test_column_range_bands() {
        assert_eq!(BingoCard::column_range(0), 1..=15);
        assert_eq!(BingoCard::column_range(4), 61..=75);
    }

    #[test]
    fn test_lines_has_rows_columns_and_diagonals() {
        let lines = card().lines();
        assert_eq!(lines.len(), 12);
        assert!(lines.contains(&[1, 16, 31, 46, 61]));
        assert!(lines.contains(&[1, 2, 3, 4, 5]));
        assert!(lines.contains(&[1, 17, 33, 49, 65]));
        assert!(lines.contains(&[61, 47, 33, 19, 5]));
    }

    #[test]
    fn test_satisfies_line_with_column_only() {
        let covered = |n: u8| (16..=20).contains(&n);
        assert!(card().satisfies(WinCategory::Line, covered));
        assert!(!card().satisfies(WinCategory::FullHouse, covered));
    }

    #[test]
    fn test_satisfies_full_house_requires_every_cell() {
        let c = card();
        assert!(c.satisfies(WinCategory::FullHouse, |_| true));
        assert!(!c.satisfies(WinCategory::FullHouse, |n| n != 33));
        assert!(c.contains(33));
        assert!(!c.contains(75));
    }

    // =====================================================================
    // Envelope / system messages
    // =====================================================================

    #[test]
    fn test_system_message_handshake_json_format() {
        let msg = SystemMessage::Handshake {
            version: 1,
            token: Some("alice".into()),
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "Handshake");
        assert_eq!(json["token"], "alice");
    }

    #[test]
    fn test_create_room_settings_default_when_missing() {
        let raw = r#"{"type":"CreateRoom","room_id":"q-1","mode":"quiz","host_name":"H"}"#;
        let msg: SystemMessage = serde_json::from_str(raw).unwrap();
        match msg {
            SystemMessage::CreateRoom { settings, mode, .. } => {
                assert_eq!(mode, GameMode::Quiz);
                assert_eq!(settings, RoomSettings::default());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_payload_event_json_format() {
        let payload = Payload::Event {
            room_id: RoomId::new("bgo-1").unwrap(),
            event: ServerEvent::AutoplayChanged { enabled: true },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "Event");
        assert_eq!(json["data"]["room_id"], "bgo-1");
        assert_eq!(json["data"]["event"]["type"], "autoplayChanged");
        assert_eq!(json["data"]["event"]["enabled"], true);
    }

    #[test]
    fn test_decode_unknown_system_message_type_returns_error() {
        let raw = r#"{"type":"Teleport"}"#;
        assert!(serde_json::from_str::<SystemMessage>(raw).is_err());
    }
}
