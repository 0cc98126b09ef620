//! Server → Client room events and the full-state snapshot.

use serde::{Deserialize, Serialize};

use crate::{
    BingoCard, GameMode, Liveness, ParticipantId, PauseReason, Phase,
    RejectReason, Role, RoomId, WinCategory,
};

/// One roster entry as every peer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantView {
    pub id: ParticipantId,
    pub name: String,
    pub role: Role,
    pub ready: bool,
    pub liveness: Liveness,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card: Option<BingoCard>,
    /// Marked numbers, ascending.
    #[serde(default)]
    pub marked: Vec<u8>,
    #[serde(default)]
    pub score: u32,
    #[serde(default)]
    pub has_answered: bool,
}

/// A claim awaiting host confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WinClaim {
    pub category: WinCategory,
    pub claimants: Vec<ParticipantId>,
}

/// Confirmed winners of one bingo category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWinners {
    pub category: WinCategory,
    pub winners: Vec<ParticipantId>,
}

/// Quiz counters. `question_index` is 0 right after a round starts and
/// counts issued questions from there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuizProgress {
    pub round: u32,
    pub question_index: u32,
    pub total_rounds: u32,
    pub questions_per_round: u32,
}

/// The question currently on screen. The correct option never leaves
/// the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    pub round: u32,
    pub question_index: u32,
    pub text: String,
    pub options: Vec<String>,
    pub time_limit_secs: u32,
}

/// What a group of final winners won.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Award {
    /// A bingo category.
    Bingo { category: WinCategory },
    /// A quiz placing (1-based) with the winning score.
    Quiz { place: u8, score: u32 },
}

/// One entry of a room's final result, in award order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    pub award: Award,
    pub winners: Vec<ParticipantId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreEntry {
    pub participant_id: ParticipantId,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DealtCard {
    pub participant_id: ParticipantId,
    pub card: BingoCard,
}

/// The room's complete authoritative state.
///
/// Every connection that binds (or rebinds) receives one, so a client
/// converges to exactly what its peers see without replaying deltas.
/// `revision` increases with every accepted mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub room_id: RoomId,
    pub mode: GameMode,
    pub host: ParticipantId,
    pub phase: Phase,
    pub pause_reason: Option<PauseReason>,
    pub autoplay: bool,
    pub revision: u64,
    pub participants: Vec<ParticipantView>,
    /// Call history in draw order.
    pub called: Vec<u8>,
    pub pending_claim: Option<WinClaim>,
    pub winners: Vec<CategoryWinners>,
    pub quiz: Option<QuizProgress>,
    pub question: Option<QuestionView>,
    pub question_open: bool,
}

impl RoomSnapshot {
    /// Looks up a roster entry.
    pub fn participant(&self, id: &ParticipantId) -> Option<&ParticipantView> {
        self.participants.iter().find(|p| &p.id == id)
    }

    /// Confirmed winners of `category`, empty if none.
    pub fn winners_of(&self, category: WinCategory) -> &[ParticipantId] {
        self.winners
            .iter()
            .find(|w| w.category == category)
            .map(|w| w.winners.as_slice())
            .unwrap_or(&[])
    }
}

/// Every event a room can emit.
///
/// Serialized with an internal `"type"` tag in camelCase, e.g.
/// `{"type":"numberCalled","value":42,"history":[7,42]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Full resync, sent to a connection when it binds.
    RoomSnapshot { snapshot: RoomSnapshot },
    ParticipantJoined { participant: ParticipantView },
    ParticipantLeft { participant_id: ParticipantId },
    LivenessChanged { participant_id: ParticipantId, liveness: Liveness },
    ReadinessChanged { participant_id: ParticipantId, ready: bool },
    /// The game left `Waiting`. `cards` is empty for quizzes.
    GameStarted { phase: Phase, cards: Vec<DealtCard> },
    AutoplayChanged { enabled: bool },
    NumberCalled { value: u8, history: Vec<u8> },
    /// Host only.
    CellMarked { participant_id: ParticipantId, number: u8, marked: bool },
    QuestionIssued {
        round: u32,
        question_index: u32,
        text: String,
        options: Vec<String>,
        time_limit_seconds: u32,
    },
    /// The countdown elapsed; the phase is unchanged until the host acts.
    QuestionTimeUp { round: u32, question_index: u32 },
    /// Host only.
    AnswerReceived { participant_id: ParticipantId },
    ScoresUpdated { scores: Vec<ScoreEntry> },
    RoundAdvanced { round: u32 },
    RoundLimitReached { round: u32 },
    WinPending { category: WinCategory, claimants: Vec<ParticipantId> },
    WinConfirmed { category: WinCategory, winners: Vec<ParticipantId> },
    WinRejected { category: WinCategory, claimants: Vec<ParticipantId> },
    GameEnded { final_winners: Vec<Standing> },
    /// Sent only to the issuer of a refused command.
    Rejected { command: String, reason: RejectReason },
    /// Host only: the settlement call failed. Game state stands.
    SettlementFailed { message: String },
    /// The room was removed from the registry.
    RoomClosed { reason: String },
}

impl ServerEvent {
    /// The wire tag, for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RoomSnapshot { .. } => "roomSnapshot",
            Self::ParticipantJoined { .. } => "participantJoined",
            Self::ParticipantLeft { .. } => "participantLeft",
            Self::LivenessChanged { .. } => "livenessChanged",
            Self::ReadinessChanged { .. } => "readinessChanged",
            Self::GameStarted { .. } => "gameStarted",
            Self::AutoplayChanged { .. } => "autoplayChanged",
            Self::NumberCalled { .. } => "numberCalled",
            Self::CellMarked { .. } => "cellMarked",
            Self::QuestionIssued { .. } => "questionIssued",
            Self::QuestionTimeUp { .. } => "questionTimeUp",
            Self::AnswerReceived { .. } => "answerReceived",
            Self::ScoresUpdated { .. } => "scoresUpdated",
            Self::RoundAdvanced { .. } => "roundAdvanced",
            Self::RoundLimitReached { .. } => "roundLimitReached",
            Self::WinPending { .. } => "winPending",
            Self::WinConfirmed { .. } => "winConfirmed",
            Self::WinRejected { .. } => "winRejected",
            Self::GameEnded { .. } => "gameEnded",
            Self::Rejected { .. } => "rejected",
            Self::SettlementFailed { .. } => "settlementFailed",
            Self::RoomClosed { .. } => "roomClosed",
        }
    }
}
