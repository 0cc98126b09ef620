//! Client → Server room commands.

use serde::{Deserialize, Serialize};

use crate::{ParticipantId, WinCategory};

/// Every command a client can send to a room.
///
/// A closed set: the room session matches on it exhaustively, so each
/// phase's valid-transition table is checked by the compiler.
///
/// Serialized with an internal `"type"` tag in camelCase, e.g.
/// `{"type":"proposeWin","category":"line","claimants":["alice"]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientCommand {
    /// Join the room (or resync after a reconnect).
    Join {
        /// Display name shown to peers.
        name: String,
    },
    /// Leave the room for good.
    Leave,
    /// Player readiness before the game starts.
    SetReady {
        /// New readiness.
        ready: bool,
    },
    /// Host: start a bingo game.
    StartGame,
    /// Host: start a quiz.
    StartQuiz,
    /// Host: draw the next number now, resetting the autoplay cadence.
    DrawNumber,
    /// Host: flip autoplay.
    ToggleAutoplay,
    /// Claim a win. Players may only name themselves.
    ProposeWin {
        /// Claimed category.
        category: WinCategory,
        /// Participants claimed to have won.
        claimants: Vec<ParticipantId>,
    },
    /// Host: accept the pending claim.
    ConfirmWin {
        /// Must match the pending claim's category.
        category: WinCategory,
    },
    /// Host: throw out the pending claim and resume.
    RejectWin {
        /// Must match the pending claim's category.
        category: WinCategory,
    },
    /// Host: issue the next quiz question.
    NextQuestion,
    /// Host: advance to the next quiz round.
    NextRound,
    /// Host: end a bingo game.
    EndGame,
    /// Host: end a quiz.
    EndQuiz,
    /// Player: toggle a mark on their own card.
    MarkCell {
        /// Number on the player's card.
        number: u8,
    },
    /// Player: answer the open quiz question.
    SubmitAnswer {
        /// Index into the question's options.
        option: usize,
    },
}

impl ClientCommand {
    /// The wire tag, for logs and rejection events.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Join { .. } => "join",
            Self::Leave => "leave",
            Self::SetReady { .. } => "setReady",
            Self::StartGame => "startGame",
            Self::StartQuiz => "startQuiz",
            Self::DrawNumber => "drawNumber",
            Self::ToggleAutoplay => "toggleAutoplay",
            Self::ProposeWin { .. } => "proposeWin",
            Self::ConfirmWin { .. } => "confirmWin",
            Self::RejectWin { .. } => "rejectWin",
            Self::NextQuestion => "nextQuestion",
            Self::NextRound => "nextRound",
            Self::EndGame => "endGame",
            Self::EndQuiz => "endQuiz",
            Self::MarkCell { .. } => "markCell",
            Self::SubmitAnswer { .. } => "submitAnswer",
        }
    }

    /// Commands only the host may issue.
    pub fn is_host_only(&self) -> bool {
        matches!(
            self,
            Self::StartGame
                | Self::StartQuiz
                | Self::DrawNumber
                | Self::ToggleAutoplay
                | Self::ConfirmWin { .. }
                | Self::RejectWin { .. }
                | Self::NextQuestion
                | Self::NextRound
                | Self::EndGame
                | Self::EndQuiz
        )
    }

    /// `endGame` / `endQuiz`.
    pub fn is_termination(&self) -> bool {
        matches!(self, Self::EndGame | Self::EndQuiz)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propose_win_json_format() {
        let cmd = ClientCommand::ProposeWin {
            category: WinCategory::FullHouse,
            claimants: vec![ParticipantId::new("a").unwrap()],
        };
        let json = serde_json::to_value(&cmd).unwrap();
        assert_eq!(json["type"], "proposeWin");
        assert_eq!(json["category"], "fullHouse");
        assert_eq!(json["claimants"][0], "a");
    }

    #[test]
    fn test_unit_commands_decode_from_tag_only() {
        let cmd: ClientCommand =
            serde_json::from_str(r#"{"type":"nextRound"}"#).unwrap();
        assert_eq!(cmd, ClientCommand::NextRound);
    }

    #[test]
    fn test_kind_matches_wire_tag() {
        let cmds = [
            ClientCommand::Join { name: "A".into() },
            ClientCommand::SetReady { ready: true },
            ClientCommand::MarkCell { number: 7 },
            ClientCommand::SubmitAnswer { option: 1 },
            ClientCommand::ToggleAutoplay,
        ];
        for cmd in cmds {
            let json = serde_json::to_value(&cmd).unwrap();
            assert_eq!(json["type"], cmd.kind());
        }
    }

    #[test]
    fn test_is_host_only_splits_player_commands() {
        assert!(ClientCommand::DrawNumber.is_host_only());
        assert!(ClientCommand::ConfirmWin { category: WinCategory::Line }.is_host_only());
        assert!(!ClientCommand::Leave.is_host_only());
        assert!(!ClientCommand::ProposeWin {
            category: WinCategory::Line,
            claimants: vec![],
        }
        .is_host_only());
        assert!(ClientCommand::EndQuiz.is_termination());
    }

    #[test]
    fn test_decode_unknown_command_returns_error() {
        let result = serde_json::from_str::<ClientCommand>(r#"{"type":"cheat"}"#);
        assert!(result.is_err());
    }
}
