//! Reason codes carried by `rejected` events.

use serde::{Deserialize, Serialize};

/// Why a command was refused.
///
/// A rejection only ever reaches the offending connection; the room's
/// state and every other participant's view are untouched.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, thiserror::Error,
)]
#[serde(rename_all = "camelCase")]
pub enum RejectReason {
    /// Not valid in the room's current phase or mode.
    #[error("command is not valid in the current phase")]
    InvalidTransition,
    /// A non-host issued a host-only command, or claimed for someone else.
    #[error("not permitted for this participant")]
    Unauthorized,
    /// The connection is not bound to the addressed room, or the
    /// participant is not on its roster.
    #[error("not in room")]
    NotInRoom,
    /// No live room has this id.
    #[error("room not found")]
    RoomNotFound,
    /// A live room already uses this id.
    #[error("room already exists")]
    RoomAlreadyExists,
    /// Another claim is awaiting confirmation.
    #[error("a win claim is already pending")]
    ClaimAlreadyPending,
    /// The category has confirmed winners.
    #[error("category already won")]
    CategoryAlreadyWon,
    /// The current round has no more questions, or no rounds remain.
    #[error("round limit reached")]
    RoundLimitReached,
    /// Not every player is ready, or too few players joined.
    #[error("roster is not ready")]
    RosterNotReady,
    /// The roster cap is reached.
    #[error("room is full")]
    RoomFull,
    /// A claimant is unknown, the host, duplicated away to nothing, or
    /// there are too many claimants.
    #[error("invalid claimants")]
    InvalidClaim,
    /// A claimant's card does not satisfy the category.
    #[error("claim does not match the call history")]
    ClaimNotVerified,
    /// Full house claimed before the line was confirmed.
    #[error("line must be confirmed first")]
    LineNotConfirmed,
    /// Malformed arguments or unusable settings.
    #[error("invalid command")]
    InvalidCommand,
}

impl RejectReason {
    /// Boundary conditions that are reported but are not failures.
    pub fn is_informational(self) -> bool {
        self == Self::RoundLimitReached
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reject_reason_wire_codes() {
        assert_eq!(
            serde_json::to_string(&RejectReason::ClaimAlreadyPending).unwrap(),
            "\"claimAlreadyPending\""
        );
        assert_eq!(
            serde_json::to_string(&RejectReason::NotInRoom).unwrap(),
            "\"notInRoom\""
        );
    }

    #[test]
    fn test_only_round_limit_is_informational() {
        assert!(RejectReason::RoundLimitReached.is_informational());
        assert!(!RejectReason::InvalidTransition.is_informational());
    }
}
