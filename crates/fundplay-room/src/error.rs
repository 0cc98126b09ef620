//! Error types for the room layer.

use fundplay_protocol::{RejectReason, RoomId};

/// Errors that can occur during room operations.
#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    /// No live room has this id.
    #[error("room {0} not found")]
    NotFound(RoomId),

    /// A live room already uses this id.
    #[error("room {0} already exists")]
    AlreadyExists(RoomId),

    /// Merged room settings failed validation.
    #[error("invalid room configuration: {0}")]
    InvalidConfig(String),

    /// `end_room` was called before the session reached a terminal phase.
    #[error("room {0} has not finished")]
    NotFinished(RoomId),

    /// The room's actor has stopped.
    #[error("room {0} is unavailable")]
    Unavailable(RoomId),

    /// The session refused the command.
    #[error(transparent)]
    Rejected(#[from] RejectReason),
}

impl RoomError {
    /// The reason code reported to the client that caused this error.
    pub fn reject_reason(&self) -> RejectReason {
        match self {
            Self::NotFound(_) | Self::Unavailable(_) => RejectReason::RoomNotFound,
            Self::AlreadyExists(_) => RejectReason::RoomAlreadyExists,
            Self::InvalidConfig(_) => RejectReason::InvalidCommand,
            Self::NotFinished(_) => RejectReason::InvalidTransition,
            Self::Rejected(reason) => *reason,
        }
    }
}

/// Errors reported by a [`SettlementBridge`](crate::SettlementBridge).
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    /// The settlement backend refused the winner list.
    #[error("settlement rejected: {0}")]
    Rejected(String),

    /// The settlement backend could not be reached.
    #[error("settlement unavailable: {0}")]
    Unavailable(String),
}
