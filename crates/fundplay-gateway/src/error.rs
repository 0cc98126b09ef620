//! Error types for the gateway layer.

use fundplay_protocol::{RejectReason, RoomId};
use fundplay_room::RoomError;

/// Errors that can occur while authenticating, binding or routing.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The [`Authenticator`](crate::Authenticator) refused the token.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The connection is not bound to the addressed room.
    #[error("connection is not in room {0}")]
    NotInRoom(RoomId),

    /// The connection already speaks for a participant of another room.
    /// It has to `leave` there first.
    #[error("connection is already bound to room {0}")]
    AlreadyBound(RoomId),

    /// The room refused or could not be reached.
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl GatewayError {
    /// The reason code for the offending client, or `None` when the room
    /// has already delivered its own `rejected` event on the connection.
    pub fn client_rejection(&self) -> Option<RejectReason> {
        match self {
            Self::AuthFailed(_) => Some(RejectReason::Unauthorized),
            Self::NotInRoom(_) => Some(RejectReason::NotInRoom),
            Self::AlreadyBound(_) => Some(RejectReason::InvalidTransition),
            Self::Room(RoomError::Rejected(_)) => None,
            Self::Room(e) => Some(e.reject_reason()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> RoomId {
        RoomId::new("bgo-1").unwrap()
    }

    #[test]
    fn test_client_rejection_not_in_room_maps_to_not_in_room() {
        let err = GatewayError::NotInRoom(room());
        assert_eq!(err.client_rejection(), Some(RejectReason::NotInRoom));
    }

    #[test]
    fn test_client_rejection_missing_room_maps_to_room_not_found() {
        let err: GatewayError = RoomError::NotFound(room()).into();
        assert_eq!(err.client_rejection(), Some(RejectReason::RoomNotFound));
    }

    #[test]
    fn test_client_rejection_room_refusal_is_already_delivered() {
        let err: GatewayError = RoomError::Rejected(RejectReason::Unauthorized).into();
        assert_eq!(err.client_rejection(), None);
    }
}
