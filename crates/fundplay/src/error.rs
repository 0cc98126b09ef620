//! Unified error type for the fundplay server.

use fundplay_gateway::GatewayError;
use fundplay_protocol::ProtocolError;
use fundplay_room::RoomError;
use fundplay_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant auto-generates `From` impls,
/// so the `?` operator converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum FundplayError {
    /// A transport-level error (bind, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, invalid message).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A gateway-level error (auth, binding, routing).
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    /// A room-level error (not found, invalid settings, refused).
    #[error(transparent)]
    Room(#[from] RoomError),

    /// A configuration value could not be used.
    #[error("invalid configuration {key}={value:?}: {reason}")]
    Config {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use fundplay_protocol::RoomId;

    use super::*;

    #[test]
    fn test_from_transport_error() {
        let err = TransportError::ConnectionClosed("gone".into());
        let fundplay_err: FundplayError = err.into();
        assert!(matches!(fundplay_err, FundplayError::Transport(_)));
        assert!(fundplay_err.to_string().contains("gone"));
    }

    #[test]
    fn test_from_protocol_error() {
        let err = ProtocolError::InvalidMessage("bad".into());
        let fundplay_err: FundplayError = err.into();
        assert!(matches!(fundplay_err, FundplayError::Protocol(_)));
    }

    #[test]
    fn test_from_gateway_error() {
        let err = GatewayError::AuthFailed("nope".into());
        let fundplay_err: FundplayError = err.into();
        assert!(matches!(fundplay_err, FundplayError::Gateway(_)));
    }

    #[test]
    fn test_from_room_error() {
        let err = RoomError::NotFound(RoomId::new("bgo-1").unwrap());
        let fundplay_err: FundplayError = err.into();
        assert!(matches!(fundplay_err, FundplayError::Room(_)));
        assert!(fundplay_err.to_string().contains("bgo-1"));
    }
}
