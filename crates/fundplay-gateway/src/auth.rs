//! Authentication hook for validating participant identity.
//!
//! fundplay doesn't implement authentication itself. It defines the
//! [`Authenticator`] trait: a single async method that takes the token from
//! the client's handshake and returns a `ParticipantId` or an error. The
//! handler calls it before the connection may touch any room.

use fundplay_protocol::ParticipantId;

use crate::GatewayError;

/// Validates a client's auth token and returns their identity.
///
/// # Trait bounds
///
/// - `Send + Sync`: shared by every connection task.
/// - `'static`: lives as long as the server.
///
/// # Example
///
/// ```rust
/// use fundplay_gateway::{Authenticator, GatewayError};
/// use fundplay_protocol::ParticipantId;
///
/// /// Accepts tokens of the form `guest:<name>`.
/// struct GuestAuthenticator;
///
/// impl Authenticator for GuestAuthenticator {
///     async fn authenticate(
///         &self,
///         token: &str,
///     ) -> Result<ParticipantId, GatewayError> {
///         let name = token.strip_prefix("guest:").ok_or_else(|| {
///             GatewayError::AuthFailed("expected a guest token".into())
///         })?;
///         ParticipantId::new(name)
///             .map_err(|e| GatewayError::AuthFailed(e.to_string()))
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Validates the given token and returns the participant's identity.
    ///
    /// Called during the handshake when a client sends a
    /// [`SystemMessage::Handshake`](fundplay_protocol::SystemMessage::Handshake).
    ///
    /// # Returns
    /// - `Ok(ParticipantId)`: this connection acts as that participant
    /// - `Err(GatewayError::AuthFailed)`: token is invalid
    fn authenticate(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = Result<ParticipantId, GatewayError>> + Send;
}

/// Trusts the client: the token *is* the participant id.
///
/// Wallet-style frontends sign in on their own and present the resulting
/// address; deployments that need verification plug in their own
/// [`Authenticator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAuthenticator;

impl Authenticator for OpenAuthenticator {
    async fn authenticate(&self, token: &str) -> Result<ParticipantId, GatewayError> {
        ParticipantId::new(token.trim()).map_err(|e| GatewayError::AuthFailed(e.to_string()))
    }
}
