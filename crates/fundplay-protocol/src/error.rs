//! Error types for the protocol layer.

/// Errors that can occur while encoding, decoding or validating frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, an unknown `type` tag,
    /// a missing field, or an identifier that fails validation.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// An identifier is empty or longer than its kind allows.
    #[error("invalid {kind} id {value:?}: must be 1 to {max} characters")]
    InvalidId {
        /// `"room"` or `"participant"`.
        kind: &'static str,
        /// The rejected value.
        value: String,
        /// Maximum length in characters.
        max: usize,
    },

    /// The frame decoded but violates the protocol (wrong first
    /// message, version mismatch, ...).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
