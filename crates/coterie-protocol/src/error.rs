//! Error types for the protocol layer.
//!
//! A `ProtocolError` always means the problem is in turning frames into
//! messages or back, never in the network or in session state.

/// Errors that can occur while encoding or decoding wire messages.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed.
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or a
    /// `type` discriminant this client does not know.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// The frame was not valid UTF-8 text.
    #[error("frame is not valid UTF-8")]
    NotText,

    /// The message parsed but breaks a protocol rule.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
