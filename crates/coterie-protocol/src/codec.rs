//! Codec trait and implementations for serializing/deserializing messages.
//!
//! A codec converts between Rust types and frame bytes. The rest of the
//! client only sees the [`Codec`] trait, so the wire format can change
//! without touching session or connection code.
//!
//! The play-together server speaks JSON text frames, so [`JsonCodec`] is
//! the only implementation today.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// A codec that can encode Rust types to bytes and decode bytes back.
///
/// `Send + Sync + 'static` because the codec lives inside the long-running
/// driver task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed,
    /// incomplete, or don't match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;

    /// Serializes a value into a text frame.
    fn encode_text<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<String, ProtocolError> {
        String::from_utf8(self.encode(value)?)
            .map_err(|_| ProtocolError::NotText)
    }

    /// Deserializes a text frame.
    fn decode_text<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> Result<T, ProtocolError> {
        self.decode(text.as_bytes())
    }
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] that uses JSON (via `serde_json`).
///
/// Behind the `json` feature flag (enabled by default).
///
/// ## Example
///
/// ```rust
/// use coterie_protocol::{ClientMessage, Codec, JsonCodec};
///
/// let codec = JsonCodec;
/// let msg = ClientMessage::LeaveSession;
///
/// let text = codec.encode_text(&msg).unwrap();
/// assert_eq!(text, r#"{"type":"leave_session"}"#);
///
/// let decoded: ClientMessage = codec.decode_text(&text).unwrap();
/// assert_eq!(decoded, msg);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }

    fn encode_text<T: Serialize>(
        &self,
        value: &T,
    ) -> Result<String, ProtocolError> {
        serde_json::to_string(value).map_err(ProtocolError::Encode)
    }

    fn decode_text<T: DeserializeOwned>(
        &self,
        text: &str,
    ) -> Result<T, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Decode)
    }
}
