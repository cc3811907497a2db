//! Error types for the session layer.

/// Errors raised by session bookkeeping and durable storage.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The storage backend failed to read or write.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// A stored value could not be parsed or serialized.
    #[error("stored value under {key} is corrupt: {source}")]
    CorruptValue {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}
