//! Error types for the Coterie client.

use coterie_dice::DiceError;
use coterie_protocol::{ProtocolError, MAX_CHAT_MESSAGE_CHARS};
use coterie_session::SessionError;
use coterie_transport::TransportError;

/// A client-side precondition failed. The request was never sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// Chat text was empty after trimming.
    #[error("chat message is empty")]
    EmptyChat,

    /// Chat text was longer than the server accepts.
    #[error("chat message is {0} characters, limit {MAX_CHAT_MESSAGE_CHARS}")]
    ChatTooLong(usize),

    /// A rouse or remorse die was outside `1..=10`.
    #[error("roll {0} is outside 1..=10")]
    RollOutOfRange(u8),

    /// A remorse check needs at least one die.
    #[error("remorse check has no dice")]
    NoRemorseDice,

    /// Hunger outside `0..=5`.
    #[error("hunger {0} is outside 0..=5")]
    HungerOutOfRange(u8),

    /// Humanity outside `0..=10`.
    #[error("humanity {0} is outside 0..=10")]
    HumanityOutOfRange(u8),

    /// A roll record whose results are not the engine's output for its
    /// dice.
    #[error("roll results do not match its dice")]
    InconsistentRoll,

    /// A roll record with no dice.
    #[error("roll has no dice")]
    EmptyRoll,

    /// The dice layer rejected the request.
    #[error(transparent)]
    Dice(#[from] DiceError),
}

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant lets `?` convert sub-crate
/// errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum CoterieError {
    /// A transport-level error (connect, send, recv).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (storage).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A request rejected before sending.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The driver task has stopped; the handle is dead.
    #[error("client driver has stopped")]
    DriverStopped,
}
