//! Wire protocol for the Coterie play-together session.
//!
//! - **Types** ([`ClientMessage`], [`ServerMessage`], [`Event`], etc.) —
//!   the JSON frames exchanged with the session server.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]) — how those messages are
//!   converted to and from frames.
//! - **Errors** ([`ProtocolError`]) — what can go wrong while doing so.
//!
//! # Architecture
//!
//! The protocol layer sits between transport (text frames) and the session
//! client (roster, event log). It knows nothing about sockets or state.
//!
//! ```text
//! Transport (frames) → Protocol (ServerMessage) → Session client (state)
//! ```

mod codec;
mod error;
mod types;

pub use codec::Codec;
#[cfg(feature = "json")]
pub use codec::JsonCodec;
pub use error::ProtocolError;
pub use types::{
    Author, ChatEvent, ClientMessage, CoterieId, DiceRollEvent, ErrorEvent,
    Event, Participant, RemorseCheckEvent, RouseCheckEvent, ServerMessage,
    SessionId, SessionJoined, SessionType, UserId, MAX_CHAT_MESSAGE_CHARS,
};
