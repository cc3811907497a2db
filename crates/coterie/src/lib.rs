//! # Coterie
//!
//! Real-time play-together client for a tabletop character keeper.
//!
//! Participants share dice rolls, rouse and remorse checks, and short chat
//! lines in a session. This crate keeps one participant connected to the
//! session server through drops and reloads:
//!
//! - [`ConnectionManager`] — lifecycle state machine with bounded
//!   exponential reconnect and an outbound [`MessageQueue`]
//! - [`SessionClient`] — all client state in one owned value: connection,
//!   session directory, roster, event log
//! - [`ClientDriver`] / [`ClientHandle`] — the async actor that runs a
//!   `SessionClient` against a real socket
//!
//! The state machine and the client do no IO. They are driven by method
//! calls and emit [`Effect`]s, which makes every lifecycle rule testable
//! without a network.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use coterie::prelude::*;
//!
//! # async fn demo() -> Result<(), CoterieError> {
//! let config = ClientConfig::new("ws://127.0.0.1:3000/ws")
//!     .with_character_name("Mara");
//! let (client, _task) =
//!     coterie::spawn_websocket(config, MemoryStorage::new());
//!
//! client.join_session(SessionReference::coterie("abc")).await?;
//! let roll = client.roll_pool(6, 2).await?;
//! println!("{} successes", roll.total_successes);
//! # Ok(())
//! # }
//! ```

mod client;
mod config;
mod connection;
mod driver;
mod error;
mod queue;

pub use client::{ClientEvent, SessionClient};
pub use config::{ClientConfig, ReconnectPolicy, DEFAULT_URL};
pub use connection::{
    CloseOutcome, ConnectionManager, ConnectionState, Effect, SocketId,
};
#[cfg(feature = "websocket")]
pub use driver::spawn_websocket;
pub use driver::{spawn, ClientDriver, ClientHandle, Snapshot};
pub use error::{CoterieError, ValidationError};
pub use queue::MessageQueue;

/// Re-exports of the types most callers need.
pub mod prelude {
    pub use crate::{
        ClientConfig, ClientEvent, ClientHandle, ConnectionState,
        CoterieError, ReconnectPolicy, SessionClient, Snapshot,
        ValidationError,
    };
    pub use coterie_dice::{
        Die, DieFace, OutcomeKind, RemorseOutcome, Resolution, RollRecord,
        RouseOutcome, resolve, resolve_faces,
    };
    pub use coterie_protocol::{
        Author, ChatEvent, ClientMessage, CoterieId, DiceRollEvent, Event,
        Participant, ServerMessage, SessionId, SessionType, UserId,
    };
    pub use coterie_session::{
        FileStorage, MemoryStorage, SessionReference, Storage,
    };
}
