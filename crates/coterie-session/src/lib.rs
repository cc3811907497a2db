//! Session-side state for the Coterie play-together client.
//!
//! This crate holds everything the client knows about the session it is
//! in, without any networking:
//!
//! 1. **Storage** — the durable get/set/remove hook ([`Storage`])
//! 2. **Session directory** — the rejoin reference and the confirmed
//!    session ([`SessionDirectory`])
//! 3. **Roster** — who is in the session ([`Roster`])
//! 4. **Event log** — chat, rolls and checks in order ([`EventLog`])
//!
//! # How it fits in the stack
//!
//! ```text
//! Client (above)   ← drives these from socket callbacks and commands
//!     ↕
//! Session (this crate)  ← derived state, persistence
//!     ↕
//! Protocol (below)  ← provides SessionJoined, Participant, Event
//! ```

mod directory;
mod error;
mod event_log;
mod roster;
mod storage;

pub use directory::{
    ActiveSession, SessionDirectory, SessionReference, LAST_JOIN_OPTIONS_KEY,
};
pub use error::SessionError;
pub use event_log::{EventLog, Ingested};
pub use roster::Roster;
pub use storage::{FileStorage, MemoryStorage, Storage};
