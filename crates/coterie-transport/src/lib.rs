//! Client-side transport layer for Coterie.
//!
//! Provides the [`Connector`] and [`Connection`] traits that abstract over
//! how the client reaches the session server, so the connection manager
//! can be driven by a real WebSocket or by an in-memory fake in tests.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket transport via `tokio-tungstenite`

mod error;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

use std::fmt;
use std::future::Future;

/// Process-unique tag for one dialed socket, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dial-{}", self.0)
    }
}

/// Opens outbound connections to the session server.
///
/// The returned futures are `Send` so the driver can run them inside
/// spawned tasks.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Opens a new connection.
    fn connect(
        &self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// A single open connection that exchanges text frames.
///
/// Sending and receiving may run concurrently from different tasks.
pub trait Connection: Send + Sync + 'static {
    /// Sends one text frame.
    fn send_text(
        &self,
        text: &str,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next text frame.
    ///
    /// `Ok(None)` means the server closed the socket cleanly.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<String>, TransportError>> + Send;

    /// Starts the close handshake.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Tag assigned when the socket was dialed.
    fn id(&self) -> ConnectionId;
}
