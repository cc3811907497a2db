//! The connection lifecycle state machine.
//!
//! [`ConnectionManager`] owns the one logical socket, the outbound
//! [`MessageQueue`] and the reconnect bookkeeping. It performs no IO:
//! every input is a method call, and every output is an [`Effect`] that
//! the driver executes and reports back on.
//!
//! ```text
//!                 connect()/send()
//!  Disconnected ───────────────────→ Connecting ──(on_open)──→ Connected
//!       ▲                                │                        │
//!       │                           (on_error)               (on_error)
//!       │                                ▼                        │
//!       └──────────(on_close)─────────  Error  ◀──────────────────┘
//! ```
//!
//! On an unexpected close the manager schedules a reconnect with bounded
//! exponential backoff. Sockets carry a [`SocketId`]; a callback tagged
//! with anything but the current socket's id is stale and ignored, so at
//! most one socket is ever live.
//!
//! Every open starts with a join: the one handed to [`join`] if it has
//! not gone out yet, otherwise the caller's rejoin reference. Queued
//! messages follow it, oldest first.
//!
//! [`join`]: ConnectionManager::join

use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

use coterie_protocol::ClientMessage;

use crate::{MessageQueue, ReconnectPolicy};

/// Lifecycle state of the logical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "disconnected"),
            Self::Connecting => write!(f, "connecting"),
            Self::Connected => write!(f, "connected"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Identifies one physical socket the manager asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SocketId(u64);

impl SocketId {
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sock-{}", self.0)
    }
}

/// IO the driver must perform on the manager's behalf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Open a new socket. Report back with `on_open`, or `on_error`
    /// followed by `on_close` if it fails.
    Open(SocketId),
    /// Write one message to an open socket.
    Transmit {
        socket: SocketId,
        message: ClientMessage,
    },
    /// Close a socket. No further callbacks are expected for it.
    Close(SocketId),
    /// Call `on_reconnect_timer(generation)` after `delay`.
    ScheduleReconnect {
        generation: u64,
        delay: Duration,
        attempt: u32,
    },
    /// Drop the pending reconnect timer, if any.
    CancelReconnect,
}

/// What a close did to the connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Not the current socket; nothing changed.
    Stale,
    /// Closed while manually disconnected; no reconnect.
    Manual,
    /// A reconnect is scheduled.
    Reconnecting { attempt: u32, delay: Duration },
    /// Out of attempts; the counter was reset and nothing is scheduled.
    Exhausted,
}

/// Sans-IO connection lifecycle manager.
#[derive(Debug)]
pub struct ConnectionManager {
    policy: ReconnectPolicy,
    state: ConnectionState,
    socket: Option<SocketId>,
    next_socket: u64,
    attempts: u32,
    manual_disconnect: bool,
    timer: Option<u64>,
    next_timer: u64,
    pending_join: Option<ClientMessage>,
    queue: MessageQueue,
    effects: VecDeque<Effect>,
}

impl ConnectionManager {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            policy,
            state: ConnectionState::Disconnected,
            socket: None,
            next_socket: 1,
            attempts: 0,
            manual_disconnect: false,
            timer: None,
            next_timer: 1,
            pending_join: None,
            queue: MessageQueue::new(),
            effects: VecDeque::new(),
        }
    }

    // -- Accessors -----------------------------------------------------------

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// The current socket, opening or open.
    pub fn socket(&self) -> Option<SocketId> {
        self.socket
    }

    /// Consecutive reconnects scheduled since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn is_manually_disconnected(&self) -> bool {
        self.manual_disconnect
    }

    pub fn reconnect_pending(&self) -> bool {
        self.timer.is_some()
    }

    /// A join waiting for the next open.
    pub fn pending_join(&self) -> Option<&ClientMessage> {
        self.pending_join.as_ref()
    }

    pub fn queue(&self) -> &MessageQueue {
        &self.queue
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    /// Removes and returns the effects produced so far, in order.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        self.effects.drain(..).collect()
    }

    // -- Commands ------------------------------------------------------------

    /// Caller-issued connect.
    ///
    /// Clears the manual-disconnect flag, then opens a socket unless one
    /// is already open or opening.
    pub fn connect(&mut self) {
        self.manual_disconnect = false;
        if self.socket.is_some() {
            return;
        }
        self.cancel_timer();
        self.open_socket();
    }

    /// Caller-issued join.
    ///
    /// Transmits at once if connected. Otherwise the join replaces any
    /// earlier pending one, goes out first on the next open, and a socket
    /// is opened if none is.
    pub fn join(&mut self, message: ClientMessage) {
        self.manual_disconnect = false;
        if let (ConnectionState::Connected, Some(socket)) =
            (self.state, self.socket)
        {
            tracing::debug!(%socket, "transmit join");
            self.effects.push_back(Effect::Transmit { socket, message });
            return;
        }
        self.pending_join = Some(message);
        if self.socket.is_none() {
            self.cancel_timer();
            self.open_socket();
        }
    }

    /// Transmits now if connected, otherwise queues and, when
    /// disconnected, starts connecting.
    pub fn send(&mut self, message: ClientMessage) {
        if let (ConnectionState::Connected, Some(socket)) =
            (self.state, self.socket)
        {
            tracing::debug!(%socket, kind = message.kind(), "transmit");
            self.effects.push_back(Effect::Transmit { socket, message });
            return;
        }

        tracing::debug!(
            kind = message.kind(),
            queued = self.queue.len() + 1,
            "socket not open, queued"
        );
        self.queue.push(message);
        let idle = self.state == ConnectionState::Disconnected;
        if idle && !self.manual_disconnect {
            self.cancel_timer();
            self.open_socket();
        }
    }

    /// Caller-issued disconnect.
    ///
    /// Cancels the reconnect timer before closing the socket, sets the
    /// sticky manual-disconnect flag, and drops queued messages and any
    /// pending join.
    pub fn disconnect(&mut self) {
        self.cancel_timer();
        self.manual_disconnect = true;
        if let Some(socket) = self.socket.take() {
            tracing::info!(%socket, "disconnecting");
            self.effects.push_back(Effect::Close(socket));
        }
        self.state = ConnectionState::Disconnected;
        self.attempts = 0;
        self.pending_join = None;
        self.queue.clear();
    }

    // -- Socket callbacks ----------------------------------------------------

    /// The socket opened. Returns `false` for a stale socket.
    ///
    /// The pending join, or else `rejoin`, is transmitted first. The
    /// queue is flushed after it, oldest first.
    pub fn on_open(
        &mut self,
        socket: SocketId,
        rejoin: Option<ClientMessage>,
    ) -> bool {
        if self.socket != Some(socket) {
            tracing::debug!(%socket, "ignoring open of stale socket");
            return false;
        }
        self.state = ConnectionState::Connected;
        self.attempts = 0;
        tracing::info!(%socket, "connected");

        let join = match self.pending_join.take() {
            Some(join) => Some(join),
            None => {
                if rejoin.is_some() {
                    tracing::info!(%socket, "replaying session join");
                }
                rejoin
            }
        };
        if let Some(message) = join {
            self.effects.push_back(Effect::Transmit { socket, message });
        }
        let flushed = self.queue.len();
        for message in self.queue.drain() {
            self.effects.push_back(Effect::Transmit { socket, message });
        }
        if flushed > 0 {
            tracing::debug!(%socket, flushed, "flushed queued messages");
        }
        true
    }

    /// The socket reported an error. A close normally follows.
    pub fn on_error(&mut self, socket: SocketId) -> bool {
        if self.socket != Some(socket) {
            return false;
        }
        self.state = ConnectionState::Error;
        true
    }

    /// The socket closed, or failed to open.
    pub fn on_close(&mut self, socket: SocketId) -> CloseOutcome {
        if self.socket != Some(socket) {
            tracing::debug!(%socket, "ignoring close of stale socket");
            return CloseOutcome::Stale;
        }
        self.socket = None;
        self.state = ConnectionState::Disconnected;

        if self.manual_disconnect {
            return CloseOutcome::Manual;
        }

        if !self.policy.allows(self.attempts) {
            tracing::info!(
                attempts = self.attempts,
                "reconnect attempts exhausted, giving up"
            );
            self.attempts = 0;
            return CloseOutcome::Exhausted;
        }

        let delay = self.policy.delay_for(self.attempts);
        self.attempts += 1;
        let generation = self.next_timer;
        self.next_timer += 1;
        self.timer = Some(generation);
        tracing::info!(
            attempt = self.attempts,
            delay_ms = delay.as_millis() as u64,
            "reconnect scheduled"
        );
        self.effects.push_back(Effect::ScheduleReconnect {
            generation,
            delay,
            attempt: self.attempts,
        });
        CloseOutcome::Reconnecting {
            attempt: self.attempts,
            delay,
        }
    }

    /// The reconnect timer fired. Returns whether a socket was opened.
    pub fn on_reconnect_timer(&mut self, generation: u64) -> bool {
        if self.timer != Some(generation) {
            tracing::debug!(generation, "ignoring cancelled reconnect timer");
            return false;
        }
        self.timer = None;
        self.open_socket()
    }

    // -- Internals -----------------------------------------------------------

    fn open_socket(&mut self) -> bool {
        if self.manual_disconnect {
            tracing::debug!("manually disconnected, not opening a socket");
            return false;
        }
        if self.socket.is_some() {
            return false;
        }
        let socket = SocketId(self.next_socket);
        self.next_socket += 1;
        self.socket = Some(socket);
        self.state = ConnectionState::Connecting;
        tracing::debug!(%socket, "opening socket");
        self.effects.push_back(Effect::Open(socket));
        true
    }

    fn cancel_timer(&mut self) {
        if self.timer.take().is_some() {
            self.effects.push_back(Effect::CancelReconnect);
        }
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(ReconnectPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chat(text: &str) -> ClientMessage {
        ClientMessage::ChatMessage {
            message: text.into(),
            character_name: None,
        }
    }

    fn opened(manager: &mut ConnectionManager) -> SocketId {
        let effects = manager.take_effects();
        match effects.last() {
            Some(Effect::Open(socket)) => *socket,
            other => panic!("expected Open, got {other:?}"),
        }
    }

    fn scheduled(manager: &mut ConnectionManager) -> u64 {
        let effects = manager.take_effects();
        match effects.last() {
            Some(Effect::ScheduleReconnect { generation, .. }) => *generation,
            other => panic!("expected ScheduleReconnect, got {other:?}"),
        }
    }

    // =====================================================================
    // connect / open
    // =====================================================================

    #[test]
    fn test_connect_from_disconnected_emits_open() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.take_effects(), vec![Effect::Open(SocketId(1))]);
    }

    #[test]
    fn test_connect_while_opening_is_noop() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        manager.take_effects();
        manager.connect();
        assert!(manager.take_effects().is_empty());
    }

    #[test]
    fn test_on_open_resets_attempts_and_connects() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.on_error(socket);
        manager.on_close(socket);
        let generation = scheduled(&mut manager);
        assert_eq!(manager.attempts(), 1);

        manager.on_reconnect_timer(generation);
        let socket = opened(&mut manager);
        assert!(manager.on_open(socket, None));

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert_eq!(manager.attempts(), 0);
    }

    #[test]
    fn test_on_open_stale_socket_ignored() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.disconnect();

        assert!(!manager.on_open(socket, None));
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    // =====================================================================
    // send / queue
    // =====================================================================

    #[test]
    fn test_send_connected_transmits_immediately() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.on_open(socket, None);
        manager.take_effects();

        manager.send(chat("hi"));

        assert_eq!(
            manager.take_effects(),
            vec![Effect::Transmit {
                socket,
                message: chat("hi")
            }]
        );
    }

    #[test]
    fn test_send_disconnected_queues_and_connects() {
        let mut manager = ConnectionManager::default();
        manager.send(chat("hi"));

        assert_eq!(manager.queue().len(), 1);
        assert_eq!(manager.state(), ConnectionState::Connecting);
        assert_eq!(manager.take_effects(), vec![Effect::Open(SocketId(1))]);
    }

    #[test]
    fn test_send_while_connecting_only_queues() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        manager.take_effects();

        manager.send(chat("a"));
        manager.send(chat("b"));

        assert_eq!(manager.queue().len(), 2);
        assert!(manager.take_effects().is_empty());
    }

    #[test]
    fn test_on_open_flushes_after_rejoin_in_order() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.send(chat("a"));
        manager.send(chat("b"));

        manager.on_open(socket, Some(ClientMessage::LeaveSession));

        let sent: Vec<_> = manager
            .take_effects()
            .into_iter()
            .map(|e| match e {
                Effect::Transmit { message, .. } => message,
                other => panic!("expected Transmit, got {other:?}"),
            })
            .collect();
        assert_eq!(
            sent,
            vec![ClientMessage::LeaveSession, chat("a"), chat("b")]
        );
        assert!(manager.queue().is_empty());
    }

    fn transmitted(manager: &mut ConnectionManager) -> Vec<ClientMessage> {
        manager
            .take_effects()
            .into_iter()
            .filter_map(|e| match e {
                Effect::Transmit { message, .. } => Some(message),
                _ => None,
            })
            .collect()
    }

    fn join(coterie: &str) -> ClientMessage {
        ClientMessage::JoinSession {
            session_id: None,
            coterie_id: Some(coterie.into()),
            character_name: None,
        }
    }

    #[test]
    fn test_send_triggered_open_replays_rejoin_first() {
        let mut manager = ConnectionManager::default();
        manager.send(chat("a"));
        let socket = opened(&mut manager);

        manager.on_open(socket, Some(join("abc")));

        assert_eq!(transmitted(&mut manager), vec![join("abc"), chat("a")]);
    }

    // =====================================================================
    // join
    // =====================================================================

    #[test]
    fn test_join_disconnected_goes_out_before_older_queue() {
        let mut manager = ConnectionManager::default();
        manager.disconnect();
        manager.send(chat("stale"));

        manager.join(join("abc"));
        let socket = opened(&mut manager);
        manager.on_open(socket, Some(join("old")));

        assert_eq!(
            transmitted(&mut manager),
            vec![join("abc"), chat("stale")]
        );
        assert!(manager.pending_join().is_none());
    }

    #[test]
    fn test_join_while_opening_waits_for_open() {
        let mut manager = ConnectionManager::default();
        manager.send(chat("a"));
        let socket = opened(&mut manager);

        manager.join(join("abc"));

        assert!(manager.take_effects().is_empty());
        manager.on_open(socket, None);
        assert_eq!(transmitted(&mut manager), vec![join("abc"), chat("a")]);
    }

    #[test]
    fn test_join_connected_transmits_immediately() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.on_open(socket, None);

        manager.join(join("abc"));

        assert_eq!(transmitted(&mut manager), vec![join("abc")]);
        assert!(manager.pending_join().is_none());
    }

    #[test]
    fn test_pending_join_survives_failed_open() {
        let mut manager = ConnectionManager::default();
        manager.join(join("abc"));
        let socket = opened(&mut manager);
        manager.on_close(socket);
        let generation = scheduled(&mut manager);

        manager.on_reconnect_timer(generation);
        let socket = opened(&mut manager);
        manager.on_open(socket, None);

        assert_eq!(transmitted(&mut manager), vec![join("abc")]);
    }

    #[test]
    fn test_disconnect_drops_pending_join() {
        let mut manager = ConnectionManager::default();
        manager.join(join("abc"));
        manager.disconnect();
        assert!(manager.pending_join().is_none());
    }

    // =====================================================================
    // close / reconnect
    // =====================================================================

    #[test]
    fn test_on_close_schedules_backoff() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.on_open(socket, None);

        let outcome = manager.on_close(socket);

        assert_eq!(
            outcome,
            CloseOutcome::Reconnecting {
                attempt: 1,
                delay: Duration::from_secs(1)
            }
        );
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(manager.reconnect_pending());
    }

    #[test]
    fn test_stale_timer_is_ignored() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.on_close(socket);
        let generation = scheduled(&mut manager);

        assert!(!manager.on_reconnect_timer(generation + 1));
        assert!(manager.on_reconnect_timer(generation));
        assert!(!manager.on_reconnect_timer(generation));
    }

    #[test]
    fn test_five_failed_reconnects_exhaust() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let mut socket = opened(&mut manager);
        manager.on_open(socket, None);

        let mut delays = Vec::new();
        for _ in 0..5 {
            match manager.on_close(socket) {
                CloseOutcome::Reconnecting { delay, .. } => delays.push(delay),
                other => panic!("expected Reconnecting, got {other:?}"),
            }
            let generation = scheduled(&mut manager);
            manager.on_reconnect_timer(generation);
            socket = opened(&mut manager);
            manager.on_error(socket);
        }

        assert_eq!(manager.on_close(socket), CloseOutcome::Exhausted);
        assert_eq!(manager.attempts(), 0);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.reconnect_pending());
        assert!(manager.take_effects().is_empty());
        assert_eq!(
            delays,
            [1, 2, 4, 8, 16].map(Duration::from_secs).to_vec()
        );
    }

    #[test]
    fn test_exhaustion_keeps_queue() {
        let mut manager = ConnectionManager::new(ReconnectPolicy {
            max_attempts: 0,
            ..ReconnectPolicy::default()
        });
        manager.send(chat("a"));
        let socket = opened(&mut manager);

        assert_eq!(manager.on_close(socket), CloseOutcome::Exhausted);
        assert_eq!(manager.queue().len(), 1);
    }

    // =====================================================================
    // disconnect
    // =====================================================================

    #[test]
    fn test_disconnect_cancels_timer_before_close() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.on_close(socket);
        let generation = scheduled(&mut manager);
        manager.send(chat("a"));
        let reopened = opened(&mut manager);

        manager.disconnect();

        assert_eq!(
            manager.take_effects(),
            vec![Effect::Close(reopened)]
        );
        assert!(!manager.on_reconnect_timer(generation));
        assert!(manager.queue().is_empty());
    }

    #[test]
    fn test_disconnect_with_pending_timer_emits_cancel_first() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.on_close(socket);
        let generation = scheduled(&mut manager);

        manager.disconnect();

        assert_eq!(manager.take_effects(), vec![Effect::CancelReconnect]);
        assert!(!manager.on_reconnect_timer(generation));
        assert_eq!(manager.attempts(), 0);
    }

    #[test]
    fn test_manual_flag_blocks_automatic_connects() {
        let mut manager = ConnectionManager::default();
        manager.disconnect();

        manager.send(chat("a"));

        assert!(manager.take_effects().is_empty());
        assert_eq!(manager.queue().len(), 1);
        assert!(manager.is_manually_disconnected());
    }

    #[test]
    fn test_explicit_connect_clears_manual_flag() {
        let mut manager = ConnectionManager::default();
        manager.disconnect();

        manager.connect();

        assert!(!manager.is_manually_disconnected());
        assert_eq!(manager.take_effects(), vec![Effect::Open(SocketId(1))]);
    }

    #[test]
    fn test_close_after_manual_disconnect_is_stale() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let socket = opened(&mut manager);
        manager.on_open(socket, None);
        manager.disconnect();

        assert_eq!(manager.on_close(socket), CloseOutcome::Stale);
        assert!(!manager.reconnect_pending());
    }

    #[test]
    fn test_socket_ids_are_unique() {
        let mut manager = ConnectionManager::default();
        manager.connect();
        let first = opened(&mut manager);
        manager.on_close(first);
        let generation = scheduled(&mut manager);
        manager.on_reconnect_timer(generation);
        let second = opened(&mut manager);
        assert_ne!(first, second);
        assert_eq!(second.to_string(), "sock-2");
    }
}
