//! The client driver: runs a [`SessionClient`] against a real transport.
//!
//! The driver is an actor. It owns the client and the connector, runs in
//! one Tokio task, and processes one input at a time:
//!
//! - **commands** from any number of [`ClientHandle`]s (an `mpsc`
//!   channel, with `oneshot` reply channels where the caller needs an
//!   answer)
//! - **socket events** from helper tasks: the connect task, the per-socket
//!   reader task, and the reconnect timer
//!
//! After each input it executes the [`Effect`]s the client produced and
//! publishes its [`ClientEvent`]s on a `broadcast` channel.
//!
//! ```text
//! ClientHandle ──Command──→ ┌──────────────┐ ──Effect──→ sockets, timer
//!                           │ ClientDriver │
//! reader/timer ──Socket───→ └──────────────┘ ──ClientEvent──→ subscribers
//! ```

use std::sync::Arc;
use std::time::Duration;

use coterie_dice::{RemorseOutcome, RollRecord, RouseOutcome};
use coterie_protocol::{ClientMessage, Event, Participant};
use coterie_session::{ActiveSession, SessionReference, Storage};
use coterie_transport::{Connection, Connector, TransportError};
#[cfg(feature = "websocket")]
use coterie_transport::WebSocketConnector;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::{
    ClientConfig, ClientEvent, ConnectionState, CoterieError, Effect,
    SessionClient, SocketId, ValidationError,
};

/// Bound on the command channel. Callers wait when it is full.
const COMMAND_CHANNEL_SIZE: usize = 64;

/// How long a close handshake may take before the socket is dropped.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Commands and snapshots
// ---------------------------------------------------------------------------

/// Commands sent to the driver through its channel.
pub(crate) enum Command {
    Connect,
    Disconnect,
    Send(ClientMessage),
    JoinSession {
        reference: SessionReference,
        reply: oneshot::Sender<Result<(), CoterieError>>,
    },
    LeaveSession {
        reply: oneshot::Sender<Result<(), CoterieError>>,
    },
    SendChat {
        text: String,
        reply: oneshot::Sender<Result<(), ValidationError>>,
    },
    SendRoll {
        record: RollRecord,
        reply: oneshot::Sender<Result<(), ValidationError>>,
    },
    RollPool {
        pool: usize,
        hunger: u8,
        reply: oneshot::Sender<Result<RollRecord, ValidationError>>,
    },
    Reroll {
        record: RollRecord,
        indices: Vec<usize>,
        reply: oneshot::Sender<Result<RollRecord, ValidationError>>,
    },
    RouseCheck {
        hunger: u8,
        reply: oneshot::Sender<Result<RouseOutcome, ValidationError>>,
    },
    RemorseCheck {
        humanity: u8,
        stains: u8,
        reply: oneshot::Sender<Result<RemorseOutcome, ValidationError>>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
    Shutdown,
}

/// A copy of the client's observable state at one instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub state: ConnectionState,
    pub session: Option<ActiveSession>,
    pub last_join: Option<SessionReference>,
    pub participants: Vec<Participant>,
    pub events: Vec<Event>,
    pub reconnect_attempts: u32,
    pub queued: usize,
}

// ---------------------------------------------------------------------------
// ClientHandle
// ---------------------------------------------------------------------------

/// Handle to a running driver.
///
/// Cheap to clone. Every method fails with
/// [`CoterieError::DriverStopped`] once the driver task is gone.
#[derive(Clone)]
pub struct ClientHandle {
    commands: mpsc::Sender<Command>,
    events: broadcast::Sender<ClientEvent>,
}

impl ClientHandle {
    /// Subscribes to client events from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Connects, lifting a previous manual disconnect.
    pub async fn connect(&self) -> Result<(), CoterieError> {
        self.command(Command::Connect).await
    }

    /// Disconnects and resets session state. No reconnect follows.
    pub async fn disconnect(&self) -> Result<(), CoterieError> {
        self.command(Command::Disconnect).await
    }

    /// Sends a raw message (fire-and-forget).
    pub async fn send(
        &self,
        message: ClientMessage,
    ) -> Result<(), CoterieError> {
        self.command(Command::Send(message)).await
    }

    pub async fn join_session(
        &self,
        reference: SessionReference,
    ) -> Result<(), CoterieError> {
        self.request(|reply| Command::JoinSession { reference, reply })
            .await?
    }

    pub async fn leave_session(&self) -> Result<(), CoterieError> {
        self.request(|reply| Command::LeaveSession { reply }).await?
    }

    pub async fn send_chat(
        &self,
        text: impl Into<String>,
    ) -> Result<(), CoterieError> {
        let text = text.into();
        Ok(self.request(|reply| Command::SendChat { text, reply }).await??)
    }

    pub async fn send_roll(
        &self,
        record: RollRecord,
    ) -> Result<(), CoterieError> {
        Ok(self
            .request(|reply| Command::SendRoll { record, reply })
            .await??)
    }

    /// Rolls `pool` dice with `hunger` blood dice and shares the result.
    pub async fn roll_pool(
        &self,
        pool: usize,
        hunger: u8,
    ) -> Result<RollRecord, CoterieError> {
        Ok(self
            .request(|reply| Command::RollPool {
                pool,
                hunger,
                reply,
            })
            .await??)
    }

    /// Rerolls the regular dice at `indices` of `record` with willpower.
    pub async fn reroll(
        &self,
        record: RollRecord,
        indices: Vec<usize>,
    ) -> Result<RollRecord, CoterieError> {
        Ok(self
            .request(|reply| Command::Reroll {
                record,
                indices,
                reply,
            })
            .await??)
    }

    pub async fn rouse_check(
        &self,
        hunger: u8,
    ) -> Result<RouseOutcome, CoterieError> {
        Ok(self
            .request(|reply| Command::RouseCheck { hunger, reply })
            .await??)
    }

    pub async fn remorse_check(
        &self,
        humanity: u8,
        stains: u8,
    ) -> Result<RemorseOutcome, CoterieError> {
        Ok(self
            .request(|reply| Command::RemorseCheck {
                humanity,
                stains,
                reply,
            })
            .await??)
    }

    pub async fn snapshot(&self) -> Result<Snapshot, CoterieError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    /// Closes the socket and stops the driver task.
    pub async fn shutdown(&self) -> Result<(), CoterieError> {
        self.command(Command::Shutdown).await
    }

    async fn command(&self, command: Command) -> Result<(), CoterieError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| CoterieError::DriverStopped)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, CoterieError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.command(make(reply_tx)).await?;
        reply_rx.await.map_err(|_| CoterieError::DriverStopped)
    }
}

// ---------------------------------------------------------------------------
// ClientDriver
// ---------------------------------------------------------------------------

/// Notifications from the helper tasks, tagged with the socket they
/// concern.
enum SocketEvent<T> {
    Opened { socket: SocketId, conn: T },
    ConnectFailed { socket: SocketId, error: TransportError },
    Frame { socket: SocketId, text: String },
    Closed {
        socket: SocketId,
        error: Option<TransportError>,
    },
    ReconnectTimer { generation: u64 },
}

struct LiveSocket<T> {
    socket: SocketId,
    conn: Arc<T>,
    reader: JoinHandle<()>,
}

/// The driver actor. Build with [`ClientDriver::new`] and run with
/// [`ClientDriver::run`], or use [`spawn`].
pub struct ClientDriver<C: Connector, S: Storage> {
    client: SessionClient<S>,
    connector: Arc<C>,
    commands: mpsc::Receiver<Command>,
    socket_tx: mpsc::UnboundedSender<SocketEvent<C::Connection>>,
    socket_rx: mpsc::UnboundedReceiver<SocketEvent<C::Connection>>,
    opening: Option<(SocketId, JoinHandle<()>)>,
    live: Option<LiveSocket<C::Connection>>,
    timer: Option<JoinHandle<()>>,
    events: broadcast::Sender<ClientEvent>,
}

impl<C: Connector, S: Storage> ClientDriver<C, S> {
    /// Creates the driver and a handle to it. Nothing runs until
    /// [`run`](Self::run) is awaited.
    pub fn new(
        config: ClientConfig,
        connector: C,
        storage: S,
    ) -> (Self, ClientHandle) {
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (socket_tx, socket_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        let driver = Self {
            client: SessionClient::new(config, storage),
            connector: Arc::new(connector),
            commands: command_rx,
            socket_tx,
            socket_rx,
            opening: None,
            live: None,
            timer: None,
            events: events.clone(),
        };
        let handle = ClientHandle {
            commands: command_tx,
            events,
        };
        (driver, handle)
    }

    /// Runs the actor loop until shutdown or until every handle is
    /// dropped.
    pub async fn run(mut self) {
        tracing::info!(
            url = %self.client.config().url,
            "client driver started"
        );

        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    let Some(command) = command else { break };
                    if !self.handle_command(command) {
                        break;
                    }
                }
                Some(event) = self.socket_rx.recv() => {
                    self.handle_socket_event(event);
                }
            }
            self.flush().await;
        }

        self.client.disconnect();
        self.flush().await;
        if let Some((_, task)) = self.opening.take() {
            task.abort();
        }
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        tracing::info!("client driver stopped");
    }

    /// Applies a command. Returns `false` on shutdown.
    fn handle_command(&mut self, command: Command) -> bool {
        let client = &mut self.client;
        match command {
            Command::Connect => client.connect(),
            Command::Disconnect => client.disconnect(),
            Command::Send(message) => client.send(message),
            Command::JoinSession { reference, reply } => {
                let _ = reply.send(client.join_session(reference));
            }
            Command::LeaveSession { reply } => {
                let _ = reply.send(client.leave_session());
            }
            Command::SendChat { text, reply } => {
                let _ = reply.send(client.send_chat(&text));
            }
            Command::SendRoll { record, reply } => {
                let _ = reply.send(client.send_roll(record));
            }
            Command::RollPool {
                pool,
                hunger,
                reply,
            } => {
                let result = client.roll_pool(&mut rand::rng(), pool, hunger);
                let _ = reply.send(result);
            }
            Command::Reroll {
                record,
                indices,
                reply,
            } => {
                let result = client.reroll(&mut rand::rng(), &record, &indices);
                let _ = reply.send(result);
            }
            Command::RouseCheck { hunger, reply } => {
                let result = client.rouse_check(&mut rand::rng(), hunger);
                let _ = reply.send(result);
            }
            Command::RemorseCheck {
                humanity,
                stains,
                reply,
            } => {
                let result =
                    client.remorse_check(&mut rand::rng(), humanity, stains);
                let _ = reply.send(result);
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.snapshot());
            }
            Command::Shutdown => {
                tracing::info!("client driver shutting down");
                return false;
            }
        }
        true
    }

    fn handle_socket_event(&mut self, event: SocketEvent<C::Connection>) {
        match event {
            SocketEvent::Opened { socket, conn } => {
                self.finish_opening(socket);
                if self.client.connection().socket() != Some(socket) {
                    tracing::debug!(%socket, "closing abandoned socket");
                    tokio::spawn(async move {
                        let _ = conn.close().await;
                    });
                    return;
                }
                let conn = Arc::new(conn);
                let reader = tokio::spawn(read_frames(
                    socket,
                    Arc::clone(&conn),
                    self.socket_tx.clone(),
                ));
                tracing::debug!(%socket, conn_id = %conn.id(), "socket open");
                self.live = Some(LiveSocket {
                    socket,
                    conn,
                    reader,
                });
                self.client.handle_open(socket);
            }
            SocketEvent::ConnectFailed { socket, error } => {
                self.finish_opening(socket);
                tracing::warn!(%socket, error = %error, "connect failed");
                self.client.handle_error(socket);
                self.client.handle_close(socket);
            }
            SocketEvent::Frame { socket, text } => {
                self.client.handle_frame(socket, &text);
            }
            SocketEvent::Closed { socket, error } => {
                if let Some(error) = error {
                    tracing::debug!(%socket, error = %error, "socket error");
                    self.client.handle_error(socket);
                }
                if self.live.as_ref().is_some_and(|l| l.socket == socket) {
                    self.live = None;
                }
                tracing::debug!(%socket, "socket closed");
                self.client.handle_close(socket);
            }
            SocketEvent::ReconnectTimer { generation } => {
                self.client.handle_reconnect_timer(generation);
            }
        }
    }

    /// Executes pending effects, then publishes pending events.
    async fn flush(&mut self) {
        for effect in self.client.take_effects() {
            self.execute(effect).await;
        }
        for notice in self.client.take_notices() {
            // No subscribers is fine.
            let _ = self.events.send(notice);
        }
    }

    async fn execute(&mut self, effect: Effect) {
        match effect {
            Effect::Open(socket) => {
                let connector = Arc::clone(&self.connector);
                let events = self.socket_tx.clone();
                let task = tokio::spawn(async move {
                    let event = match connector.connect().await {
                        Ok(conn) => SocketEvent::Opened { socket, conn },
                        Err(error) => {
                            SocketEvent::ConnectFailed { socket, error }
                        }
                    };
                    let _ = events.send(event);
                });
                if let Some((_, previous)) =
                    self.opening.replace((socket, task))
                {
                    previous.abort();
                }
            }
            Effect::Transmit { socket, message } => {
                let Some(live) =
                    self.live.as_ref().filter(|l| l.socket == socket)
                else {
                    tracing::debug!(
                        %socket,
                        kind = message.kind(),
                        "socket gone, dropping frame"
                    );
                    return;
                };
                let text = match self.client.encode(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!(
                            kind = message.kind(),
                            error = %e,
                            "failed to encode message"
                        );
                        return;
                    }
                };
                tracing::debug!(%socket, kind = message.kind(), "send");
                if let Err(e) = live.conn.send_text(&text).await {
                    tracing::warn!(%socket, error = %e, "send failed");
                }
            }
            Effect::Close(socket) => {
                if let Some((id, task)) = self.opening.take() {
                    if id == socket {
                        task.abort();
                    } else {
                        self.opening = Some((id, task));
                    }
                }
                if let Some(live) = self.live.take_if(|l| l.socket == socket) {
                    live.reader.abort();
                    match tokio::time::timeout(CLOSE_TIMEOUT, live.conn.close())
                        .await
                    {
                        Ok(Ok(())) => {}
                        Ok(Err(e)) => {
                            tracing::debug!(
                                %socket,
                                error = %e,
                                "close failed"
                            );
                        }
                        Err(_) => {
                            tracing::debug!(%socket, "close timed out");
                        }
                    }
                }
            }
            Effect::ScheduleReconnect {
                generation,
                delay,
                attempt,
            } => {
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "arming reconnect timer"
                );
                let events = self.socket_tx.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let fired = SocketEvent::ReconnectTimer { generation };
                    let _ = events.send(fired);
                });
                if let Some(previous) = self.timer.replace(timer) {
                    previous.abort();
                }
            }
            Effect::CancelReconnect => {
                if let Some(timer) = self.timer.take() {
                    timer.abort();
                }
            }
        }
    }

    fn finish_opening(&mut self, socket: SocketId) {
        if self.opening.as_ref().is_some_and(|(id, _)| *id == socket) {
            self.opening = None;
        }
    }

    fn snapshot(&self) -> Snapshot {
        let client = &self.client;
        Snapshot {
            state: client.state(),
            session: client.active_session().cloned(),
            last_join: client.last_join().cloned(),
            participants: client.roster().participants().to_vec(),
            events: client.events().to_vec(),
            reconnect_attempts: client.reconnect_attempts(),
            queued: client.connection().queue().len(),
        }
    }
}

/// Forwards frames from one socket until it closes.
async fn read_frames<T: Connection>(
    socket: SocketId,
    conn: Arc<T>,
    events: mpsc::UnboundedSender<SocketEvent<T>>,
) {
    let error = loop {
        match conn.recv().await {
            Ok(Some(text)) => {
                if events.send(SocketEvent::Frame { socket, text }).is_err() {
                    return;
                }
            }
            Ok(None) => break None,
            Err(e) => break Some(e),
        }
    };
    let _ = events.send(SocketEvent::Closed { socket, error });
}

/// Spawns a driver on the current Tokio runtime.
///
/// Returns the handle and the driver task's `JoinHandle`.
pub fn spawn<C: Connector, S: Storage>(
    config: ClientConfig,
    connector: C,
    storage: S,
) -> (ClientHandle, JoinHandle<()>) {
    let (driver, handle) = ClientDriver::new(config, connector, storage);
    (handle, tokio::spawn(driver.run()))
}

/// Spawns a driver that dials `config.url` over WebSocket.
#[cfg(feature = "websocket")]
pub fn spawn_websocket<S: Storage>(
    config: ClientConfig,
    storage: S,
) -> (ClientHandle, JoinHandle<()>) {
    let connector = WebSocketConnector::new(config.url.clone());
    spawn(config, connector, storage)
}
