//! The session client: one explicitly owned object holding all client
//! state.
//!
//! [`SessionClient`] glues the [`ConnectionManager`] to the session-side
//! state (directory, roster, event log). Like the manager it performs no
//! IO. Caller commands and socket callbacks are plain method calls; the
//! results are [`Effect`]s for the driver and [`ClientEvent`]s for
//! observers.
//!
//! Each call runs to completion before the next, so the state seen by
//! observers is always consistent.

use std::time::Duration;

use coterie_dice::{
    generate_roll_id, resolve_faces, rules, RemorseOutcome, RollRecord,
    RouseOutcome,
};
use coterie_protocol::{
    ClientMessage, Codec, Event, JsonCodec, Participant, ProtocolError,
    ServerMessage, SessionId, SessionJoined, SessionType,
    MAX_CHAT_MESSAGE_CHARS,
};
use coterie_session::{
    ActiveSession, EventLog, Ingested, Roster, SessionDirectory,
    SessionReference, Storage,
};
use rand::Rng;

use crate::{
    ClientConfig, CloseOutcome, ConnectionManager, ConnectionState,
    CoterieError, Effect, SocketId, ValidationError,
};

/// Something observers may want to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The connection moved to a new state.
    StateChanged(ConnectionState),
    /// The server confirmed a join.
    SessionJoined {
        session_id: SessionId,
        session_type: SessionType,
    },
    ParticipantJoined(Participant),
    ParticipantLeft(Participant),
    /// An event was added at the end of the log.
    EventAppended { index: usize, event: Event },
    /// A reroll replaced the log entry at `index`.
    EventReplaced { index: usize, event: Event },
    /// An unexpected close; a reconnect will be tried after `delay`.
    ReconnectScheduled { attempt: u32, delay: Duration },
    /// Reconnecting gave up and session state was reset. Call
    /// `join_session` to get back in.
    ReconnectExhausted,
    /// An inbound frame that could not be decoded was dropped.
    ProtocolViolation(String),
}

/// All client state for one participant.
pub struct SessionClient<S: Storage> {
    config: ClientConfig,
    connection: ConnectionManager,
    directory: SessionDirectory<S>,
    roster: Roster,
    log: EventLog,
    codec: JsonCodec,
    notices: Vec<ClientEvent>,
}

impl<S: Storage> SessionClient<S> {
    /// Creates a client, loading any persisted rejoin reference from
    /// `storage`. Does not connect.
    pub fn new(config: ClientConfig, storage: S) -> Self {
        let connection = ConnectionManager::new(config.reconnect);
        Self {
            config,
            connection,
            directory: SessionDirectory::load(storage),
            roster: Roster::new(),
            log: EventLog::new(),
            codec: JsonCodec,
            notices: Vec::new(),
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn connection(&self) -> &ConnectionManager {
        &self.connection
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn events(&self) -> &[Event] {
        self.log.events()
    }

    /// The session the server last confirmed, while connected to it.
    pub fn active_session(&self) -> Option<&ActiveSession> {
        self.directory.active()
    }

    /// The reference replayed on reconnect.
    pub fn last_join(&self) -> Option<&SessionReference> {
        self.directory.last_join()
    }

    pub fn directory(&self) -> &SessionDirectory<S> {
        &self.directory
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.connection.attempts()
    }

    /// Serializes an outbound message into a text frame.
    pub fn encode(
        &self,
        message: &ClientMessage,
    ) -> Result<String, ProtocolError> {
        self.codec.encode_text(message)
    }

    /// Removes and returns pending effects, in order.
    pub fn take_effects(&mut self) -> Vec<Effect> {
        self.connection.take_effects()
    }

    /// Removes and returns pending observer events, in order.
    pub fn take_notices(&mut self) -> Vec<ClientEvent> {
        std::mem::take(&mut self.notices)
    }

    // =========================================================================
    // Connection commands
    // =========================================================================

    /// Connects, replaying the rejoin reference once open.
    pub fn connect(&mut self) {
        self.tracked(|c| c.connection.connect());
    }

    /// Closes the connection and resets session, roster and log. The
    /// persisted rejoin reference is kept.
    pub fn disconnect(&mut self) {
        self.tracked(|c| {
            c.connection.disconnect();
            c.reset_session_state();
        });
    }

    /// Sends a raw message, queueing it if the socket is not open.
    pub fn send(&mut self, message: ClientMessage) {
        self.tracked(|c| c.connection.send(message));
    }

    // =========================================================================
    // Session commands
    // =========================================================================

    /// Joins a session and records `reference` as the rejoin target.
    ///
    /// When the socket is not open, the join goes out first on the next
    /// open, ahead of anything already queued. It is sent even if
    /// persisting the reference fails; the storage error is returned
    /// afterwards.
    pub fn join_session(
        &mut self,
        reference: SessionReference,
    ) -> Result<(), CoterieError> {
        let message =
            reference.to_join_message(self.config.character_name.clone());
        tracing::info!(?reference, "joining session");
        let persisted = self.directory.remember(reference);
        self.tracked(|c| c.connection.join(message));
        persisted.map_err(CoterieError::from)
    }

    /// Leaves the session: notifies the server if connected, disconnects,
    /// and forgets the persisted reference.
    pub fn leave_session(&mut self) -> Result<(), CoterieError> {
        if self.connection.is_connected() {
            self.connection.send(ClientMessage::LeaveSession);
        }
        self.disconnect();
        tracing::info!("left session");
        self.directory.forget().map_err(CoterieError::from)
    }

    /// Sends a chat line. The text is trimmed and must be 1 to 5000
    /// characters.
    pub fn send_chat(&mut self, text: &str) -> Result<(), ValidationError> {
        let message = text.trim();
        if message.is_empty() {
            return Err(ValidationError::EmptyChat);
        }
        let chars = message.chars().count();
        if chars > MAX_CHAT_MESSAGE_CHARS {
            return Err(ValidationError::ChatTooLong(chars));
        }
        self.send(ClientMessage::ChatMessage {
            message: message.to_owned(),
            character_name: self.config.character_name.clone(),
        });
        Ok(())
    }

    /// Sends a resolved roll. Its results must be the engine's output for
    /// its dice.
    pub fn send_roll(
        &mut self,
        record: RollRecord,
    ) -> Result<(), ValidationError> {
        if record.dice.is_empty() {
            return Err(ValidationError::EmptyRoll);
        }
        let resolution = resolve_faces(&record.dice);
        if resolution.results != record.results
            || resolution.total_successes != record.total_successes
        {
            return Err(ValidationError::InconsistentRoll);
        }
        self.send(ClientMessage::DiceRoll {
            roll_data: record,
            character_name: self.config.character_name.clone(),
        });
        Ok(())
    }

    /// Rolls a pool locally and sends it.
    pub fn roll_pool<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        pool: usize,
        hunger: u8,
    ) -> Result<RollRecord, ValidationError> {
        let dice = rules::roll_pool(rng, pool, hunger)?;
        let record = RollRecord::with_id(dice, generate_roll_id(rng));
        self.send_roll(record.clone())?;
        Ok(record)
    }

    /// Rerolls up to three regular dice of an earlier roll and sends the
    /// replacement.
    pub fn reroll<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        record: &RollRecord,
        indices: &[usize],
    ) -> Result<RollRecord, ValidationError> {
        let rerolled = rules::willpower_reroll(rng, record, indices)?;
        self.send_roll(rerolled.clone())?;
        Ok(rerolled)
    }

    /// Rolls a rouse check locally and sends it.
    pub fn rouse_check<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        hunger: u8,
    ) -> Result<RouseOutcome, ValidationError> {
        let outcome = rules::rouse_check(rng, hunger)?;
        self.send_rouse(outcome)?;
        Ok(outcome)
    }

    pub fn send_rouse(
        &mut self,
        outcome: RouseOutcome,
    ) -> Result<(), ValidationError> {
        check_die(outcome.roll)?;
        if outcome.new_hunger > rules::MAX_HUNGER {
            return Err(ValidationError::HungerOutOfRange(outcome.new_hunger));
        }
        self.send(ClientMessage::RouseCheck {
            roll: outcome.roll,
            success: outcome.success,
            new_hunger: outcome.new_hunger,
            character_name: self.config.character_name.clone(),
        });
        Ok(())
    }

    /// Rolls a remorse check locally and sends it.
    pub fn remorse_check<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
        humanity: u8,
        stains: u8,
    ) -> Result<RemorseOutcome, ValidationError> {
        let outcome = rules::remorse_check(rng, humanity, stains)?;
        self.send_remorse(outcome.clone())?;
        Ok(outcome)
    }

    pub fn send_remorse(
        &mut self,
        outcome: RemorseOutcome,
    ) -> Result<(), ValidationError> {
        if outcome.rolls.is_empty() {
            return Err(ValidationError::NoRemorseDice);
        }
        for &roll in &outcome.rolls {
            check_die(roll)?;
        }
        if outcome.new_humanity > rules::MAX_HUMANITY {
            return Err(ValidationError::HumanityOutOfRange(
                outcome.new_humanity,
            ));
        }
        let successes = outcome
            .rolls
            .iter()
            .filter(|&&r| r >= rules::SUCCESS_THRESHOLD)
            .count() as u32;
        if successes != outcome.successes || outcome.passed != (successes > 0)
        {
            return Err(ValidationError::InconsistentRoll);
        }
        self.send(ClientMessage::RemorseCheck {
            rolls: outcome.rolls,
            successes: outcome.successes,
            passed: outcome.passed,
            new_humanity: outcome.new_humanity,
            character_name: self.config.character_name.clone(),
        });
        Ok(())
    }

    // =========================================================================
    // Socket callbacks
    // =========================================================================

    /// The socket opened.
    pub fn handle_open(&mut self, socket: SocketId) {
        let rejoin = self.directory.last_join().map(|reference| {
            reference.to_join_message(self.config.character_name.clone())
        });
        self.tracked(|c| {
            c.connection.on_open(socket, rejoin);
        });
    }

    /// A text frame arrived.
    pub fn handle_frame(&mut self, socket: SocketId, text: &str) {
        if self.connection.socket() != Some(socket) {
            tracing::debug!(%socket, "ignoring frame from stale socket");
            return;
        }
        match self.codec.decode_text::<ServerMessage>(text) {
            Ok(message) => self.ingest(message),
            Err(e) => {
                tracing::warn!(
                    %socket,
                    error = %e,
                    "dropping undecodable frame"
                );
                self.notices
                    .push(ClientEvent::ProtocolViolation(e.to_string()));
            }
        }
    }

    /// The socket reported an error.
    pub fn handle_error(&mut self, socket: SocketId) {
        self.tracked(|c| {
            c.connection.on_error(socket);
        });
    }

    /// The socket closed, or failed to open.
    pub fn handle_close(&mut self, socket: SocketId) -> CloseOutcome {
        self.tracked(|c| {
            let outcome = c.connection.on_close(socket);
            match outcome {
                CloseOutcome::Reconnecting { attempt, delay } => {
                    let notice =
                        ClientEvent::ReconnectScheduled { attempt, delay };
                    c.notices.push(notice);
                }
                CloseOutcome::Exhausted => {
                    c.reset_session_state();
                    c.notices.push(ClientEvent::ReconnectExhausted);
                }
                CloseOutcome::Stale | CloseOutcome::Manual => {}
            }
            outcome
        })
    }

    /// The reconnect timer fired.
    pub fn handle_reconnect_timer(&mut self, generation: u64) {
        self.tracked(|c| {
            c.connection.on_reconnect_timer(generation);
        });
    }

    // =========================================================================
    // Inbound messages
    // =========================================================================

    /// Applies one decoded server message to the roster and event log.
    pub fn ingest(&mut self, message: ServerMessage) {
        tracing::debug!(kind = message.kind(), "inbound");
        match message {
            ServerMessage::SessionJoined(joined) => {
                self.on_session_joined(joined)
            }
            ServerMessage::UserJoined(participant) => {
                if self.roster.apply_user_joined(participant.clone()) {
                    tracing::debug!(
                        user_id = %participant.user_id,
                        "participant joined"
                    );
                    self.notices
                        .push(ClientEvent::ParticipantJoined(participant));
                }
            }
            ServerMessage::UserLeft { user_id } => {
                let left = self.roster.apply_user_left(&user_id);
                if let Some(participant) = left {
                    tracing::debug!(%user_id, "participant left");
                    self.notices
                        .push(ClientEvent::ParticipantLeft(participant));
                }
            }
            ServerMessage::ChatMessage(e) => self.record(Event::ChatMessage(e)),
            ServerMessage::DiceRoll(e) => self.record(Event::DiceRoll(e)),
            ServerMessage::RouseCheck(e) => self.record(Event::RouseCheck(e)),
            ServerMessage::RemorseCheck(e) => {
                self.record(Event::RemorseCheck(e))
            }
            ServerMessage::Error(e) => {
                tracing::info!(
                    message = %e.message,
                    "server rejected a request"
                );
                self.record(Event::Error(e));
            }
        }
    }

    /// Replaces the active session and roster. The event log is kept
    /// when the server confirms the session already active, so a rejoin
    /// after a dropped socket does not wipe history.
    fn on_session_joined(&mut self, joined: SessionJoined) {
        let same_session = self
            .directory
            .active()
            .is_some_and(|active| active.session_id == joined.session_id);
        if let Err(e) = self.directory.confirm(&joined) {
            tracing::warn!(error = %e, "failed to persist session reference");
        }
        self.roster.apply_joined(&joined);
        if !same_session {
            self.log.clear();
        }
        tracing::info!(
            session_id = %joined.session_id,
            session_type = %joined.session_type,
            participants = self.roster.len(),
            "session joined"
        );
        self.notices.push(ClientEvent::SessionJoined {
            session_id: joined.session_id,
            session_type: joined.session_type,
        });
    }

    fn record(&mut self, event: Event) {
        match self.log.ingest(event) {
            Ingested::Appended(index) => {
                if let Some(event) = self.log.get(index) {
                    self.notices.push(ClientEvent::EventAppended {
                        index,
                        event: event.clone(),
                    });
                }
            }
            Ingested::Replaced(index) => {
                if let Some(event) = self.log.get(index) {
                    self.notices.push(ClientEvent::EventReplaced {
                        index,
                        event: event.clone(),
                    });
                }
            }
            Ingested::Dropped => {}
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn reset_session_state(&mut self) {
        self.directory.clear_active();
        self.roster.clear();
        self.log.clear();
    }

    /// Runs `f` and reports a connection state change, if any, ahead of
    /// the events `f` produced.
    fn tracked<T>(&mut self, f: impl FnOnce(&mut Self) -> T) -> T {
        let before = self.connection.state();
        let mark = self.notices.len();
        let out = f(self);
        let after = self.connection.state();
        if before != after {
            self.notices.insert(mark, ClientEvent::StateChanged(after));
        }
        out
    }
}

fn check_die(roll: u8) -> Result<(), ValidationError> {
    if (1..=10).contains(&roll) {
        Ok(())
    } else {
        Err(ValidationError::RollOutOfRange(roll))
    }
}

#[cfg(test)]
mod tests {
    use coterie_dice::DieFace;
    use coterie_session::MemoryStorage;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn client() -> SessionClient<MemoryStorage> {
        SessionClient::new(
            ClientConfig::default().with_character_name("Mara"),
            MemoryStorage::new(),
        )
    }

    fn queued(client: &SessionClient<MemoryStorage>) -> Vec<ClientMessage> {
        client.connection().queue().iter().cloned().collect()
    }

    #[test]
    fn test_send_chat_trims_and_attaches_character() {
        let mut client = client();
        client.send_chat("  hello  ").unwrap();
        assert_eq!(
            queued(&client),
            vec![ClientMessage::ChatMessage {
                message: "hello".into(),
                character_name: Some("Mara".into()),
            }]
        );
    }

    #[test]
    fn test_send_chat_rejects_blank_and_oversized() {
        let mut client = client();
        assert_eq!(client.send_chat("   "), Err(ValidationError::EmptyChat));
        let long = "x".repeat(MAX_CHAT_MESSAGE_CHARS + 1);
        assert_eq!(
            client.send_chat(&long),
            Err(ValidationError::ChatTooLong(MAX_CHAT_MESSAGE_CHARS + 1))
        );
        assert!(queued(&client).is_empty());
        assert_eq!(client.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_send_chat_counts_characters_not_bytes() {
        let mut client = client();
        let text = "é".repeat(MAX_CHAT_MESSAGE_CHARS);
        assert!(client.send_chat(&text).is_ok());
    }

    #[test]
    fn test_send_roll_rejects_tampered_results() {
        let mut client = client();
        let mut record =
            RollRecord::with_id(vec![DieFace::regular(10).unwrap()], "r1");
        record.total_successes = 4;
        assert_eq!(
            client.send_roll(record),
            Err(ValidationError::InconsistentRoll)
        );
    }

    #[test]
    fn test_roll_pool_sends_engine_output() {
        let mut client = client();
        let mut rng = StdRng::seed_from_u64(7);

        let record = client.roll_pool(&mut rng, 5, 2).unwrap();

        assert_eq!(record.hunger_dice(), 2);
        assert_eq!(record.roll_id.as_ref().map(String::len), Some(32));
        let sent = queued(&client);
        let [ClientMessage::DiceRoll { roll_data, .. }] = sent.as_slice() else {
            panic!("expected one queued dice_roll");
        };
        assert_eq!(roll_data, &record);
    }

    #[test]
    fn test_roll_pool_rejects_bad_hunger() {
        let mut client = client();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            client.roll_pool(&mut rng, 3, 9),
            Err(ValidationError::Dice(_))
        ));
    }

    #[test]
    fn test_send_rouse_validates_ranges() {
        let mut client = client();
        let bad_roll = RouseOutcome {
            roll: 11,
            success: true,
            new_hunger: 1,
        };
        assert_eq!(
            client.send_rouse(bad_roll),
            Err(ValidationError::RollOutOfRange(11))
        );
        let bad_hunger = RouseOutcome {
            roll: 2,
            success: false,
            new_hunger: 6,
        };
        assert_eq!(
            client.send_rouse(bad_hunger),
            Err(ValidationError::HungerOutOfRange(6))
        );
    }

    #[test]
    fn test_send_remorse_rejects_inconsistent_tally() {
        let mut client = client();
        let outcome = RemorseOutcome {
            rolls: vec![7, 2],
            successes: 0,
            passed: false,
            new_humanity: 6,
        };
        assert_eq!(
            client.send_remorse(outcome),
            Err(ValidationError::InconsistentRoll)
        );
        let empty = RemorseOutcome {
            rolls: vec![],
            successes: 0,
            passed: false,
            new_humanity: 6,
        };
        assert_eq!(
            client.send_remorse(empty),
            Err(ValidationError::NoRemorseDice)
        );
    }

    #[test]
    fn test_remorse_check_sends_outcome() {
        let mut client = client();
        let mut rng = StdRng::seed_from_u64(11);
        let outcome = client.remorse_check(&mut rng, 7, 1).unwrap();
        assert_eq!(outcome.rolls.len(), 2);
        assert!(matches!(
            &queued(&client)[..],
            [ClientMessage::RemorseCheck { .. }]
        ));
    }

    #[test]
    fn test_state_changes_are_reported() {
        let mut client = client();
        client.connect();
        assert_eq!(
            client.take_notices(),
            vec![ClientEvent::StateChanged(ConnectionState::Connecting)]
        );
        client.connect();
        assert!(client.take_notices().is_empty());
    }
}
