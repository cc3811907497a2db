//! The session event log.
//!
//! Append-only, with one exception: a `dice_roll` flagged as a reroll
//! replaces, in place, the most recent earlier roll with the same roll id.
//! The replaced entry keeps its position in the timeline.

use coterie_protocol::{DiceRollEvent, Event};

/// What [`EventLog::ingest`] did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    /// Added at the end, at this index.
    Appended(usize),
    /// Replaced the entry at this index.
    Replaced(usize),
    /// A reroll with nothing to replace; the log is unchanged.
    Dropped,
}

/// Timeline of chat, rolls, checks, and server errors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventLog {
    events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one inbound event.
    pub fn ingest(&mut self, event: Event) -> Ingested {
        match event {
            Event::DiceRoll(roll) if roll.is_reroll() => {
                self.replace_roll(roll)
            }
            event => {
                self.events.push(event);
                Ingested::Appended(self.events.len() - 1)
            }
        }
    }

    fn replace_roll(&mut self, roll: DiceRollEvent) -> Ingested {
        let Some(roll_id) = roll.roll_id() else {
            tracing::warn!("dropping reroll without a roll id");
            return Ingested::Dropped;
        };
        let found = self.events.iter().rposition(|e| match e {
            Event::DiceRoll(prior) => prior.roll_id() == Some(roll_id),
            _ => false,
        });
        match found {
            Some(index) => {
                tracing::debug!(roll_id, index, "reroll replaced in place");
                self.events[index] = Event::DiceRoll(roll);
                Ingested::Replaced(index)
            }
            None => {
                tracing::warn!(
                    roll_id,
                    "dropping reroll with no matching roll"
                );
                Ingested::Dropped
            }
        }
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    pub fn last(&self) -> Option<&Event> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
