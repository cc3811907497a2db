//! The participant roster.
//!
//! Purely derived from inbound events. The only ways in are the three
//! `apply_*` methods (one per roster event) and [`Roster::clear`] for a
//! local reset.

use coterie_protocol::{Participant, SessionJoined, UserId};

/// Who is in the session, in join order. `user_id` is unique.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Roster {
    participants: Vec<Participant>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// `session_joined`: replace everything with the server's snapshot.
    ///
    /// The snapshot is authoritative; duplicates in it are collapsed to
    /// the first occurrence so the uniqueness invariant still holds.
    pub fn apply_joined(&mut self, joined: &SessionJoined) {
        self.participants.clear();
        for participant in &joined.participants {
            self.apply_user_joined(participant.clone());
        }
    }

    /// `user_joined`: add unless already present. Returns whether it was
    /// added.
    pub fn apply_user_joined(&mut self, participant: Participant) -> bool {
        if self.contains(&participant.user_id) {
            return false;
        }
        self.participants.push(participant);
        true
    }

    /// `user_left`: remove by id. Returns the removed participant.
    pub fn apply_user_left(&mut self, user_id: &UserId) -> Option<Participant> {
        let index = self
            .participants
            .iter()
            .position(|p| &p.user_id == user_id)?;
        Some(self.participants.remove(index))
    }

    pub fn clear(&mut self) {
        self.participants.clear();
    }

    pub fn contains(&self, user_id: &UserId) -> bool {
        self.participants.iter().any(|p| &p.user_id == user_id)
    }

    pub fn get(&self, user_id: &UserId) -> Option<&Participant> {
        self.participants.iter().find(|p| &p.user_id == user_id)
    }

    pub fn participants(&self) -> &[Participant] {
        &self.participants
    }

    pub fn len(&self) -> usize {
        self.participants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }
}
