//! Outbound message queue.

use std::collections::VecDeque;

use coterie_protocol::ClientMessage;

/// FIFO of messages waiting for an open socket.
///
/// Unbounded and without deduplication: sending the same message twice
/// queues it twice. There is no spill policy; chat and dice traffic is
/// low-volume and the queue drains on the next successful open.
#[derive(Debug, Clone, Default)]
pub struct MessageQueue {
    pending: VecDeque<ClientMessage>,
}

impl MessageQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ClientMessage) {
        self.pending.push_back(message);
    }

    /// Removes and yields every queued message, oldest first.
    pub fn drain(&mut self) -> impl Iterator<Item = ClientMessage> + '_ {
        self.pending.drain(..)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClientMessage> {
        self.pending.iter()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
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

    #[test]
    fn test_drain_yields_in_push_order() {
        let mut queue = MessageQueue::new();
        queue.push(chat("a"));
        queue.push(chat("b"));
        queue.push(chat("c"));

        let drained: Vec<_> = queue.drain().collect();

        assert_eq!(drained, vec![chat("a"), chat("b"), chat("c")]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_identical_messages_are_not_deduplicated() {
        let mut queue = MessageQueue::new();
        queue.push(chat("same"));
        queue.push(chat("same"));
        assert_eq!(queue.len(), 2);
    }
}
