//! Delivery guarantees of the move channel.
//!
//! Both modes are unreliable: messages may be lost. A sequenced channel also
//! drops any message that is not newer than the last one delivered for the same
//! character, so a late packet never reverts a character to an older state.
use bevy_platform::collections::HashMap;
use serde::{Deserialize, Serialize};
use tracing::trace;

use autonomy_core::id::NetId;

use crate::message::{MessageSequence, MoveMessage};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChannelMode {
    /// Every message that arrives is delivered; the last one to arrive wins
    UnorderedUnreliable,
    /// Only messages newer than the last delivered one are delivered
    #[default]
    SequencedUnreliable,
}

/// Sequence bookkeeping for one direction of a link
#[derive(Debug, Default)]
pub struct MoveChannel {
    mode: ChannelMode,
    /// Next sequence to send, per character
    next_send: HashMap<NetId, MessageSequence>,
    /// Most recent sequence delivered, per character
    last_received: HashMap<NetId, MessageSequence>,
}

impl MoveChannel {
    pub fn new(mode: ChannelMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> ChannelMode {
        self.mode
    }

    /// Sequence to stamp on the next message sent for `character`
    pub fn next_sequence(&mut self, character: NetId) -> MessageSequence {
        let next = self.next_send.entry(character).or_default();
        let sequence = *next;
        *next = next.next();
        sequence
    }

    /// Whether a received message should be delivered
    pub fn accept(&mut self, message: &MoveMessage) -> bool {
        if self.mode == ChannelMode::UnorderedUnreliable {
            return true;
        }
        match self.last_received.get(&message.character) {
            Some(last) if message.sequence <= *last => {
                trace!(character = ?message.character, sequence = ?message.sequence, last = ?last, "dropping out-of-order move message");
                false
            }
            _ => {
                self.last_received.insert(message.character, message.sequence);
                true
            }
        }
    }

    /// Forget everything about a character that left the session
    pub fn remove(&mut self, character: NetId) {
        self.next_send.remove(&character);
        self.last_received.remove(&character);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autonomy_core::snapshot::MoveSnapshot;
    use test_log::test;

    fn message(character: u64, sequence: u16) -> MoveMessage {
        MoveMessage {
            character: NetId(character),
            sequence: MessageSequence(sequence),
            snapshot: MoveSnapshot::default(),
        }
    }

    #[test]
    fn test_next_sequence() {
        let mut channel = MoveChannel::default();
        assert_eq!(channel.next_sequence(NetId(1)), MessageSequence(0));
        assert_eq!(channel.next_sequence(NetId(1)), MessageSequence(1));
        assert_eq!(channel.next_sequence(NetId(2)), MessageSequence(0));
    }

    #[test]
    fn test_sequenced_drops_older() {
        let mut channel = MoveChannel::new(ChannelMode::SequencedUnreliable);
        assert!(channel.accept(&message(1, 5)));
        assert!(!channel.accept(&message(1, 3)));
        assert!(!channel.accept(&message(1, 5)));
        // other characters are sequenced independently
        assert!(channel.accept(&message(2, 0)));
        assert!(channel.accept(&message(1, 6)));

        // wraparound
        assert!(channel.accept(&message(3, 65535)));
        assert!(channel.accept(&message(3, 1)));
        assert!(!channel.accept(&message(3, 65534)));
    }

    #[test]
    fn test_unordered_accepts_everything() {
        let mut channel = MoveChannel::new(ChannelMode::UnorderedUnreliable);
        assert!(channel.accept(&message(1, 5)));
        assert!(channel.accept(&message(1, 3)));
        assert!(channel.accept(&message(1, 3)));
    }
}
