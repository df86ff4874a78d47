/*! # Autonomy Link

A one-way unreliable channel that carries movement snapshots between two peers.

Each [`MoveLink`] is one end of a connection: it stamps outgoing snapshots with
a per-character sequence number, and filters incoming ones according to its
[`ChannelMode`]. A [`LinkConditioner`] can be inserted on the receiving side to
simulate latency, jitter, packet loss and duplication.
*/
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use core::time::Duration;
use tracing::{error, trace};

use autonomy_core::id::NetId;
use autonomy_core::network::MoveSender;
use autonomy_core::snapshot::MoveSnapshot;

pub mod channel;
pub mod conditioner;
pub mod error;
pub mod io;
pub mod message;

pub use channel::{ChannelMode, MoveChannel};
pub use conditioner::{LinkConditioner, LinkConditionerConfig};
pub use error::LinkError;
pub use io::CrossbeamIo;
pub use message::{MessageSequence, MoveMessage};

pub mod prelude {
    pub use crate::channel::ChannelMode;
    pub use crate::conditioner::LinkConditionerConfig;
    pub use crate::error::LinkError;
    pub use crate::io::CrossbeamIo;
    pub use crate::message::MoveMessage;
    pub use crate::MoveLink;
}

/// One end of a move channel between two peers
#[derive(Debug)]
pub struct MoveLink {
    io: CrossbeamIo,
    channel: MoveChannel,
    conditioner: Option<LinkConditioner<bytes::Bytes>>,
}

impl MoveLink {
    pub fn new(io: CrossbeamIo, mode: ChannelMode) -> Self {
        Self {
            io,
            channel: MoveChannel::new(mode),
            conditioner: None,
        }
    }

    /// Condition every packet received on this end
    pub fn with_conditioner(mut self, conditioner: LinkConditioner<bytes::Bytes>) -> Self {
        self.conditioner = Some(conditioner);
        self
    }

    /// Two connected ends
    pub fn new_pair(mode: ChannelMode) -> (Self, Self) {
        let (a, b) = CrossbeamIo::new_pair();
        (Self::new(a, mode), Self::new(b, mode))
    }

    pub fn mode(&self) -> ChannelMode {
        self.channel.mode()
    }

    /// Send a snapshot of `character` to the remote end
    pub fn send(&mut self, character: NetId, snapshot: MoveSnapshot) -> Result<(), LinkError> {
        let message = MoveMessage {
            character,
            sequence: self.channel.next_sequence(character),
            snapshot,
        };
        let bytes = message.to_bytes()?;
        trace!(?character, sequence = ?message.sequence, len = bytes.len(), "sending move message");
        self.io.send(bytes)
    }

    /// Every message that is ready to be delivered at `now`.
    ///
    /// Packets that fail to decode are dropped.
    pub fn receive(&mut self, now: Duration) -> Result<Vec<MoveMessage>, LinkError> {
        let mut ready = Vec::new();
        while let Some(packet) = self.io.recv()? {
            match self.conditioner.as_mut() {
                Some(conditioner) => conditioner.condition_packet(packet, now),
                None => ready.push(packet),
            }
        }
        if let Some(conditioner) = self.conditioner.as_mut() {
            ready.extend(core::iter::from_fn(|| conditioner.pop_packet(now)));
        }

        let mut messages = Vec::with_capacity(ready.len());
        for packet in ready {
            match MoveMessage::from_bytes(&packet) {
                Ok(message) if self.channel.accept(&message) => messages.push(message),
                Ok(_) => {}
                Err(e) => error!(?e, "dropping malformed move message"),
            }
        }
        Ok(messages)
    }

    /// Forget the sequence state of a character that left the session
    pub fn remove_character(&mut self, character: NetId) {
        self.channel.remove(character);
    }
}

impl MoveSender for MoveLink {
    fn send_move(&mut self, character: NetId, snapshot: &MoveSnapshot) {
        if let Err(e) = self.send(character, snapshot.clone()) {
            error!(?character, ?e, "failed to send move message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autonomy_core::rotator::Rotator;
    use bevy_math::Vec3;
    use test_log::test;

    fn snapshot(x: f32) -> MoveSnapshot {
        MoveSnapshot {
            location: Vec3::new(x, 0.0, 0.0),
            rotation: Rotator::from_yaw(90.0),
            ..Default::default()
        }
    }

    #[test]
    fn test_send_receive() {
        let (mut client, mut server) = MoveLink::new_pair(ChannelMode::SequencedUnreliable);
        client.send(NetId(1), snapshot(1.0)).unwrap();
        client.send(NetId(1), snapshot(2.0)).unwrap();
        let messages = server.receive(Duration::ZERO).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].sequence, MessageSequence(1));
        assert_eq!(messages[1].snapshot.location.x, 2.0);
        assert!(client.receive(Duration::ZERO).unwrap().is_empty());
    }

    #[test]
    fn test_sequenced_never_delivers_older() {
        // heavy jitter reorders packets; the sequenced end only ever moves forward
        let config = LinkConditionerConfig::new(Duration::from_millis(50), Duration::from_millis(45), 0.1)
            .with_duplication(0.2);
        let (io_a, io_b) = CrossbeamIo::new_pair();
        let mut sender = MoveLink::new(io_a, ChannelMode::SequencedUnreliable);
        let mut receiver = MoveLink::new(io_b, ChannelMode::SequencedUnreliable)
            .with_conditioner(LinkConditioner::with_seed(config.clone(), 11));

        let mut last: Option<MessageSequence> = None;
        for frame in 0..400u64 {
            let now = Duration::from_millis(frame * 5);
            sender.send(NetId(1), snapshot(frame as f32)).unwrap();
            for message in receiver.receive(now).unwrap() {
                if let Some(last) = last {
                    assert!(message.sequence > last);
                }
                last = Some(message.sequence);
            }
        }
        assert!(last.is_some());

        // the unordered end delivers the same traffic out of order
        let (io_a, io_b) = CrossbeamIo::new_pair();
        let mut sender = MoveLink::new(io_a, ChannelMode::UnorderedUnreliable);
        let mut receiver = MoveLink::new(io_b, ChannelMode::UnorderedUnreliable)
            .with_conditioner(LinkConditioner::with_seed(config, 11));
        let mut sequences = Vec::new();
        for frame in 0..400u64 {
            let now = Duration::from_millis(frame * 5);
            sender.send(NetId(1), snapshot(frame as f32)).unwrap();
            sequences.extend(receiver.receive(now).unwrap().into_iter().map(|m| m.sequence));
        }
        assert!(sequences.windows(2).any(|w| w[1] <= w[0]));
    }

    #[test]
    fn test_malformed_packet_dropped() {
        let (io_a, io_b) = CrossbeamIo::new_pair();
        let mut receiver = MoveLink::new(io_b, ChannelMode::SequencedUnreliable);
        io_a.send(bytes::Bytes::from_static(&[0x01])).unwrap();
        assert!(receiver.receive(Duration::ZERO).unwrap().is_empty());
    }
}
