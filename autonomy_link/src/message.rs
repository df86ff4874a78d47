//! Envelope of a move message on the wire.
//!
//! | field     | encoding            |
//! |-----------|---------------------|
//! | character | varint `NetId`      |
//! | sequence  | u16                 |
//! | snapshot  | `MoveSnapshot` bits |
use bytes::Bytes;
use core::cmp::Ordering;
use core::ops::Sub;
use serde::{Deserialize, Serialize};

use autonomy_core::id::NetId;
use autonomy_core::snapshot::MoveSnapshot;
use autonomy_serde::{BitReader, BitWriter, SerializationError, ToBits};

/// Retrieves the wrapping difference of b-a.
/// Wraps around 32768
///
/// # Examples
///
/// ```
/// use autonomy_link::message::wrapping_diff;
/// assert_eq!(wrapping_diff(1, 2), 1);
/// assert_eq!(wrapping_diff(2, 1), -1);
/// assert_eq!(wrapping_diff(65535, 0), 1);
/// assert_eq!(wrapping_diff(0, 32768), -32768);
/// ```
pub fn wrapping_diff(a: u16, b: u16) -> i16 {
    b.wrapping_sub(a) as i16
}

/// Per-character sequence number that wraps around 65536
#[derive(Serialize, Deserialize, Clone, Copy, Debug, Eq, Hash, PartialEq, Default)]
pub struct MessageSequence(pub u16);

impl MessageSequence {
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl Ord for MessageSequence {
    fn cmp(&self, other: &Self) -> Ordering {
        match wrapping_diff(self.0, other.0) {
            0 => Ordering::Equal,
            x if x > 0 => Ordering::Less,
            _ => Ordering::Greater,
        }
    }
}

impl PartialOrd for MessageSequence {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Sub for MessageSequence {
    type Output = i16;

    fn sub(self, rhs: Self) -> Self::Output {
        wrapping_diff(rhs.0, self.0)
    }
}

impl ToBits for MessageSequence {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        writer.write_u16(self.0);
        Ok(())
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        Ok(Self(reader.read_u16()?))
    }
}

/// A movement snapshot for one character
#[derive(Debug, Clone, PartialEq)]
pub struct MoveMessage {
    pub character: NetId,
    pub sequence: MessageSequence,
    pub snapshot: MoveSnapshot,
}

impl MoveMessage {
    pub fn to_bytes(&self) -> Result<Bytes, SerializationError> {
        let mut writer = BitWriter::with_capacity(40);
        self.to_bits(&mut writer)?;
        Ok(writer.finish())
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SerializationError> {
        Self::from_bits(&mut BitReader::new(bytes))
    }
}

impl ToBits for MoveMessage {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        self.character.to_bits(writer)?;
        self.sequence.to_bits(writer)?;
        self.snapshot.to_bits(writer)
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        Ok(Self {
            character: NetId::from_bits(reader)?,
            sequence: MessageSequence::from_bits(reader)?,
            snapshot: MoveSnapshot::from_bits(reader)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autonomy_core::rotator::Rotator;
    use bevy_math::Vec3;
    use test_log::test;

    #[test]
    fn test_ordering() {
        assert!(MessageSequence(2) > MessageSequence(1));
        assert!(MessageSequence(1) < MessageSequence(2));
        assert!(MessageSequence(0) > MessageSequence(65535));
        assert!(MessageSequence(0) < MessageSequence(32767));
        assert!(MessageSequence(0) > MessageSequence(32768));
        assert_eq!(MessageSequence(65535).next(), MessageSequence(0));
        assert_eq!(MessageSequence(1) - MessageSequence(65535), 2);
    }

    #[test]
    fn test_envelope() {
        let message = MoveMessage {
            character: NetId(300),
            sequence: MessageSequence(65534),
            snapshot: MoveSnapshot {
                location: Vec3::new(10.0, 20.5, -30.0),
                rotation: Rotator::from_yaw(45.0),
                ..Default::default()
            },
        };
        let bytes = message.to_bytes().unwrap();
        let decoded = MoveMessage::from_bytes(&bytes).unwrap();
        assert_eq!(decoded.character, message.character);
        assert_eq!(decoded.sequence, message.sequence);
        assert_eq!(decoded.snapshot, message.snapshot.quantized());

        assert!(matches!(
            MoveMessage::from_bytes(&bytes[..2]),
            Err(SerializationError::BufferTooShort { .. })
        ));
    }
}
