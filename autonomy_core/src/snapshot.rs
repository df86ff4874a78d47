//! The movement snapshot sent by the owning client, and its wire codec.
//!
//! Field order on the wire:
//!
//! | field | encoding |
//! |---|---|
//! | location | [`QuantizedVec3`] |
//! | rotation | compressed [`Rotator`] |
//! | velocity | 1 bit, then [`QuantizedVec3`] if set |
//! | control rotation | compressed [`Rotator`] |
//! | movement mode | packed `u8` |
//! | base | 1 bit, then varint [`NetId`] if set |
//! | bone | 1 bit, then length-prefixed utf-8 if set |
//! | relative rotation, override root motion, crouching | 1 bit each |
//! | timestamp | 1 bit, then `f32` if set |
use bevy_math::Vec3;
use bytes::Bytes;

use autonomy_serde::quantize::QuantizedVec3;
use autonomy_serde::{BitReader, BitWriter, SerializationError, ToBits};

use crate::id::{BoneName, NetId};
use crate::movement_mode::MovementMode;
use crate::rotator::Rotator;

/// Velocities shorter than this are sent as exactly zero
pub const VELOCITY_EPSILON: f32 = 1.0e-4;

/// The unit of movement replication.
///
/// A snapshot is built fresh every time the owning client sends, and replaces
/// the previous one wholesale on the receiving side.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MoveSnapshot {
    /// World location on the zero origin, or the location relative to `base`
    pub location: Vec3,
    /// World rotation, or the rotation relative to `base` when `base_has_relative_rotation`
    pub rotation: Rotator,
    pub velocity: Vec3,
    pub control_rotation: Rotator,
    pub movement_mode: MovementMode,
    pub base: Option<NetId>,
    /// Only meaningful when `base` is set
    pub bone: Option<BoneName>,
    pub base_has_relative_rotation: bool,
    pub has_override_root_motion: bool,
    pub crouching: bool,
    /// Sender world time; only sent in linear smoothing mode
    pub timestamp: Option<f32>,
}

impl MoveSnapshot {
    pub fn has_velocity(&self) -> bool {
        self.velocity.length() >= VELOCITY_EPSILON
    }

    pub fn has_timestamp(&self) -> bool {
        self.timestamp.is_some()
    }

    /// Location, rotation and velocity are all zero: no real movement has been received yet
    pub fn is_empty(&self) -> bool {
        self.location == Vec3::ZERO && self.rotation.is_zero() && self.velocity == Vec3::ZERO
    }

    /// The snapshot exactly as a receiver will decode it
    pub fn quantized(&self) -> Self {
        let velocity = if self.has_velocity() {
            QuantizedVec3::quantized(self.velocity)
        } else {
            Vec3::ZERO
        };
        Self {
            location: QuantizedVec3::quantized(self.location),
            rotation: self.rotation.compressed(),
            velocity,
            control_rotation: self.control_rotation.compressed(),
            movement_mode: MovementMode::unpack(self.movement_mode.pack()),
            bone: self.base.and(self.bone.clone()),
            ..self.clone()
        }
    }

    pub fn encode(&self) -> Result<Bytes, SerializationError> {
        let mut writer = BitWriter::with_capacity(32);
        self.to_bits(&mut writer)?;
        Ok(writer.finish())
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, SerializationError> {
        Self::from_bits(&mut BitReader::new(bytes))
    }
}

impl ToBits for MoveSnapshot {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        QuantizedVec3(self.location).to_bits(writer)?;
        self.rotation.to_bits(writer)?;
        let velocity = self.has_velocity().then_some(QuantizedVec3(self.velocity));
        velocity.to_bits(writer)?;
        self.control_rotation.to_bits(writer)?;
        writer.write_u8(self.movement_mode.pack());
        self.base.to_bits(writer)?;
        // a bone without a base cannot be resolved
        self.base.and(self.bone.as_ref()).cloned().to_bits(writer)?;
        writer.write_bit(self.base_has_relative_rotation);
        writer.write_bit(self.has_override_root_motion);
        writer.write_bit(self.crouching);
        self.timestamp.to_bits(writer)
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        let location = QuantizedVec3::from_bits(reader)?.0;
        let rotation = Rotator::from_bits(reader)?;
        let velocity = Option::<QuantizedVec3>::from_bits(reader)?
            .map(|v| v.0)
            .unwrap_or(Vec3::ZERO);
        let control_rotation = Rotator::from_bits(reader)?;
        let movement_mode = MovementMode::unpack(reader.read_u8()?);
        let base = Option::<NetId>::from_bits(reader)?;
        let bone = Option::<BoneName>::from_bits(reader)?;
        let base_has_relative_rotation = reader.read_bit()?;
        let has_override_root_motion = reader.read_bit()?;
        let crouching = reader.read_bit()?;
        let timestamp = Option::<f32>::from_bits(reader)?;
        Ok(Self {
            location,
            rotation,
            velocity,
            control_rotation,
            movement_mode,
            base,
            bone,
            base_has_relative_rotation,
            has_override_root_motion,
            crouching,
            timestamp,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_log::test;

    fn snapshot() -> MoveSnapshot {
        MoveSnapshot {
            location: Vec3::new(1520.25, 90.0, -33.3),
            rotation: Rotator::from_yaw(135.0),
            velocity: Vec3::new(420.0, 0.0, -12.5),
            control_rotation: Rotator::new(-10.0, 135.0, 0.0),
            movement_mode: MovementMode::Falling,
            base: Some(NetId(77)),
            bone: Some(BoneName::from("deck")),
            base_has_relative_rotation: true,
            has_override_root_motion: false,
            crouching: true,
            timestamp: Some(12.25),
        }
    }

    #[test]
    fn test_round_trip() {
        let original = snapshot();
        let decoded = MoveSnapshot::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded, original.quantized());
        assert_relative_eq!(decoded.location.x, 1520.3, epsilon = 1e-2);
        assert_eq!(decoded.timestamp, Some(12.25));
        assert_eq!(decoded.bone, Some(BoneName::from("deck")));
    }

    #[test]
    fn test_negligible_velocity_is_zero() {
        let original = MoveSnapshot {
            velocity: Vec3::splat(1.0e-6),
            timestamp: None,
            ..snapshot()
        };
        let decoded = MoveSnapshot::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded.velocity, Vec3::ZERO);
        assert!(!decoded.has_timestamp());
    }

    #[test]
    fn test_bone_requires_base() {
        let original = MoveSnapshot {
            base: None,
            ..snapshot()
        };
        let decoded = MoveSnapshot::decode(&original.encode().unwrap()).unwrap();
        assert_eq!(decoded.base, None);
        assert_eq!(decoded.bone, None);
    }

    /// Every strict prefix of an encoding is rejected
    #[test]
    fn test_truncated() {
        let original = MoveSnapshot {
            timestamp: None,
            ..snapshot()
        };
        let mut writer = BitWriter::new();
        original.to_bits(&mut writer).unwrap();
        let len = writer.bit_len();
        let bytes = writer.finish();
        // byte-level truncation
        for cut in 0..bytes.len() {
            assert!(matches!(
                MoveSnapshot::decode(&bytes[..cut]),
                Err(SerializationError::BufferTooShort { .. })
            ));
        }
        // the final byte carries `len % 8` meaningful bits, so the full buffer decodes
        assert!(len <= bytes.len() * 8);
        assert!(MoveSnapshot::decode(&bytes).is_ok());
    }
}
