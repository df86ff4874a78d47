//! Euler rotations in degrees, and their compressed wire form
use bevy_math::{EulerRot, Quat};
use serde::{Deserialize, Serialize};

use autonomy_serde::{BitReader, BitWriter, SerializationError, ToBits};

/// Orientation expressed as pitch/yaw/roll in degrees.
///
/// The world is Y-up: yaw turns around Y, pitch around X, roll around Z.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub const ZERO: Self = Self::new(0.0, 0.0, 0.0);

    pub const fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    pub const fn from_yaw(yaw: f32) -> Self {
        Self::new(0.0, yaw, 0.0)
    }

    /// Wrap an angle into `(-180, 180]`
    pub fn normalize_axis(angle: f32) -> f32 {
        let mut angle = angle % 360.0;
        if angle > 180.0 {
            angle -= 360.0;
        } else if angle <= -180.0 {
            angle += 360.0;
        }
        angle
    }

    pub fn normalized(self) -> Self {
        Self::new(
            Self::normalize_axis(self.pitch),
            Self::normalize_axis(self.yaw),
            Self::normalize_axis(self.roll),
        )
    }

    pub fn is_zero(&self) -> bool {
        self.pitch == 0.0 && self.yaw == 0.0 && self.roll == 0.0
    }

    /// Keep only the yaw, for characters that must stay upright
    pub fn yaw_only(self) -> Self {
        Self::from_yaw(self.yaw)
    }

    pub fn to_quat(self) -> Quat {
        Quat::from_euler(
            EulerRot::YXZ,
            self.yaw.to_radians(),
            self.pitch.to_radians(),
            self.roll.to_radians(),
        )
    }

    pub fn from_quat(quat: Quat) -> Self {
        let (yaw, pitch, roll) = quat.to_euler(EulerRot::YXZ);
        Self::new(pitch.to_degrees(), yaw.to_degrees(), roll.to_degrees())
    }

    /// Compress an angle to 16 bits (about 0.0055 degrees of precision)
    pub fn compress_axis(angle: f32) -> u16 {
        ((angle * 65536.0 / 360.0).round() as i64 & 0xffff) as u16
    }

    pub fn decompress_axis(value: u16) -> f32 {
        Self::normalize_axis(value as f32 * 360.0 / 65536.0)
    }

    /// The value this rotator decodes to on the receiving side
    pub fn compressed(self) -> Self {
        Self::new(
            Self::decompress_axis(Self::compress_axis(self.pitch)),
            Self::decompress_axis(Self::compress_axis(self.yaw)),
            Self::decompress_axis(Self::compress_axis(self.roll)),
        )
    }
}

/// Each axis is one "non-zero" bit, followed by the 16-bit compressed angle when set
impl ToBits for Rotator {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        for angle in [self.pitch, self.yaw, self.roll] {
            let compressed = Self::compress_axis(angle);
            writer.write_bit(compressed != 0);
            if compressed != 0 {
                writer.write_u16(compressed);
            }
        }
        Ok(())
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        let mut axes = [0.0f32; 3];
        for axis in axes.iter_mut() {
            if reader.read_bit()? {
                *axis = Self::decompress_axis(reader.read_u16()?);
            }
        }
        let [pitch, yaw, roll] = axes;
        Ok(Self::new(pitch, yaw, roll))
    }
}
