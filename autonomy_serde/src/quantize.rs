//! Fixed-precision vector quantization.
//!
//! A [`QuantizedVec3`] keeps one decimal of precision (values are scaled by 10 and
//! rounded). On the wire it is a 5-bit width header `n` followed by the three
//! components, each biased by `2^n` and written in `n + 1` bits. Components are
//! limited to 24 bits, so magnitudes beyond [`QuantizedVec3::MAX_COMPONENT`]
//! are clamped.
use bevy_math::Vec3;
use tracing::trace;

use crate::bits::{BitReader, BitWriter};
use crate::error::SerializationError;
use crate::ToBits;

const SCALE: f32 = 10.0;
const HEADER_BITS: u32 = 5;
const MAX_BITS_PER_COMPONENT: u32 = 24;
const MAX_SCALED: i64 = (1 << (MAX_BITS_PER_COMPONENT - 1)) - 1;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QuantizedVec3(pub Vec3);

impl QuantizedVec3 {
    /// Largest magnitude a single component can carry
    pub const MAX_COMPONENT: f32 = MAX_SCALED as f32 / SCALE;

    /// The value this vector decodes to on the receiving side
    pub fn quantized(value: Vec3) -> Vec3 {
        let [x, y, z] = Self::scaled(value);
        Vec3::new(x as f32, y as f32, z as f32) / SCALE
    }

    fn scaled(value: Vec3) -> [i64; 3] {
        value.to_array().map(|c| {
            if !c.is_finite() {
                trace!(component = c, "non-finite component quantized to zero");
                return 0;
            }
            let scaled = (c * SCALE).round() as i64;
            if scaled.abs() > MAX_SCALED {
                trace!(component = c, "component out of range, clamping");
            }
            scaled.clamp(-MAX_SCALED, MAX_SCALED)
        })
    }
}

impl From<Vec3> for QuantizedVec3 {
    fn from(value: Vec3) -> Self {
        Self(value)
    }
}

impl ToBits for QuantizedVec3 {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        let scaled = Self::scaled(self.0);
        let max = scaled.iter().map(|c| c.unsigned_abs()).max().unwrap_or(0);
        // width of the largest magnitude; the extra bit holds the bias
        let width = 64 - max.leading_zeros();
        writer.write_bits(width as u64, HEADER_BITS);
        let bias = 1i64 << width;
        for component in scaled {
            writer.write_bits((component + bias) as u64, width + 1);
        }
        Ok(())
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        let width = reader.read_bits(HEADER_BITS)? as u32;
        if width >= MAX_BITS_PER_COMPONENT {
            return Err(SerializationError::InvalidValue(
                "quantized component width out of range",
            ));
        }
        let bias = 1i64 << width;
        let mut components = [0.0f32; 3];
        for component in components.iter_mut() {
            let raw = reader.read_bits(width + 1)? as i64;
            *component = (raw - bias) as f32 / SCALE;
        }
        Ok(Self(Vec3::from_array(components)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use test_log::test;

    fn round_trip(value: Vec3) -> (Vec3, usize) {
        let mut writer = BitWriter::new();
        QuantizedVec3(value).to_bits(&mut writer).unwrap();
        let len = writer.bit_len();
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        (QuantizedVec3::from_bits(&mut reader).unwrap().0, len)
    }

    #[test]
    fn test_precision() {
        let (decoded, _) = round_trip(Vec3::new(1234.56, -0.04, 98765.4));
        assert_relative_eq!(decoded.x, 1234.6, epsilon = 1e-3);
        assert_eq!(decoded.y, 0.0);
        assert_relative_eq!(decoded.z, 98765.4, epsilon = 1e-2);
        assert_eq!(decoded, QuantizedVec3::quantized(Vec3::new(1234.56, -0.04, 98765.4)));
    }

    #[test]
    fn test_zero_is_compact() {
        let (decoded, len) = round_trip(Vec3::ZERO);
        assert_eq!(decoded, Vec3::ZERO);
        assert_eq!(len, 5 + 3);
    }

    #[test]
    fn test_out_of_range_clamps() {
        let (decoded, _) = round_trip(Vec3::new(1.0e9, -1.0e9, f32::NAN));
        assert_eq!(decoded.x, QuantizedVec3::MAX_COMPONENT);
        assert_eq!(decoded.y, -QuantizedVec3::MAX_COMPONENT);
        assert_eq!(decoded.z, 0.0);
    }

    #[test]
    fn test_invalid_header() {
        let mut writer = BitWriter::new();
        writer.write_bits(31, HEADER_BITS);
        let bytes = writer.finish();
        let mut reader = BitReader::new(&bytes);
        assert!(matches!(
            QuantizedVec3::from_bits(&mut reader),
            Err(SerializationError::InvalidValue(_))
        ));
    }
}
