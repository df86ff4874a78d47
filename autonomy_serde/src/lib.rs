/*! # Autonomy Serde

Bit-oriented wire primitives used to pack movement snapshots.

Values are written least-significant-bit first into a growable byte buffer, so
single-bit flags cost exactly one bit on the wire.
*/

extern crate alloc;

pub mod bits;
pub mod error;
pub mod quantize;
pub mod varint;

pub use bits::{BitReader, BitWriter};
pub use error::SerializationError;

/// Types that can be written to and read from a bit stream.
pub trait ToBits {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError>;

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError>
    where
        Self: Sized;
}

impl ToBits for bool {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        writer.write_bit(*self);
        Ok(())
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        reader.read_bit()
    }
}

impl ToBits for f32 {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        writer.write_f32(*self);
        Ok(())
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        reader.read_f32()
    }
}

impl<T: ToBits> ToBits for Option<T> {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        match self {
            None => {
                writer.write_bit(false);
                Ok(())
            }
            Some(value) => {
                writer.write_bit(true);
                value.to_bits(writer)
            }
        }
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        if reader.read_bit()? {
            Ok(Some(T::from_bits(reader)?))
        } else {
            Ok(None)
        }
    }
}

pub mod prelude {
    pub use crate::ToBits;
    pub use crate::bits::{BitReader, BitWriter};
    pub use crate::error::SerializationError;
}
