//! Variable-length unsigned integers: 7 value bits per group, high bit set while more groups follow.
use crate::bits::{BitReader, BitWriter};
use crate::error::SerializationError;

const MAX_GROUPS: usize = 10;

pub fn write_varint(writer: &mut BitWriter, mut value: u64) {
    loop {
        let group = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            writer.write_u8(group);
            return;
        }
        writer.write_u8(group | 0x80);
    }
}

pub fn read_varint(reader: &mut BitReader) -> Result<u64, SerializationError> {
    let mut value = 0u64;
    for i in 0..MAX_GROUPS {
        let group = reader.read_u8()?;
        value |= ((group & 0x7f) as u64) << (7 * i);
        if group & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(SerializationError::InvalidValue("varint longer than 10 groups"))
}

/// Number of bits `value` occupies once varint-encoded
pub fn varint_len(value: u64) -> usize {
    let significant = 64 - value.leading_zeros() as usize;
    8 * significant.div_ceil(7).max(1)
}
