//! Least-significant-bit-first bit buffers.
use alloc::vec::Vec;

use bytes::Bytes;

use crate::error::SerializationError;

/// Appends bits to a growable byte buffer.
///
/// The first bit written lands in the lowest bit of the first byte. The final
/// byte is zero-padded when the stream is finished.
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    bytes: Vec<u8>,
    bit_len: usize,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            bytes: Vec::with_capacity(bytes),
            bit_len: 0,
        }
    }

    /// Number of bits written so far
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    pub fn write_bit(&mut self, bit: bool) {
        let offset = self.bit_len % 8;
        if offset == 0 {
            self.bytes.push(0);
        }
        if bit {
            // the push above guarantees a last byte
            if let Some(last) = self.bytes.last_mut() {
                *last |= 1 << offset;
            }
        }
        self.bit_len += 1;
    }

    /// Write the `num_bits` lowest bits of `value`.
    pub fn write_bits(&mut self, value: u64, num_bits: u32) {
        debug_assert!(num_bits <= 64);
        for i in 0..num_bits {
            self.write_bit((value >> i) & 1 == 1);
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.write_bits(value as u64, 8);
    }

    pub fn write_u16(&mut self, value: u16) {
        self.write_bits(value as u64, 16);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.write_bits(value as u64, 32);
    }

    pub fn write_f32(&mut self, value: f32) {
        self.write_u32(value.to_bits());
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) {
        bytes.iter().for_each(|b| self.write_u8(*b));
    }

    /// Consume the writer and return the padded byte stream
    pub fn finish(self) -> Bytes {
        Bytes::from(self.bytes)
    }
}

/// Reads bits in the order a [`BitWriter`] wrote them.
///
/// Every read is bounds-checked; reading past the end returns
/// [`SerializationError::BufferTooShort`] without consuming anything.
#[derive(Debug, Clone)]
pub struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn remaining_bits(&self) -> usize {
        self.bytes.len() * 8 - self.position
    }

    fn ensure(&self, needed: usize) -> Result<(), SerializationError> {
        let remaining = self.remaining_bits();
        if needed > remaining {
            return Err(SerializationError::BufferTooShort { needed, remaining });
        }
        Ok(())
    }

    fn take_bit(&mut self) -> bool {
        let byte = self.bytes[self.position / 8];
        let bit = (byte >> (self.position % 8)) & 1 == 1;
        self.position += 1;
        bit
    }

    pub fn read_bit(&mut self) -> Result<bool, SerializationError> {
        self.ensure(1)?;
        Ok(self.take_bit())
    }

    pub fn read_bits(&mut self, num_bits: u32) -> Result<u64, SerializationError> {
        debug_assert!(num_bits <= 64);
        self.ensure(num_bits as usize)?;
        let mut value = 0u64;
        for i in 0..num_bits {
            if self.take_bit() {
                value |= 1 << i;
            }
        }
        Ok(value)
    }

    pub fn read_u8(&mut self) -> Result<u8, SerializationError> {
        Ok(self.read_bits(8)? as u8)
    }

    pub fn read_u16(&mut self) -> Result<u16, SerializationError> {
        Ok(self.read_bits(16)? as u16)
    }

    pub fn read_u32(&mut self) -> Result<u32, SerializationError> {
        Ok(self.read_bits(32)? as u32)
    }

    pub fn read_f32(&mut self) -> Result<f32, SerializationError> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, SerializationError> {
        self.ensure(len * 8)?;
        (0..len).map(|_| self.read_u8()).collect()
    }
}
