//! Identifiers for peers, network-addressable objects and attachment bones
use alloc::string::String;
use core::fmt::Formatter;

use autonomy_serde::varint::{read_varint, write_varint};
use autonomy_serde::{BitReader, BitWriter, SerializationError, ToBits};
use serde::{Deserialize, Serialize};

/// Identifies one participant of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PeerId {
    /// Refers to the server
    Server,
    Client(u64),
}

impl PeerId {
    pub fn is_server(&self) -> bool {
        matches!(self, PeerId::Server)
    }
}

impl core::fmt::Display for PeerId {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            PeerId::Server => write!(f, "Server"),
            PeerId::Client(id) => write!(f, "Client({id})"),
        }
    }
}

/// Stable network id of a replicated object (a character or a movement base).
///
/// Ids are resolved through a registry on every peer; an id that no longer
/// resolves simply means the object is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NetId(pub u64);

impl ToBits for NetId {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        write_varint(writer, self.0);
        Ok(())
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        Ok(Self(read_varint(reader)?))
    }
}

/// Name of an attachment bone on a movement base
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoneName(pub String);

impl BoneName {
    pub const MAX_LEN: usize = u8::MAX as usize;

    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for BoneName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl ToBits for BoneName {
    fn to_bits(&self, writer: &mut BitWriter) -> Result<(), SerializationError> {
        let bytes = self.0.as_bytes();
        if bytes.len() > Self::MAX_LEN {
            return Err(SerializationError::ValueTooLarge("bone name longer than 255 bytes"));
        }
        write_varint(writer, bytes.len() as u64);
        writer.write_bytes(bytes);
        Ok(())
    }

    fn from_bits(reader: &mut BitReader) -> Result<Self, SerializationError> {
        let len = read_varint(reader)? as usize;
        if len > Self::MAX_LEN {
            return Err(SerializationError::ValueTooLarge("bone name longer than 255 bytes"));
        }
        let bytes = reader.read_bytes(len)?;
        String::from_utf8(bytes)
            .map(Self)
            .map_err(|_| SerializationError::InvalidUtf8)
    }
}
