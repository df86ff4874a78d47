//! Errors raised while reading or writing the wire format

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SerializationError {
    #[error("buffer too short: needed {needed} bits but only {remaining} remain")]
    BufferTooShort { needed: usize, remaining: usize },
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    #[error("string is not valid utf-8")]
    InvalidUtf8,
    #[error("value too large: {0}")]
    ValueTooLarge(&'static str),
}
