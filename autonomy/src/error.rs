use autonomy_core::id::NetId;
use autonomy_serde::SerializationError;

/// Errors raised while handling an incoming move message
#[derive(thiserror::Error, Debug)]
pub enum ReceiveError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error("no character {0:?} on this peer")]
    UnknownCharacter(NetId),
}
