use autonomy_serde::SerializationError;

#[derive(thiserror::Error, Debug)]
pub enum LinkError {
    #[error(transparent)]
    Serialization(#[from] SerializationError),
    #[error("the remote end of the link is disconnected")]
    Disconnected,
    #[error("the link send buffer is full")]
    Full,
}
