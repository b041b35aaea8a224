use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChannelError {
    #[error("channel is disconnected")]
    Disconnected,
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}
