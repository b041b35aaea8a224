use cwchannel::ChannelError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("channel error: {0}")]
    Channel(#[from] ChannelError),
}
