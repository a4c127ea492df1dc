use std::time::Duration;
use thiserror::Error;
use tokio_tungstenite::tungstenite;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("connection failed: {0}")]
    Transport(#[from] tungstenite::Error),
    #[error("connection attempt timed out after {0:?}")]
    Timeout(Duration),
    #[error("channel is not open")]
    NotConnected,
    #[error(transparent)]
    Config(#[from] shared::ConfigError),
}
