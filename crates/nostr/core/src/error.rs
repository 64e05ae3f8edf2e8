use thiserror::Error;

/// Errors produced while handling keys and building or signing events.
#[derive(Debug, Error)]
pub enum NostrError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("bech32 error: {0}")]
    Bech32(String),
}

pub type Result<T> = std::result::Result<T, NostrError>;
