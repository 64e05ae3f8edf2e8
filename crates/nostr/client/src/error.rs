//! Client error types.

use thiserror::Error;

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("relay rejected event: {0}")]
    RelayRejected(String),

    #[error("timeout error: {0}")]
    Timeout(String),

    #[error("a publish attempt is already in progress")]
    PublishInProgress,

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("not connected")]
    NotConnected,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("protocol error: {0}")]
    Protocol(String),
}

impl From<nostr::NostrError> for ClientError {
    fn from(error: nostr::NostrError) -> Self {
        match error {
            nostr::NostrError::InvalidKey(message) => Self::InvalidKey(message),
            nostr::NostrError::Bech32(message) => Self::InvalidKey(message),
            other => Self::Signing(other.to_string()),
        }
    }
}

/// Client result type.
pub type Result<T> = std::result::Result<T, ClientError>;
