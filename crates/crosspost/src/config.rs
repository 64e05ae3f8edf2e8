//! Environment configuration.

use nostr_client::{CoordinatorConfig, RelayConfig};
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_NOSTR_RELAYS: [&str; 5] = [
    "wss://relay.damus.io",
    "wss://nos.lol",
    "wss://relay.snort.social",
    "wss://relay.current.fyi",
    "wss://brb.io",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid CROSSPOST_PUBLISH_TIMEOUT_MS: {0}")]
    InvalidPublishTimeoutMs(String),
    #[error("invalid CROSSPOST_CONNECT_TIMEOUT_MS: {0}")]
    InvalidConnectTimeoutMs(String),
    #[error("invalid CROSSPOST_MAX_RELAYS: {0}")]
    InvalidMaxRelays(String),
    #[error("invalid CROSSPOST_RELAYS: {0}")]
    InvalidRelays(String),
    #[error("failed to read accounts file {path}: {source}")]
    AccountsRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write accounts file {path}: {source}")]
    AccountsWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid accounts file: {0}")]
    AccountsParse(#[from] toml::de::Error),
    #[error("failed to encode accounts: {0}")]
    AccountsEncode(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishConfig {
    pub publish_timeout: Duration,
    pub connect_timeout: Duration,
    pub max_relays: usize,
    pub relays: Vec<String>,
    pub accounts_path: PathBuf,
}

impl PublishConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let publish_timeout_ms = parse_positive(&lookup, "CROSSPOST_PUBLISH_TIMEOUT_MS", 10_000)
            .map_err(ConfigError::InvalidPublishTimeoutMs)?;
        let connect_timeout_ms = parse_positive(&lookup, "CROSSPOST_CONNECT_TIMEOUT_MS", 5_000)
            .map_err(ConfigError::InvalidConnectTimeoutMs)?;
        let max_relays = parse_positive(&lookup, "CROSSPOST_MAX_RELAYS", 16)
            .map_err(ConfigError::InvalidMaxRelays)?;
        let max_relays = usize::try_from(max_relays)
            .map_err(|error| ConfigError::InvalidMaxRelays(error.to_string()))?;

        let relays = lookup("CROSSPOST_RELAYS")
            .map(|value| split_relays(&value))
            .unwrap_or_default();
        if let Some(bad) = relays
            .iter()
            .find(|relay| !(relay.starts_with("ws://") || relay.starts_with("wss://")))
        {
            return Err(ConfigError::InvalidRelays(format!(
                "relay must use ws:// or wss://, got {bad}"
            )));
        }

        let accounts_path = lookup("CROSSPOST_ACCOUNTS_PATH")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                lookup("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_default()
                    .join(".crosspost")
                    .join("accounts.toml")
            });

        Ok(Self {
            publish_timeout: Duration::from_millis(publish_timeout_ms),
            connect_timeout: Duration::from_millis(connect_timeout_ms),
            max_relays,
            relays,
            accounts_path,
        })
    }

    /// Relays to use when an account or command names none.
    pub fn default_relays(&self) -> Vec<String> {
        if self.relays.is_empty() {
            DEFAULT_NOSTR_RELAYS.iter().map(ToString::to_string).collect()
        } else {
            self.relays.clone()
        }
    }

    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            max_relays: self.max_relays,
            relay_config: RelayConfig {
                connect_timeout: self.connect_timeout,
            },
        }
    }
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            publish_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            max_relays: 16,
            relays: Vec::new(),
            accounts_path: PathBuf::from(".crosspost").join("accounts.toml"),
        }
    }
}

/// Split a comma-separated relay list, dropping blanks.
pub fn split_relays(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|relay| !relay.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_positive<F>(lookup: &F, key: &str, default: u64) -> Result<u64, String>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value = raw.trim().parse::<u64>().map_err(|error| error.to_string())?;
    if value == 0 {
        return Err("must be greater than zero".to_string());
    }
    Ok(value)
}
