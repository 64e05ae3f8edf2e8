//! Posting services.
//!
//! Every account names one [`ServiceKind`]. Only Nostr and the local test
//! service have implementations; the remaining kinds resolve to no service.

use crate::account::Account;
use async_trait::async_trait;
use nostr_client::{ClientError, CoordinatorConfig, PublishCoordinator, PublishOutcome};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const INVALID_ACCOUNT: &str = "Invalid account configuration";
pub const ALREADY_POSTING: &str = "Already posting, please wait";
pub const RELAY_TIMEOUT: &str = "Failed to connect to any relay (timeout)";
pub const RELAY_CONNECTION_ERRORS: &str = "Failed to connect to any relay (connection errors)";

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("unknown service: {0}")]
    UnknownService(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceKind {
    Mastodon,
    BlueSky,
    MicroBlog,
    Nostr,
    Test,
}

impl ServiceKind {
    pub const ALL: [Self; 5] = [
        Self::Mastodon,
        Self::BlueSky,
        Self::MicroBlog,
        Self::Nostr,
        Self::Test,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Mastodon => "mastodon",
            Self::BlueSky => "bluesky",
            Self::MicroBlog => "microblog",
            Self::Nostr => "nostr",
            Self::Test => "test",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceKind {
    type Err = ServiceError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| ServiceError::UnknownService(value.to_string()))
    }
}

/// Something that can publish a post for an account.
#[async_trait]
pub trait PostService: Send + Sync {
    fn kind(&self) -> ServiceKind;

    /// Whether the account carries what this service needs to post.
    fn validate_account(&self, account: &Account) -> bool;

    async fn post(&self, account: &Account, text: &str) -> PublishOutcome;
}

/// Signs text notes and publishes them to the account's relays.
pub struct NostrService {
    coordinator: PublishCoordinator,
    publish_timeout: Duration,
}

impl NostrService {
    pub fn new(config: CoordinatorConfig, publish_timeout: Duration) -> Self {
        Self {
            coordinator: PublishCoordinator::new(config),
            publish_timeout,
        }
    }

    pub fn is_posting(&self) -> bool {
        self.coordinator.is_publishing()
    }
}

#[async_trait]
impl PostService for NostrService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Nostr
    }

    fn validate_account(&self, account: &Account) -> bool {
        !account.private_key.trim().is_empty() && !account.relays.is_empty()
    }

    async fn post(&self, account: &Account, text: &str) -> PublishOutcome {
        if !self.validate_account(account) {
            return PublishOutcome::failed(INVALID_ACCOUNT);
        }

        debug!("posting note for account {}", account.label());
        let result = self
            .coordinator
            .publish_note(
                &account.private_key,
                text,
                &account.relays,
                self.publish_timeout,
            )
            .await;

        match result {
            Ok(acceptance) => {
                info!(
                    "note {} accepted by {} for account {}",
                    acceptance.event_id,
                    acceptance.relay_url,
                    account.label()
                );
                PublishOutcome::succeeded()
            }
            Err(error) => PublishOutcome::failed(failure_text(&error)),
        }
    }
}

fn failure_text(error: &ClientError) -> String {
    match error {
        ClientError::PublishInProgress => ALREADY_POSTING.to_string(),
        ClientError::Timeout(_) => RELAY_TIMEOUT.to_string(),
        ClientError::Connection(_) | ClientError::WebSocket(_) => {
            RELAY_CONNECTION_ERRORS.to_string()
        }
        other => other.to_string(),
    }
}

/// Local service that succeeds after a short delay without any I/O.
pub struct TestService {
    delay: Duration,
}

impl TestService {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for TestService {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[async_trait]
impl PostService for TestService {
    fn kind(&self) -> ServiceKind {
        ServiceKind::Test
    }

    fn validate_account(&self, account: &Account) -> bool {
        !account.username.is_empty()
    }

    async fn post(&self, account: &Account, text: &str) -> PublishOutcome {
        if !self.validate_account(account) {
            return PublishOutcome::failed(INVALID_ACCOUNT);
        }
        debug!(
            "test post for account {} ({} chars)",
            account.label(),
            text.chars().count()
        );
        tokio::time::sleep(self.delay).await;
        PublishOutcome::succeeded()
    }
}
