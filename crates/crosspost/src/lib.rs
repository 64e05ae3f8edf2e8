//! Post short notes from configured accounts.
//!
//! Nostr accounts are signed locally and fanned out to relays through
//! [`nostr_client::PublishCoordinator`].

pub mod account;
pub mod cli;
pub mod config;
pub mod service;

pub use account::{Account, AccountManager, AccountPostResult};
pub use config::{ConfigError, DEFAULT_NOSTR_RELAYS, PublishConfig};
pub use service::{NostrService, PostService, ServiceError, ServiceKind, TestService};
