//! Command line front end.

use crate::account::AccountManager;
use crate::config::{PublishConfig, split_relays};
use crate::service::{NostrService, TestService};
use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use nostr::{PrivateKey, Signer};
use nostr_client::PublishCoordinator;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "crosspost")]
#[command(about = "Publish short notes to Nostr relays")]
pub struct CrosspostCli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate a new private key
    GenerateKey,
    /// Print the public key for a private key
    GetPubkey {
        /// Private key as hex or nsec
        #[arg(long)]
        private_key: String,
    },
    /// Sign a text note and publish it to relays
    Post {
        /// Private key as hex or nsec
        #[arg(long)]
        private_key: String,
        /// Note text
        #[arg(long)]
        content: String,
        /// Comma-separated relay URLs (defaults to the configured list)
        #[arg(long, value_delimiter = ',')]
        relays: Vec<String>,
        /// Publish deadline in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Post to accounts from the accounts file
    PostAccounts {
        /// Note text
        #[arg(long)]
        content: String,
        /// Account id (repeatable; defaults to every enabled account)
        #[arg(long = "account")]
        accounts: Vec<String>,
    },
}

/// Run a command and return the text to print.
pub async fn run(command: Commands, config: &PublishConfig) -> anyhow::Result<String> {
    match command {
        Commands::GenerateKey => generate_key(),
        Commands::GetPubkey { private_key } => get_pubkey(&private_key),
        Commands::Post {
            private_key,
            content,
            relays,
            timeout_ms,
        } => post(config, &private_key, &content, relays, timeout_ms).await,
        Commands::PostAccounts { content, accounts } => {
            post_accounts(config, &content, accounts).await
        }
    }
}

fn generate_key() -> anyhow::Result<String> {
    let key = PrivateKey::generate()?;
    let public_key = Signer::new().derive_public_key(&key)?;
    Ok(format!(
        "private key: {}\nnsec: {}\npublic key: {}\nnpub: {}",
        key.to_hex(),
        key.to_nsec()?,
        public_key.to_hex(),
        public_key.to_npub()?
    ))
}

fn get_pubkey(private_key: &str) -> anyhow::Result<String> {
    let key = PrivateKey::parse(private_key).context("invalid private key")?;
    let public_key = Signer::new().derive_public_key(&key)?;
    Ok(format!(
        "public key: {}\nnpub: {}",
        public_key.to_hex(),
        public_key.to_npub()?
    ))
}

async fn post(
    config: &PublishConfig,
    private_key: &str,
    content: &str,
    relays: Vec<String>,
    timeout_ms: Option<u64>,
) -> anyhow::Result<String> {
    let relays = relays
        .iter()
        .flat_map(|relay| split_relays(relay))
        .collect::<Vec<_>>();
    let relays = if relays.is_empty() {
        config.default_relays()
    } else {
        relays
    };
    let timeout = timeout_ms.map_or(config.publish_timeout, Duration::from_millis);

    let coordinator = PublishCoordinator::new(config.coordinator_config());
    let acceptance = coordinator
        .publish_note(private_key, content, &relays, timeout)
        .await
        .context("publish failed")?;
    Ok(format!(
        "published {} (accepted by {})",
        acceptance.event_id, acceptance.relay_url
    ))
}

async fn post_accounts(
    config: &PublishConfig,
    content: &str,
    accounts: Vec<String>,
) -> anyhow::Result<String> {
    let mut manager = AccountManager::load(&config.accounts_path, config.default_relays())?;
    manager.register_service(Arc::new(NostrService::new(
        config.coordinator_config(),
        config.publish_timeout,
    )));
    manager.register_service(Arc::new(TestService::default()));

    let ids = if accounts.is_empty() {
        manager
            .accounts()
            .iter()
            .filter(|account| account.enabled)
            .map(|account| account.id.clone())
            .collect()
    } else {
        accounts
    };

    let results = manager.post_to_accounts(content, &ids).await;
    let failed = results.iter().filter(|result| !result.outcome.success).count();
    let lines = results
        .iter()
        .map(|result| match &result.outcome.error {
            None => format!("{}: ok", result.label),
            Some(error) => format!("{}: failed: {}", result.label, error),
        })
        .collect::<Vec<_>>()
        .join("\n");

    if failed > 0 {
        bail!("{failed} of {} posts failed\n{lines}", results.len());
    }
    Ok(lines)
}
