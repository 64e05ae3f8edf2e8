//! Accounts and multi-account posting.

use crate::config::ConfigError;
use crate::service::{PostService, ServiceKind};
use nostr_client::PublishOutcome;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// One configured posting identity.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    #[serde(default)]
    pub id: String,
    pub service: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub username: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub private_key: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relays: Vec<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl Account {
    /// Display name, or the id when no name is set.
    pub fn label(&self) -> &str {
        if self.display_name.is_empty() {
            &self.id
        } else {
            &self.display_name
        }
    }

    pub fn service_kind(&self) -> Option<ServiceKind> {
        self.service.parse().ok()
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("service", &self.service)
            .field("display_name", &self.display_name)
            .field("username", &self.username)
            .field("enabled", &self.enabled)
            .field("private_key", &"<redacted>")
            .field("relays", &self.relays)
            .finish()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AccountsFile {
    #[serde(default)]
    accounts: Vec<Account>,
}

/// Result of posting to one requested account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPostResult {
    /// Service name, or `none` / `unknown` when no account was resolved.
    pub label: String,
    pub outcome: PublishOutcome,
}

impl AccountPostResult {
    fn new(label: impl Into<String>, outcome: PublishOutcome) -> Self {
        Self {
            label: label.into(),
            outcome,
        }
    }
}

/// Holds accounts and the services that post for them.
pub struct AccountManager {
    accounts: Vec<Account>,
    default_relays: Vec<String>,
    services: HashMap<ServiceKind, Arc<dyn PostService>>,
}

impl AccountManager {
    pub fn new(default_relays: Vec<String>) -> Self {
        Self {
            accounts: Vec::new(),
            default_relays,
            services: HashMap::new(),
        }
    }

    /// Load accounts from a TOML file. A missing file yields no accounts.
    pub fn load(path: &Path, default_relays: Vec<String>) -> Result<Self, ConfigError> {
        let mut manager = Self::new(default_relays);
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => {
                debug!("no accounts file at {}", path.display());
                return Ok(manager);
            }
            Err(source) => {
                return Err(ConfigError::AccountsRead {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let file: AccountsFile = toml::from_str(&raw)?;
        for account in file.accounts {
            if account.service.trim().is_empty() {
                warn!("skipping account {} with no service", account.id);
                continue;
            }
            manager.add_account(account);
        }
        info!("loaded {} accounts from {}", manager.accounts.len(), path.display());
        Ok(manager)
    }

    /// Write all accounts to a TOML file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let encoded = toml::to_string_pretty(&AccountsFile {
            accounts: self.accounts.clone(),
        })?;
        let write_error = |source| ConfigError::AccountsWrite {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }
        std::fs::write(path, encoded).map_err(write_error)
    }

    pub fn register_service(&mut self, service: Arc<dyn PostService>) {
        self.services.insert(service.kind(), service);
    }

    pub fn service_for(&self, account: &Account) -> Option<Arc<dyn PostService>> {
        account
            .service_kind()
            .and_then(|kind| self.services.get(&kind).cloned())
    }

    pub fn default_relays(&self) -> &[String] {
        &self.default_relays
    }

    /// Insert or replace an account, returning its id.
    ///
    /// A blank id is replaced with a fresh one. Nostr accounts without relays
    /// get the default relay list.
    pub fn add_account(&mut self, mut account: Account) -> String {
        if account.id.is_empty() {
            account.id = Uuid::new_v4().to_string();
        }
        if account.relays.is_empty() && account.service_kind() == Some(ServiceKind::Nostr) {
            account.relays = self.default_relays.clone();
        }

        let id = account.id.clone();
        self.remove_account(&id);
        self.accounts.push(account);
        id
    }

    /// Replace an existing account in place. Returns `false` if the id is unknown.
    pub fn update_account(&mut self, account: Account) -> bool {
        match self.accounts.iter_mut().find(|existing| existing.id == account.id) {
            Some(existing) => {
                *existing = account;
                true
            }
            None => false,
        }
    }

    pub fn remove_account(&mut self, id: &str) -> Option<Account> {
        let index = self.accounts.iter().position(|account| account.id == id)?;
        Some(self.accounts.remove(index))
    }

    pub fn account(&self, id: &str) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == id)
    }

    pub fn accounts(&self) -> &[Account] {
        &self.accounts
    }

    /// Enabled accounts for one service.
    pub fn accounts_by_service(&self, kind: ServiceKind) -> Vec<&Account> {
        self.accounts
            .iter()
            .filter(|account| account.enabled && account.service_kind() == Some(kind))
            .collect()
    }

    /// Post `text` to each requested account in order.
    ///
    /// Every id yields exactly one result; an empty id list yields a single
    /// failure.
    pub async fn post_to_accounts(&self, text: &str, ids: &[String]) -> Vec<AccountPostResult> {
        debug!("posting to {} accounts", ids.len());
        if ids.is_empty() {
            return vec![AccountPostResult::new(
                "none",
                PublishOutcome::failed("No accounts provided"),
            )];
        }

        let mut results = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(account) = self.account(id) else {
                warn!("account not found: {}", id);
                results.push(AccountPostResult::new(
                    "unknown",
                    PublishOutcome::failed(format!("Account not found: {id}")),
                ));
                continue;
            };

            if !account.enabled {
                results.push(AccountPostResult::new(
                    account.service.clone(),
                    PublishOutcome::failed(format!("Account disabled: {}", account.display_name)),
                ));
                continue;
            }

            let outcome = match self.service_for(account) {
                Some(service) => {
                    info!("posting to {} for account {}", account.service, account.label());
                    service.post(account, text).await
                }
                None => PublishOutcome::failed(format!(
                    "No service implementation found for {}",
                    account.service
                )),
            };
            results.push(AccountPostResult::new(account.service.clone(), outcome));
        }
        results
    }
}
