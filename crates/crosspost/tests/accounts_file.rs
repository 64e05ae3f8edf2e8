//! Accounts file persistence and posting through registered services.

use crosspost::{
    Account, AccountManager, AccountPostResult, ConfigError, DEFAULT_NOSTR_RELAYS, NostrService,
    PublishConfig, TestService,
};
use nostr_client::PublishOutcome;
use std::sync::Arc;
use std::time::Duration;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn default_relays() -> Vec<String> {
    DEFAULT_NOSTR_RELAYS.iter().map(ToString::to_string).collect()
}

#[test]
fn missing_file_loads_no_accounts() -> TestResult {
    let dir = tempfile::tempdir()?;
    let manager = AccountManager::load(&dir.path().join("absent.toml"), default_relays())?;
    assert!(manager.accounts().is_empty());
    Ok(())
}

#[test]
fn nostr_accounts_without_relays_get_defaults() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("accounts.toml");
    std::fs::write(
        &path,
        r#"
[[accounts]]
id = "n1"
service = "nostr"
display_name = "Alice"
private_key = "0101010101010101010101010101010101010101010101010101010101010101"

[[accounts]]
id = "t1"
service = "test"
username = "tester"
enabled = false

[[accounts]]
id = "blank"
service = ""
"#,
    )?;

    let manager = AccountManager::load(&path, default_relays())?;
    assert_eq!(manager.accounts().len(), 2);

    let nostr = manager.account("n1").ok_or("missing n1")?;
    assert_eq!(nostr.relays, DEFAULT_NOSTR_RELAYS);
    assert!(nostr.enabled);

    let test = manager.account("t1").ok_or("missing t1")?;
    assert!(!test.enabled);
    assert!(test.relays.is_empty());
    Ok(())
}

#[test]
fn saved_accounts_load_back() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("accounts.toml");

    let mut manager = AccountManager::new(default_relays());
    let id = manager.add_account(Account {
        service: "nostr".to_string(),
        display_name: "Alice".to_string(),
        private_key: "01".repeat(32),
        relays: vec!["wss://relay.example".to_string()],
        enabled: true,
        ..Account::default()
    });
    manager.save(&path)?;

    let reloaded = AccountManager::load(&path, default_relays())?;
    assert_eq!(reloaded.accounts(), manager.accounts());
    assert_eq!(
        reloaded.account(&id).map(|account| account.relays.clone()),
        Some(vec!["wss://relay.example".to_string()])
    );
    Ok(())
}

#[test]
fn malformed_file_is_a_parse_error() -> TestResult {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("accounts.toml");
    std::fs::write(&path, "[[accounts]]\nservice = 7\n")?;

    let result = AccountManager::load(&path, default_relays());
    assert!(matches!(result, Err(ConfigError::AccountsParse(_))));
    Ok(())
}

#[tokio::test]
async fn posting_mixes_services_and_reports_each() -> TestResult {
    let closed = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        format!("ws://{}", listener.local_addr()?)
    };

    let config = PublishConfig {
        publish_timeout: Duration::from_secs(5),
        ..PublishConfig::default()
    };
    let mut manager = AccountManager::new(default_relays());
    manager.register_service(Arc::new(NostrService::new(
        config.coordinator_config(),
        config.publish_timeout,
    )));
    manager.register_service(Arc::new(TestService::new(Duration::from_millis(10))));

    manager.add_account(Account {
        id: "nostr".to_string(),
        service: "nostr".to_string(),
        private_key: "01".repeat(32),
        relays: vec![closed],
        enabled: true,
        ..Account::default()
    });
    manager.add_account(Account {
        id: "test".to_string(),
        service: "test".to_string(),
        username: "tester".to_string(),
        enabled: true,
        ..Account::default()
    });

    let ids = vec!["nostr".to_string(), "test".to_string()];
    let results = manager.post_to_accounts("hello", &ids).await;

    assert_eq!(
        results,
        [
            AccountPostResult {
                label: "nostr".to_string(),
                outcome: PublishOutcome::failed(
                    "Failed to connect to any relay (connection errors)"
                ),
            },
            AccountPostResult {
                label: "test".to_string(),
                outcome: PublishOutcome::succeeded(),
            },
        ]
    );
    Ok(())
}
