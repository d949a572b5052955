// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::time::Duration;

use anyhow::Result;
use ledgerstore::application::LedgerService;
use ledgerstore::domain::{Account, Cents, NewAccount};
use ledgerstore::storage::{Store, StoreConfig};
use rand::Rng;
use rand::seq::SliceRandom;
use tempfile::TempDir;

const CURRENCIES: [&str; 3] = ["EUR", "USD", "CAD"];

/// Helper to create a migrated store on a temporary database
pub async fn test_store() -> Result<(Store, TempDir)> {
    test_store_with_config(|config| config).await
}

async fn test_store_with_config(
    configure: impl FnOnce(StoreConfig) -> StoreConfig,
) -> Result<(Store, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let config = StoreConfig::for_path(db_path.to_str().unwrap()).create_if_missing(true);
    let store = Store::init(&configure(config)).await?;
    Ok((store, temp_dir))
}

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let (store, temp_dir) = test_store().await?;
    Ok((LedgerService::new(store), temp_dir))
}

/// Like `test_service`, but lock waits give up after `busy_timeout`
pub async fn test_service_with_busy_timeout(
    busy_timeout: Duration,
) -> Result<(LedgerService, TempDir)> {
    let (store, temp_dir) =
        test_store_with_config(|config| config.with_busy_timeout(busy_timeout)).await?;
    Ok((LedgerService::new(store), temp_dir))
}

pub fn random_owner() -> String {
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| rng.gen_range(b'a'..=b'z') as char)
        .collect()
}

pub fn random_money() -> Cents {
    rand::thread_rng().gen_range(0..=1000)
}

pub fn random_currency() -> String {
    CURRENCIES
        .choose(&mut rand::thread_rng())
        .unwrap()
        .to_string()
}

pub fn random_new_account() -> NewAccount {
    NewAccount::new(random_owner(), random_money(), random_currency())
}

/// Create an account with random owner, balance and currency
pub async fn create_random_account(service: &LedgerService) -> Result<Account> {
    let params = random_new_account();
    let account = service.create_account(params.clone()).await?;

    assert_eq!(account.owner, params.owner);
    assert_eq!(account.balance, params.balance);
    assert_eq!(account.currency, params.currency);
    assert!(account.id > 0);

    Ok(account)
}

/// Create an account with a fixed opening balance
pub async fn create_account_with_balance(
    service: &LedgerService,
    balance: Cents,
) -> Result<Account> {
    Ok(service
        .create_account(NewAccount::new(random_owner(), balance, "EUR"))
        .await?)
}
