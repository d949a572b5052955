use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;

pub const DEFAULT_DATABASE_URL: &str = "sqlite:ledger.db";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection settings for the backing SQLite database.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// How long a statement waits on a locked database before failing
    /// with a transaction conflict.
    pub busy_timeout: Duration,
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: DEFAULT_DATABASE_URL.to_string(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
            create_if_missing: false,
        }
    }
}

impl StoreConfig {
    /// Config for a database file path, e.g. `ledger.db`.
    pub fn for_path(path: &str) -> Self {
        Self {
            database_url: format!("sqlite:{}", path),
            ..Self::default()
        }
    }

    pub fn create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max;
        self
    }

    pub fn connect_options(&self) -> Result<SqliteConnectOptions> {
        let options = SqliteConnectOptions::from_str(&self.database_url)
            .with_context(|| format!("Invalid database URL: {}", self.database_url))?
            .create_if_missing(self.create_if_missing)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(self.busy_timeout);
        Ok(options)
    }

    /// Open a connection pool with these settings.
    pub async fn open_pool(&self) -> Result<SqlitePool> {
        SqlitePoolOptions::new()
            .max_connections(self.max_connections)
            .connect_with(self.connect_options()?)
            .await
            .with_context(|| format!("Failed to connect to database {}", self.database_url))
    }
}
