use anyhow::{Context, Result as AnyResult};
use futures::future::BoxFuture;
use sqlx::SqlitePool;
use tokio::time::Instant;

use crate::error::{LedgerError, Result};

use super::{MIGRATION_001_INITIAL, PoolRepository, Repository, StoreConfig, TxRepository};

/// Every unit of work takes the database write lock when it begins.
const BEGIN_WRITE: &str = "BEGIN IMMEDIATE";

/// Owns the connection pool and runs units of work against it.
///
/// Build one per process and hand it to whoever needs it.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open a pool using the given settings.
    pub async fn connect(config: &StoreConfig) -> AnyResult<Self> {
        let pool = config.open_pool().await?;
        Ok(Self::new(pool))
    }

    /// Create the schema if it doesn't exist yet.
    pub async fn migrate(&self) -> AnyResult<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(config: &StoreConfig) -> AnyResult<Self> {
        let store = Self::connect(config).await?;
        store.migrate().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// A repository on a pooled connection, outside any transaction.
    pub async fn repository(&self) -> Result<PoolRepository> {
        let conn = self.pool.acquire().await?;
        Ok(Repository::new(conn))
    }

    /// Run `work` inside a single transaction.
    ///
    /// Commits when `work` succeeds and rolls back when it fails. A failed
    /// rollback is reported together with the original error. Nothing is
    /// retried here.
    ///
    /// Dropping the returned future before it completes drops the open
    /// transaction, which rolls it back.
    pub async fn exec_tx<T, F>(&self, work: F) -> Result<T>
    where
        T: Send,
        F: for<'q> FnOnce(&'q mut TxRepository) -> BoxFuture<'q, Result<T>> + Send,
    {
        let tx = self.pool.begin_with(BEGIN_WRITE).await?;
        tracing::debug!("transaction started");

        let mut repo = Repository::new(tx);
        let outcome = work(&mut repo).await;
        let tx = repo.into_inner();

        match outcome {
            Ok(value) => {
                tx.commit().await?;
                tracing::debug!("transaction committed");
                Ok(value)
            }
            Err(err) => match tx.rollback().await {
                Ok(()) => {
                    tracing::warn!(error = %err, "transaction rolled back");
                    Err(err)
                }
                Err(rollback) => {
                    tracing::error!(error = %err, rollback_error = %rollback, "rollback failed");
                    Err(LedgerError::Rollback {
                        source: Box::new(err),
                        rollback,
                    })
                }
            },
        }
    }

    /// Like [`Store::exec_tx`], but gives up at `deadline`.
    ///
    /// If the deadline passes first (for instance while waiting for a lock),
    /// the transaction is abandoned and rolled back, and the call returns
    /// [`LedgerError::Cancelled`].
    pub async fn exec_tx_with_deadline<T, F>(&self, deadline: Instant, work: F) -> Result<T>
    where
        T: Send,
        F: for<'q> FnOnce(&'q mut TxRepository) -> BoxFuture<'q, Result<T>> + Send,
    {
        match tokio::time::timeout_at(deadline, self.exec_tx(work)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("transaction deadline exceeded");
                Err(LedgerError::Cancelled)
            }
        }
    }
}
