use std::ops::DerefMut;

use chrono::{DateTime, Utc};
use sqlx::pool::PoolConnection;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, Transaction};

use crate::domain::{
    Account, AccountId, Cents, Entry, EntryId, LedgerStats, NewAccount, Transfer, TransferId,
};
use crate::error::{LedgerError, Result};

/// Repository bound to a pooled connection. Every statement autocommits.
pub type PoolRepository = Repository<PoolConnection<Sqlite>>;

/// Repository bound to an open transaction, handed to unit-of-work callbacks.
pub type TxRepository = Repository<Transaction<'static, Sqlite>>;

/// Typed access to accounts, entries and transfers.
///
/// The repository runs on whatever connection it wraps: a plain pooled
/// connection, or a transaction owned by [`crate::storage::Store::exec_tx`].
/// None of the operations coordinate across rows on their own.
pub struct Repository<C> {
    conn: C,
}

impl<C> Repository<C>
where
    C: DerefMut<Target = SqliteConnection> + Send,
{
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// Give back the underlying connection (or transaction).
    pub fn into_inner(self) -> C {
        self.conn
    }

    // ========================
    // Account operations
    // ========================

    /// Insert a new account. Schema checks (currency format) surface as
    /// [`LedgerError::ConstraintViolation`].
    pub async fn create_account(&mut self, account: &NewAccount) -> Result<Account> {
        let row = sqlx::query(
            r#"
            INSERT INTO accounts (owner, balance, currency, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(&account.owner)
        .bind(account.balance)
        .bind(&account.currency)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await?;

        row_to_account(&row)
    }

    /// Get an account by ID.
    pub async fn get_account(&mut self, id: AccountId) -> Result<Account> {
        let row = sqlx::query(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(LedgerError::not_found("Account", id)),
        }
    }

    /// List accounts ordered by ID.
    pub async fn list_accounts(&mut self, limit: u32, offset: u32) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r#"
            SELECT id, owner, balance, currency, created_at
            FROM accounts
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter().map(row_to_account).collect()
    }

    /// Overwrite an account's balance.
    pub async fn update_account(&mut self, id: AccountId, balance: Cents) -> Result<Account> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = ?
            WHERE id = ?
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(balance)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(LedgerError::not_found("Account", id)),
        }
    }

    /// Add `delta` to an account's balance and return the updated row.
    ///
    /// The read-modify-write happens in a single statement, so concurrent
    /// callers never lose each other's updates.
    pub async fn add_account_balance(&mut self, id: AccountId, delta: Cents) -> Result<Account> {
        let row = sqlx::query(
            r#"
            UPDATE accounts
            SET balance = balance + ?
            WHERE id = ?
            RETURNING id, owner, balance, currency, created_at
            "#,
        )
        .bind(delta)
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            Some(row) => row_to_account(&row),
            None => Err(LedgerError::not_found("Account", id)),
        }
    }

    /// Delete an account. Deleting a missing ID is not an error.
    /// Accounts still referenced by entries or transfers cannot be deleted.
    pub async fn delete_account(&mut self, id: AccountId) -> Result<()> {
        sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;
        Ok(())
    }

    // ========================
    // Entry operations
    // ========================

    /// Append an entry for an account.
    pub async fn create_entry(&mut self, account_id: AccountId, amount: Cents) -> Result<Entry> {
        let row = sqlx::query(
            r#"
            INSERT INTO entries (account_id, amount, created_at)
            VALUES (?, ?, ?)
            RETURNING id, account_id, amount, created_at
            "#,
        )
        .bind(account_id)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await?;

        row_to_entry(&row)
    }

    pub async fn get_entry(&mut self, id: EntryId) -> Result<Entry> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            Some(row) => row_to_entry(&row),
            None => Err(LedgerError::not_found("Entry", id)),
        }
    }

    /// List the entries of one account, oldest first.
    pub async fn list_entries(
        &mut self,
        account_id: AccountId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Entry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            WHERE account_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(account_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    /// List entries across all accounts, ordered by ID.
    pub async fn list_all_entries(&mut self, limit: u32, offset: u32) -> Result<Vec<Entry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, amount, created_at
            FROM entries
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter().map(row_to_entry).collect()
    }

    // ========================
    // Transfer operations
    // ========================

    /// Record a transfer. Balances and entries are not touched here.
    pub async fn create_transfer(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        amount: Cents,
    ) -> Result<Transfer> {
        let row = sqlx::query(
            r#"
            INSERT INTO transfers (from_account_id, to_account_id, amount, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id, from_account_id, to_account_id, amount, created_at
            "#,
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(amount)
        .bind(Utc::now().to_rfc3339())
        .fetch_one(&mut *self.conn)
        .await?;

        row_to_transfer(&row)
    }

    pub async fn get_transfer(&mut self, id: TransferId) -> Result<Transfer> {
        let row = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        match row {
            Some(row) => row_to_transfer(&row),
            None => Err(LedgerError::not_found("Transfer", id)),
        }
    }

    /// List transfers from one account to another, oldest first.
    pub async fn list_transfers(
        &mut self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Transfer>> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            WHERE from_account_id = ? AND to_account_id = ?
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(from_account_id)
        .bind(to_account_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter().map(row_to_transfer).collect()
    }

    /// List all transfers, ordered by ID.
    pub async fn list_all_transfers(&mut self, limit: u32, offset: u32) -> Result<Vec<Transfer>> {
        let rows = sqlx::query(
            r#"
            SELECT id, from_account_id, to_account_id, amount, created_at
            FROM transfers
            ORDER BY id
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&mut *self.conn)
        .await?;

        rows.iter().map(row_to_transfer).collect()
    }

    // ========================
    // Integrity
    // ========================

    /// Collect counts and sums used to verify conservation of money.
    pub async fn ledger_stats(&mut self) -> Result<LedgerStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM accounts) AS account_count,
                (SELECT COUNT(*) FROM entries) AS entry_count,
                (SELECT COUNT(*) FROM transfers) AS transfer_count,
                (SELECT COALESCE(SUM(balance), 0) FROM accounts) AS total_balance,
                (SELECT COALESCE(SUM(amount), 0) FROM entries) AS entry_sum,
                (
                    SELECT COUNT(*)
                    FROM transfers t
                    WHERE NOT EXISTS (
                            SELECT 1 FROM entries e
                            WHERE e.account_id = t.from_account_id AND e.amount = -t.amount
                        )
                       OR NOT EXISTS (
                            SELECT 1 FROM entries e
                            WHERE e.account_id = t.to_account_id AND e.amount = t.amount
                        )
                ) AS unmatched_transfers
            "#,
        )
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(LedgerStats {
            account_count: row.try_get("account_count")?,
            entry_count: row.try_get("entry_count")?,
            transfer_count: row.try_get("transfer_count")?,
            total_balance: row.try_get("total_balance")?,
            entry_sum: row.try_get("entry_sum")?,
            unmatched_transfers: row.try_get("unmatched_transfers")?,
        })
    }
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| LedgerError::Corrupt(format!("invalid {} timestamp '{}': {}", column, value, e)))
}

fn row_to_account(row: &SqliteRow) -> Result<Account> {
    let created_at: String = row.try_get("created_at")?;

    Ok(Account {
        id: row.try_get("id")?,
        owner: row.try_get("owner")?,
        balance: row.try_get("balance")?,
        currency: row.try_get("currency")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

fn row_to_entry(row: &SqliteRow) -> Result<Entry> {
    let created_at: String = row.try_get("created_at")?;

    Ok(Entry {
        id: row.try_get("id")?,
        account_id: row.try_get("account_id")?,
        amount: row.try_get("amount")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}

fn row_to_transfer(row: &SqliteRow) -> Result<Transfer> {
    let created_at: String = row.try_get("created_at")?;

    Ok(Transfer {
        id: row.try_get("id")?,
        from_account_id: row.try_get("from_account_id")?,
        to_account_id: row.try_get("to_account_id")?,
        amount: row.try_get("amount")?,
        created_at: parse_timestamp(&created_at, "created_at")?,
    })
}
