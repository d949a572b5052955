use serde::Serialize;
use tokio::time::Instant;

use crate::domain::{
    build_integrity_report, transfer_deltas, Account, AccountId, Cents, Entry, IntegrityReport,
    NewAccount, Transfer, TransferId, TransferParams,
};
use crate::error::{LedgerError, Result};
use crate::storage::{Store, TxRepository};

/// Application service providing high-level operations for the ledger.
/// Transfers go through here; it is the only writer of entries and transfers.
#[derive(Clone)]
pub struct LedgerService {
    store: Store,
}

/// Everything a committed transfer produced.
///
/// `from_account` and `to_account` follow the caller's from/to roles,
/// not the order in which the rows were updated.
#[derive(Debug, Clone, Serialize)]
pub struct TransferResult {
    pub transfer: Transfer,
    pub from_entry: Entry,
    pub to_entry: Entry,
    pub from_account: Account,
    pub to_account: Account,
}

impl LedgerService {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ========================
    // Transfer operations
    // ========================

    /// Move `amount` from one account to another in a single unit of work.
    ///
    /// Creates the transfer record and its two entries, then applies both
    /// balance deltas. Any failure undoes all of it. The caller may replay the
    /// call on [`LedgerError::is_retryable`] errors; there is no deduplication.
    #[tracing::instrument(skip(self, params), fields(from = params.from_account_id, to = params.to_account_id, amount = params.amount))]
    pub async fn transfer_tx(&self, params: TransferParams) -> Result<TransferResult> {
        validate(&params)?;
        let result = self
            .store
            .exec_tx(move |repo| Box::pin(transfer_in_tx(repo, params)))
            .await?;
        log_committed(&result);
        Ok(result)
    }

    /// [`LedgerService::transfer_tx`] bounded by a deadline. On expiry nothing
    /// is written and [`LedgerError::Cancelled`] is returned.
    #[tracing::instrument(skip(self, params, deadline), fields(from = params.from_account_id, to = params.to_account_id, amount = params.amount))]
    pub async fn transfer_tx_with_deadline(
        &self,
        params: TransferParams,
        deadline: Instant,
    ) -> Result<TransferResult> {
        validate(&params)?;
        let result = self
            .store
            .exec_tx_with_deadline(deadline, move |repo| {
                Box::pin(transfer_in_tx(repo, params))
            })
            .await?;
        log_committed(&result);
        Ok(result)
    }

    // ========================
    // Account operations
    // ========================

    pub async fn create_account(&self, account: NewAccount) -> Result<Account> {
        let account = self.store.repository().await?.create_account(&account).await?;
        tracing::info!(id = account.id, owner = %account.owner, "account created");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> Result<Account> {
        self.store.repository().await?.get_account(id).await
    }

    pub async fn list_accounts(&self, limit: u32, offset: u32) -> Result<Vec<Account>> {
        self.store
            .repository()
            .await?
            .list_accounts(limit, offset)
            .await
    }

    /// Overwrite an account's balance outside of a transfer.
    pub async fn update_account(&self, id: AccountId, balance: Cents) -> Result<Account> {
        let account = self
            .store
            .repository()
            .await?
            .update_account(id, balance)
            .await?;
        tracing::info!(id, balance, "account balance set");
        Ok(account)
    }

    pub async fn delete_account(&self, id: AccountId) -> Result<()> {
        self.store.repository().await?.delete_account(id).await?;
        tracing::info!(id, "account deleted");
        Ok(())
    }

    // ========================
    // Ledger queries
    // ========================

    pub async fn list_entries(
        &self,
        account_id: AccountId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Entry>> {
        self.store
            .repository()
            .await?
            .list_entries(account_id, limit, offset)
            .await
    }

    pub async fn get_transfer(&self, id: TransferId) -> Result<Transfer> {
        self.store.repository().await?.get_transfer(id).await
    }

    pub async fn list_transfers(
        &self,
        from_account_id: AccountId,
        to_account_id: AccountId,
        limit: u32,
        offset: u32,
    ) -> Result<Vec<Transfer>> {
        self.store
            .repository()
            .await?
            .list_transfers(from_account_id, to_account_id, limit, offset)
            .await
    }

    /// Verify that entries and transfers still balance.
    pub async fn check_integrity(&self) -> Result<IntegrityReport> {
        let stats = self.store.repository().await?.ledger_stats().await?;
        Ok(build_integrity_report(stats))
    }
}

fn validate(params: &TransferParams) -> Result<()> {
    if params.amount <= 0 {
        return Err(LedgerError::InvalidArgument(format!(
            "transfer amount must be positive, got {}",
            params.amount
        )));
    }
    Ok(())
}

fn log_committed(result: &TransferResult) {
    tracing::info!(
        transfer_id = result.transfer.id,
        from_balance = result.from_account.balance,
        to_balance = result.to_account.balance,
        "transfer committed"
    );
}

/// The body of a transfer, run on the transaction's repository.
async fn transfer_in_tx(repo: &mut TxRepository, params: TransferParams) -> Result<TransferResult> {
    let TransferParams {
        from_account_id,
        to_account_id,
        amount,
    } = params;
    let (debit, credit) = transfer_deltas(amount).ok_or_else(|| {
        LedgerError::InvalidArgument(format!("transfer amount must be positive, got {}", amount))
    })?;

    let transfer = repo
        .create_transfer(from_account_id, to_account_id, amount)
        .await?;
    let from_entry = repo.create_entry(from_account_id, debit).await?;
    let to_entry = repo.create_entry(to_account_id, credit).await?;

    // Rows are always updated lowest id first, whatever the direction.
    let (first_id, second_id) = params.lock_order();
    let debit_first = first_id == from_account_id && second_id == to_account_id;
    let (from_account, to_account) = if debit_first {
        add_money(repo, first_id, debit, second_id, credit).await?
    } else {
        let (to_account, from_account) =
            add_money(repo, first_id, credit, second_id, debit).await?;
        (from_account, to_account)
    };

    Ok(TransferResult {
        transfer,
        from_entry,
        to_entry,
        from_account,
        to_account,
    })
}

/// Apply two balance deltas in the order given and return both updated rows.
async fn add_money(
    repo: &mut TxRepository,
    account1_id: AccountId,
    amount1: Cents,
    account2_id: AccountId,
    amount2: Cents,
) -> Result<(Account, Account)> {
    let account1 = repo.add_account_balance(account1_id, amount1).await?;
    let account2 = repo.add_account_balance(account2_id, amount2).await?;
    Ok((account1, account2))
}
