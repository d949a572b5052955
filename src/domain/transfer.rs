use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents};

pub type TransferId = i64;

/// A transfer records a movement of money from one account to another.
/// Transfers are immutable once written; there is no update or delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub id: TransferId,
    /// Source account (balance decreases)
    pub from_account_id: AccountId,
    /// Destination account (balance increases)
    pub to_account_id: AccountId,
    /// Amount moved, always positive
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

/// Arguments of a money transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferParams {
    pub from_account_id: AccountId,
    pub to_account_id: AccountId,
    pub amount: Cents,
}

impl TransferParams {
    pub fn new(from_account_id: AccountId, to_account_id: AccountId, amount: Cents) -> Self {
        Self {
            from_account_id,
            to_account_id,
            amount,
        }
    }

    /// The two account ids in the order their rows must be locked.
    pub fn lock_order(&self) -> (AccountId, AccountId) {
        if self.from_account_id < self.to_account_id {
            (self.from_account_id, self.to_account_id)
        } else {
            (self.to_account_id, self.from_account_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_order_is_ascending() {
        assert_eq!(TransferParams::new(1, 2, 10).lock_order(), (1, 2));
        assert_eq!(TransferParams::new(2, 1, 10).lock_order(), (1, 2));
        assert_eq!(TransferParams::new(7, 7, 10).lock_order(), (7, 7));
    }
}
