use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AccountId, Cents};

pub type EntryId = i64;

/// A single append-only line in an account's ledger.
/// Negative amounts are debits, positive amounts are credits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,
    pub account_id: AccountId,
    pub amount: Cents,
    pub created_at: DateTime<Utc>,
}

impl Entry {
    pub fn is_debit(&self) -> bool {
        self.amount < 0
    }

    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}

/// Sum the signed amounts of a set of entries.
pub fn entries_total(entries: &[Entry]) -> Cents {
    entries.iter().map(|e| e.amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(amount: Cents) -> Entry {
        Entry {
            id: 1,
            account_id: 1,
            amount,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_debit_credit() {
        assert!(entry(-10).is_debit());
        assert!(!entry(-10).is_credit());
        assert!(entry(10).is_credit());
        assert!(!entry(0).is_debit() && !entry(0).is_credit());
    }

    #[test]
    fn test_entries_total() {
        assert_eq!(entries_total(&[]), 0);
        assert_eq!(entries_total(&[entry(-25), entry(25)]), 0);
        assert_eq!(entries_total(&[entry(-25), entry(10), entry(40)]), 25);
    }
}
