use serde::Serialize;

use super::Cents;

/// Aggregate figures read from the store in one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LedgerStats {
    pub account_count: i64,
    pub entry_count: i64,
    pub transfer_count: i64,
    /// Sum of all account balances.
    pub total_balance: Cents,
    /// Signed sum of all entry amounts.
    pub entry_sum: Cents,
    /// Transfers whose source account has no entry of `-amount`
    /// or whose destination has no entry of `+amount`.
    pub unmatched_transfers: i64,
}

/// Result of checking the ledger's bookkeeping rules.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub stats: LedgerStats,
    pub issues: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Every transfer writes exactly two entries that cancel out, so a ledger fed
/// only by transfers has `2 * transfers` entries summing to zero.
pub fn build_integrity_report(stats: LedgerStats) -> IntegrityReport {
    let mut issues = Vec::new();

    if stats.entry_sum != 0 {
        issues.push(format!("Entries sum to {} instead of 0", stats.entry_sum));
    }

    if stats.entry_count != stats.transfer_count * 2 {
        issues.push(format!(
            "Found {} entries for {} transfers (expected {})",
            stats.entry_count,
            stats.transfer_count,
            stats.transfer_count * 2
        ));
    }

    if stats.unmatched_transfers > 0 {
        issues.push(format!(
            "{} transfer(s) without matching entries",
            stats.unmatched_transfers
        ));
    }

    IntegrityReport { stats, issues }
}
