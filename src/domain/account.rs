use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Cents;

pub type AccountId = i64;

/// An account holds a balance in a single currency.
///
/// The balance is only ever changed inside a unit of work, either by a transfer
/// (which also appends the matching entries) or by an explicit balance update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub owner: String,
    /// Balance in the smallest currency unit. Overdraft is not prevented here.
    pub balance: Cents,
    /// Three-letter currency code (e.g. "EUR").
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

/// Input for creating an account. The id and timestamp are assigned on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAccount {
    pub owner: String,
    pub balance: Cents,
    pub currency: String,
}

impl NewAccount {
    pub fn new(owner: impl Into<String>, balance: Cents, currency: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            balance,
            currency: currency.into(),
        }
    }
}
