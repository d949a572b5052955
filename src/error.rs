use std::borrow::Cow;

use sqlx::error::ErrorKind;
use thiserror::Error;

/// SQLITE_BUSY and SQLITE_LOCKED primary result codes.
const SQLITE_BUSY: i32 = 5;
const SQLITE_LOCKED: i32 = 6;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("Transaction conflict: {0}")]
    TransactionConflict(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unit of work cancelled before completion")]
    Cancelled,

    #[error("{source} (rollback also failed: {rollback})")]
    Rollback {
        source: Box<LedgerError>,
        rollback: sqlx::Error,
    },

    #[error("Corrupt row: {0}")]
    Corrupt(String),

    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

pub type Result<T, E = LedgerError> = std::result::Result<T, E>;

impl LedgerError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for failures the caller may resolve by replaying the whole operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransactionConflict(_) => true,
            Self::Rollback { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

impl From<sqlx::Error> for LedgerError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound {
                entity: "row",
                id: "?".to_string(),
            },
            sqlx::Error::Database(db) => {
                let message = db.message().to_string();
                match db.kind() {
                    ErrorKind::UniqueViolation
                    | ErrorKind::ForeignKeyViolation
                    | ErrorKind::NotNullViolation
                    | ErrorKind::CheckViolation => Self::ConstraintViolation(message),
                    _ if is_lock_conflict(db.code()) => Self::TransactionConflict(message),
                    _ => Self::Database(sqlx::Error::Database(db)),
                }
            }
            sqlx::Error::ColumnDecode { index, source } => {
                Self::Corrupt(format!("column {}: {}", index, source))
            }
            other => Self::Database(other),
        }
    }
}

/// SQLite reports extended result codes; the primary code is the low byte.
fn is_lock_conflict(code: Option<Cow<'_, str>>) -> bool {
    code.and_then(|c| c.parse::<i32>().ok())
        .map(|c| matches!(c & 0xff, SQLITE_BUSY | SQLITE_LOCKED))
        .unwrap_or(false)
}
