pub mod application;
pub mod cli;
pub mod domain;
pub mod error;
pub mod storage;
pub mod telemetry;

pub use domain::*;
pub use error::{LedgerError, Result};
pub use storage::{Store, StoreConfig};
