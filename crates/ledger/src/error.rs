//! Ledger error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("ledger store timed out after {0}ms")]
    Timeout(u64),

    #[error("sync run not found: {0}")]
    NotFound(i64),

    #[error("ledger store unavailable: {0}")]
    Unavailable(String),
}
