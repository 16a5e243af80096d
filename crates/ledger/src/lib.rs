//! Sync Run Ledger: durable records of refresh-job executions.
//!
//! This crate provides:
//! - [`LedgerStore`] trait over the `sync_log` table, with PostgreSQL and
//!   in-memory implementations
//! - [`SyncLedger`], the non-fatal facade refresh jobs call (`start`,
//!   `finalize`, `track`)
//! - [`batch::write_paged`] for page-at-a-time bulk writes that survive a
//!   failing page

pub mod batch;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod pg;
pub mod store;
pub mod types;

pub use batch::{write_paged, BatchReport, PageError};
pub use error::LedgerError;
pub use ledger::{truncate_error, RunHandle, SyncLedger, MAX_ERROR_LEN};
pub use memory::MemoryLedgerStore;
pub use pg::PgLedgerStore;
pub use store::LedgerStore;
pub use types::{CompletedRun, HealthSnapshot, RunCompletion, SyncRun, GHOST_RUN_MESSAGE};
