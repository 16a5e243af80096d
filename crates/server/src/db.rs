use std::sync::Arc;

use drep_ledger::{LedgerStore, MemoryLedgerStore, PgLedgerStore};
use tracing::{info, warn};

/// Open the ledger store. Falls back to an in-memory store when PostgreSQL
/// is not configured or unreachable, so health and scoring still serve.
pub async fn open_ledger_store(config: &drep_core::config::PostgresConfig) -> Arc<dyn LedgerStore> {
    if !config.is_configured() {
        warn!("PostgreSQL not configured; sync ledger is in-memory and will not persist");
        return Arc::new(MemoryLedgerStore::new());
    }

    match PgLedgerStore::connect(&config.connection_string(), config.max_connections).await {
        Ok(store) => {
            info!("PostgreSQL connected: {}", config.host);
            Arc::new(store)
        }
        Err(e) => {
            warn!("Failed to connect to PostgreSQL: {}; sync ledger is in-memory", e);
            Arc::new(MemoryLedgerStore::new())
        }
    }
}
