use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// DRep reputation scoring and sync-health service.
#[derive(Parser, Debug)]
#[command(name = "drep", version, about = "DRep scoring and sync freshness service")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server and the background freshness guard (default)
    Serve,

    /// Run one freshness guard pass and print the report as JSON
    Guard,

    /// Print the current sync health report as JSON
    Health,

    /// Compose a score from pillar percentages
    Score {
        #[arg(long)]
        participation: Option<f64>,

        #[arg(long)]
        rationale: Option<f64>,

        #[arg(long)]
        reliability: Option<f64>,

        #[arg(long)]
        profile: Option<f64>,
    },

    /// Print the epoch containing a unix timestamp
    Epoch {
        /// Unix seconds (defaults to now)
        #[arg(long)]
        ts: Option<i64>,
    },

    /// Import completed runs from a JSON array file into the ledger
    Backfill {
        file: PathBuf,

        /// Rows per insert page
        #[arg(long, default_value_t = drep_ledger::batch::DEFAULT_PAGE_SIZE)]
        page_size: usize,
    },

    /// Send a test alert through every configured alert channel
    TestAlerts,
}
