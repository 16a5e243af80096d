mod api;
mod cli;
mod db;
mod guard_runner;
mod rate_limit;
mod router;
mod state;

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use drep_core::{compose_detailed, PillarMetrics};
use drep_ledger::CompletedRun;
use drep_notify::Dispatcher;

use crate::cli::{CliArgs, Command};
use crate::state::AppState;

fn load_config() -> anyhow::Result<drep_core::Config> {
    drep_core::config::load_dotenv();
    let config = drep_core::Config::from_env();
    config.validate()?;
    Ok(config)
}

async fn build_state(config: drep_core::Config) -> Arc<AppState> {
    let store = db::open_ledger_store(&config.postgres).await;
    Arc::new(AppState::build(config, store))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn serve(config: drep_core::Config) -> anyhow::Result<()> {
    config.log_summary();
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = build_state(config).await;

    if state.config.guard.enabled {
        tokio::spawn(guard_runner::run_guard_loop(Arc::clone(&state)));
    } else {
        warn!("GUARD_ENABLED=false; freshness guard will only run on demand");
    }

    let app = router::build_router(state);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn backfill(config: drep_core::Config, file: &Path, page_size: usize) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read {}", file.display()))?;
    let runs: Vec<CompletedRun> = serde_json::from_str(&raw)
        .with_context(|| format!("{} is not a JSON array of completed runs", file.display()))?;
    info!("Backfilling {} runs from {}", runs.len(), file.display());

    let state = build_state(config).await;
    let report = state.ledger.backfill(&runs, page_size).await;
    print_json(&report)?;

    if !report.is_complete() {
        anyhow::bail!(
            "{} of {} pages failed ({} rows not written)",
            report.page_errors.len(),
            report.pages,
            report.failed
        );
    }
    Ok(())
}

async fn test_alerts(config: drep_core::Config) -> anyhow::Result<()> {
    let dispatcher = Dispatcher::from_config(&config.alerts);
    if dispatcher.is_empty() {
        anyhow::bail!("no alert channels configured (set ALERT_WEBHOOK_URL or TELEGRAM_BOT_TOKEN + TELEGRAM_CHAT_ID)");
    }
    info!("Sending test alert to {:?}", dispatcher.channel_names());

    let results = dispatcher.test_all().await;
    print_json(&results)?;

    let failed = results.iter().filter(|r| !r.success).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} alert channels failed", results.len());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    let args = CliArgs::parse();
    let config = load_config()?;

    match args.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await?,
        Command::Guard => {
            let state = build_state(config).await;
            print_json(&state.guard.run_once().await)?;
        }
        Command::Health => {
            let state = build_state(config).await;
            let report = state
                .classifier
                .check(state.ledger.store().as_ref(), state.store_timeout())
                .await;
            print_json(&report)?;
        }
        Command::Score {
            participation,
            rationale,
            reliability,
            profile,
        } => {
            let pillars = PillarMetrics {
                participation,
                rationale_rate: rationale,
                reliability,
                profile_completeness: profile,
            };
            print_json(&compose_detailed(&pillars, None))?;
        }
        Command::Epoch { ts } => {
            let clock = config.epoch.clock();
            let ts = ts.unwrap_or_else(|| chrono::Utc::now().timestamp());
            let epoch = clock.epoch_of(ts);
            print_json(&serde_json::json!({
                "epoch": epoch,
                "ts": ts,
                "epochStart": clock.epoch_start(epoch),
            }))?;
        }
        Command::Backfill { file, page_size } => backfill(config, &file, page_size).await?,
        Command::TestAlerts => test_alerts(config).await?,
    }

    Ok(())
}
