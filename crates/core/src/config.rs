use std::env;

use serde::{Deserialize, Serialize};

use crate::epoch::EpochClock;
use crate::error::DrepError;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_parse<T: std::str::FromStr>(profile: &str, key: &str, default: T) -> T {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_bool(profile: &str, key: &str, default: bool) -> bool {
    match profiled_env_opt(profile, key) {
        Some(v) => matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        None => default,
    }
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub server: ServerConfig,
    pub postgres: PostgresConfig,
    pub epoch: EpochConfig,
    pub guard: GuardConfig,
    pub refresh: RefreshConfig,
    pub alerts: AlertConfig,
    pub telemetry: TelemetryConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `DREP_PROFILE`. When set (e.g. `PROD`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("DREP_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            server: ServerConfig::from_env_profiled(p),
            postgres: PostgresConfig::from_env_profiled(p),
            epoch: EpochConfig::from_env_profiled(p),
            guard: GuardConfig::from_env_profiled(p),
            refresh: RefreshConfig::from_env_profiled(p),
            alerts: AlertConfig::from_env_profiled(p),
            telemetry: TelemetryConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Reject values that would make derived numbers meaningless.
    pub fn validate(&self) -> Result<(), DrepError> {
        if self.epoch.duration_secs <= 0 {
            return Err(DrepError::Config(format!(
                "EPOCH_DURATION_SECS must be positive, got {}",
                self.epoch.duration_secs
            )));
        }
        if self.guard.interval_mins == 0 {
            return Err(DrepError::Config("GUARD_INTERVAL_MINS must be at least 1".into()));
        }
        if self.guard.refresh_timeout_secs == 0 {
            return Err(DrepError::Config(
                "GUARD_REFRESH_TIMEOUT_SECS must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  server:      {}:{}", self.server.host, self.server.port);
        tracing::info!(
            "  postgres:    host={}, db={}, configured={}",
            self.postgres.host,
            self.postgres.database,
            self.postgres.is_configured()
        );
        tracing::info!(
            "  epoch:       genesis={}, duration={}s, base={}",
            self.epoch.genesis_timestamp,
            self.epoch.duration_secs,
            self.epoch.base_epoch
        );
        tracing::info!(
            "  guard:       enabled={}, every {}m, ghost>{}m, backoff {}m",
            self.guard.enabled,
            self.guard.interval_mins,
            self.guard.ghost_threshold_mins,
            self.guard.recent_failure_mins
        );
        tracing::info!(
            "  refresh:     base_url={}",
            self.refresh.base_url.as_deref().unwrap_or("(none)")
        );
        tracing::info!(
            "  alerts:      webhook={}, telegram={}",
            self.alerts.webhook_url.is_some(),
            self.alerts.telegram_configured()
        );
        tracing::info!("  telemetry:   configured={}", self.telemetry.is_configured());
    }

    /// Return a redacted view safe for API responses (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "server": { "host": self.server.host, "port": self.server.port },
            "postgres": {
                "host": self.postgres.host,
                "port": self.postgres.port,
                "database": self.postgres.database,
                "configured": self.postgres.is_configured(),
            },
            "epoch": {
                "genesis_timestamp": self.epoch.genesis_timestamp,
                "duration_secs": self.epoch.duration_secs,
                "base_epoch": self.epoch.base_epoch,
            },
            "guard": {
                "enabled": self.guard.enabled,
                "interval_mins": self.guard.interval_mins,
                "ghost_threshold_mins": self.guard.ghost_threshold_mins,
                "recent_failure_mins": self.guard.recent_failure_mins,
                "refresh_timeout_secs": self.guard.refresh_timeout_secs,
            },
            "refresh": {
                "base_url": self.refresh.base_url,
                "authenticated": self.refresh.secret.is_some(),
            },
            "alerts": {
                "webhook": self.alerts.webhook_url.is_some(),
                "telegram": self.alerts.telegram_configured(),
            },
            "telemetry": { "configured": self.telemetry.is_configured() },
        })
    }
}

// ── Server ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: String,
    /// Manual guard runs allowed per client per window.
    pub guard_run_limit: u32,
    pub guard_run_window_secs: u64,
}

impl ServerConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_or(p, "HOST", "0.0.0.0"),
            port: profiled_env_parse(p, "PORT", 3001),
            cors_origin: profiled_env_or(p, "CORS_ORIGIN", "*"),
            guard_run_limit: profiled_env_parse(p, "GUARD_RUN_LIMIT", 3),
            guard_run_window_secs: profiled_env_parse(p, "GUARD_RUN_WINDOW_SECS", 300),
        }
    }
}

// ── PostgreSQL ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostgresConfig {
    /// Full connection URL; takes precedence over the discrete fields.
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub database: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl PostgresConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_opt(p, "DATABASE_URL"),
            host: profiled_env_or(p, "PG_HOST", "localhost"),
            port: profiled_env_parse(p, "PG_PORT", 5432),
            database: profiled_env_or(p, "PG_DATABASE", "drep"),
            username: profiled_env_opt(p, "PG_USERNAME"),
            password: profiled_env_opt(p, "PG_PASSWORD"),
            ssl_mode: profiled_env_or(p, "PG_SSL_MODE", "prefer"),
            max_connections: profiled_env_parse(p, "PG_MAX_CONNECTIONS", 10),
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        let user = self.username.as_deref().unwrap_or("postgres");
        let pass = self.password.as_deref().unwrap_or("");
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            user, pass, self.host, self.port, self.database, self.ssl_mode
        )
    }

    pub fn is_configured(&self) -> bool {
        self.url.is_some() || self.username.is_some()
    }
}

// ── Epoch ─────────────────────────────────────────────────────

/// Deployment-time epoch boundary constants (Cardano mainnet Shelley by default).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochConfig {
    pub genesis_timestamp: i64,
    pub duration_secs: i64,
    pub base_epoch: i64,
}

impl EpochConfig {
    fn from_env_profiled(p: &str) -> Self {
        let mainnet = EpochClock::mainnet();
        Self {
            genesis_timestamp: profiled_env_parse(
                p,
                "EPOCH_GENESIS_TIMESTAMP",
                mainnet.genesis_timestamp,
            ),
            duration_secs: profiled_env_parse(p, "EPOCH_DURATION_SECS", mainnet.epoch_duration_secs),
            base_epoch: profiled_env_parse(p, "EPOCH_BASE", mainnet.base_epoch),
        }
    }

    pub fn clock(&self) -> EpochClock {
        EpochClock::new(self.genesis_timestamp, self.duration_secs, self.base_epoch)
    }
}

// ── Freshness guard ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    pub enabled: bool,
    pub interval_mins: u64,
    pub ghost_threshold_mins: i64,
    pub recent_failure_mins: i64,
    pub refresh_timeout_secs: u64,
    pub store_timeout_secs: u64,
}

impl GuardConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            enabled: profiled_env_bool(p, "GUARD_ENABLED", true),
            interval_mins: profiled_env_parse(p, "GUARD_INTERVAL_MINS", 30),
            ghost_threshold_mins: profiled_env_parse(p, "GUARD_GHOST_THRESHOLD_MINS", 30),
            recent_failure_mins: profiled_env_parse(p, "GUARD_RECENT_FAILURE_MINS", 15),
            refresh_timeout_secs: profiled_env_parse(p, "GUARD_REFRESH_TIMEOUT_SECS", 300),
            store_timeout_secs: profiled_env_parse(p, "GUARD_STORE_TIMEOUT_SECS", 15),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_mins: 30,
            ghost_threshold_mins: 30,
            recent_failure_mins: 15,
            refresh_timeout_secs: 300,
            store_timeout_secs: 15,
        }
    }
}

// ── Refresh entry points ──────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Base URL the per-type refresh paths are appended to.
    pub base_url: Option<String>,
    /// Sent as a bearer token on refresh calls.
    pub secret: Option<String>,
}

impl RefreshConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_url: profiled_env_opt(p, "REFRESH_BASE_URL"),
            secret: profiled_env_opt(p, "REFRESH_SECRET"),
        }
    }
}

// ── Alerts ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    pub webhook_url: Option<String>,
    /// Minijinja template for the webhook request body.
    pub webhook_template: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub timeout_secs: u64,
}

impl AlertConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            webhook_url: profiled_env_opt(p, "ALERT_WEBHOOK_URL"),
            webhook_template: profiled_env_opt(p, "ALERT_WEBHOOK_TEMPLATE"),
            telegram_bot_token: profiled_env_opt(p, "TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: profiled_env_opt(p, "TELEGRAM_CHAT_ID"),
            timeout_secs: profiled_env_parse(p, "ALERT_TIMEOUT_SECS", 10),
        }
    }

    pub fn telegram_configured(&self) -> bool {
        self.telegram_bot_token.is_some() && self.telegram_chat_id.is_some()
    }
}

// ── Telemetry ─────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub host: Option<String>,
    pub api_key: Option<String>,
}

impl TelemetryConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            host: profiled_env_opt(p, "TELEMETRY_HOST"),
            api_key: profiled_env_opt(p, "TELEMETRY_API_KEY"),
        }
    }

    pub fn is_configured(&self) -> bool {
        self.host.is_some() && self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_prefixed_key_wins() {
        std::env::set_var("CFGTEST_PG_HOST", "prod-db.internal");
        std::env::set_var("CFGTEST_PG_PORT", "6543");
        let cfg = Config::for_profile("cfgtest");
        assert_eq!(cfg.profile, "CFGTEST");
        assert_eq!(cfg.postgres.host, "prod-db.internal");
        assert_eq!(cfg.postgres.port, 6543);
        std::env::remove_var("CFGTEST_PG_HOST");
        std::env::remove_var("CFGTEST_PG_PORT");
    }

    #[test]
    fn guard_defaults_match_documented_values() {
        let cfg = Config::for_profile("GUARDDEFAULTS");
        assert_eq!(cfg.guard.interval_mins, 30);
        assert_eq!(cfg.guard.ghost_threshold_mins, 30);
        assert_eq!(cfg.guard.recent_failure_mins, 15);
        assert_eq!(cfg.guard.refresh_timeout_secs, 300);
    }

    #[test]
    fn connection_url_overrides_fields() {
        let pg = PostgresConfig {
            url: Some("postgres://u:p@db:5432/x".into()),
            host: "ignored".into(),
            port: 1,
            database: "ignored".into(),
            username: None,
            password: None,
            ssl_mode: "prefer".into(),
            max_connections: 5,
        };
        assert!(pg.is_configured());
        assert_eq!(pg.connection_string(), "postgres://u:p@db:5432/x");
    }

    #[test]
    fn validate_rejects_zero_epoch_duration() {
        let mut cfg = Config::for_profile("VALIDATETEST");
        cfg.epoch.duration_secs = 0;
        assert!(matches!(cfg.validate(), Err(DrepError::Config(_))));
    }

    #[test]
    fn redacted_summary_hides_secrets() {
        let mut cfg = Config::for_profile("REDACTTEST");
        cfg.refresh.secret = Some("hunter2".into());
        cfg.postgres.password = Some("pw-secret".into());
        let text = cfg.redacted_summary().to_string();
        assert!(!text.contains("hunter2"));
        assert!(!text.contains("pw-secret"));
        assert!(text.contains("\"authenticated\":true"));
    }
}
