//! Notifier trait definition and shared error types.

use std::collections::HashMap;

use serde::Serialize;

/// Errors that can occur during notification delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Template rendering failed: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Endpoint rejected delivery with {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Delivery timed out after {0}ms")]
    Timeout(u64),
}

/// How loudly an alert should be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational: staleness the guard already fixed.
    Info,
    /// Needs a human: genuine job failure or failed recovery.
    Urgent,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Urgent => "urgent",
        }
    }
}

/// A rendered alert ready for delivery.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub title: String,
    pub body: String,
    pub severity: Severity,
    /// Additional metadata (e.g., sync type, staleness).
    pub metadata: HashMap<String, String>,
}

impl Alert {
    pub fn new(title: impl Into<String>, body: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            severity,
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Trait for alert channel implementations.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an alert through this channel.
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError>;

    /// Test connectivity with a sample alert.
    async fn test(&self) -> Result<(), NotifyError> {
        let alert = Alert::new(
            "[TEST] Sync guard alert channel",
            "This is a test alert from the DRep sync guard.",
            Severity::Info,
        )
        .with_metadata("event", "test");
        self.send(&alert).await
    }

    /// Human-readable name for this channel (e.g., "webhook", "telegram").
    fn channel_name(&self) -> &str;
}

/// Result of dispatching an alert to a single channel.
#[derive(Debug, Clone, Serialize)]
pub struct DispatchResult {
    pub channel: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}
