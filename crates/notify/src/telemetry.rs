//! Best-effort analytics events.
//!
//! [`Telemetry`] fans an event out to every [`TelemetrySink`], bounding
//! each emission by a timeout. Failures are logged and discarded.

use std::time::Duration;

use chrono::{DateTime, Utc};
use drep_core::config::TelemetryConfig;
use serde::Serialize;

use crate::traits::NotifyError;

/// Distinct id used for events emitted by background jobs.
pub const SYSTEM_DISTINCT_ID: &str = "system:sync-guard";

/// A named event with structured properties.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub event: String,
    pub distinct_id: String,
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub timestamp: DateTime<Utc>,
}

impl TelemetryEvent {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            distinct_id: SYSTEM_DISTINCT_ID.to_string(),
            properties: serde_json::Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

#[async_trait::async_trait]
pub trait TelemetrySink: Send + Sync {
    async fn capture(&self, event: &TelemetryEvent) -> Result<(), NotifyError>;

    fn sink_name(&self) -> &str;
}

/// Posts events to a PostHog-compatible `/capture/` endpoint.
#[derive(Debug)]
pub struct HttpTelemetrySink {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpTelemetrySink {
    pub fn new(host: &str, api_key: impl Into<String>) -> Result<Self, NotifyError> {
        let host = host.trim_end_matches('/');
        if !host.starts_with("http://") && !host.starts_with("https://") {
            return Err(NotifyError::Config(format!(
                "telemetry host must be an http(s) URL: {host}"
            )));
        }
        let api_key = api_key.into();
        if api_key.is_empty() {
            return Err(NotifyError::Config("telemetry api key must not be empty".into()));
        }
        Ok(Self {
            endpoint: format!("{host}/capture/"),
            api_key,
            client: reqwest::Client::new(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn payload(&self, event: &TelemetryEvent) -> serde_json::Value {
        serde_json::json!({
            "api_key": self.api_key,
            "event": event.event,
            "distinct_id": event.distinct_id,
            "properties": event.properties,
            "timestamp": event.timestamp.to_rfc3339(),
        })
    }
}

#[async_trait::async_trait]
impl TelemetrySink for HttpTelemetrySink {
    async fn capture(&self, event: &TelemetryEvent) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&self.payload(event))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        tracing::debug!(event = %event.event, "telemetry event captured");
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "http"
    }
}

/// Fire-and-forget emitter over zero or more sinks.
pub struct Telemetry {
    sinks: Vec<Box<dyn TelemetrySink>>,
    timeout: Duration,
}

impl Telemetry {
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Duration::from_secs(5))
    }

    pub fn new(sinks: Vec<Box<dyn TelemetrySink>>, timeout: Duration) -> Self {
        Self { sinks, timeout }
    }

    /// Build from config; an unconfigured or invalid host disables telemetry.
    pub fn from_config(config: &TelemetryConfig, timeout: Duration) -> Self {
        match (&config.host, &config.api_key) {
            (Some(host), Some(key)) => match HttpTelemetrySink::new(host, key.clone()) {
                Ok(sink) => {
                    let sinks: Vec<Box<dyn TelemetrySink>> = vec![Box::new(sink)];
                    Self::new(sinks, timeout)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Telemetry disabled");
                    Self::disabled()
                }
            },
            _ => {
                tracing::debug!("Telemetry not configured");
                Self::disabled()
            }
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.sinks.is_empty()
    }

    /// Emit to every sink. Returns how many sinks accepted the event.
    pub async fn emit(&self, event: &TelemetryEvent) -> usize {
        let mut delivered = 0;
        for sink in &self.sinks {
            match tokio::time::timeout(self.timeout, sink.capture(event)).await {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => tracing::warn!(
                    sink = sink.sink_name(),
                    event = %event.event,
                    error = %e,
                    "telemetry emission failed"
                ),
                Err(_) => tracing::warn!(
                    sink = sink.sink_name(),
                    event = %event.event,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "telemetry emission timed out"
                ),
            }
        }
        delivered
    }
}
