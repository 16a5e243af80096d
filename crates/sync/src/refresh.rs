//! Refresh entry points the guard calls to re-run a stale job.

use serde::Serialize;

use crate::registry::SyncTypeSpec;

#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("refresh request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("refresh returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("refresh timed out after {0}ms")]
    Timeout(u64),

    #[error("refresh entry points not configured: {0}")]
    NotConfigured(String),
}

/// What the entry point reported back.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshOutcome {
    pub status_code: u16,
    pub status: String,
}

impl RefreshOutcome {
    pub fn ok(status: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            status: status.into(),
        }
    }
}

/// Invokes the refresh job for a sync type.
#[async_trait::async_trait]
pub trait RefreshTrigger: Send + Sync {
    async fn trigger(&self, spec: &SyncTypeSpec) -> Result<RefreshOutcome, RefreshError>;

    fn trigger_name(&self) -> &str;
}

/// Calls `POST {base_url}{refresh_path}` with a bearer secret.
#[derive(Debug)]
pub struct HttpRefreshTrigger {
    base_url: String,
    secret: Option<String>,
    client: reqwest::Client,
}

impl HttpRefreshTrigger {
    pub fn new(base_url: &str, secret: Option<String>) -> Result<Self, RefreshError> {
        let base_url = base_url.trim_end_matches('/');
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            return Err(RefreshError::NotConfigured(format!(
                "base URL must be http(s): {base_url}"
            )));
        }
        Ok(Self {
            base_url: base_url.to_string(),
            secret: secret.filter(|s| !s.is_empty()),
            client: reqwest::Client::new(),
        })
    }

    pub fn url_for(&self, spec: &SyncTypeSpec) -> String {
        format!("{}{}", self.base_url, spec.refresh_path)
    }
}

#[async_trait::async_trait]
impl RefreshTrigger for HttpRefreshTrigger {
    async fn trigger(&self, spec: &SyncTypeSpec) -> Result<RefreshOutcome, RefreshError> {
        let url = self.url_for(spec);
        let mut request = self
            .client
            .post(&url)
            .header("x-triggered-by", "freshness-guard");
        if let Some(ref secret) = self.secret {
            request = request.bearer_auth(secret);
        }

        tracing::debug!(sync_type = %spec.name, %url, "invoking refresh entry point");
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(RefreshError::Status {
                status: status.as_u16(),
                body: body.chars().take(500).collect(),
            });
        }

        Ok(RefreshOutcome {
            status_code: status.as_u16(),
            status: status.to_string(),
        })
    }

    fn trigger_name(&self) -> &str {
        "http"
    }
}

/// Stand-in used when no refresh base URL is configured. Every call fails.
#[derive(Debug, Default)]
pub struct UnconfiguredTrigger;

#[async_trait::async_trait]
impl RefreshTrigger for UnconfiguredTrigger {
    async fn trigger(&self, spec: &SyncTypeSpec) -> Result<RefreshOutcome, RefreshError> {
        Err(RefreshError::NotConfigured(format!(
            "REFRESH_BASE_URL is not set, cannot refresh {}",
            spec.name
        )))
    }

    fn trigger_name(&self) -> &str {
        "unconfigured"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_joins_base_and_path() {
        let trigger = HttpRefreshTrigger::new("https://app.example.com/", None).unwrap();
        let spec = SyncTypeSpec::new("votes", 60, 90);
        assert_eq!(trigger.url_for(&spec), "https://app.example.com/api/sync/votes");
    }

    #[test]
    fn rejects_non_http_base() {
        assert!(matches!(
            HttpRefreshTrigger::new("app.example.com", None),
            Err(RefreshError::NotConfigured(_))
        ));
    }

    #[test]
    fn empty_secret_is_dropped() {
        let trigger = HttpRefreshTrigger::new("http://localhost:3000", Some(String::new())).unwrap();
        assert!(trigger.secret.is_none());
    }

    #[tokio::test]
    async fn unconfigured_trigger_always_fails() {
        let spec = SyncTypeSpec::new("dreps", 120, 180);
        let err = UnconfiguredTrigger.trigger(&spec).await.unwrap_err();
        assert!(err.to_string().contains("REFRESH_BASE_URL"));
    }
}
