//! HTTP webhook alert channel.
//!
//! Posts each alert as JSON to one URL. The URL may reference environment
//! variables as `${NAME}`, resolved once at construction. An optional
//! minijinja body template replaces the default [`WebhookPayload`] for
//! receivers that expect their own shape (Slack, Discord, PagerDuty relays).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::templating::TemplateRenderer;
use crate::traits::{Alert, Notifier, NotifyError, Severity};

#[derive(Debug)]
pub struct WebhookNotifier {
    url: String,
    body_template: Option<String>,
    renderer: Arc<TemplateRenderer>,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: &str, renderer: Arc<TemplateRenderer>) -> Result<Self, NotifyError> {
        let url = expand_env_refs(url)?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(NotifyError::Config(format!(
                "webhook URL must be http(s): {url}"
            )));
        }
        Ok(Self {
            url,
            body_template: None,
            renderer,
            client: reqwest::Client::new(),
        })
    }

    /// Use `template` as the request body. Syntax is checked here so a bad
    /// template disables the channel at startup instead of on first alert.
    pub fn with_body_template(mut self, template: Option<String>) -> Result<Self, NotifyError> {
        if let Some(ref t) = template {
            self.renderer
                .validate(t)
                .map_err(|e| NotifyError::Config(format!("invalid webhook body template: {e}")))?;
        }
        self.body_template = template;
        Ok(self)
    }

    fn render_body(&self, alert: &Alert) -> Result<String, NotifyError> {
        let payload = WebhookPayload::from(alert);
        match self.body_template {
            Some(ref t) => self.renderer.render(t, &payload),
            None => serde_json::to_string(&payload)
                .map_err(|e| NotifyError::Template(format!("alert payload: {e}"))),
        }
    }
}

/// Default JSON body. `content` is the title and body joined, which chat
/// webhooks display verbatim.
#[derive(Debug, Serialize)]
pub struct WebhookPayload<'a> {
    pub title: &'a str,
    pub body: &'a str,
    pub severity: Severity,
    pub metadata: &'a HashMap<String, String>,
    pub content: String,
}

impl<'a> From<&'a Alert> for WebhookPayload<'a> {
    fn from(alert: &'a Alert) -> Self {
        Self {
            title: &alert.title,
            body: &alert.body,
            severity: alert.severity,
            metadata: &alert.metadata,
            content: format!("{}\n\n{}", alert.title, alert.body),
        }
    }
}

#[async_trait::async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-alert-severity", alert.severity.as_str())
            .body(self.render_body(alert)?)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body: String = response
                .text()
                .await
                .unwrap_or_default()
                .chars()
                .take(500)
                .collect();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        tracing::debug!(%status, severity = alert.severity.as_str(), "webhook alert delivered");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "webhook"
    }
}

/// Replace every `${NAME}` in `input` with the value of env var `NAME`.
fn expand_env_refs(input: &str) -> Result<String, NotifyError> {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or_else(|| {
            NotifyError::Config(format!("unterminated ${{...}} in webhook URL: {input}"))
        })?;
        let name = &after[..end];
        let value = std::env::var(name)
            .map_err(|_| NotifyError::Config(format!("webhook URL references unset env var {name}")))?;
        out.push_str(&value);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
