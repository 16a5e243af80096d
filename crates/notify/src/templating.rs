//! Minijinja template rendering for guard alerts.
//!
//! Each [`AlertKind`] has a title and body template rendered against an
//! [`AlertContext`]. A fresh [`minijinja::Environment`] is created per
//! render call.

use serde::Serialize;

use crate::traits::{Alert, NotifyError, Severity};

/// Context data available to alert templates.
#[derive(Debug, Clone, Serialize)]
pub struct AlertContext {
    pub sync_type: String,
    /// Minutes since the last run; `None` when the type never ran.
    pub stale_mins: Option<f64>,
    pub threshold_mins: i64,
    /// Outcome reported by the refresh entry point.
    pub status: Option<String>,
    pub error: Option<String>,
    /// Current timestamp in ISO 8601 format.
    pub now: String,
}

impl AlertContext {
    pub fn new(sync_type: impl Into<String>, threshold_mins: i64) -> Self {
        Self {
            sync_type: sync_type.into(),
            stale_mins: None,
            threshold_mins,
            status: None,
            error: None,
            now: chrono::Utc::now().to_rfc3339(),
        }
    }
}

/// The alerts the guard knows how to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    /// A stale type was re-triggered successfully.
    SelfHealed,
    /// The guard's own re-trigger failed or timed out.
    RecoveryFailed,
    /// A type's latest run failed with a genuine error.
    SyncFailed,
}

const STALE_FRAGMENT: &str =
    "{% if stale_mins is none %}never run{% else %}stale for {{ stale_mins | round }}m{% endif %}";

impl AlertKind {
    pub fn severity(&self) -> Severity {
        match self {
            Self::SelfHealed => Severity::Info,
            Self::RecoveryFailed | Self::SyncFailed => Severity::Urgent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SelfHealed => "self_healed",
            Self::RecoveryFailed => "recovery_failed",
            Self::SyncFailed => "sync_failed",
        }
    }

    fn title_template(&self) -> &'static str {
        match self {
            Self::SelfHealed => "[recovered] {{ sync_type }} sync self-healed",
            Self::RecoveryFailed => "[URGENT] {{ sync_type | upper }} sync recovery failed",
            Self::SyncFailed => "[URGENT] {{ sync_type | upper }} sync failing",
        }
    }

    fn body_template(&self) -> String {
        match self {
            Self::SelfHealed => format!(
                "{{{{ sync_type }}}} was {STALE_FRAGMENT} (threshold {{{{ threshold_mins }}}}m). \
                 The freshness guard re-triggered it: {{{{ status or 'ok' }}}}."
            ),
            Self::RecoveryFailed => format!(
                "{{{{ sync_type }}}} was {STALE_FRAGMENT} (threshold {{{{ threshold_mins }}}}m). \
                 The freshness guard re-trigger failed: {{{{ error or 'unknown error' }}}}. \
                 Manual attention needed."
            ),
            Self::SyncFailed => "Latest {{ sync_type }} run failed at {{ now }}: \
                 {{ error or 'no error message' }}."
                .to_string(),
        }
    }
}

/// Renders alert templates using minijinja.
#[derive(Debug)]
pub struct TemplateRenderer {
    _private: (),
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self { _private: () }
    }

    fn build_env() -> minijinja::Environment<'static> {
        let mut env = minijinja::Environment::new();
        env.add_filter("round", round_filter);
        env.add_filter("upper", upper_filter);
        env
    }

    /// Render a template string with the given context.
    pub fn render<S: Serialize>(&self, template_str: &str, ctx: &S) -> Result<String, NotifyError> {
        let env = Self::build_env();
        env.render_str(template_str, ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    /// Validate that a template string parses without errors.
    pub fn validate(&self, template_str: &str) -> Result<(), NotifyError> {
        let env = Self::build_env();
        env.template_from_str(template_str)
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        Ok(())
    }

    /// Render a complete [`Alert`] of the given kind.
    pub fn render_alert(&self, kind: AlertKind, ctx: &AlertContext) -> Result<Alert, NotifyError> {
        let title = self.render(kind.title_template(), ctx)?;
        let body = self.render(&kind.body_template(), ctx)?;

        let mut alert = Alert::new(title, body, kind.severity())
            .with_metadata("kind", kind.as_str())
            .with_metadata("sync_type", ctx.sync_type.clone());
        if let Some(stale) = ctx.stale_mins {
            alert = alert.with_metadata("stale_mins", format!("{stale:.0}"));
        }
        Ok(alert)
    }
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

/// Round a float to N decimal places.
fn round_filter(value: f64, decimals: Option<u32>) -> String {
    let n = decimals.unwrap_or(0);
    format!("{:.prec$}", value, prec = n as usize)
}

fn upper_filter(value: String) -> String {
    value.to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> AlertContext {
        AlertContext {
            sync_type: "votes".to_string(),
            stale_mins: Some(134.6),
            threshold_mins: 90,
            status: Some("200 OK".to_string()),
            error: None,
            now: "2026-02-16T12:00:00Z".to_string(),
        }
    }

    #[test]
    fn self_healed_is_informational() {
        let alert = TemplateRenderer::new()
            .render_alert(AlertKind::SelfHealed, &ctx())
            .unwrap();
        assert_eq!(alert.severity, Severity::Info);
        assert_eq!(alert.title, "[recovered] votes sync self-healed");
        assert_eq!(
            alert.body,
            "votes was stale for 135m (threshold 90m). The freshness guard re-triggered it: 200 OK."
        );
        assert_eq!(alert.metadata["kind"], "self_healed");
        assert_eq!(alert.metadata["stale_mins"], "135");
    }

    #[test]
    fn recovery_failed_is_urgent_and_carries_error() {
        let mut c = ctx();
        c.error = Some("timed out after 300000ms".to_string());
        let alert = TemplateRenderer::new()
            .render_alert(AlertKind::RecoveryFailed, &c)
            .unwrap();
        assert_eq!(alert.severity, Severity::Urgent);
        assert_eq!(alert.title, "[URGENT] VOTES sync recovery failed");
        assert!(alert.body.contains("timed out after 300000ms"));
        assert!(alert.body.contains("Manual attention needed."));
    }

    #[test]
    fn never_run_type_renders_without_staleness() {
        let mut c = ctx();
        c.stale_mins = None;
        let alert = TemplateRenderer::new()
            .render_alert(AlertKind::RecoveryFailed, &c)
            .unwrap();
        assert!(alert.body.starts_with("votes was never run"));
        assert!(!alert.metadata.contains_key("stale_mins"));
    }

    #[test]
    fn sync_failed_falls_back_when_error_missing() {
        let alert = TemplateRenderer::new()
            .render_alert(AlertKind::SyncFailed, &ctx())
            .unwrap();
        assert_eq!(
            alert.body,
            "Latest votes run failed at 2026-02-16T12:00:00Z: no error message."
        );
    }

    #[test]
    fn builtin_templates_parse() {
        let renderer = TemplateRenderer::new();
        for kind in [AlertKind::SelfHealed, AlertKind::RecoveryFailed, AlertKind::SyncFailed] {
            assert!(renderer.validate(kind.title_template()).is_ok());
            assert!(renderer.validate(&kind.body_template()).is_ok());
        }
    }

    #[test]
    fn invalid_template_produces_error() {
        let result = TemplateRenderer::new().render("{{ unclosed", &ctx());
        assert!(matches!(result, Err(NotifyError::Template(_))));
    }
}
