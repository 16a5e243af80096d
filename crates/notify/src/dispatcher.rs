//! Fans alerts out to every configured channel.
//!
//! Each channel send is bounded by the dispatcher timeout. Individual
//! channel failures don't block other channels.

use std::sync::Arc;
use std::time::{Duration, Instant};

use drep_core::config::AlertConfig;

use crate::telegram::TelegramNotifier;
use crate::templating::TemplateRenderer;
use crate::traits::{Alert, DispatchResult, Notifier, NotifyError};
use crate::webhook::WebhookNotifier;

/// Default per-channel delivery timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Dispatches alerts to a fixed list of channels.
pub struct Dispatcher {
    channels: Vec<Box<dyn Notifier>>,
    timeout: Duration,
}

impl Dispatcher {
    /// Create a dispatcher with no channels. Every dispatch is a no-op.
    pub fn empty() -> Self {
        Self::with_defaults(Vec::new())
    }

    /// Create a dispatcher over the given channels.
    pub fn with_defaults(channels: Vec<Box<dyn Notifier>>) -> Self {
        Self {
            channels,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build channels from alert config.
    ///
    /// A channel that fails to construct is logged and skipped so one bad
    /// setting doesn't silence the others.
    pub fn from_config(config: &AlertConfig) -> Self {
        let renderer = Arc::new(TemplateRenderer::new());
        let mut channels: Vec<Box<dyn Notifier>> = Vec::new();

        if let Some(ref url) = config.webhook_url {
            let notifier = WebhookNotifier::new(url, renderer)
                .and_then(|n| n.with_body_template(config.webhook_template.clone()));
            match notifier {
                Ok(n) => channels.push(Box::new(n)),
                Err(e) => tracing::warn!(error = %e, "Webhook alert channel disabled"),
            }
        }

        if let (Some(token), Some(chat_id)) =
            (&config.telegram_bot_token, &config.telegram_chat_id)
        {
            match TelegramNotifier::from_config(token.clone(), chat_id.clone()) {
                Ok(n) => channels.push(Box::new(n)),
                Err(e) => tracing::warn!(error = %e, "Telegram alert channel disabled"),
            }
        }

        if channels.is_empty() {
            tracing::warn!("No alert channels configured; alerts will only be logged");
        }

        Self::with_defaults(channels).with_timeout(Duration::from_secs(config.timeout_secs.max(1)))
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.channel_name()).collect()
    }

    /// Dispatch an alert to all channels, one after another.
    ///
    /// Returns results for each channel delivery.
    pub async fn dispatch(&self, alert: &Alert) -> Vec<DispatchResult> {
        if self.channels.is_empty() {
            tracing::info!(
                severity = alert.severity.as_str(),
                title = %alert.title,
                "No alert channels configured"
            );
            return Vec::new();
        }

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let start = Instant::now();
            let result = match tokio::time::timeout(self.timeout, channel.send(alert)).await {
                Ok(r) => r,
                Err(_) => Err(NotifyError::Timeout(self.timeout.as_millis() as u64)),
            };
            let duration_ms = start.elapsed().as_millis() as u64;

            let (success, error) = match result {
                Ok(()) => {
                    tracing::info!(
                        channel = channel.channel_name(),
                        severity = alert.severity.as_str(),
                        duration_ms,
                        "Alert delivered"
                    );
                    (true, None)
                }
                Err(e) => {
                    tracing::warn!(
                        channel = channel.channel_name(),
                        error = %e,
                        duration_ms,
                        "Alert delivery failed"
                    );
                    (false, Some(e.to_string()))
                }
            };

            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success,
                error,
                duration_ms,
            });
        }

        results
    }

    /// Send a test alert through a channel by index.
    pub async fn test_notify(&self, channel_index: usize) -> Result<(), NotifyError> {
        let channel = self.channels.get(channel_index).ok_or_else(|| {
            NotifyError::Config(format!("Channel index {channel_index} out of range"))
        })?;

        match tokio::time::timeout(self.timeout, channel.test()).await {
            Ok(r) => r,
            Err(_) => Err(NotifyError::Timeout(self.timeout.as_millis() as u64)),
        }
    }

    /// Send a test alert through every channel and report each outcome.
    pub async fn test_all(&self) -> Vec<DispatchResult> {
        let mut results = Vec::with_capacity(self.channels.len());
        for (index, channel) in self.channels.iter().enumerate() {
            let start = Instant::now();
            let result = self.test_notify(index).await;
            results.push(DispatchResult {
                channel: channel.channel_name().to_string(),
                success: result.is_ok(),
                error: result.err().map(|e| e.to_string()),
                duration_ms: start.elapsed().as_millis() as u64,
            });
        }
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::Severity;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockNotifier {
        name: String,
        send_count: Arc<AtomicUsize>,
        should_fail: bool,
        delay: Option<Duration>,
    }

    impl MockNotifier {
        fn ok(name: &str, send_count: Arc<AtomicUsize>) -> Self {
            Self {
                name: name.to_string(),
                send_count,
                should_fail: false,
                delay: None,
            }
        }
    }

    #[async_trait::async_trait]
    impl Notifier for MockNotifier {
        async fn send(&self, _alert: &Alert) -> Result<(), NotifyError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.send_count.fetch_add(1, Ordering::SeqCst);
            if self.should_fail {
                Err(NotifyError::Config("mock failure".to_string()))
            } else {
                Ok(())
            }
        }
        fn channel_name(&self) -> &str {
            &self.name
        }
    }

    fn alert() -> Alert {
        Alert::new("test", "test body", Severity::Urgent)
    }

    #[tokio::test]
    async fn dispatch_to_all_channels() {
        let count_a = Arc::new(AtomicUsize::new(0));
        let count_b = Arc::new(AtomicUsize::new(0));

        let channels: Vec<Box<dyn Notifier>> = vec![
            Box::new(MockNotifier::ok("a", count_a.clone())),
            Box::new(MockNotifier::ok("b", count_b.clone())),
        ];
        let dispatcher = Dispatcher::with_defaults(channels);

        let results = dispatcher.dispatch(&alert()).await;
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.success));
        assert_eq!(count_a.load(Ordering::SeqCst), 1);
        assert_eq!(count_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn partial_failure_doesnt_block() {
        let count = Arc::new(AtomicUsize::new(0));

        let channels: Vec<Box<dyn Notifier>> = vec![
            Box::new(MockNotifier {
                name: "fail".to_string(),
                send_count: Arc::new(AtomicUsize::new(0)),
                should_fail: true,
                delay: None,
            }),
            Box::new(MockNotifier::ok("ok", count.clone())),
        ];
        let dispatcher = Dispatcher::with_defaults(channels);

        let results = dispatcher.dispatch(&alert()).await;
        assert_eq!(results.len(), 2);
        assert!(!results[0].success);
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1); // second channel still sent
    }

    #[tokio::test]
    async fn slow_channel_times_out() {
        let count = Arc::new(AtomicUsize::new(0));
        let channels: Vec<Box<dyn Notifier>> = vec![
            Box::new(MockNotifier {
                name: "slow".to_string(),
                send_count: Arc::new(AtomicUsize::new(0)),
                should_fail: false,
                delay: Some(Duration::from_secs(30)),
            }),
            Box::new(MockNotifier::ok("fast", count.clone())),
        ];
        let dispatcher = Dispatcher::with_defaults(channels).with_timeout(Duration::from_millis(20));

        let results = dispatcher.dispatch(&alert()).await;
        assert!(!results[0].success);
        assert!(results[0].error.as_deref().unwrap().contains("timed out"));
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_dispatcher_returns_empty() {
        let dispatcher = Dispatcher::empty();
        assert!(dispatcher.is_empty());
        assert!(dispatcher.dispatch(&alert()).await.is_empty());
    }

    #[tokio::test]
    async fn test_notify_out_of_range() {
        let dispatcher = Dispatcher::empty();
        assert!(matches!(
            dispatcher.test_notify(0).await,
            Err(NotifyError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_all_reports_every_channel() {
        let count = Arc::new(AtomicUsize::new(0));
        let channels: Vec<Box<dyn Notifier>> = vec![
            Box::new(MockNotifier {
                name: "fail".to_string(),
                send_count: Arc::new(AtomicUsize::new(0)),
                should_fail: true,
                delay: None,
            }),
            Box::new(MockNotifier::ok("ok", count.clone())),
        ];
        let dispatcher = Dispatcher::with_defaults(channels);

        let results = dispatcher.test_all().await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].channel, "fail");
        assert!(!results[0].success);
        assert_eq!(results[0].error.as_deref(), Some("Configuration error: mock failure"));
        assert!(results[1].success);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_notify_is_bounded_by_timeout() {
        let channels: Vec<Box<dyn Notifier>> = vec![Box::new(MockNotifier {
            name: "slow".to_string(),
            send_count: Arc::new(AtomicUsize::new(0)),
            should_fail: false,
            delay: Some(Duration::from_secs(30)),
        })];
        let dispatcher = Dispatcher::with_defaults(channels).with_timeout(Duration::from_millis(20));
        assert!(matches!(
            dispatcher.test_notify(0).await,
            Err(NotifyError::Timeout(20))
        ));
    }

    #[test]
    fn from_config_builds_configured_channels() {
        let config = AlertConfig {
            webhook_url: Some("https://hooks.example.com/drep".into()),
            webhook_template: None,
            telegram_bot_token: Some("123:ABC".into()),
            telegram_chat_id: Some("-100123".into()),
            timeout_secs: 5,
        };
        let dispatcher = Dispatcher::from_config(&config);
        assert_eq!(dispatcher.channel_names(), vec!["webhook", "telegram"]);
        assert_eq!(dispatcher.timeout, Duration::from_secs(5));
    }

    #[test]
    fn from_config_without_channels_is_empty() {
        let config = AlertConfig {
            webhook_url: None,
            webhook_template: None,
            telegram_bot_token: Some("123:ABC".into()),
            telegram_chat_id: None,
            timeout_secs: 10,
        };
        assert!(Dispatcher::from_config(&config).is_empty());
    }
}
