//! Outbound alerting and telemetry for the sync guard.
//!
//! This crate provides:
//! - `Notifier` trait for pluggable alert channels
//! - Webhook and Telegram notifier implementations
//! - Minijinja templates for the guard's alert messages
//! - Dispatcher that fans an alert out to every configured channel
//! - `TelemetrySink` trait and an HTTP capture client for analytics events
//!
//! Delivery is best-effort everywhere: failures are logged and reported
//! back, never retried.

pub mod dispatcher;
pub mod telegram;
pub mod telemetry;
pub mod templating;
pub mod traits;
pub mod webhook;

pub use dispatcher::Dispatcher;
pub use telemetry::{HttpTelemetrySink, Telemetry, TelemetryEvent, TelemetrySink};
pub use templating::{AlertContext, AlertKind, TemplateRenderer};
pub use traits::{Alert, DispatchResult, Notifier, NotifyError, Severity};
