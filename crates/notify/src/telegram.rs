//! Telegram Bot API alert channel.
//!
//! Alerts go out through `sendMessage` as MarkdownV2. Informational alerts
//! (a sync that healed itself) are delivered silently so only urgent ones
//! buzz the on-call phone.

use serde_json::{json, Value};

use crate::traits::{Alert, Notifier, NotifyError, Severity};

const API_BASE: &str = "https://api.telegram.org";

/// Telegram rejects messages longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 4096;

const MARKDOWN_V2_RESERVED: &[char] = &[
    '_', '*', '[', ']', '(', ')', '~', '`', '>', '#', '+', '-', '=', '|', '{', '}', '.', '!', '\\',
];

/// Backslash-escape every MarkdownV2 reserved character.
pub fn escape_markdown_v2(text: &str) -> String {
    text.chars().fold(String::with_capacity(text.len() + 8), |mut out, ch| {
        if MARKDOWN_V2_RESERVED.contains(&ch) {
            out.push('\\');
        }
        out.push(ch);
        out
    })
}

/// Bold title, blank line, body. Long bodies are cut to fit one message.
pub fn format_message(alert: &Alert) -> String {
    let title = format!("*{}*\n\n", escape_markdown_v2(&alert.title));
    let budget = MAX_MESSAGE_CHARS.saturating_sub(title.chars().count() + 6);
    let mut body = escape_markdown_v2(&alert.body);
    if body.chars().count() > budget {
        body = body.chars().take(budget).collect();
        // An odd run of trailing backslashes ends in a dangling escape.
        let trailing = body.chars().rev().take_while(|&c| c == '\\').count();
        if trailing % 2 == 1 {
            body.pop();
        }
        body.push_str("\\.\\.\\.");
    }
    title + &body
}

pub struct TelegramNotifier {
    bot_token: String,
    chat_id: String,
    api_base: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for TelegramNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramNotifier")
            .field("chat_id", &self.chat_id)
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl TelegramNotifier {
    pub fn from_config(bot_token: String, chat_id: String) -> Result<Self, NotifyError> {
        if bot_token.trim().is_empty() {
            return Err(NotifyError::Config("Telegram bot token must not be empty".into()));
        }
        if chat_id.trim().is_empty() {
            return Err(NotifyError::Config("Telegram chat id must not be empty".into()));
        }
        Ok(Self {
            bot_token,
            chat_id: chat_id.trim().to_string(),
            api_base: API_BASE.to_string(),
            client: reqwest::Client::new(),
        })
    }

    /// Point at a different Bot API host (self-hosted Bot API server).
    pub fn with_api_base(mut self, api_base: &str) -> Self {
        self.api_base = api_base.trim_end_matches('/').to_string();
        self
    }

    fn send_message_url(&self) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, self.bot_token)
    }

    fn request_body(&self, alert: &Alert) -> Value {
        json!({
            "chat_id": self.chat_id,
            "text": format_message(alert),
            "parse_mode": "MarkdownV2",
            "disable_notification": alert.severity == Severity::Info,
        })
    }
}

/// Map a Bot API reply to a delivery result.
fn interpret_reply(status: u16, reply: &Value) -> Result<(), NotifyError> {
    if reply.get("ok").and_then(Value::as_bool) == Some(true) {
        return Ok(());
    }
    if status == 429 {
        let retry_after_secs = reply
            .pointer("/parameters/retry_after")
            .and_then(Value::as_u64)
            .unwrap_or(30);
        return Err(NotifyError::RateLimited { retry_after_secs });
    }
    let description = reply
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or("unknown Telegram API error");
    Err(NotifyError::Rejected {
        status,
        body: description.to_string(),
    })
}

#[async_trait::async_trait]
impl Notifier for TelegramNotifier {
    async fn send(&self, alert: &Alert) -> Result<(), NotifyError> {
        let response = self
            .client
            .post(self.send_message_url())
            .json(&self.request_body(alert))
            .send()
            .await?;
        let status = response.status().as_u16();
        let reply: Value = response.json().await.unwrap_or(Value::Null);

        interpret_reply(status, &reply)?;
        tracing::info!(chat_id = %self.chat_id, severity = alert.severity.as_str(), "Telegram alert sent");
        Ok(())
    }

    fn channel_name(&self) -> &str {
        "telegram"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> TelegramNotifier {
        TelegramNotifier::from_config("123456:ABC-DEF".into(), " -100123 ".into()).unwrap()
    }

    #[test]
    fn escapes_reserved_characters() {
        assert_eq!(
            escape_markdown_v2("votes_sync (v2.1) - 100% ok!"),
            r"votes\_sync \(v2\.1\) \- 100% ok\!"
        );
        assert_eq!(escape_markdown_v2(r"a\b"), r"a\\b");
        assert_eq!(escape_markdown_v2("plain text 123"), "plain text 123");
    }

    #[test]
    fn format_message_escapes_title_and_body() {
        let alert = Alert::new(
            "[recovered] votes sync self-healed",
            "votes was stale for 135m (threshold 90m).",
            Severity::Info,
        );
        assert_eq!(
            format_message(&alert),
            "*\\[recovered\\] votes sync self\\-healed*\n\nvotes was stale for 135m \\(threshold 90m\\)\\."
        );
    }

    #[test]
    fn long_body_fits_one_message() {
        let alert = Alert::new("t", "x".repeat(10_000), Severity::Urgent);
        let text = format_message(&alert);
        assert!(text.chars().count() <= MAX_MESSAGE_CHARS);
        assert!(text.ends_with("\\.\\.\\."));
    }

    #[test]
    fn truncation_never_splits_an_escape_pair() {
        // "*t*\n\n" leaves a 4085 char body budget. The escaped body has
        // 4082 'a's then four backslashes, so the cut lands after three.
        let body = format!("{}\\\\tail", "a".repeat(4082));
        let text = format_message(&Alert::new("t", body, Severity::Urgent));
        let kept = text.strip_suffix("\\.\\.\\.").unwrap();
        assert!(kept.ends_with("a\\\\"));
        let trailing = kept.chars().rev().take_while(|&c| c == '\\').count();
        assert_eq!(trailing % 2, 0);
        assert!(text.chars().count() <= MAX_MESSAGE_CHARS);
    }

    #[test]
    fn info_alerts_are_silent() {
        let n = notifier();
        let info = n.request_body(&Alert::new("t", "b", Severity::Info));
        let urgent = n.request_body(&Alert::new("t", "b", Severity::Urgent));
        assert_eq!(info["disable_notification"], true);
        assert_eq!(urgent["disable_notification"], false);
        assert_eq!(urgent["chat_id"], "-100123");
        assert_eq!(urgent["parse_mode"], "MarkdownV2");
    }

    #[test]
    fn api_base_is_overridable() {
        let n = notifier().with_api_base("http://localhost:8081/");
        assert_eq!(n.send_message_url(), "http://localhost:8081/bot123456:ABC-DEF/sendMessage");
    }

    #[test]
    fn debug_output_hides_token() {
        assert!(!format!("{:?}", notifier()).contains("ABC-DEF"));
    }

    #[test]
    fn empty_credentials_are_rejected() {
        assert!(TelegramNotifier::from_config(String::new(), "1".into()).is_err());
        let err = TelegramNotifier::from_config("1:A".into(), " ".into()).unwrap_err();
        assert!(err.to_string().contains("chat id"));
    }

    #[test]
    fn reply_interpretation() {
        assert!(interpret_reply(200, &json!({ "ok": true })).is_ok());
        assert!(matches!(
            interpret_reply(429, &json!({ "ok": false, "parameters": { "retry_after": 7 } })),
            Err(NotifyError::RateLimited { retry_after_secs: 7 })
        ));
        match interpret_reply(400, &json!({ "ok": false, "description": "chat not found" })) {
            Err(NotifyError::Rejected { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, "chat not found");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn channel_name_is_telegram() {
        assert_eq!(notifier().channel_name(), "telegram");
    }
}
