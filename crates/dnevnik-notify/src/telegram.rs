//! Telegram Bot API notifier.
//!
//! Wraps `sendMessage` and `answerCallbackQuery` behind the [`Notifier`]
//! trait. Every request is bounded by a client-wide timeout; any transport
//! or API failure is logged and reported as `false`, never propagated.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use dnevnik_shared::constants::NOTIFY_TIMEOUT_SECS;

use crate::{MessageAction, Notifier, OutboundMessage};

const API_BASE: &str = "https://api.telegram.org";

/// Notifier backed by the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramNotifier {
    http_client: reqwest::Client,
    api_base: String,
    bot_token: String,
}

/// The envelope Telegram wraps every response in; only `ok` matters here.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    description: Option<String>,
}

impl TelegramNotifier {
    /// Create a notifier for the given bot token.
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self::with_api_base(API_BASE, bot_token)
    }

    /// Create a notifier against a custom API base URL. Used by tests and
    /// self-hosted Bot API servers.
    pub fn with_api_base(api_base: impl Into<String>, bot_token: impl Into<String>) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(NOTIFY_TIMEOUT_SECS))
            .build()
            .unwrap_or_default();

        Self {
            http_client,
            api_base: api_base.into(),
            bot_token: bot_token.into(),
        }
    }

    /// Build the URL for a Bot API method.
    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    /// POST a JSON payload to a Bot API method and report whether the API
    /// answered `ok: true`.
    async fn call_api(&self, method: &str, payload: &serde_json::Value) -> bool {
        let url = self.method_url(method);

        let response = match self.http_client.post(&url).json(payload).send().await {
            Ok(resp) => resp,
            Err(e) => {
                tracing::warn!(method, error = %e, "notifier request failed");
                return false;
            }
        };

        let status = response.status();
        match response.json::<ApiResponse>().await {
            Ok(body) if body.ok => true,
            Ok(body) => {
                tracing::warn!(
                    method,
                    status = %status,
                    description = body.description.as_deref().unwrap_or(""),
                    "notifier API rejected request"
                );
                false
            }
            Err(e) => {
                tracing::warn!(method, status = %status, error = %e, "notifier response unreadable");
                false
            }
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_message(&self, chat_id: &str, message: &OutboundMessage) -> bool {
        // No parse_mode: content is plain text and never interpreted.
        let mut payload = serde_json::json!({
            "chat_id": chat_id,
            "text": message.text,
        });
        if !message.actions.is_empty() {
            payload["reply_markup"] = inline_keyboard(&message.actions);
        }
        self.call_api("sendMessage", &payload).await
    }

    async fn acknowledge_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        urgent: bool,
    ) -> bool {
        let mut payload = serde_json::json!({
            "callback_query_id": callback_id,
        });
        if let Some(text) = text {
            payload["text"] = serde_json::json!(text);
        }
        if urgent {
            payload["show_alert"] = serde_json::json!(true);
        }
        self.call_api("answerCallbackQuery", &payload).await
    }
}

/// Render action buttons as a one-column Telegram inline keyboard.
fn inline_keyboard(actions: &[MessageAction]) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = actions
        .iter()
        .map(|a| {
            serde_json::json!([{
                "text": a.label,
                "callback_data": a.data,
            }])
        })
        .collect();
    serde_json::json!({ "inline_keyboard": rows })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_has_one_row_per_action() {
        let actions = vec![
            MessageAction {
                label: "Approve".into(),
                data: "confirm_login:t".into(),
            },
            MessageAction {
                label: "Deny".into(),
                data: "deny_login:t".into(),
            },
        ];
        let markup = inline_keyboard(&actions);
        let rows = markup["inline_keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0][0]["callback_data"], "confirm_login:t");
    }

    #[test]
    fn method_url_embeds_token() {
        let notifier = TelegramNotifier::with_api_base("http://localhost:1", "abc:def");
        assert_eq!(
            notifier.method_url("sendMessage"),
            "http://localhost:1/botabc:def/sendMessage"
        );
    }

    #[tokio::test]
    async fn unreachable_api_reports_not_delivered() {
        // Port 1 is never listening; the failure must surface as `false`.
        let notifier = TelegramNotifier::with_api_base("http://127.0.0.1:1", "abc:def");
        let delivered = notifier
            .send_message("100", &OutboundMessage::text("hi"))
            .await;
        assert!(!delivered);
    }
}
