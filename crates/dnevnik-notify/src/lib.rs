//! # dnevnik-notify
//!
//! The notifier capability: deliver a message to an external chat identity
//! and acknowledge an inbound button-press callback.
//!
//! Both operations are best-effort from the caller's point of view. They
//! report `true`/`false` and never error outward; a lost notification
//! degrades observability, not correctness. Callers inject an
//! `Arc<dyn Notifier>`: [`TelegramNotifier`] in production, [`NoopNotifier`]
//! when the channel is deliberately unconfigured.

pub mod telegram;

use async_trait::async_trait;

pub use telegram::TelegramNotifier;

/// An outbound message, channel-agnostic.
///
/// Action buttons become whatever affordance the concrete channel offers
/// (inline keyboard buttons for Telegram); their `data` comes back verbatim
/// in a callback query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
    pub actions: Vec<MessageAction>,
}

impl OutboundMessage {
    /// A plain text message with no buttons.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            actions: Vec::new(),
        }
    }

    /// Attach an action button.
    pub fn with_action(mut self, label: impl Into<String>, data: impl Into<String>) -> Self {
        self.actions.push(MessageAction {
            label: label.into(),
            data: data.into(),
        });
        self
    }
}

/// A single action button on an [`OutboundMessage`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageAction {
    pub label: String,
    pub data: String,
}

/// Delivery capability for the external messaging channel.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a message to an external chat identity.
    ///
    /// Returns whether the channel accepted the message.
    async fn send_message(&self, chat_id: &str, message: &OutboundMessage) -> bool;

    /// Acknowledge an inbound callback so the sender's client stops
    /// spinning. `urgent` asks the channel to surface the text prominently.
    async fn acknowledge_callback(&self, callback_id: &str, text: Option<&str>, urgent: bool)
        -> bool;
}

/// Notifier for deployments without a configured channel.
///
/// Every delivery reports failure, which callers already treat as the soft
/// path; state changes proceed normally.
#[derive(Debug, Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send_message(&self, chat_id: &str, _message: &OutboundMessage) -> bool {
        tracing::debug!(chat_id, "no notifier configured, dropping message");
        false
    }

    async fn acknowledge_callback(
        &self,
        callback_id: &str,
        _text: Option<&str>,
        _urgent: bool,
    ) -> bool {
        tracing::debug!(callback_id, "no notifier configured, dropping ack");
        false
    }
}
