//! Inbound payload shapes of the external messaging channel.
//!
//! The webhook receives an update that is either a plain chat message or a
//! button-press callback. Only the fields the dispatcher actually reads are
//! modeled; everything else in the payload is ignored by serde.

use serde::{Deserialize, Serialize};

/// A single inbound update delivered to the webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundUpdate {
    pub message: Option<InboundMessage>,
    pub edited_message: Option<InboundMessage>,
    pub callback_query: Option<CallbackQuery>,
}

impl InboundUpdate {
    /// The message carried by this update, preferring the original over an
    /// edited copy.
    pub fn message(&self) -> Option<&InboundMessage> {
        self.message.as_ref().or(self.edited_message.as_ref())
    }
}

/// A chat message (or edited message) from the external channel.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

/// The originating chat of an inbound message.
#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

impl Chat {
    /// Best-effort display name: username first, then first name.
    pub fn display_name(&self) -> Option<&str> {
        self.username.as_deref().or(self.first_name.as_deref())
    }
}

/// A button-press callback from an approve/deny prompt.
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackQuery {
    pub id: String,
    pub data: Option<String>,
    pub from: Option<Chat>,
}

/// Acknowledgement returned for every inbound update, recognized or not.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Ack {
    pub ok: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            ok: true,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            message: message.into(),
        }
    }
}
