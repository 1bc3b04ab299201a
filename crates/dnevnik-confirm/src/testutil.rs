//! Shared fixtures for the crate's tests.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use dnevnik_notify::{Notifier, OutboundMessage};
use dnevnik_store::Database;

use crate::{shared_db, SharedDb};

/// A fresh in-memory database.
pub fn fresh_db() -> SharedDb {
    shared_db(Database::open_in_memory().expect("in-memory database"))
}

/// Everything one delivery attempt carried.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub chat_id: String,
    pub message: OutboundMessage,
}

/// Test notifier that records every call and answers with a configurable
/// delivery outcome.
pub struct RecordingNotifier {
    pub deliver: bool,
    pub sent: Mutex<Vec<SentMessage>>,
    pub acks: Mutex<Vec<(String, Option<String>, bool)>>,
}

impl RecordingNotifier {
    pub fn delivering() -> Arc<Self> {
        Arc::new(Self {
            deliver: true,
            sent: Mutex::new(Vec::new()),
            acks: Mutex::new(Vec::new()),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            deliver: false,
            sent: Mutex::new(Vec::new()),
            acks: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_message(&self, chat_id: &str, message: &OutboundMessage) -> bool {
        self.sent.lock().await.push(SentMessage {
            chat_id: chat_id.to_string(),
            message: message.clone(),
        });
        self.deliver
    }

    async fn acknowledge_callback(
        &self,
        callback_id: &str,
        text: Option<&str>,
        urgent: bool,
    ) -> bool {
        self.acks
            .lock()
            .await
            .push((callback_id.to_string(), text.map(str::to_string), urgent));
        self.deliver
    }
}
