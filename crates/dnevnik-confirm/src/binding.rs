//! Binding Token Manager.
//!
//! Issues one-time tokens that link an external chat identity to a user
//! account, and redeems them. Issuing is an upsert keyed by chat id;
//! redemption is funneled through the store's atomic claim so that of two
//! concurrent redemptions of the same token exactly one succeeds.

use std::sync::Arc;

use dnevnik_notify::{Notifier, OutboundMessage};
use dnevnik_shared::constants::APP_NAME;
use dnevnik_shared::token;
use dnevnik_store::{ChatBinding, StoreError};

use crate::audit::{event, events, AuditRecorder};
use crate::error::{BindError, ConfirmError};
use crate::SharedDb;

/// What a successful redemption tells the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindOutcome {
    pub chat_id: String,
    pub display_name: Option<String>,
}

/// Issues and redeems chat-binding tokens.
#[derive(Clone)]
pub struct BindingManager {
    db: SharedDb,
    notifier: Arc<dyn Notifier>,
    audit: AuditRecorder,
}

impl BindingManager {
    pub fn new(db: SharedDb, notifier: Arc<dyn Notifier>, audit: AuditRecorder) -> Self {
        Self { db, notifier, audit }
    }

    /// Issue (or reissue) a binding token for an external chat and attempt
    /// to deliver it there.
    ///
    /// Delivery failure is not an error: the binding is persisted either
    /// way and the outcome is only reflected in the audit trail.
    pub async fn issue_token_for_chat(
        &self,
        chat_id: &str,
        display_name: Option<&str>,
    ) -> Result<ChatBinding, ConfirmError> {
        let token = token::generate();

        let binding = {
            let db = self.db.lock().await;
            db.upsert_chat_token(chat_id, &token, display_name)?
        };

        let message = OutboundMessage::text(format!(
            "{APP_NAME} binding token:\n\n{token}\n\nPaste it into the \"Link Telegram\" form on the site.",
        ));
        let delivered = self.notifier.send_message(chat_id, &message).await;

        let event_type = if delivered {
            events::TOKEN_SENT
        } else {
            tracing::warn!(chat_id, "binding token could not be delivered");
            events::TOKEN_SEND_FAILED
        };
        self.audit
            .record(event(
                binding.user_id,
                event_type,
                None,
                serde_json::json!({ "chat_id": chat_id }),
            ))
            .await;

        Ok(binding)
    }

    /// Redeem a binding token on behalf of a user.
    ///
    /// Exactly one of two concurrent redemptions of the same token can
    /// succeed; the loser observes [`BindError::AlreadyUsed`].
    pub async fn redeem_token(
        &self,
        user_id: i64,
        token_str: &str,
    ) -> Result<BindOutcome, BindError> {
        if !token::is_valid_format(token_str) {
            return Err(BindError::InvalidFormat);
        }

        let bound = {
            let db = self.db.lock().await;

            match db.get_binding_by_token(token_str) {
                Ok(existing) if existing.is_bound() => return Err(BindError::AlreadyUsed),
                Ok(_) => {}
                Err(StoreError::NotFound) => return Err(BindError::NotFound),
                Err(e) => return Err(BindError::Store(e)),
            }

            // The guarded update decides the winner; losing the race after
            // the lookup above surfaces as an already-used token.
            let Some(bound) = db
                .claim_binding(token_str, user_id)
                .map_err(BindError::Store)?
            else {
                return Err(BindError::AlreadyUsed);
            };

            db.set_user_chat_id(user_id, Some(&bound.chat_id))
                .map_err(BindError::Store)?;
            bound
        };

        self.audit
            .record(event(
                Some(user_id),
                events::BIND_SUCCESS,
                None,
                serde_json::json!({ "chat_id": bound.chat_id }),
            ))
            .await;

        Ok(BindOutcome {
            chat_id: bound.chat_id,
            display_name: bound.display_name,
        })
    }

    /// Remove every binding owned by a user and clear the user's linked
    /// chat id. Returns how many bindings were removed.
    pub async fn unbind_all_for_user(&self, user_id: i64) -> Result<usize, ConfirmError> {
        let removed = {
            let db = self.db.lock().await;
            let removed = db.delete_bindings_for_user(user_id)?;
            db.set_user_chat_id(user_id, None)?;
            removed
        };

        self.audit
            .record(event(
                Some(user_id),
                events::UNBIND,
                None,
                serde_json::json!({ "removed": removed }),
            ))
            .await;

        Ok(removed)
    }
}
