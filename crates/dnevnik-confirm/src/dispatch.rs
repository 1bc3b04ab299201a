//! Callback Dispatcher.
//!
//! Interprets inbound updates from the external messaging channel and
//! routes them: a `/start` message asks the Binding Token Manager for a
//! fresh token, an `action:token` button press settles a pending login
//! verification, and anything else is acknowledged as a no-op. The
//! dispatcher always produces an [`Ack`]; it never raises on unrecognized
//! or malformed input.

use std::sync::Arc;

use dnevnik_notify::Notifier;
use dnevnik_shared::constants::{ACTION_CONFIRM_LOGIN, ACTION_DENY_LOGIN};
use dnevnik_shared::protocol::{Ack, CallbackQuery, InboundMessage, InboundUpdate};

use crate::binding::BindingManager;
use crate::login::{Decision, LoginConfirmations};

/// Outcome text sent back through the channel after a settled login.
const TEXT_CONFIRMED: &str = "Login approved.";
const TEXT_DENIED: &str = "Login denied.";
const TEXT_TOO_LATE: &str = "This confirmation has expired or was already used.";
const TEXT_UNRECOGNIZED: &str = "Unrecognized action.";

/// Routes inbound updates to the token manager and the state machine.
#[derive(Clone)]
pub struct Dispatcher {
    bindings: BindingManager,
    logins: LoginConfirmations,
    notifier: Arc<dyn Notifier>,
}

impl Dispatcher {
    pub fn new(
        bindings: BindingManager,
        logins: LoginConfirmations,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            bindings,
            logins,
            notifier,
        }
    }

    /// Handle one inbound update. Infallible by contract.
    pub async fn dispatch(&self, update: InboundUpdate) -> Ack {
        if let Some(callback) = update.callback_query.clone() {
            return self.handle_callback(callback).await;
        }
        if let Some(message) = update.message() {
            return self.handle_message(message).await;
        }
        Ack::ok("ignored")
    }

    async fn handle_message(&self, message: &InboundMessage) -> Ack {
        let Some(text) = message.text.as_deref() else {
            return Ack::ok("ignored");
        };
        if !text.trim().starts_with("/start") {
            return Ack::ok("ignored");
        }

        let chat_id = message.chat.id.to_string();
        match self
            .bindings
            .issue_token_for_chat(&chat_id, message.chat.display_name())
            .await
        {
            Ok(_) => Ack::ok("binding token issued"),
            Err(e) => {
                tracing::error!(chat_id, error = %e, "failed to issue binding token");
                Ack::error("failed to issue binding token")
            }
        }
    }

    async fn handle_callback(&self, callback: CallbackQuery) -> Ack {
        let Some((decision, token)) = callback.data.as_deref().and_then(parse_callback_data)
        else {
            // Malformed payload: acknowledged as an error and dropped.
            self.notifier
                .acknowledge_callback(&callback.id, Some(TEXT_UNRECOGNIZED), false)
                .await;
            return Ack::error("malformed callback payload");
        };

        match self.logins.transition(&token, decision).await {
            Ok(true) => {
                let text = match decision {
                    Decision::Confirm => TEXT_CONFIRMED,
                    Decision::Deny => TEXT_DENIED,
                };
                self.notifier
                    .acknowledge_callback(&callback.id, Some(text), false)
                    .await;
                Ack::ok(text)
            }
            Ok(false) => {
                self.notifier
                    .acknowledge_callback(&callback.id, Some(TEXT_TOO_LATE), true)
                    .await;
                Ack::ok(TEXT_TOO_LATE)
            }
            Err(e) => {
                tracing::error!(error = %e, "login transition failed");
                self.notifier
                    .acknowledge_callback(&callback.id, Some(TEXT_TOO_LATE), true)
                    .await;
                Ack::error("confirmation unavailable")
            }
        }
    }
}

/// Split `action:token` callback data into a decision and its token.
fn parse_callback_data(data: &str) -> Option<(Decision, String)> {
    let (action, token) = data.split_once(':')?;
    let decision = match action {
        ACTION_CONFIRM_LOGIN => Decision::Confirm,
        ACTION_DENY_LOGIN => Decision::Deny,
        _ => return None,
    };
    if token.is_empty() {
        return None;
    }
    Some((decision, token.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use dnevnik_store::VerificationStatus;

    use crate::audit::AuditRecorder;
    use crate::testutil::{fresh_db, RecordingNotifier};
    use crate::SharedDb;

    fn dispatcher(db: &SharedDb, notifier: Arc<RecordingNotifier>) -> Dispatcher {
        let audit = AuditRecorder::new(db.clone());
        let bindings = BindingManager::new(db.clone(), notifier.clone(), audit.clone());
        let logins = LoginConfirmations::new(db.clone(), notifier.clone(), audit);
        Dispatcher::new(bindings, logins, notifier)
    }

    fn message_update(chat_id: i64, text: &str) -> InboundUpdate {
        serde_json::from_value(serde_json::json!({
            "message": {
                "chat": {"id": chat_id, "username": "ivan"},
                "text": text,
            }
        }))
        .unwrap()
    }

    fn callback_update(data: Option<&str>) -> InboundUpdate {
        serde_json::from_value(serde_json::json!({
            "callback_query": {
                "id": "cb-1",
                "data": data,
            }
        }))
        .unwrap()
    }

    #[test]
    fn parses_well_formed_callback_data() {
        assert_eq!(
            parse_callback_data("confirm_login:tok123456"),
            Some((Decision::Confirm, "tok123456".to_string()))
        );
        assert_eq!(
            parse_callback_data("deny_login:tok123456"),
            Some((Decision::Deny, "tok123456".to_string()))
        );
        assert_eq!(parse_callback_data("confirm_login:"), None);
        assert_eq!(parse_callback_data("confirm_login"), None);
        assert_eq!(parse_callback_data("delete_account:tok"), None);
    }

    #[tokio::test]
    async fn start_message_issues_a_binding_token() {
        let db = fresh_db();
        let notifier = RecordingNotifier::delivering();
        let dispatcher = dispatcher(&db, notifier.clone());

        let ack = dispatcher.dispatch(message_update(100, "/start")).await;
        assert!(ack.ok);

        let binding = { db.lock().await.get_binding_by_chat("100").unwrap() };
        assert_eq!(binding.display_name.as_deref(), Some("ivan"));
        assert_eq!(notifier.sent.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn non_command_messages_are_ignored() {
        let db = fresh_db();
        let dispatcher = dispatcher(&db, RecordingNotifier::delivering());

        let ack = dispatcher.dispatch(message_update(100, "hello there")).await;
        assert_eq!(ack, Ack::ok("ignored"));
        assert!({ db.lock().await.get_binding_by_chat("100").is_err() });
    }

    #[tokio::test]
    async fn empty_update_is_a_noop() {
        let db = fresh_db();
        let dispatcher = dispatcher(&db, RecordingNotifier::delivering());
        let ack = dispatcher.dispatch(InboundUpdate::default()).await;
        assert_eq!(ack, Ack::ok("ignored"));
    }

    #[tokio::test]
    async fn confirm_callback_settles_the_verification() {
        let db = fresh_db();
        let notifier = RecordingNotifier::delivering();
        let dispatcher = dispatcher(&db, notifier.clone());

        let user = {
            let db = db.lock().await;
            let user = db.create_user("alice", None, true).unwrap();
            db.set_user_chat_id(user.id, Some("100")).unwrap();
            db.get_user(user.id).unwrap()
        };
        let verification = dispatcher
            .logins
            .create_challenge(&user, "10.0.0.9", Duration::minutes(5))
            .await
            .unwrap();

        let data = format!("confirm_login:{}", verification.token);
        let ack = dispatcher.dispatch(callback_update(Some(&data))).await;
        assert!(ack.ok);
        assert_eq!(ack.message, TEXT_CONFIRMED);

        assert_eq!(
            dispatcher.logins.query_status(&verification.token).await.unwrap(),
            Some(VerificationStatus::Confirmed)
        );
        // the sender was acknowledged
        let acks = notifier.acks.lock().await;
        assert_eq!(acks.len(), 1);
        assert_eq!(acks[0].1.as_deref(), Some(TEXT_CONFIRMED));
    }

    #[tokio::test]
    async fn second_callback_gets_the_too_late_ack() {
        let db = fresh_db();
        let notifier = RecordingNotifier::delivering();
        let dispatcher = dispatcher(&db, notifier.clone());

        let user = {
            let db = db.lock().await;
            let user = db.create_user("alice", None, true).unwrap();
            db.set_user_chat_id(user.id, Some("100")).unwrap();
            db.get_user(user.id).unwrap()
        };
        let verification = dispatcher
            .logins
            .create_challenge(&user, "10.0.0.9", Duration::minutes(5))
            .await
            .unwrap();

        let confirm = format!("confirm_login:{}", verification.token);
        let deny = format!("deny_login:{}", verification.token);
        dispatcher.dispatch(callback_update(Some(&confirm))).await;
        let ack = dispatcher.dispatch(callback_update(Some(&deny))).await;

        assert!(ack.ok);
        assert_eq!(ack.message, TEXT_TOO_LATE);
        // first decision stands
        assert_eq!(
            dispatcher.logins.query_status(&verification.token).await.unwrap(),
            Some(VerificationStatus::Confirmed)
        );
    }

    #[tokio::test]
    async fn malformed_callback_is_acked_as_error_without_state_change() {
        let db = fresh_db();
        let notifier = RecordingNotifier::delivering();
        let dispatcher = dispatcher(&db, notifier.clone());

        for data in [None, Some(""), Some("confirm_login"), Some("launch:tok")] {
            let ack = dispatcher.dispatch(callback_update(data)).await;
            assert!(!ack.ok);
        }
        // every malformed payload was acknowledged to the sender
        assert_eq!(notifier.acks.lock().await.len(), 4);
    }

    #[tokio::test]
    async fn unknown_token_callback_is_rejected_but_acked() {
        let db = fresh_db();
        let notifier = RecordingNotifier::delivering();
        let dispatcher = dispatcher(&db, notifier.clone());

        let ack = dispatcher
            .dispatch(callback_update(Some("confirm_login:tok-unknown99")))
            .await;
        assert!(ack.ok);
        assert_eq!(ack.message, TEXT_TOO_LATE);
    }
}
