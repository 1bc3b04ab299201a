//! Best-effort, append-only recording of security events.
//!
//! Every state-changing operation in the subsystem writes through
//! [`AuditRecorder::record`]. The write is fire-and-forget: a failure is
//! logged at `warn` and swallowed so it can never fail or roll back the
//! primary operation it describes.

use dnevnik_store::{AuditEvent, NewAuditEvent, StoreError};

use crate::SharedDb;

/// Well-known audit event types.
pub mod events {
    /// A binding token was delivered to its chat.
    pub const TOKEN_SENT: &str = "token_sent";
    /// A binding token was issued but delivery failed.
    pub const TOKEN_SEND_FAILED: &str = "token_send_failed";
    /// A binding token was redeemed and the account linked.
    pub const BIND_SUCCESS: &str = "bind_success";
    /// All bindings for a user were removed.
    pub const UNBIND: &str = "unbind";
    /// A login-confirmation prompt was delivered.
    pub const LOGIN_REQUEST_SENT: &str = "login_request_sent";
    /// A login-confirmation prompt could not be delivered.
    pub const LOGIN_REQUEST_SEND_FAILED: &str = "login_request_send_failed";
    /// A pending login was approved via callback.
    pub const LOGIN_CONFIRMED: &str = "login_confirmed";
    /// A pending login was denied via callback.
    pub const LOGIN_DENIED: &str = "login_denied";
    /// A callback arrived for a missing, settled, or expired verification.
    pub const LOGIN_CALLBACK_REJECTED: &str = "login_callback_rejected";
}

/// Write-only sink for security events, shared by every component.
#[derive(Clone)]
pub struct AuditRecorder {
    db: SharedDb,
}

impl AuditRecorder {
    pub fn new(db: SharedDb) -> Self {
        Self { db }
    }

    /// Append an event. Never fails from the caller's perspective.
    pub async fn record(&self, event: NewAuditEvent) {
        let db = self.db.lock().await;
        if let Err(e) = db.insert_audit_event(&event) {
            tracing::warn!(
                event_type = %event.event_type,
                error = %e,
                "failed to record audit event"
            );
        }
    }

    /// List a user's audit events, most recent first. Operator read path.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        limit: u32,
    ) -> Result<Vec<AuditEvent>, StoreError> {
        let db = self.db.lock().await;
        db.audit_events_for_user(user_id, limit)
    }
}

/// Shorthand for building an event with a JSON details payload.
pub(crate) fn event(
    user_id: Option<i64>,
    event_type: &str,
    origin_addr: Option<&str>,
    details: serde_json::Value,
) -> NewAuditEvent {
    NewAuditEvent {
        user_id,
        event_type: event_type.to_string(),
        origin_addr: origin_addr.map(str::to_string),
        client_info: None,
        details: Some(details.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::fresh_db;

    #[tokio::test]
    async fn record_then_list() {
        let db = fresh_db();
        let recorder = AuditRecorder::new(db.clone());

        let user = { db.lock().await.create_user("ivan", None, true).unwrap() };

        recorder
            .record(event(
                Some(user.id),
                events::BIND_SUCCESS,
                Some("10.0.0.5"),
                serde_json::json!({"chat_id": "100"}),
            ))
            .await;

        let listed = recorder.list_for_user(user.id, 10).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].event_type, events::BIND_SUCCESS);
        assert_eq!(listed[0].origin_addr.as_deref(), Some("10.0.0.5"));
    }

    #[tokio::test]
    async fn record_swallows_store_failures() {
        let db = fresh_db();
        let recorder = AuditRecorder::new(db.clone());

        // Sabotage the table; the write must not panic or error.
        {
            let db = db.lock().await;
            db.conn().execute_batch("DROP TABLE audit_events").unwrap();
        }

        recorder
            .record(event(None, events::TOKEN_SENT, None, serde_json::json!({})))
            .await;
    }
}
