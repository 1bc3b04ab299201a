//! Login Verification State Machine.
//!
//! Decides when a login needs out-of-band confirmation, creates pending
//! verification records, and settles them. The state machine is
//!
//! ```text
//! pending -[confirm]-> confirmed
//! pending -[deny]----> denied
//! pending -[overdue]-> expired
//! ```
//!
//! with no edge out of a terminal state. The three outgoing edges race;
//! the store's guarded update picks exactly one winner. Expiry is lazy:
//! every creation and status query sweeps overdue pending records, and
//! [`LoginConfirmations::transition`] enforces the deadline independently,
//! so no background timer is needed for correctness.

use std::sync::Arc;

use chrono::{Duration, Utc};

use dnevnik_notify::{Notifier, OutboundMessage};
use dnevnik_shared::constants::{ACTION_CONFIRM_LOGIN, ACTION_DENY_LOGIN, APP_NAME};
use dnevnik_shared::token;
use dnevnik_store::{
    LoginVerification, StoreError, User, VerificationKind, VerificationStatus,
};

use crate::audit::{event, events, AuditRecorder};
use crate::error::{ConfirmError, FinalizeError};
use crate::SharedDb;

/// The two ways a callback can settle a pending verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Deny,
}

impl Decision {
    /// The terminal status this decision lands in.
    pub fn status(self) -> VerificationStatus {
        match self {
            Decision::Confirm => VerificationStatus::Confirmed,
            Decision::Deny => VerificationStatus::Denied,
        }
    }

    fn audit_event(self) -> &'static str {
        match self {
            Decision::Confirm => events::LOGIN_CONFIRMED,
            Decision::Deny => events::LOGIN_DENIED,
        }
    }
}

/// Creates, settles, and reads out-of-band login confirmations.
#[derive(Clone)]
pub struct LoginConfirmations {
    db: SharedDb,
    notifier: Arc<dyn Notifier>,
    audit: AuditRecorder,
}

impl LoginConfirmations {
    pub fn new(db: SharedDb, notifier: Arc<dyn Notifier>, audit: AuditRecorder) -> Self {
        Self { db, notifier, audit }
    }

    /// Whether a login attempt from `origin_addr` needs confirmation.
    ///
    /// True only when the user opted in, has a bound chat identity, and
    /// the origin differs from the last recorded successful-login origin.
    /// A user with no recorded origin is never challenged; the first login
    /// from any origin is trusted.
    pub fn should_challenge(&self, user: &User, origin_addr: &str) -> bool {
        if !user.two_factor_enabled || !user.has_bound_chat() {
            return false;
        }
        match user.last_login_addr.as_deref() {
            None => false,
            Some(last) => last != origin_addr,
        }
    }

    /// Create a pending verification for a login attempt and prompt the
    /// user's bound chat identity to approve or deny it.
    ///
    /// Failure to deliver the prompt is not fatal: the record stays
    /// pending and redeemable, and the audit trail reflects the failed
    /// delivery so the caller can offer a fallback.
    pub async fn create_challenge(
        &self,
        user: &User,
        origin_addr: &str,
        ttl: Duration,
    ) -> Result<LoginVerification, ConfirmError> {
        let token = token::generate();

        let verification = {
            let db = self.db.lock().await;
            let now = Utc::now();

            let swept = db.expire_overdue_verifications(now)?;
            if swept > 0 {
                tracing::debug!(swept, "expired overdue login verifications");
            }

            db.create_verification(
                user.id,
                &token,
                VerificationKind::Login,
                Some(origin_addr),
                now + ttl,
            )?
        };

        let delivered = match user.telegram_chat_id.as_deref() {
            Some(chat_id) => {
                let prompt = OutboundMessage::text(format!(
                    "{APP_NAME}: login attempt from {origin_addr}.\nApprove it?",
                ))
                .with_action("Approve", format!("{ACTION_CONFIRM_LOGIN}:{token}"))
                .with_action("Deny", format!("{ACTION_DENY_LOGIN}:{token}"));
                self.notifier.send_message(chat_id, &prompt).await
            }
            None => false,
        };

        let event_type = if delivered {
            events::LOGIN_REQUEST_SENT
        } else {
            tracing::warn!(
                user_id = user.id,
                origin = origin_addr,
                "login confirmation prompt could not be delivered"
            );
            events::LOGIN_REQUEST_SEND_FAILED
        };
        self.audit
            .record(event(
                Some(user.id),
                event_type,
                Some(origin_addr),
                serde_json::json!({ "expires_at": verification.expires_at.to_rfc3339() }),
            ))
            .await;

        Ok(verification)
    }

    /// Atomically settle the pending verification identified by `token_str`.
    ///
    /// Returns `true` only if the record was still pending and inside its
    /// ttl; in every other case (missing, settled, overdue) nothing is
    /// overwritten and the result is `false`. An overdue pending record is
    /// moved to `expired` as a side effect.
    pub async fn transition(
        &self,
        token_str: &str,
        decision: Decision,
    ) -> Result<bool, ConfirmError> {
        if !token::is_valid_format(token_str) {
            return Ok(false);
        }

        let (settled, record) = {
            let db = self.db.lock().await;
            db.record_verification_attempt(token_str)?;
            let settled = db.transition_if_pending(token_str, decision.status(), Utc::now())?;
            let record = match db.get_verification_by_token(token_str) {
                Ok(v) => Some(v),
                Err(StoreError::NotFound) => None,
                Err(e) => return Err(e.into()),
            };
            (settled, record)
        };

        if settled {
            // The record is present: the transition just wrote it.
            let record = record.as_ref();
            self.audit
                .record(event(
                    record.map(|v| v.user_id),
                    decision.audit_event(),
                    record.and_then(|v| v.origin_addr.as_deref()),
                    serde_json::json!({}),
                ))
                .await;
        } else {
            self.audit
                .record(event(
                    record.as_ref().map(|v| v.user_id),
                    events::LOGIN_CALLBACK_REJECTED,
                    record.as_ref().and_then(|v| v.origin_addr.as_deref()),
                    serde_json::json!({
                        "requested": decision.status().as_str(),
                        "found": record.as_ref().map(|v| v.status.as_str()),
                    }),
                ))
                .await;
        }

        Ok(settled)
    }

    /// Current status of a verification, after the lazy-expiry sweep.
    /// `None` means no such token exists.
    pub async fn query_status(
        &self,
        token_str: &str,
    ) -> Result<Option<VerificationStatus>, ConfirmError> {
        if !token::is_valid_format(token_str) {
            return Ok(None);
        }

        let db = self.db.lock().await;
        db.expire_overdue_verifications(Utc::now())?;
        match db.get_verification_by_token(token_str) {
            Ok(v) => Ok(Some(v.status)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Load the owner of a confirmed verification so the caller can finish
    /// establishing the session.
    ///
    /// Read-only: `confirmed` is terminal, so repeating this call is safe.
    pub async fn finalize(&self, token_str: &str) -> Result<User, FinalizeError> {
        if !token::is_valid_format(token_str) {
            return Err(FinalizeError::NotConfirmed);
        }

        let db = self.db.lock().await;
        let verification = match db.get_verification_by_token(token_str) {
            Ok(v) => v,
            Err(StoreError::NotFound) => return Err(FinalizeError::NotConfirmed),
            Err(e) => return Err(FinalizeError::Store(e)),
        };
        if verification.status != VerificationStatus::Confirmed {
            return Err(FinalizeError::NotConfirmed);
        }

        match db.get_user(verification.user_id) {
            Ok(user) => Ok(user),
            Err(StoreError::NotFound) => Err(FinalizeError::UserNotFound),
            Err(e) => Err(FinalizeError::Store(e)),
        }
    }
}
