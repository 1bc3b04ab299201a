//! CRUD and transition operations for [`LoginVerification`] records.
//!
//! The transition primitive is a single `UPDATE` scoped by token, the
//! `pending` status, and the expiry timestamp. Of two callers racing on the
//! same token, exactly one sees an affected row; a pending record past its
//! expiry is moved to `expired` under the same guard instead. No plain
//! read-modify-write exists anywhere on this table.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{LoginVerification, VerificationKind, VerificationStatus};

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a fresh pending verification and return it with its id.
    pub fn create_verification(
        &self,
        user_id: i64,
        token: &str,
        kind: VerificationKind,
        origin_addr: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<LoginVerification> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO login_verifications
                 (user_id, token, kind, status, origin_addr, created_at, expires_at, attempts)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5, ?6, 0)",
            params![
                user_id,
                token,
                kind.as_str(),
                origin_addr,
                now.to_rfc3339(),
                expires_at.to_rfc3339(),
            ],
        )?;
        self.get_verification_by_token(token)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a verification by its token.
    pub fn get_verification_by_token(&self, token: &str) -> Result<LoginVerification> {
        self.conn()
            .query_row(
                "SELECT id, user_id, token, kind, status, origin_addr,
                        created_at, expires_at, attempts
                 FROM login_verifications WHERE token = ?1",
                params![token],
                row_to_verification,
            )
            .map_err(not_found)
    }

    // ------------------------------------------------------------------
    // Lazy expiry sweep
    // ------------------------------------------------------------------

    /// Move every overdue pending record to `expired`, system-wide.
    ///
    /// Called opportunistically on every creation and status query; there
    /// is no background sweeper correctness depends on.
    pub fn expire_overdue_verifications(&self, now: DateTime<Utc>) -> Result<usize> {
        let affected = self.conn().execute(
            "UPDATE login_verifications
             SET status = 'expired'
             WHERE status = 'pending' AND expires_at <= ?1",
            params![now.to_rfc3339()],
        )?;
        Ok(affected)
    }

    // ------------------------------------------------------------------
    // Transition (atomic)
    // ------------------------------------------------------------------

    /// Atomically settle a pending verification.
    ///
    /// Returns `true` only when the record existed, was still `pending`,
    /// and had not passed its expiry: in that case its status is now
    /// `new_status`. A pending-but-overdue record is moved to `expired`
    /// instead and the call returns `false`. A missing or already-settled
    /// record returns `false` without modifying anything.
    pub fn transition_if_pending(
        &self,
        token: &str,
        new_status: VerificationStatus,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let now_str = now.to_rfc3339();

        let affected = self.conn().execute(
            "UPDATE login_verifications
             SET status = ?1
             WHERE token = ?2 AND status = 'pending' AND expires_at > ?3",
            params![new_status.as_str(), token, now_str],
        )?;
        if affected > 0 {
            return Ok(true);
        }

        // The record was missing, already settled, or overdue. Only the
        // overdue-pending case needs a write; the same guard keeps this a
        // no-op for the others.
        self.conn().execute(
            "UPDATE login_verifications
             SET status = 'expired'
             WHERE token = ?1 AND status = 'pending' AND expires_at <= ?2",
            params![token, now_str],
        )?;
        Ok(false)
    }

    /// Count a callback attempt against a verification, whatever its state.
    pub fn record_verification_attempt(&self, token: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE login_verifications SET attempts = attempts + 1 WHERE token = ?1",
            params![token],
        )?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn not_found(e: rusqlite::Error) -> StoreError {
    match e {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        other => StoreError::Sqlite(other),
    }
}

/// Map a `rusqlite::Row` to a [`LoginVerification`].
fn row_to_verification(row: &rusqlite::Row<'_>) -> rusqlite::Result<LoginVerification> {
    let kind_str: String = row.get(3)?;
    let status_str: String = row.get(4)?;
    let created_str: String = row.get(6)?;
    let expires_str: String = row.get(7)?;

    let kind = VerificationKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown verification kind: {kind_str}").into(),
        )
    })?;
    let status = VerificationStatus::parse(&status_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            rusqlite::types::Type::Text,
            format!("unknown verification status: {status_str}").into(),
        )
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;
    let expires_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&expires_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(LoginVerification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        token: row.get(2)?,
        kind,
        status,
        origin_addr: row.get(5)?,
        created_at,
        expires_at,
        attempts: row.get(8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db_with_user() -> (Database, i64) {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ivan", None, true).unwrap();
        (db, user.id)
    }

    #[test]
    fn create_and_fetch() {
        let (db, user_id) = db_with_user();
        let expires = Utc::now() + Duration::minutes(5);
        let verif = db
            .create_verification(user_id, "tok-12345678", VerificationKind::Login, Some("10.0.0.9"), expires)
            .unwrap();

        assert_eq!(verif.status, VerificationStatus::Pending);
        assert_eq!(verif.origin_addr.as_deref(), Some("10.0.0.9"));
        assert_eq!(verif.attempts, 0);

        let fetched = db.get_verification_by_token("tok-12345678").unwrap();
        assert_eq!(fetched, verif);
    }

    #[test]
    fn transition_settles_pending_exactly_once() {
        let (db, user_id) = db_with_user();
        let expires = Utc::now() + Duration::minutes(5);
        db.create_verification(user_id, "tok-12345678", VerificationKind::Login, None, expires)
            .unwrap();

        let now = Utc::now();
        assert!(db
            .transition_if_pending("tok-12345678", VerificationStatus::Confirmed, now)
            .unwrap());
        // already terminal: every further transition is a no-op
        assert!(!db
            .transition_if_pending("tok-12345678", VerificationStatus::Denied, now)
            .unwrap());
        assert_eq!(
            db.get_verification_by_token("tok-12345678").unwrap().status,
            VerificationStatus::Confirmed
        );
    }

    #[test]
    fn transition_on_overdue_pending_expires_it() {
        let (db, user_id) = db_with_user();
        let expires = Utc::now() - Duration::seconds(1);
        db.create_verification(user_id, "tok-12345678", VerificationKind::Login, None, expires)
            .unwrap();

        let ok = db
            .transition_if_pending("tok-12345678", VerificationStatus::Confirmed, Utc::now())
            .unwrap();
        assert!(!ok);
        assert_eq!(
            db.get_verification_by_token("tok-12345678").unwrap().status,
            VerificationStatus::Expired
        );
    }

    #[test]
    fn transition_on_missing_token_is_a_noop() {
        let (db, _) = db_with_user();
        assert!(!db
            .transition_if_pending("no-such-token", VerificationStatus::Confirmed, Utc::now())
            .unwrap());
    }

    #[test]
    fn sweep_expires_only_overdue_pending() {
        let (db, user_id) = db_with_user();
        let now = Utc::now();

        db.create_verification(user_id, "tok-overdue1", VerificationKind::Login, None, now - Duration::seconds(10))
            .unwrap();
        db.create_verification(user_id, "tok-current1", VerificationKind::Login, None, now + Duration::minutes(5))
            .unwrap();
        db.create_verification(user_id, "tok-settled1", VerificationKind::Login, None, now - Duration::seconds(10))
            .unwrap();
        db.conn()
            .execute(
                "UPDATE login_verifications SET status = 'denied' WHERE token = 'tok-settled1'",
                [],
            )
            .unwrap();

        assert_eq!(db.expire_overdue_verifications(now).unwrap(), 1);
        assert_eq!(
            db.get_verification_by_token("tok-overdue1").unwrap().status,
            VerificationStatus::Expired
        );
        assert_eq!(
            db.get_verification_by_token("tok-current1").unwrap().status,
            VerificationStatus::Pending
        );
        assert_eq!(
            db.get_verification_by_token("tok-settled1").unwrap().status,
            VerificationStatus::Denied
        );
    }

    #[test]
    fn attempts_are_counted() {
        let (db, user_id) = db_with_user();
        db.create_verification(user_id, "tok-12345678", VerificationKind::Login, None, Utc::now() + Duration::minutes(5))
            .unwrap();

        db.record_verification_attempt("tok-12345678").unwrap();
        db.record_verification_attempt("tok-12345678").unwrap();
        assert_eq!(db.get_verification_by_token("tok-12345678").unwrap().attempts, 2);
    }
}
