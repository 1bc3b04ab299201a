//! CRUD operations for [`ChatBinding`] records.
//!
//! The binding table has upsert semantics keyed by `chat_id`: reissuing a
//! token for a chat replaces the token in place, and an already-bound chat
//! keeps its owner. Claiming a token is a single conditional `UPDATE`
//! guarded by `user_id IS NULL`, so of two racing redemptions exactly one
//! observes an affected row.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::ChatBinding;

impl Database {
    // ------------------------------------------------------------------
    // Upsert
    // ------------------------------------------------------------------

    /// Insert or refresh the binding row for an external chat.
    ///
    /// A new chat gets a fresh unbound row. An existing row gets the new
    /// token and (if reported) display name while keeping `user_id` and
    /// `bound_at` untouched, so reissuing never unbinds anyone.
    pub fn upsert_chat_token(
        &self,
        chat_id: &str,
        token: &str,
        display_name: Option<&str>,
    ) -> Result<ChatBinding> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO chat_bindings (chat_id, token, display_name, created_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(chat_id) DO UPDATE SET
                 token = excluded.token,
                 display_name = COALESCE(excluded.display_name, display_name)",
            params![chat_id, token, display_name, now.to_rfc3339()],
        )?;
        self.get_binding_by_chat(chat_id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a binding by its one-time token.
    pub fn get_binding_by_token(&self, token: &str) -> Result<ChatBinding> {
        self.conn()
            .query_row(
                "SELECT id, chat_id, token, user_id, display_name, created_at, bound_at
                 FROM chat_bindings WHERE token = ?1",
                params![token],
                row_to_binding,
            )
            .map_err(not_found)
    }

    /// Fetch a binding by its external chat id.
    pub fn get_binding_by_chat(&self, chat_id: &str) -> Result<ChatBinding> {
        self.conn()
            .query_row(
                "SELECT id, chat_id, token, user_id, display_name, created_at, bound_at
                 FROM chat_bindings WHERE chat_id = ?1",
                params![chat_id],
                row_to_binding,
            )
            .map_err(not_found)
    }

    // ------------------------------------------------------------------
    // Claim (atomic)
    // ------------------------------------------------------------------

    /// Atomically bind a token to a user.
    ///
    /// The write is guarded by `user_id IS NULL`; if another caller claimed
    /// the token first (or it was never issued) this returns `Ok(None)` and
    /// nothing is modified.
    pub fn claim_binding(&self, token: &str, user_id: i64) -> Result<Option<ChatBinding>> {
        let now = Utc::now();
        let affected = self.conn().execute(
            "UPDATE chat_bindings
             SET user_id = ?1, bound_at = ?2
             WHERE token = ?3 AND user_id IS NULL",
            params![user_id, now.to_rfc3339(), token],
        )?;

        if affected == 0 {
            return Ok(None);
        }
        self.get_binding_by_token(token).map(Some)
    }

    // ------------------------------------------------------------------
    // Delete
    // ------------------------------------------------------------------

    /// Remove every binding owned by a user. Returns the number removed.
    pub fn delete_bindings_for_user(&self, user_id: i64) -> Result<usize> {
        let affected = self.conn().execute(
            "DELETE FROM chat_bindings WHERE user_id = ?1",
            params![user_id],
        )?;
        Ok(affected)
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

/// Map a `rusqlite::Row` to a [`ChatBinding`].
fn row_to_binding(row: &rusqlite::Row<'_>) -> rusqlite::Result<ChatBinding> {
    let created_str: String = row.get(5)?;
    let bound_str: Option<String> = row.get(6)?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    let bound_at = bound_str
        .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(ChatBinding {
        id: row.get(0)?,
        chat_id: row.get(1)?,
        token: row.get(2)?,
        user_id: row.get(3)?,
        display_name: row.get(4)?,
        created_at,
        bound_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_replaces_token_for_unbound_chat() {
        let db = Database::open_in_memory().unwrap();

        let first = db.upsert_chat_token("100", "token-aaaa", Some("ivan")).unwrap();
        let second = db.upsert_chat_token("100", "token-bbbb", None).unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.token, "token-bbbb");
        // display name survives a reissue that reports none
        assert_eq!(second.display_name.as_deref(), Some("ivan"));

        // old token is gone
        assert!(matches!(
            db.get_binding_by_token("token-aaaa"),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn upsert_preserves_owner_for_bound_chat() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ivan", None, true).unwrap();

        db.upsert_chat_token("100", "token-aaaa", None).unwrap();
        db.claim_binding("token-aaaa", user.id).unwrap().unwrap();

        let reissued = db.upsert_chat_token("100", "token-bbbb", None).unwrap();
        assert_eq!(reissued.user_id, Some(user.id));
        assert!(reissued.bound_at.is_some());
    }

    #[test]
    fn claim_succeeds_once() {
        let db = Database::open_in_memory().unwrap();
        let alice = db.create_user("alice", None, true).unwrap();
        let bob = db.create_user("bob", None, true).unwrap();

        db.upsert_chat_token("100", "token-aaaa", None).unwrap();

        let won = db.claim_binding("token-aaaa", alice.id).unwrap();
        assert_eq!(won.unwrap().user_id, Some(alice.id));

        // second claim loses, owner unchanged
        assert!(db.claim_binding("token-aaaa", bob.id).unwrap().is_none());
        assert_eq!(
            db.get_binding_by_token("token-aaaa").unwrap().user_id,
            Some(alice.id)
        );
    }

    #[test]
    fn claim_of_unknown_token_is_none() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ivan", None, true).unwrap();
        assert!(db.claim_binding("no-such-token", user.id).unwrap().is_none());
    }

    #[test]
    fn delete_bindings_for_user_counts_rows() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ivan", None, true).unwrap();

        db.upsert_chat_token("100", "token-aaaa", None).unwrap();
        db.claim_binding("token-aaaa", user.id).unwrap().unwrap();

        assert_eq!(db.delete_bindings_for_user(user.id).unwrap(), 1);
        assert_eq!(db.delete_bindings_for_user(user.id).unwrap(), 0);
    }
}
