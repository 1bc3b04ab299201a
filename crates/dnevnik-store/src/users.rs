//! CRUD operations for [`User`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    // ------------------------------------------------------------------
    // Create
    // ------------------------------------------------------------------

    /// Insert a new user and return it with its assigned id.
    pub fn create_user(
        &self,
        username: &str,
        display_name: Option<&str>,
        two_factor_enabled: bool,
    ) -> Result<User> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO users (username, display_name, two_factor_enabled, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![username, display_name, two_factor_enabled, now.to_rfc3339()],
        )?;
        let id = self.conn().last_insert_rowid();
        self.get_user(id)
    }

    // ------------------------------------------------------------------
    // Read
    // ------------------------------------------------------------------

    /// Fetch a single user by id.
    pub fn get_user(&self, id: i64) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, display_name, two_factor_enabled,
                        telegram_chat_id, last_login_addr, created_at
                 FROM users WHERE id = ?1",
                params![id],
                row_to_user,
            )
            .map_err(not_found)
    }

    /// Fetch a single user by username.
    pub fn get_user_by_username(&self, username: &str) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, username, display_name, two_factor_enabled,
                        telegram_chat_id, last_login_addr, created_at
                 FROM users WHERE username = ?1",
                params![username],
                row_to_user,
            )
            .map_err(not_found)
    }

    // ------------------------------------------------------------------
    // Update
    // ------------------------------------------------------------------

    /// Set or clear the user's bound external chat id.
    pub fn set_user_chat_id(&self, user_id: i64, chat_id: Option<&str>) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET telegram_chat_id = ?1 WHERE id = ?2",
            params![chat_id, user_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Record the origin address of a successful login.
    pub fn set_last_login_addr(&self, user_id: i64, addr: &str) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET last_login_addr = ?1 WHERE id = ?2",
            params![addr, user_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Toggle out-of-band login confirmation for a user.
    pub fn set_two_factor_enabled(&self, user_id: i64, enabled: bool) -> Result<()> {
        let affected = self.conn().execute(
            "UPDATE users SET two_factor_enabled = ?1 WHERE id = ?2",
            params![enabled, user_id],
        )?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
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

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let created_str: String = row.get(6)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        display_name: row.get(2)?,
        two_factor_enabled: row.get(3)?,
        telegram_chat_id: row.get(4)?,
        last_login_addr: row.get(5)?,
        created_at,
    })
}
