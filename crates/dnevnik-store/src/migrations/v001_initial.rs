//! v001 -- Initial schema creation.
//!
//! Creates the four core tables: `users`, `chat_bindings`,
//! `login_verifications`, and `audit_events`.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users
--
-- Only the columns the confirmation subsystem reads and writes.
-- Credentials live elsewhere.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    username           TEXT NOT NULL UNIQUE,
    display_name       TEXT,
    two_factor_enabled INTEGER NOT NULL DEFAULT 0,   -- boolean 0/1
    telegram_chat_id   TEXT,                         -- bound external chat id
    last_login_addr    TEXT,                         -- last successful-login origin
    created_at         TEXT NOT NULL                 -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Chat bindings
--
-- At most one current row per external chat id; the token is
-- unique and consumed exactly once by setting user_id.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS chat_bindings (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    chat_id      TEXT NOT NULL UNIQUE,
    token        TEXT NOT NULL UNIQUE,
    user_id      INTEGER,                            -- NULL until bound
    display_name TEXT,
    created_at   TEXT NOT NULL,
    bound_at     TEXT,                               -- NULL until bound

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_chat_bindings_user ON chat_bindings(user_id);

-- ----------------------------------------------------------------
-- Login verifications
--
-- status: pending -> confirmed | denied | expired (one-way).
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS login_verifications (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER NOT NULL,
    token       TEXT NOT NULL UNIQUE,
    kind        TEXT NOT NULL DEFAULT 'login',
    status      TEXT NOT NULL DEFAULT 'pending',
    origin_addr TEXT,
    created_at  TEXT NOT NULL,
    expires_at  TEXT NOT NULL,
    attempts    INTEGER NOT NULL DEFAULT 0,

    FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_login_verifications_sweep
    ON login_verifications(status, expires_at);

-- ----------------------------------------------------------------
-- Audit events (append-only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS audit_events (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id     INTEGER,
    event_type  TEXT NOT NULL,
    origin_addr TEXT,
    client_info TEXT,
    details     TEXT,                                -- opaque JSON payload
    created_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_audit_events_user
    ON audit_events(user_id, created_at DESC);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
