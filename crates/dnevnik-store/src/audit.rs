//! Append-only storage for [`AuditEvent`] records.

use chrono::{DateTime, Utc};
use rusqlite::params;

use crate::database::Database;
use crate::error::Result;
use crate::models::{AuditEvent, NewAuditEvent};

impl Database {
    /// Append an audit event. Returns the assigned id.
    pub fn insert_audit_event(&self, event: &NewAuditEvent) -> Result<i64> {
        let now = Utc::now();
        self.conn().execute(
            "INSERT INTO audit_events
                 (user_id, event_type, origin_addr, client_info, details, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.user_id,
                event.event_type,
                event.origin_addr,
                event.client_info,
                event.details,
                now.to_rfc3339(),
            ],
        )?;
        Ok(self.conn().last_insert_rowid())
    }

    /// List a user's audit events, most recent first.
    pub fn audit_events_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<AuditEvent>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, user_id, event_type, origin_addr, client_info, details, created_at
             FROM audit_events
             WHERE user_id = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![user_id, limit], row_to_audit_event)?;

        let mut events = Vec::new();
        for row in rows {
            events.push(row?);
        }
        Ok(events)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Map a `rusqlite::Row` to an [`AuditEvent`].
fn row_to_audit_event(row: &rusqlite::Row<'_>) -> rusqlite::Result<AuditEvent> {
    let created_str: String = row.get(6)?;
    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(6, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(AuditEvent {
        id: row.get(0)?,
        user_id: row.get(1)?,
        event_type: row.get(2)?,
        origin_addr: row.get(3)?,
        client_info: row.get(4)?,
        details: row.get(5)?,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_list_most_recent_first() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ivan", None, true).unwrap();

        for i in 0..3 {
            db.insert_audit_event(&NewAuditEvent {
                user_id: Some(user.id),
                event_type: format!("event_{i}"),
                ..Default::default()
            })
            .unwrap();
        }

        let events = db.audit_events_for_user(user.id, 10).unwrap();
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event_type, "event_2");
        assert_eq!(events[2].event_type, "event_0");
    }

    #[test]
    fn limit_is_respected() {
        let db = Database::open_in_memory().unwrap();
        let user = db.create_user("ivan", None, true).unwrap();

        for i in 0..5 {
            db.insert_audit_event(&NewAuditEvent {
                user_id: Some(user.id),
                event_type: format!("event_{i}"),
                ..Default::default()
            })
            .unwrap();
        }

        assert_eq!(db.audit_events_for_user(user.id, 2).unwrap().len(), 2);
    }

    #[test]
    fn events_without_user_are_accepted() {
        let db = Database::open_in_memory().unwrap();
        let id = db
            .insert_audit_event(&NewAuditEvent {
                user_id: None,
                event_type: "token_send_failed".into(),
                details: Some(r#"{"chat_id":"100"}"#.into()),
                ..Default::default()
            })
            .unwrap();
        assert!(id > 0);
    }
}
