// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket audit-trail operations.

use dineo_core::DineoError;
use rusqlite::params;

use crate::database::{Database, map_tr_err};
use crate::models::TicketLog;

/// Append an audit event for a ticket transition.
#[allow(clippy::too_many_arguments)]
pub async fn log_event(
    db: &Database,
    ticket_id: i64,
    admin_email: Option<&str>,
    action_type: &str,
    from_status: Option<&str>,
    to_status: Option<&str>,
    note: Option<&str>,
    now: &str,
) -> Result<i64, DineoError> {
    let admin_email = admin_email.map(str::to_string);
    let action_type = action_type.to_string();
    let from_status = from_status.map(str::to_string);
    let to_status = to_status.map(str::to_string);
    let note = note.map(str::to_string);
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO driver_issue_ticket_logs
                     (ticket_id, admin_email, action_type, from_status, to_status, note, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![ticket_id, admin_email, action_type, from_status, to_status, note, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// All audit events for a ticket, oldest first.
pub async fn events_for_ticket(db: &Database, ticket_id: i64) -> Result<Vec<TicketLog>, DineoError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, ticket_id, admin_email, action_type, from_status, to_status, note, created_at
                 FROM driver_issue_ticket_logs WHERE ticket_id = ?1 ORDER BY id ASC",
            )?;
            let rows = stmt.query_map(params![ticket_id], |row| {
                Ok(TicketLog {
                    id: row.get(0)?,
                    ticket_id: row.get(1)?,
                    admin_email: row.get(2)?,
                    action_type: row.get(3)?,
                    from_status: row.get(4)?,
                    to_status: row.get(5)?,
                    note: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?;
            let mut events = Vec::new();
            for row in rows {
                events.push(row?);
            }
            Ok(events)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::tickets::create_ticket;
    use tempfile::tempdir;

    #[tokio::test]
    async fn events_append_in_order() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("t.db").to_str().unwrap())
            .await
            .unwrap();
        let id = create_ticket(&db, "27831234567", "app_issue", None, "2026-02-01T08:00:00+02:00")
            .await
            .unwrap();

        log_event(&db, id, None, "created", None, Some("collecting"), None, "2026-02-01T08:00:00+02:00")
            .await
            .unwrap();
        log_event(
            &db,
            id,
            Some("ops@example.co.za"),
            "status_change",
            Some("collecting"),
            Some("closed"),
            Some("resolved by ops"),
            "2026-02-01T10:00:00+02:00",
        )
        .await
        .unwrap();

        let events = events_for_ticket(&db, id).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].action_type, "created");
        assert_eq!(events[1].admin_email.as_deref(), Some("ops@example.co.za"));
        assert_eq!(events[1].to_status.as_deref(), Some("closed"));
    }
}
