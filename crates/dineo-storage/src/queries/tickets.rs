// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ticket row operations.
//!
//! Media lists are append-only JSON arrays; metadata is JSON merge-patched.
//! Both mutations happen inside a single transaction on the serialized
//! connection, so concurrent workers cannot interleave a read-modify-write.

use dineo_core::DineoError;
use dineo_core::types::is_closed_status;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::Ticket;

/// Insert a new ticket in `collecting` status and return its id.
pub async fn create_ticket(
    db: &Database,
    wa_id: &str,
    issue_type: &str,
    initial_message: Option<&str>,
    now: &str,
) -> Result<i64, DineoError> {
    let wa_id = wa_id.to_string();
    let issue_type = issue_type.to_string();
    let initial_message = initial_message.map(str::to_string);
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO driver_issue_tickets
                     (wa_id, issue_type, status, initial_message, created_at, last_update_at)
                 VALUES (?1, ?2, 'collecting', ?3, ?4, ?4)",
                params![wa_id, issue_type, initial_message, now],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch a ticket by id.
pub async fn get_ticket(db: &Database, ticket_id: i64) -> Result<Option<Ticket>, DineoError> {
    db.connection()
        .call(move |conn| {
            let ticket = conn
                .query_row(
                    &format!("SELECT {TICKET_COLUMNS} FROM driver_issue_tickets WHERE id = ?1"),
                    params![ticket_id],
                    read_ticket,
                )
                .optional()?;
            Ok(ticket)
        })
        .await
        .map_err(map_tr_err)
}

/// Append one media URL to the ticket's JSON array and flag receipt.
pub async fn append_media(
    db: &Database,
    ticket_id: i64,
    url: &str,
    now: &str,
) -> Result<(), DineoError> {
    let url = url.to_string();
    let now = now.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let existing: Option<(String, String)> = tx
                .query_row(
                    "SELECT media_urls, metadata FROM driver_issue_tickets WHERE id = ?1",
                    params![ticket_id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((media_json, meta_json)) = existing else {
                return Ok(false);
            };

            let mut media: Vec<String> = serde_json::from_str(&media_json).unwrap_or_default();
            media.push(url);
            let mut meta: serde_json::Value =
                serde_json::from_str(&meta_json).unwrap_or_else(|_| serde_json::json!({}));
            if let Some(obj) = meta.as_object_mut() {
                obj.insert("photos_received".into(), serde_json::Value::Bool(true));
            }

            tx.execute(
                "UPDATE driver_issue_tickets
                 SET media_urls = ?2, metadata = ?3, last_update_at = ?4
                 WHERE id = ?1",
                params![
                    ticket_id,
                    serde_json::to_string(&media).unwrap_or_else(|_| "[]".into()),
                    meta.to_string(),
                    now
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if updated {
        Ok(())
    } else {
        Err(DineoError::TicketNotFound { ticket_id })
    }
}

/// Overwrite the ticket's location fields; the raw payload goes into
/// `metadata.location_raw`.
pub async fn update_location(
    db: &Database,
    ticket_id: i64,
    lat: f64,
    lng: f64,
    desc: Option<&str>,
    raw: Option<&serde_json::Value>,
    now: &str,
) -> Result<(), DineoError> {
    let desc = desc.map(str::to_string);
    let raw = raw.cloned();
    let now = now.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let meta_json: Option<String> = tx
                .query_row(
                    "SELECT metadata FROM driver_issue_tickets WHERE id = ?1",
                    params![ticket_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(meta_json) = meta_json else {
                return Ok(false);
            };

            let mut meta: serde_json::Value =
                serde_json::from_str(&meta_json).unwrap_or_else(|_| serde_json::json!({}));
            if let (Some(obj), Some(raw)) = (meta.as_object_mut(), raw) {
                obj.insert("location_raw".into(), raw);
            }

            tx.execute(
                "UPDATE driver_issue_tickets
                 SET location_lat = ?2, location_lng = ?3, location_desc = ?4,
                     metadata = ?5, last_update_at = ?6
                 WHERE id = ?1",
                params![ticket_id, lat, lng, desc, meta.to_string(), now],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if updated {
        Ok(())
    } else {
        Err(DineoError::TicketNotFound { ticket_id })
    }
}

/// Set a ticket's status, returning the previous status.
pub async fn update_status(
    db: &Database,
    ticket_id: i64,
    new_status: &str,
    now: &str,
) -> Result<String, DineoError> {
    let new_status = new_status.to_string();
    let now = now.to_string();
    let previous = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let previous: Option<String> = tx
                .query_row(
                    "SELECT status FROM driver_issue_tickets WHERE id = ?1",
                    params![ticket_id],
                    |row| row.get(0),
                )
                .optional()?;
            if previous.is_some() {
                tx.execute(
                    "UPDATE driver_issue_tickets
                     SET status = ?2, last_update_at = ?3 WHERE id = ?1",
                    params![ticket_id, new_status, now],
                )?;
            }
            tx.commit()?;
            Ok(previous)
        })
        .await
        .map_err(map_tr_err)?;

    previous.ok_or(DineoError::TicketNotFound { ticket_id })
}

/// JSON merge-patch the ticket metadata (RFC 7386 semantics: object keys
/// merge recursively, `null` removes, scalars replace).
pub async fn merge_metadata(
    db: &Database,
    ticket_id: i64,
    patch: &serde_json::Value,
    now: &str,
) -> Result<(), DineoError> {
    let patch = patch.clone();
    let now = now.to_string();
    let updated = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let meta_json: Option<String> = tx
                .query_row(
                    "SELECT metadata FROM driver_issue_tickets WHERE id = ?1",
                    params![ticket_id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(meta_json) = meta_json else {
                return Ok(false);
            };

            let mut meta: serde_json::Value =
                serde_json::from_str(&meta_json).unwrap_or_else(|_| serde_json::json!({}));
            merge_patch(&mut meta, &patch);

            tx.execute(
                "UPDATE driver_issue_tickets
                 SET metadata = ?2, last_update_at = ?3 WHERE id = ?1",
                params![ticket_id, meta.to_string(), now],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;

    if updated {
        Ok(())
    } else {
        Err(DineoError::TicketNotFound { ticket_id })
    }
}

/// Most recent non-closed ticket for the driver among the given issue types.
///
/// "Closed" is the case-insensitive status family from
/// [`dineo_core::types::is_closed_status`]; filtering happens here rather
/// than in SQL because admin consoles write free-form status strings.
pub async fn find_open_for_driver(
    db: &Database,
    wa_id: &str,
    issue_types: &[&str],
) -> Result<Option<Ticket>, DineoError> {
    if issue_types.is_empty() {
        return Ok(None);
    }
    let wa_id = wa_id.to_string();
    let issue_types: Vec<String> = issue_types.iter().map(|s| s.to_string()).collect();
    db.connection()
        .call(move |conn| {
            let placeholders = issue_types
                .iter()
                .enumerate()
                .map(|(i, _)| format!("?{}", i + 2))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "SELECT {TICKET_COLUMNS} FROM driver_issue_tickets
                 WHERE wa_id = ?1 AND issue_type IN ({placeholders})
                 ORDER BY created_at DESC, id DESC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut bind: Vec<&dyn rusqlite::ToSql> = vec![&wa_id];
            for t in &issue_types {
                bind.push(t);
            }
            let rows = stmt.query_map(&bind[..], read_ticket)?;
            for row in rows {
                let ticket = row?;
                if !is_closed_status(&ticket.status) {
                    return Ok(Some(ticket));
                }
            }
            Ok(None)
        })
        .await
        .map_err(map_tr_err)
}

/// Every non-closed ticket of one issue type, oldest first. Drives the
/// cross-driver check-in scan.
pub async fn open_tickets_of_type(
    db: &Database,
    issue_type: &str,
) -> Result<Vec<Ticket>, DineoError> {
    let issue_type = issue_type.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {TICKET_COLUMNS} FROM driver_issue_tickets
                 WHERE issue_type = ?1 ORDER BY created_at ASC, id ASC"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![issue_type], read_ticket)?;
            let mut out = Vec::new();
            for row in rows {
                let ticket = row?;
                if !is_closed_status(&ticket.status) {
                    out.push(ticket);
                }
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

const TICKET_COLUMNS: &str = "id, wa_id, issue_type, status, initial_message, media_urls, \
     location_lat, location_lng, location_desc, metadata, created_at, last_update_at";

fn read_ticket(row: &rusqlite::Row<'_>) -> Result<Ticket, rusqlite::Error> {
    let media_json: String = row.get(5)?;
    let meta_json: String = row.get(9)?;
    Ok(Ticket {
        id: row.get(0)?,
        wa_id: row.get(1)?,
        issue_type: row.get(2)?,
        status: row.get(3)?,
        initial_message: row.get(4)?,
        media_urls: serde_json::from_str(&media_json).unwrap_or_default(),
        location_lat: row.get(6)?,
        location_lng: row.get(7)?,
        location_desc: row.get(8)?,
        metadata: serde_json::from_str(&meta_json).unwrap_or_else(|_| serde_json::json!({})),
        created_at: row.get(10)?,
        last_update_at: row.get(11)?,
    })
}

/// RFC 7386 merge-patch.
fn merge_patch(target: &mut serde_json::Value, patch: &serde_json::Value) {
    if let serde_json::Value::Object(patch_obj) = patch {
        if !target.is_object() {
            *target = serde_json::json!({});
        }
        let target_obj = target
            .as_object_mut()
            .unwrap_or_else(|| unreachable!("target coerced to object above"));
        for (key, value) in patch_obj {
            if value.is_null() {
                target_obj.remove(key);
            } else {
                merge_patch(
                    target_obj.entry(key.clone()).or_insert(serde_json::Value::Null),
                    value,
                );
            }
        }
    } else {
        *target = patch.clone();
    }
}
