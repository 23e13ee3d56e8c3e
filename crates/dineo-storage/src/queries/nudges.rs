// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zero-trip nudge idempotency rows and analytics events.
//!
//! `driver_zero_trip_nudges` caps sends per `(wa_id, date)`; retries use
//! `INSERT OR IGNORE` on `driver_nudge_events` so a worker restart never
//! duplicates a sequence number.

use dineo_core::DineoError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::{NudgeEvent, NudgeRow};

/// Today's nudge counter for a driver, if any.
pub async fn get_nudge_row(
    db: &Database,
    wa_id: &str,
    date: &str,
) -> Result<Option<NudgeRow>, DineoError> {
    let wa_id = wa_id.to_string();
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT wa_id, nudge_date, nudge_count, last_sent_at
                     FROM driver_zero_trip_nudges WHERE wa_id = ?1 AND nudge_date = ?2",
                    params![wa_id, date],
                    |row| {
                        Ok(NudgeRow {
                            wa_id: row.get(0)?,
                            nudge_date: row.get(1)?,
                            nudge_count: row.get(2)?,
                            last_sent_at: row.get(3)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Remove the day's counter once the driver has finished a trip.
pub async fn clear_nudges(db: &Database, wa_id: &str, date: &str) -> Result<(), DineoError> {
    let wa_id = wa_id.to_string();
    let date = date.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "DELETE FROM driver_zero_trip_nudges WHERE wa_id = ?1 AND nudge_date = ?2",
                params![wa_id, date],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Increment the day's counter after a successful send.
pub async fn record_nudge_sent(
    db: &Database,
    wa_id: &str,
    date: &str,
    now: &str,
) -> Result<i64, DineoError> {
    let wa_id = wa_id.to_string();
    let date = date.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO driver_zero_trip_nudges (wa_id, nudge_date, nudge_count, last_sent_at)
                 VALUES (?1, ?2, 1, ?3)
                 ON CONFLICT (wa_id, nudge_date) DO UPDATE SET
                     nudge_count = nudge_count + 1,
                     last_sent_at = excluded.last_sent_at",
                params![wa_id, date, now],
            )?;
            let count = conn.query_row(
                "SELECT nudge_count FROM driver_zero_trip_nudges
                 WHERE wa_id = ?1 AND nudge_date = ?2",
                params![wa_id, date],
                |row| row.get(0),
            )?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert the analytics event for one sent nudge. Returns false when the
/// `(wa_id, date, sequence)` slot was already claimed.
pub async fn insert_nudge_event(
    db: &Database,
    wa_id: &str,
    date: &str,
    sequence: i64,
    outbound_message_id: Option<&str>,
    send_status: &str,
    now: &str,
) -> Result<bool, DineoError> {
    let wa_id = wa_id.to_string();
    let date = date.to_string();
    let outbound = outbound_message_id.map(str::to_string);
    let send_status = send_status.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO driver_nudge_events
                     (wa_id, nudge_date, sequence, outbound_message_id, send_status, sent_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![wa_id, date, sequence, outbound, send_status, now],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// The driver's most recent sent nudge that has no linked response yet.
pub async fn latest_unresponded_event(
    db: &Database,
    wa_id: &str,
) -> Result<Option<NudgeEvent>, DineoError> {
    let wa_id = wa_id.to_string();
    db.connection()
        .call(move |conn| {
            let event = conn
                .query_row(
                    &format!(
                        "SELECT {EVENT_COLUMNS} FROM driver_nudge_events
                         WHERE wa_id = ?1 AND send_status = 'sent'
                               AND response_message_id IS NULL
                         ORDER BY sent_at DESC, id DESC LIMIT 1"
                    ),
                    params![wa_id],
                    read_event,
                )
                .optional()?;
            Ok(event)
        })
        .await
        .map_err(map_tr_err)
}

/// Link a driver reply back to a nudge event.
pub async fn record_nudge_response(
    db: &Database,
    event_id: i64,
    response_message_id: &str,
    response_latency_sec: i64,
    response_intent: &str,
) -> Result<(), DineoError> {
    let response_message_id = response_message_id.to_string();
    let response_intent = response_intent.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE driver_nudge_events
                 SET response_message_id = ?2, response_latency_sec = ?3, response_intent = ?4
                 WHERE id = ?1",
                params![event_id, response_message_id, response_latency_sec, response_intent],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Record a delivery/read/failed callback against the matching outbound id.
/// Returns false when no nudge event carries that id.
pub async fn update_delivery_status(
    db: &Database,
    outbound_message_id: &str,
    status: &str,
) -> Result<bool, DineoError> {
    let outbound_message_id = outbound_message_id.to_string();
    let status = status.to_string();
    db.connection()
        .call(move |conn| {
            let updated = conn.execute(
                "UPDATE driver_nudge_events SET delivery_status = ?2
                 WHERE outbound_message_id = ?1",
                params![outbound_message_id, status],
            )?;
            Ok(updated > 0)
        })
        .await
        .map_err(map_tr_err)
}

const EVENT_COLUMNS: &str = "id, wa_id, nudge_date, sequence, outbound_message_id, send_status, \
     sent_at, delivery_status, response_message_id, response_latency_sec, response_intent";

fn read_event(row: &rusqlite::Row<'_>) -> Result<NudgeEvent, rusqlite::Error> {
    Ok(NudgeEvent {
        id: row.get(0)?,
        wa_id: row.get(1)?,
        nudge_date: row.get(2)?,
        sequence: row.get(3)?,
        outbound_message_id: row.get(4)?,
        send_status: row.get(5)?,
        sent_at: row.get(6)?,
        delivery_status: row.get(7)?,
        response_message_id: row.get(8)?,
        response_latency_sec: row.get(9)?,
        response_intent: row.get(10)?,
    })
}
