// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intraday checkpoint slot claims.
//!
//! The worker claims `(wa_id, slot_date, slot_hour)` with `INSERT OR IGNORE`
//! before any send, so two ticks racing the same checkpoint produce exactly
//! one message.

use dineo_core::DineoError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::IntradaySlot;

/// Claim the checkpoint slot. Returns false when it was already claimed.
pub async fn claim_slot(
    db: &Database,
    wa_id: &str,
    slot_date: &str,
    slot_hour: i64,
    now: &str,
) -> Result<bool, DineoError> {
    let wa_id = wa_id.to_string();
    let slot_date = slot_date.to_string();
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO driver_intraday_updates
                     (wa_id, slot_date, slot_hour, send_status, updated_at)
                 VALUES (?1, ?2, ?3, 'reserved', ?4)",
                params![wa_id, slot_date, slot_hour, now],
            )?;
            Ok(inserted > 0)
        })
        .await
        .map_err(map_tr_err)
}

/// Move a claimed slot to its final send status.
pub async fn finish_slot(
    db: &Database,
    wa_id: &str,
    slot_date: &str,
    slot_hour: i64,
    send_status: &str,
    outbound_message_id: Option<&str>,
    now: &str,
) -> Result<(), DineoError> {
    let wa_id = wa_id.to_string();
    let slot_date = slot_date.to_string();
    let send_status = send_status.to_string();
    let outbound = outbound_message_id.map(str::to_string);
    let now = now.to_string();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE driver_intraday_updates
                 SET send_status = ?4, outbound_message_id = ?5, updated_at = ?6
                 WHERE wa_id = ?1 AND slot_date = ?2 AND slot_hour = ?3",
                params![wa_id, slot_date, slot_hour, send_status, outbound, now],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// The slot record, if claimed.
pub async fn get_slot(
    db: &Database,
    wa_id: &str,
    slot_date: &str,
    slot_hour: i64,
) -> Result<Option<IntradaySlot>, DineoError> {
    let wa_id = wa_id.to_string();
    let slot_date = slot_date.to_string();
    db.connection()
        .call(move |conn| {
            let slot = conn
                .query_row(
                    "SELECT wa_id, slot_date, slot_hour, send_status, outbound_message_id, updated_at
                     FROM driver_intraday_updates
                     WHERE wa_id = ?1 AND slot_date = ?2 AND slot_hour = ?3",
                    params![wa_id, slot_date, slot_hour],
                    |row| {
                        Ok(IntradaySlot {
                            wa_id: row.get(0)?,
                            slot_date: row.get(1)?,
                            slot_hour: row.get(2)?,
                            send_status: row.get(3)?,
                            outbound_message_id: row.get(4)?,
                            updated_at: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(slot)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn slot_claims_are_exclusive() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("i.db").to_str().unwrap())
            .await
            .unwrap();

        let first = claim_slot(&db, "27831234567", "2026-02-02", 12, "2026-02-02T12:05:00+02:00")
            .await
            .unwrap();
        let second = claim_slot(&db, "27831234567", "2026-02-02", 12, "2026-02-02T12:06:00+02:00")
            .await
            .unwrap();
        assert!(first);
        assert!(!second, "same checkpoint must not be claimed twice");

        // Different hour on the same day is a separate slot.
        assert!(
            claim_slot(&db, "27831234567", "2026-02-02", 14, "2026-02-02T14:03:00+02:00")
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn finish_records_outcome() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("i.db").to_str().unwrap())
            .await
            .unwrap();

        claim_slot(&db, "27831234567", "2026-02-02", 8, "2026-02-02T08:10:00+02:00")
            .await
            .unwrap();
        finish_slot(
            &db, "27831234567", "2026-02-02", 8, "sent", Some("wamid.intraday"),
            "2026-02-02T08:10:02+02:00",
        )
        .await
        .unwrap();

        let slot = get_slot(&db, "27831234567", "2026-02-02", 8)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(slot.send_status, "sent");
        assert_eq!(slot.outbound_message_id.as_deref(), Some("wamid.intraday"));
    }
}
