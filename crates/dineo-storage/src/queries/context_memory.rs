// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mirrored conversation-context rows.
//!
//! The JSON context file is authoritative; this table exists so the admin
//! console can inspect conversation state without touching driver files.
//! Writes are upserts (the SQLite spelling of `ON DUPLICATE KEY UPDATE`).

use dineo_core::DineoError;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};
use crate::models::ContextMemoryRow;

/// Upsert the mirror row for a driver.
pub async fn upsert_context(db: &Database, row: &ContextMemoryRow) -> Result<(), DineoError> {
    let row = row.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO whatsapp_context_memory
                     (wa_id, last_intent, last_reply, prefs_json, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (wa_id) DO UPDATE SET
                     last_intent = excluded.last_intent,
                     last_reply = excluded.last_reply,
                     prefs_json = excluded.prefs_json,
                     updated_at = excluded.updated_at",
                params![row.wa_id, row.last_intent, row.last_reply, row.prefs_json, row.updated_at],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Fetch the mirror row for a driver.
pub async fn get_context(db: &Database, wa_id: &str) -> Result<Option<ContextMemoryRow>, DineoError> {
    let wa_id = wa_id.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT wa_id, last_intent, last_reply, prefs_json, updated_at
                     FROM whatsapp_context_memory WHERE wa_id = ?1",
                    params![wa_id],
                    |row| {
                        Ok(ContextMemoryRow {
                            wa_id: row.get(0)?,
                            last_intent: row.get(1)?,
                            last_reply: row.get(2)?,
                            prefs_json: row.get(3)?,
                            updated_at: row.get(4)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}
