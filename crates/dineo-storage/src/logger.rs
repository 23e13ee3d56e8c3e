// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Schema-adaptive message logging.
//!
//! Some deployments point Dineo at an admin-owned database whose
//! `whatsapp_message_logs` table predates this service and spells columns
//! differently. The logger inspects the live table once at startup, resolves
//! each logical field against a synonym list and compiles a concrete INSERT.
//! Fields with no matching column are silently dropped; only the sender id
//! and timestamp are mandatory.

use dineo_core::DineoError;
use rusqlite::types::Value;
use tracing::{debug, warn};

use crate::database::{Database, map_tr_err};
use crate::models::MessageLogEntry;

const TABLE: &str = "whatsapp_message_logs";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogField {
    WaId,
    Direction,
    MessageText,
    Intent,
    WaMessageId,
    SentimentScore,
    SentimentLabel,
    Status,
    ResponseLatencySec,
    LoggedAt,
}

impl LogField {
    fn synonyms(&self) -> &'static [&'static str] {
        match self {
            LogField::WaId => &["wa_id", "whatsapp_id", "msisdn", "phone"],
            LogField::Direction => &["message_direction", "direction"],
            LogField::MessageText => &["message_text", "message", "body", "text"],
            LogField::Intent => &["intent", "detected_intent"],
            LogField::WaMessageId => &["wa_message_id", "whatsapp_message_id", "message_id"],
            LogField::SentimentScore => &["sentiment_score"],
            LogField::SentimentLabel => &["sentiment_label", "sentiment"],
            LogField::Status => &["status", "delivery_status"],
            LogField::ResponseLatencySec => &["response_latency_sec", "response_latency"],
            LogField::LoggedAt => &["logged_at", "created_at", "timestamp"],
        }
    }

    fn required(&self) -> bool {
        matches!(self, LogField::WaId | LogField::LoggedAt)
    }
}

const ALL_FIELDS: &[LogField] = &[
    LogField::WaId,
    LogField::Direction,
    LogField::MessageText,
    LogField::Intent,
    LogField::WaMessageId,
    LogField::SentimentScore,
    LogField::SentimentLabel,
    LogField::Status,
    LogField::ResponseLatencySec,
    LogField::LoggedAt,
];

/// A message logger bound to the live table's actual column names.
#[derive(Debug, Clone)]
pub struct MessageLogger {
    insert_sql: String,
    fields: Vec<LogField>,
    wa_id_col: String,
    direction_col: Option<String>,
    text_col: Option<String>,
    logged_at_col: String,
}

impl MessageLogger {
    /// Inspect the live table and compile the INSERT statement.
    pub async fn initialize(db: &Database) -> Result<Self, DineoError> {
        let columns: Vec<String> = db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&format!("PRAGMA table_info({TABLE})"))?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(1))?;
                let mut cols = Vec::new();
                for row in rows {
                    cols.push(row?.to_ascii_lowercase());
                }
                Ok(cols)
            })
            .await
            .map_err(map_tr_err)?;

        if columns.is_empty() {
            return Err(DineoError::Internal(format!(
                "message log table `{TABLE}` does not exist"
            )));
        }

        let mut fields = Vec::new();
        let mut resolved = Vec::new();
        for field in ALL_FIELDS {
            match field
                .synonyms()
                .iter()
                .find(|s| columns.iter().any(|c| c == *s))
            {
                Some(col) => {
                    fields.push(*field);
                    resolved.push((*field, col.to_string()));
                }
                None if field.required() => {
                    return Err(DineoError::Internal(format!(
                        "message log table `{TABLE}` has no column for {:?} (tried {:?})",
                        field,
                        field.synonyms()
                    )));
                }
                None => {
                    warn!(?field, "message log column missing; field will not be logged");
                }
            }
        }

        let col_list: Vec<&str> = resolved.iter().map(|(_, c)| c.as_str()).collect();
        let placeholders: Vec<String> = (1..=col_list.len()).map(|i| format!("?{i}")).collect();
        let insert_sql = format!(
            "INSERT INTO {TABLE} ({}) VALUES ({})",
            col_list.join(", "),
            placeholders.join(", ")
        );
        debug!(%insert_sql, "message logger initialized");

        let col_for = |f: LogField| {
            resolved
                .iter()
                .find(|(rf, _)| *rf == f)
                .map(|(_, c)| c.clone())
        };
        let wa_id_col = col_for(LogField::WaId).unwrap_or_else(|| "wa_id".into());
        let logged_at_col = col_for(LogField::LoggedAt).unwrap_or_else(|| "logged_at".into());
        Ok(Self {
            insert_sql,
            direction_col: col_for(LogField::Direction),
            text_col: col_for(LogField::MessageText),
            fields,
            wa_id_col,
            logged_at_col,
        })
    }

    /// Append one row. Failures here must never break a conversation turn,
    /// so callers log and continue on error.
    pub async fn log(&self, db: &Database, entry: &MessageLogEntry) -> Result<(), DineoError> {
        let sql = self.insert_sql.clone();
        let values: Vec<Value> = self.fields.iter().map(|f| bind_field(*f, entry)).collect();
        db.connection()
            .call(move |conn| {
                conn.execute(&sql, rusqlite::params_from_iter(values.iter()))?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    /// True when the driver sent anything inbound after `since`.
    pub async fn has_inbound_since(
        &self,
        db: &Database,
        wa_id: &str,
        since: &str,
    ) -> Result<bool, DineoError> {
        let Some(direction_col) = self.direction_col.clone() else {
            return Ok(false);
        };
        let sql = format!(
            "SELECT COUNT(*) FROM {TABLE}
             WHERE {} = ?1 AND {} = 'INBOUND' AND {} > ?2",
            self.wa_id_col, direction_col, self.logged_at_col
        );
        let wa_id = wa_id.to_string();
        let since = since.to_string();
        db.connection()
            .call(move |conn| {
                let count: i64 =
                    conn.query_row(&sql, rusqlite::params![wa_id, since], |row| row.get(0))?;
                Ok(count > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    /// True when the driver sent anything inbound inside `(since, until]`.
    /// Bounds the engagement response window.
    pub async fn has_inbound_between(
        &self,
        db: &Database,
        wa_id: &str,
        since: &str,
        until: &str,
    ) -> Result<bool, DineoError> {
        let Some(direction_col) = self.direction_col.clone() else {
            return Ok(false);
        };
        let sql = format!(
            "SELECT COUNT(*) FROM {TABLE}
             WHERE {} = ?1 AND {} = 'INBOUND' AND {} > ?2 AND {} <= ?3",
            self.wa_id_col, direction_col, self.logged_at_col, self.logged_at_col
        );
        let wa_id = wa_id.to_string();
        let since = since.to_string();
        let until = until.to_string();
        db.connection()
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    &sql,
                    rusqlite::params![wa_id, since, until],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    /// Texts of outbound messages sent to the driver after `since`, newest
    /// first. Drives the repeated-reply suppression window.
    pub async fn outbound_texts_since(
        &self,
        db: &Database,
        wa_id: &str,
        since: &str,
    ) -> Result<Vec<String>, DineoError> {
        let (Some(direction_col), Some(text_col)) =
            (self.direction_col.clone(), self.text_col.clone())
        else {
            return Ok(Vec::new());
        };
        let sql = format!(
            "SELECT {text_col} FROM {TABLE}
             WHERE {} = ?1 AND {} = 'OUTBOUND' AND {} > ?2 AND {text_col} IS NOT NULL
             ORDER BY {} DESC",
            self.wa_id_col, direction_col, self.logged_at_col, self.logged_at_col
        );
        let wa_id = wa_id.to_string();
        let since = since.to_string();
        db.connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let rows = stmt.query_map(rusqlite::params![wa_id, since], |row| {
                    row.get::<_, String>(0)
                })?;
                let mut texts = Vec::new();
                for row in rows {
                    texts.push(row?);
                }
                Ok(texts)
            })
            .await
            .map_err(map_tr_err)
    }
}

fn bind_field(field: LogField, entry: &MessageLogEntry) -> Value {
    fn opt_text(v: &Option<String>) -> Value {
        v.clone().map(Value::Text).unwrap_or(Value::Null)
    }
    match field {
        LogField::WaId => Value::Text(entry.wa_id.clone()),
        LogField::Direction => Value::Text(entry.direction.clone()),
        LogField::MessageText => opt_text(&entry.message_text),
        LogField::Intent => opt_text(&entry.intent),
        LogField::WaMessageId => opt_text(&entry.wa_message_id),
        LogField::SentimentScore => entry
            .sentiment_score
            .map(Value::Real)
            .unwrap_or(Value::Null),
        LogField::SentimentLabel => opt_text(&entry.sentiment_label),
        LogField::Status => opt_text(&entry.status),
        LogField::ResponseLatencySec => entry
            .response_latency_sec
            .map(Value::Integer)
            .unwrap_or(Value::Null),
        LogField::LoggedAt => Value::Text(entry.logged_at.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn open_db() -> (Database, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("l.db").to_str().unwrap())
            .await
            .unwrap();
        (db, dir)
    }

    fn inbound(wa_id: &str, text: &str, at: &str) -> MessageLogEntry {
        MessageLogEntry {
            wa_id: wa_id.into(),
            direction: "INBOUND".into(),
            message_text: Some(text.into()),
            intent: Some("greeting".into()),
            wa_message_id: Some("wamid.in".into()),
            sentiment_score: Some(0.4),
            sentiment_label: Some("positive".into()),
            status: None,
            response_latency_sec: None,
            logged_at: at.into(),
        }
    }

    #[tokio::test]
    async fn logs_against_the_migrated_schema() {
        let (db, _dir) = open_db().await;
        let logger = MessageLogger::initialize(&db).await.unwrap();
        logger
            .log(&db, &inbound("27831234567", "hi dineo", "2026-02-01T08:00:00+02:00"))
            .await
            .unwrap();

        let count: i64 = db
            .connection()
            .call(|conn| {
                let c = conn.query_row(
                    "SELECT COUNT(*) FROM whatsapp_message_logs WHERE intent = 'greeting'",
                    [],
                    |row| row.get(0),
                )?;
                Ok::<_, rusqlite::Error>(c)
            })
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn adapts_to_legacy_column_names() {
        let (db, _dir) = open_db().await;
        // Replace the migrated table with a legacy admin-console shape.
        db.connection()
            .call(|conn| {
                conn.execute_batch(
                    "DROP TABLE whatsapp_message_logs;
                     CREATE TABLE whatsapp_message_logs (
                         id INTEGER PRIMARY KEY AUTOINCREMENT,
                         whatsapp_id TEXT NOT NULL,
                         direction TEXT,
                         message TEXT,
                         created_at TEXT NOT NULL
                     );",
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();

        let logger = MessageLogger::initialize(&db).await.unwrap();
        logger
            .log(&db, &inbound("27831234567", "legacy shape", "2026-02-01T08:00:00+02:00"))
            .await
            .unwrap();

        let (wa_id, message): (String, String) = db
            .connection()
            .call(|conn| {
                let row = conn.query_row(
                    "SELECT whatsapp_id, message FROM whatsapp_message_logs",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok::<_, rusqlite::Error>(row)
            })
            .await
            .unwrap();
        assert_eq!(wa_id, "27831234567");
        assert_eq!(message, "legacy shape");
    }

    #[tokio::test]
    async fn initialize_fails_without_sender_column() {
        let (db, _dir) = open_db().await;
        db.connection()
            .call(|conn| {
                conn.execute_batch(
                    "DROP TABLE whatsapp_message_logs;
                     CREATE TABLE whatsapp_message_logs (id INTEGER PRIMARY KEY, note TEXT);",
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();

        assert!(MessageLogger::initialize(&db).await.is_err());
    }

    #[tokio::test]
    async fn inbound_and_outbound_window_helpers() {
        let (db, _dir) = open_db().await;
        let logger = MessageLogger::initialize(&db).await.unwrap();

        logger
            .log(&db, &inbound("27831234567", "hi", "2026-02-01T08:00:00+02:00"))
            .await
            .unwrap();
        let mut out = inbound("27831234567", "Howzit Thabo", "2026-02-01T08:00:05+02:00");
        out.direction = "OUTBOUND".into();
        logger.log(&db, &out).await.unwrap();

        assert!(
            logger
                .has_inbound_since(&db, "27831234567", "2026-02-01T07:00:00+02:00")
                .await
                .unwrap()
        );
        assert!(
            !logger
                .has_inbound_since(&db, "27831234567", "2026-02-01T09:00:00+02:00")
                .await
                .unwrap()
        );
        assert!(
            logger
                .has_inbound_between(
                    &db,
                    "27831234567",
                    "2026-02-01T07:00:00+02:00",
                    "2026-02-01T09:00:00+02:00"
                )
                .await
                .unwrap()
        );
        assert!(
            !logger
                .has_inbound_between(
                    &db,
                    "27831234567",
                    "2026-02-01T08:30:00+02:00",
                    "2026-02-01T09:00:00+02:00"
                )
                .await
                .unwrap()
        );

        let texts = logger
            .outbound_texts_since(&db, "27831234567", "2026-02-01T07:00:00+02:00")
            .await
            .unwrap();
        assert_eq!(texts, vec!["Howzit Thabo".to_string()]);
    }
}
