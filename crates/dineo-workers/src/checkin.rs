// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! No-vehicle check-ins.
//!
//! The no-vehicle flow stamps `checkin_due_at` on its ticket; this worker
//! scans open no-vehicle tickets and sends one check-in per due stamp,
//! recording the stamp it served in `checkin_sent_for` so a rescheduled
//! check-in fires again but the same one never repeats.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use dineo_core::time::{iso, now_jhb};
use dineo_core::types::MessageLogEntry;
use dineo_core::{DineoError, WhatsAppAdapter};
use dineo_storage::queries::tickets;
use dineo_storage::{Database, MessageLogger};
use tracing::{error, info, warn};

const PASS_INTERVAL_SECS: u64 = 1800;

const CHECKIN_TEXT: &str = "Quick check-in - are you back on the road yet? Reply 'got the car \
     back' if you're sorted, or tell me what's still outstanding.";

pub struct CheckinWorker {
    db: Database,
    adapter: Arc<dyn WhatsAppAdapter>,
    logger: MessageLogger,
}

impl CheckinWorker {
    pub fn new(db: Database, adapter: Arc<dyn WhatsAppAdapter>, logger: MessageLogger) -> Self {
        Self {
            db,
            adapter,
            logger,
        }
    }

    pub async fn run(self) {
        let interval = std::time::Duration::from_secs(PASS_INTERVAL_SECS);
        loop {
            if let Err(e) = self.tick(now_jhb()).await {
                error!(error = %e, "check-in tick failed");
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// One pass over open no-vehicle tickets at the given instant.
    pub async fn tick(&self, now: DateTime<FixedOffset>) -> Result<(), DineoError> {
        let open = tickets::open_tickets_of_type(&self.db, "no_vehicle").await?;
        if open.is_empty() {
            return Ok(());
        }
        let now_str = iso(now);
        let mut sent = 0_usize;

        for ticket in open {
            let Some(due) = ticket
                .metadata
                .get("checkin_due_at")
                .and_then(serde_json::Value::as_str)
            else {
                continue;
            };
            let Ok(due_at) = DateTime::parse_from_rfc3339(due) else {
                warn!(ticket_id = ticket.id, due, "unparseable check-in stamp");
                continue;
            };
            if due_at > now {
                continue;
            }
            if ticket
                .metadata
                .get("checkin_sent_for")
                .and_then(serde_json::Value::as_str)
                == Some(due)
            {
                continue;
            }

            match self.adapter.send_text(&ticket.wa_id, CHECKIN_TEXT).await {
                Ok(Some(message_id)) => {
                    tickets::merge_metadata(
                        &self.db,
                        ticket.id,
                        &serde_json::json!({"checkin_sent_for": due}),
                        &now_str,
                    )
                    .await?;
                    self.logger
                        .log(
                            &self.db,
                            &MessageLogEntry {
                                wa_id: ticket.wa_id.clone(),
                                direction: "OUTBOUND".into(),
                                message_text: Some(CHECKIN_TEXT.to_string()),
                                intent: Some("no_vehicle_checkin".into()),
                                wa_message_id: Some(message_id),
                                status: Some("sent".into()),
                                logged_at: now_str.clone(),
                                ..Default::default()
                            },
                        )
                        .await?;
                    sent += 1;
                }
                Ok(None) => {
                    // Left unstamped so the next pass retries.
                    warn!(ticket_id = ticket.id, "check-in rejected by platform");
                }
                Err(e) => {
                    warn!(ticket_id = ticket.id, error = %e, "check-in send errored");
                }
            }
        }

        if sent > 0 {
            info!(sent, "no-vehicle check-ins sent");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dineo_test_utils::MockWhatsApp;
    use serde_json::json;
    use tempfile::tempdir;

    async fn worker() -> (CheckinWorker, Arc<MockWhatsApp>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("c.db").to_str().unwrap())
            .await
            .unwrap();
        let adapter = Arc::new(MockWhatsApp::new());
        let logger = MessageLogger::initialize(&db).await.unwrap();
        let w = CheckinWorker::new(db, adapter.clone(), logger);
        (w, adapter, dir)
    }

    async fn seed_ticket(db: &Database, wa_id: &str, due: &str) -> i64 {
        let id = tickets::create_ticket(
            db,
            wa_id,
            "no_vehicle",
            Some("car is at the workshop"),
            "2026-02-01T10:00:00+02:00",
        )
        .await
        .unwrap();
        tickets::merge_metadata(
            db,
            id,
            &json!({"reason": "workshop", "checkin_due_at": due}),
            "2026-02-01T10:01:00+02:00",
        )
        .await
        .unwrap();
        id
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[tokio::test]
    async fn due_ticket_gets_exactly_one_checkin() {
        let (w, adapter, _dir) = worker().await;
        let id = seed_ticket(&w.db, "27831234567", "2026-02-02T10:00:00+02:00").await;

        w.tick(at("2026-02-02T10:30:00+02:00")).await.unwrap();
        let texts = adapter.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("back on the road"), "{}", texts[0]);

        let ticket = tickets::get_ticket(&w.db, id).await.unwrap().unwrap();
        assert_eq!(
            ticket.metadata["checkin_sent_for"],
            "2026-02-02T10:00:00+02:00"
        );

        w.tick(at("2026-02-02T11:00:00+02:00")).await.unwrap();
        assert_eq!(adapter.sent_texts().len(), 1, "same stamp never repeats");
    }

    #[tokio::test]
    async fn future_due_and_closed_tickets_are_silent() {
        let (w, adapter, _dir) = worker().await;
        seed_ticket(&w.db, "27831234567", "2026-02-03T10:00:00+02:00").await;
        let closed = seed_ticket(&w.db, "27832222222", "2026-02-02T08:00:00+02:00").await;
        tickets::update_status(&w.db, closed, "resolved", "2026-02-02T09:00:00+02:00")
            .await
            .unwrap();

        w.tick(at("2026-02-02T10:30:00+02:00")).await.unwrap();
        assert!(adapter.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn rescheduled_stamp_fires_again() {
        let (w, adapter, _dir) = worker().await;
        let id = seed_ticket(&w.db, "27831234567", "2026-02-02T10:00:00+02:00").await;

        w.tick(at("2026-02-02T10:30:00+02:00")).await.unwrap();
        assert_eq!(adapter.sent_texts().len(), 1);

        // The flow pushed the check-in out another day.
        tickets::merge_metadata(
            &w.db,
            id,
            &json!({"checkin_due_at": "2026-02-03T10:00:00+02:00"}),
            "2026-02-02T11:00:00+02:00",
        )
        .await
        .unwrap();

        w.tick(at("2026-02-03T10:15:00+02:00")).await.unwrap();
        assert_eq!(adapter.sent_texts().len(), 2);
    }

    #[tokio::test]
    async fn platform_rejection_is_retried_next_pass() {
        let (w, adapter, _dir) = worker().await;
        seed_ticket(&w.db, "27831234567", "2026-02-02T10:00:00+02:00").await;

        adapter.set_fail_sends(true);
        w.tick(at("2026-02-02T10:30:00+02:00")).await.unwrap();

        adapter.set_fail_sends(false);
        w.tick(at("2026-02-02T11:00:00+02:00")).await.unwrap();
        assert_eq!(adapter.sent_texts().len(), 2, "first attempt recorded the text too");
    }
}
