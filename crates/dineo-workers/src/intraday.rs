// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Intraday checkpoint updates.
//!
//! At fixed Johannesburg hours the worker tells each active driver where
//! they stand against the day's trip target. Targets scale a daily figure
//! derived from the driver's committed weekly goal (or the fleet default)
//! by the fraction of the working day elapsed at each checkpoint. Drivers
//! with zero finished trips are left to the nudge worker.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Timelike};
use dineo_config::model::IntradayConfig;
use dineo_core::time::{day_bounds_iso, iso, now_jhb};
use dineo_core::types::MessageLogEntry;
use dineo_core::wa::normalize_wa_id;
use dineo_core::{DineoError, WhatsAppAdapter};
use dineo_context::{ContextStore, keys};
use dineo_drivers::DriverResolver;
use dineo_storage::queries::{intraday, warehouse};
use dineo_storage::{Database, MessageLogger};
use tracing::{error, info, warn};

use crate::variant_index;

/// Checkpoint hours and the fraction of the daily target expected by each,
/// over a 22-hour operating day ending at the 18:00 wrap-up.
const CHECKPOINTS: &[(u32, f64)] = &[
    (8, 8.0 / 22.0),
    (12, 12.0 / 22.0),
    (14, 16.0 / 22.0),
    (16, 20.0 / 22.0),
    (18, 1.0),
];

const ON_TRACK: &[&str] = &[
    "Nice going - {finished} of {target} trips done for today. Keep it rolling!",
    "You're on track: {finished}/{target} trips so far today. Good pace!",
];

const BEHIND: &[&str] = &[
    "You're at {finished} trips, about {short} behind the {target} pace for now. A push this next stretch will close it.",
    "{finished} trips so far - {short} short of where {target} for the day needs you right now. Still very doable.",
];

pub struct IntradayWorker {
    db: Database,
    adapter: Arc<dyn WhatsAppAdapter>,
    resolver: Arc<DriverResolver>,
    logger: MessageLogger,
    store: ContextStore,
    config: IntradayConfig,
    /// Weekly trip target used when the driver has no committed goal.
    default_weekly_trips: i64,
}

impl IntradayWorker {
    pub fn new(
        db: Database,
        adapter: Arc<dyn WhatsAppAdapter>,
        resolver: Arc<DriverResolver>,
        logger: MessageLogger,
        store: ContextStore,
        config: IntradayConfig,
        default_weekly_trips: i64,
    ) -> Self {
        Self {
            db,
            adapter,
            resolver,
            logger,
            store,
            config,
            default_weekly_trips,
        }
    }

    pub async fn run(self) {
        let interval = std::time::Duration::from_secs(self.config.interval_secs.max(60));
        loop {
            if let Err(e) = self.tick(now_jhb()).await {
                error!(error = %e, "intraday tick failed");
            }
            tokio::time::sleep(interval).await;
        }
    }

    fn daily_target(&self, goal_trips: i64) -> i64 {
        // Weekly goals assume a six-day working week.
        ((goal_trips + 5) / 6).max(self.config.daily_min_finished_orders)
    }

    /// One pass at the given instant. Emits only inside the grace window
    /// after a checkpoint hour.
    pub async fn tick(&self, now: DateTime<FixedOffset>) -> Result<(), DineoError> {
        if !self.config.enabled {
            return Ok(());
        }
        let Some(&(hour, ratio)) = CHECKPOINTS.iter().find(|(h, _)| *h == now.hour()) else {
            return Ok(());
        };
        if i64::from(now.minute()) > self.config.grace_minutes {
            return Ok(());
        }

        let date = now.date_naive();
        let slot_date = date.to_string();
        let (day_start, day_end) = day_bounds_iso(date);
        let now_str = iso(now);
        let phones = warehouse::active_driver_phones(&self.db).await?;
        let mut seen = HashSet::new();
        let mut sent = 0_usize;

        for phone in phones {
            let wa_id = normalize_wa_id(&phone);
            if !seen.insert(wa_id.clone()) {
                continue;
            }
            let ctx = self.store.load(&wa_id);
            if ctx.opted_out() || ctx.get_bool(keys::FOLLOWUP_PAUSED).unwrap_or(false) {
                continue;
            }
            if !intraday::claim_slot(&self.db, &wa_id, &slot_date, i64::from(hour), &now_str)
                .await?
            {
                continue;
            }

            let kpis = self.resolver.today_kpis(&wa_id, &day_start, &day_end).await?;
            if kpis.trips_finished == 0 {
                intraday::finish_slot(
                    &self.db,
                    &wa_id,
                    &slot_date,
                    i64::from(hour),
                    "skipped_zero_trips",
                    None,
                    &now_str,
                )
                .await?;
                continue;
            }

            let goal_trips = ctx
                .get_i64(keys::GOAL_TRIP_COUNT)
                .unwrap_or(self.default_weekly_trips);
            let daily = self.daily_target(goal_trips);
            let checkpoint_target = ((daily as f64) * ratio).ceil() as i64;

            let body = if kpis.trips_finished >= checkpoint_target {
                ON_TRACK[variant_index(&wa_id, u64::from(hour), ON_TRACK.len())]
                    .replace("{finished}", &kpis.trips_finished.to_string())
                    .replace("{target}", &daily.to_string())
            } else {
                let short = checkpoint_target - kpis.trips_finished;
                BEHIND[variant_index(&wa_id, u64::from(hour), BEHIND.len())]
                    .replace("{finished}", &kpis.trips_finished.to_string())
                    .replace("{short}", &short.to_string())
                    .replace("{target}", &daily.to_string())
            };

            match self.adapter.send_text(&wa_id, &body).await {
                Ok(Some(message_id)) => {
                    intraday::finish_slot(
                        &self.db,
                        &wa_id,
                        &slot_date,
                        i64::from(hour),
                        "sent",
                        Some(&message_id),
                        &now_str,
                    )
                    .await?;
                    self.logger
                        .log(
                            &self.db,
                            &MessageLogEntry {
                                wa_id: wa_id.clone(),
                                direction: "OUTBOUND".into(),
                                message_text: Some(body),
                                intent: Some("intraday_update".into()),
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
                    warn!(%wa_id, hour, "intraday update rejected by platform");
                    intraday::finish_slot(
                        &self.db,
                        &wa_id,
                        &slot_date,
                        i64::from(hour),
                        "send_failed",
                        None,
                        &now_str,
                    )
                    .await?;
                }
                Err(e) => {
                    warn!(%wa_id, hour, error = %e, "intraday send errored");
                    intraday::finish_slot(
                        &self.db,
                        &wa_id,
                        &slot_date,
                        i64::from(hour),
                        "send_failed",
                        None,
                        &now_str,
                    )
                    .await?;
                }
            }
        }

        if sent > 0 {
            info!(hour, sent, date = %slot_date, "intraday updates sent");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dineo_test_utils::MockWhatsApp;
    use rusqlite::params;
    use std::time::Duration;
    use tempfile::tempdir;

    fn config() -> IntradayConfig {
        IntradayConfig {
            enabled: true,
            interval_secs: 600,
            grace_minutes: 30,
            daily_min_finished_orders: 8,
        }
    }

    async fn worker() -> (IntradayWorker, Arc<MockWhatsApp>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("i.db").to_str().unwrap())
            .await
            .unwrap();
        let adapter = Arc::new(MockWhatsApp::new());
        let resolver = Arc::new(DriverResolver::new(db.clone(), Duration::from_secs(0)));
        let logger = MessageLogger::initialize(&db).await.unwrap();
        let store = ContextStore::new(dir.path().join("ctx"), db.clone()).unwrap();
        let w = IntradayWorker::new(db, adapter.clone(), resolver, logger, store, config(), 122);
        (w, adapter, dir)
    }

    async fn seed_active_driver(db: &Database, phone: &str) {
        let phone = phone.to_string();
        db.connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO simplyfleet_driver_backup
                         (driver_id, personal_code, full_name, phone, status, contact_ids)
                     VALUES ('drv-1', 'D001', 'Thabo Mokoena', ?1, 'Active', '[]')",
                    params![phone],
                )?;
                Ok::<_, rusqlite::Error>(())
            })
            .await
            .unwrap();
    }

    async fn seed_finished_orders(db: &Database, phone: &str, created: &str, count: usize) {
        for _ in 0..count {
            let phone = phone.to_string();
            let created = created.to_string();
            db.connection()
                .call(move |conn| {
                    conn.execute(
                        "INSERT INTO bolt_orders_new
                             (driver_phone, order_status, order_created_at, ride_price)
                         VALUES (?1, 'finished', ?2, 95.0)",
                        params![phone, created],
                    )?;
                    Ok::<_, rusqlite::Error>(())
                })
                .await
                .unwrap();
        }
    }

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[tokio::test]
    async fn daily_target_derives_from_weekly_goal_with_floor() {
        let (w, _adapter, _dir) = worker().await;
        assert_eq!(w.daily_target(122), 21);
        assert_eq!(w.daily_target(30), 8, "floor applies to small goals");
    }

    #[tokio::test]
    async fn behind_driver_gets_shortfall_once_per_slot() {
        let (w, adapter, _dir) = worker().await;
        seed_active_driver(&w.db, "0831234567").await;
        seed_finished_orders(&w.db, "0831234567", "2026-02-02T09:30:00+02:00", 2).await;

        w.tick(at("2026-02-02T12:05:00+02:00")).await.unwrap();
        let texts = adapter.sent_texts();
        assert_eq!(texts.len(), 1);
        // Checkpoint pace at 12:00 is ceil(21 * 12/22) = 12, so 10 short.
        assert!(texts[0].contains("10"), "{}", texts[0]);
        assert!(texts[0].contains("2 trips"), "{}", texts[0]);

        let slot = intraday::get_slot(&w.db, "27831234567", "2026-02-02", 12)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(slot.send_status, "sent");

        w.tick(at("2026-02-02T12:15:00+02:00")).await.unwrap();
        assert_eq!(adapter.sent_texts().len(), 1, "slot already claimed");
    }

    #[tokio::test]
    async fn on_track_driver_gets_progress_message() {
        let (w, adapter, _dir) = worker().await;
        seed_active_driver(&w.db, "0831234567").await;
        // 8 finished meets the 08:00 pace of ceil(21 * 8/22) = 8.
        seed_finished_orders(&w.db, "0831234567", "2026-02-02T06:30:00+02:00", 8).await;

        w.tick(at("2026-02-02T08:10:00+02:00")).await.unwrap();
        let texts = adapter.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("8"), "{}", texts[0]);
        assert!(texts[0].contains("21"), "{}", texts[0]);
    }

    #[tokio::test]
    async fn outside_checkpoint_or_grace_nothing_happens() {
        let (w, adapter, _dir) = worker().await;
        seed_active_driver(&w.db, "0831234567").await;
        seed_finished_orders(&w.db, "0831234567", "2026-02-02T09:30:00+02:00", 3).await;

        w.tick(at("2026-02-02T11:10:00+02:00")).await.unwrap();
        w.tick(at("2026-02-02T12:45:00+02:00")).await.unwrap();
        assert!(adapter.sent_texts().is_empty());
    }

    #[tokio::test]
    async fn zero_trip_driver_is_left_to_the_nudge_worker() {
        let (w, adapter, _dir) = worker().await;
        seed_active_driver(&w.db, "0831234567").await;

        w.tick(at("2026-02-02T14:05:00+02:00")).await.unwrap();
        assert!(adapter.sent_texts().is_empty());
        let slot = intraday::get_slot(&w.db, "27831234567", "2026-02-02", 14)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(slot.send_status, "skipped_zero_trips");
    }

    #[tokio::test]
    async fn committed_goal_overrides_the_fleet_default() {
        let (w, adapter, _dir) = worker().await;
        seed_active_driver(&w.db, "0831234567").await;
        seed_finished_orders(&w.db, "0831234567", "2026-02-02T09:00:00+02:00", 9).await;

        let mut ctx = w.store.load("27831234567");
        ctx.set(keys::GOAL_TRIP_COUNT, 60_i64);
        w.store
            .save("27831234567", &ctx, "2026-02-02T08:00:00+02:00")
            .await
            .unwrap();

        // Goal 60 -> daily 10, 12:00 pace ceil(10 * 12/22) = 6; 9 is on track.
        w.tick(at("2026-02-02T12:05:00+02:00")).await.unwrap();
        let texts = adapter.sent_texts();
        assert_eq!(texts.len(), 1);
        assert!(texts[0].contains("9"), "{}", texts[0]);
        assert!(texts[0].contains("10"), "{}", texts[0]);
    }
}
