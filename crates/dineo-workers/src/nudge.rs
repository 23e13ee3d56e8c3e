// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Zero-trip nudge worker.
//!
//! Scans the active roster and pings drivers with no finished trip yet
//! today, capped per day and spaced by the loop interval. A finished trip
//! clears the day's counter so tomorrow starts fresh.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, NaiveTime};
use dineo_config::model::NudgeConfig;
use dineo_core::time::{day_bounds_iso, is_sunday, iso, now_jhb};
use dineo_core::types::MessageLogEntry;
use dineo_core::wa::normalize_wa_id;
use dineo_core::{DineoError, WhatsAppAdapter};
use dineo_context::{ContextStore, keys};
use dineo_drivers::DriverResolver;
use dineo_storage::queries::{nudges, warehouse};
use dineo_storage::{Database, MessageLogger};
use tracing::{debug, error, info, warn};

use crate::variant_index;

const FIRST_NUDGES: &[&str] = &[
    "Morning! No trips on your side yet today. Everything okay with the car?",
    "Hey, I don't see any trips from you so far today. Are you able to get online?",
    "Hi! Nothing on the board for you yet today. Is everything alright?",
];

const REPEAT_NUDGES: &[&str] = &[
    "Just checking in again - still no trips today. Anything I can help with?",
    "Still quiet on your side. If something's keeping you off the road, tell me and I'll log it for the team.",
    "Following up from earlier - no trips yet. Even a few before this evening makes a difference.",
];

pub struct NudgeWorker {
    db: Database,
    adapter: Arc<dyn WhatsAppAdapter>,
    resolver: Arc<DriverResolver>,
    logger: MessageLogger,
    store: ContextStore,
    config: NudgeConfig,
}

impl NudgeWorker {
    pub fn new(
        db: Database,
        adapter: Arc<dyn WhatsAppAdapter>,
        resolver: Arc<DriverResolver>,
        logger: MessageLogger,
        store: ContextStore,
        config: NudgeConfig,
    ) -> Self {
        Self {
            db,
            adapter,
            resolver,
            logger,
            store,
            config,
        }
    }

    pub async fn run(self) {
        let interval = std::time::Duration::from_secs(self.config.interval_secs.max(60));
        loop {
            if let Err(e) = self.tick(now_jhb()).await {
                error!(error = %e, "nudge tick failed");
            }
            tokio::time::sleep(interval).await;
        }
    }

    /// One pass over the active roster at the given instant.
    pub async fn tick(&self, now: DateTime<FixedOffset>) -> Result<(), DineoError> {
        if !self.config.enabled {
            return Ok(());
        }
        let date = now.date_naive();
        if self.config.skip_sundays && is_sunday(date) {
            return Ok(());
        }
        let start = NaiveTime::from_hms_opt(self.config.start_hour, self.config.start_minute, 0)
            .unwrap_or(NaiveTime::MIN);
        if now.time() < start {
            return Ok(());
        }

        let date_str = date.to_string();
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

            let mut ctx = self.store.load(&wa_id);
            if ctx.opted_out() || ctx.get_bool(keys::FOLLOWUP_PAUSED).unwrap_or(false) {
                continue;
            }

            let trips = self
                .resolver
                .finished_trips_between(&wa_id, &day_start, &day_end)
                .await?;
            if trips > 0 {
                nudges::clear_nudges(&self.db, &wa_id, &date_str).await?;
                continue;
            }

            let row = nudges::get_nudge_row(&self.db, &wa_id, &date_str).await?;
            let count = row.as_ref().map(|r| r.nudge_count).unwrap_or(0);
            if count >= self.config.max_per_day {
                continue;
            }
            if let Some(last) = row.as_ref().and_then(|r| r.last_sent_at.as_deref())
                && let Ok(last_at) = DateTime::parse_from_rfc3339(last)
                && (now - last_at).num_seconds() < self.config.interval_secs as i64
            {
                continue;
            }

            let sequence = count + 1;
            let body = if sequence == 1 {
                FIRST_NUDGES[variant_index(&wa_id, 1, FIRST_NUDGES.len())]
            } else {
                REPEAT_NUDGES[variant_index(&wa_id, sequence as u64, REPEAT_NUDGES.len())]
            };

            match self.adapter.send_text(&wa_id, body).await {
                Ok(Some(message_id)) => {
                    nudges::record_nudge_sent(&self.db, &wa_id, &date_str, &now_str).await?;
                    nudges::insert_nudge_event(
                        &self.db,
                        &wa_id,
                        &date_str,
                        sequence,
                        Some(&message_id),
                        "sent",
                        &now_str,
                    )
                    .await?;
                    ctx.set(keys::LAST_NUDGE_OUTBOUND_ID, message_id.clone());
                    self.store.save(&wa_id, &ctx, &now_str).await?;
                    self.logger
                        .log(
                            &self.db,
                            &MessageLogEntry {
                                wa_id: wa_id.clone(),
                                direction: "OUTBOUND".into(),
                                message_text: Some(body.to_string()),
                                intent: Some("zero_trip_nudge".into()),
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
                    warn!(%wa_id, sequence, "nudge rejected by platform");
                    nudges::insert_nudge_event(
                        &self.db,
                        &wa_id,
                        &date_str,
                        sequence,
                        None,
                        "send_failed",
                        &now_str,
                    )
                    .await?;
                }
                Err(e) => {
                    warn!(%wa_id, sequence, error = %e, "nudge send errored");
                }
            }
        }

        if sent > 0 {
            info!(sent, date = %date_str, "zero-trip nudges sent");
        } else {
            debug!(date = %date_str, "nudge pass found nothing to send");
        }
        Ok(())
    }
}
