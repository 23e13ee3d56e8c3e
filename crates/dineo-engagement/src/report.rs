// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! KPI uplift report for a sent campaign.
//!
//! Compares each driver's latest weekly KPIs against the baseline snapshot
//! captured at send time, and tallies responses inside the configured
//! window. A responder whose KPIs now clear the weekly targets counts as
//! committed; other responders are promise-to-pay.

use chrono::{DateTime, Duration, FixedOffset};
use dineo_config::model::EngagementConfig;
use dineo_core::DineoError;
use dineo_drivers::DriverResolver;
use dineo_storage::queries::engagement;
use dineo_storage::{Database, MessageLogger};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-driver uplift line in the campaign report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowUplift {
    pub wa_id: String,
    pub template_id: Option<String>,
    pub baseline_online_hours: f64,
    pub current_online_hours: f64,
    pub hours_delta: f64,
    pub baseline_trips: i64,
    pub current_trips: i64,
    pub trips_delta: i64,
    pub hours_target_met: bool,
    pub trips_target_met: bool,
    pub responded: bool,
    pub committed: bool,
}

/// Campaign-level aggregates plus the per-driver lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpliftReport {
    pub campaign_id: String,
    pub sent: usize,
    pub responded: usize,
    pub committed: usize,
    pub ptp: usize,
    pub rows: Vec<RowUplift>,
}

fn baseline_f64(metrics: &Value, field: &str) -> f64 {
    metrics
        .pointer(&format!("/weekly/{field}"))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn baseline_i64(metrics: &Value, field: &str) -> i64 {
    metrics
        .pointer(&format!("/weekly/{field}"))
        .and_then(Value::as_i64)
        .unwrap_or(0)
}

/// Build the uplift report for every sent row of a campaign.
pub async fn build_report(
    db: &Database,
    resolver: &DriverResolver,
    logger: &MessageLogger,
    config: &EngagementConfig,
    campaign_id: &str,
    now: DateTime<FixedOffset>,
) -> Result<UpliftReport, DineoError> {
    let rows = engagement::rows_for_campaign(db, campaign_id).await?;
    let mut report = UpliftReport {
        campaign_id: campaign_id.to_string(),
        sent: 0,
        responded: 0,
        committed: 0,
        ptp: 0,
        rows: Vec::new(),
    };

    for row in rows {
        if row.send_status != "sent" {
            continue;
        }
        report.sent += 1;

        let current = resolver.weekly_kpis(&row.wa_id).await?.unwrap_or_default();
        let baseline_hours = baseline_f64(&row.baseline_metrics, "online_hours");
        let baseline_trips = baseline_i64(&row.baseline_metrics, "finished_trips");
        let hours_target_met = current.online_hours >= config.target_online_hours_min;
        let trips_target_met = current.finished_trips >= config.target_trips;

        let responded = match &row.sent_at {
            Some(sent_at) => {
                let window_end = DateTime::parse_from_rfc3339(sent_at)
                    .map(|at| at + Duration::days(config.response_window_days))
                    .unwrap_or(now);
                let until = window_end.min(now).to_rfc3339();
                logger
                    .has_inbound_between(db, &row.wa_id, sent_at, &until)
                    .await?
            }
            None => false,
        };
        let committed = responded && (hours_target_met || trips_target_met);
        if responded {
            report.responded += 1;
            if committed {
                report.committed += 1;
            } else {
                report.ptp += 1;
            }
        }

        report.rows.push(RowUplift {
            wa_id: row.wa_id,
            template_id: row.template_id,
            baseline_online_hours: baseline_hours,
            current_online_hours: current.online_hours,
            hours_delta: current.online_hours - baseline_hours,
            baseline_trips,
            current_trips: current.finished_trips,
            trips_delta: current.finished_trips - baseline_trips,
            hours_target_met,
            trips_target_met,
            responded,
            committed,
        });
    }

    Ok(report)
}
