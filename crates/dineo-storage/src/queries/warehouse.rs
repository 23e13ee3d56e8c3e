// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only access to the warehouse tables.
//!
//! Deployments bulk-load `driver_kpi_summary`, `bolt_orders_new`,
//! `simplyfleet_driver_backup` and `xero_daily_balance` out of band; nothing
//! in this crate writes to them. Phone columns upstream are inconsistently
//! formatted, so lookups take the caller's full set of phone variants.
//!
//! `acceptance_rate` stays a raw string here; upstream exports have shipped
//! it as `0.65`, `65` and `65%` at different times and the resolver layer
//! owns the coercion.

use dineo_core::DineoError;
use dineo_core::types::TodayKpis;
use rusqlite::{OptionalExtension, params};

use crate::database::{Database, map_tr_err};

/// One row of `driver_kpi_summary`, untouched by normalisation.
#[derive(Debug, Clone, Default)]
pub struct KpiSummaryRow {
    pub report_date: String,
    pub phone: String,
    pub driver_id: Option<String>,
    pub personal_code: Option<String>,
    pub display_name: Option<String>,
    pub asset_model: Option<String>,
    pub car_reg_number: Option<String>,
    pub online_hours: f64,
    pub finished_trips: i64,
    pub gross_earnings: f64,
    pub acceptance_rate: Option<String>,
    pub earnings_per_hour: f64,
    pub xero_balance: f64,
    pub payments_7d: f64,
}

/// One row of the `simplyfleet_driver_backup` roster.
#[derive(Debug, Clone, Default)]
pub struct RosterRow {
    pub driver_id: Option<String>,
    pub personal_code: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub status: Option<String>,
    pub contact_ids: Vec<String>,
}

/// The newest KPI summary row matching any of the phone variants.
pub async fn latest_kpi_for_phones(
    db: &Database,
    phones: &[String],
) -> Result<Option<KpiSummaryRow>, DineoError> {
    if phones.is_empty() {
        return Ok(None);
    }
    let phones = phones.to_vec();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT {KPI_COLUMNS} FROM driver_kpi_summary
                 WHERE phone IN ({}) ORDER BY report_date DESC, id DESC LIMIT 1",
                placeholders(phones.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt
                .query_row(rusqlite::params_from_iter(phones.iter()), read_kpi)
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// The newest KPI summary row for a driver personal code.
pub async fn latest_kpi_for_code(
    db: &Database,
    personal_code: &str,
) -> Result<Option<KpiSummaryRow>, DineoError> {
    let personal_code = personal_code.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        "SELECT {KPI_COLUMNS} FROM driver_kpi_summary
                         WHERE personal_code = ?1 ORDER BY report_date DESC, id DESC LIMIT 1"
                    ),
                    params![personal_code],
                    read_kpi,
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Roster row matching any of the phone variants.
pub async fn roster_by_phones(
    db: &Database,
    phones: &[String],
) -> Result<Option<RosterRow>, DineoError> {
    if phones.is_empty() {
        return Ok(None);
    }
    let phones = phones.to_vec();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT driver_id, personal_code, full_name, phone, status, contact_ids
                 FROM simplyfleet_driver_backup WHERE phone IN ({}) LIMIT 1",
                placeholders(phones.len())
            );
            let mut stmt = conn.prepare(&sql)?;
            let row = stmt
                .query_row(rusqlite::params_from_iter(phones.iter()), read_roster)
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Roster row by personal code, used by the account-inquiry flow.
pub async fn roster_by_personal_code(
    db: &Database,
    personal_code: &str,
) -> Result<Option<RosterRow>, DineoError> {
    let personal_code = personal_code.to_string();
    db.connection()
        .call(move |conn| {
            let row = conn
                .query_row(
                    "SELECT driver_id, personal_code, full_name, phone, status, contact_ids
                     FROM simplyfleet_driver_backup WHERE personal_code = ?1 LIMIT 1",
                    params![personal_code],
                    read_roster,
                )
                .optional()?;
            Ok(row)
        })
        .await
        .map_err(map_tr_err)
}

/// Phones of roster drivers marked active. Feeds the scheduled workers.
pub async fn active_driver_phones(db: &Database) -> Result<Vec<String>, DineoError> {
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT phone FROM simplyfleet_driver_backup
                 WHERE phone IS NOT NULL AND phone != ''
                       AND LOWER(COALESCE(status, '')) = 'active'",
            )?;
            let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
            let mut phones = Vec::new();
            for row in rows {
                phones.push(row?);
            }
            Ok(phones)
        })
        .await
        .map_err(map_tr_err)
}

/// Same-day aggregates over trip orders between the given ISO bounds.
///
/// `trips_sent` counts every order offered, `trips_accepted` excludes
/// driver rejections and no-responses, `trips_finished` and the averages
/// cover completed rides only.
pub async fn today_order_aggregates(
    db: &Database,
    phones: &[String],
    day_start: &str,
    day_end: &str,
) -> Result<TodayKpis, DineoError> {
    if phones.is_empty() {
        return Ok(TodayKpis::default());
    }
    let phones = phones.to_vec();
    let day_start = day_start.to_string();
    let day_end = day_end.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT order_status, ride_price, payment_method, distance_km, duration_min
                 FROM bolt_orders_new
                 WHERE driver_phone IN ({})
                       AND order_created_at >= ?{} AND order_created_at < ?{}",
                placeholders(phones.len()),
                phones.len() + 1,
                phones.len() + 2
            );
            let mut stmt = conn.prepare(&sql)?;
            let mut args: Vec<String> = phones.clone();
            args.push(day_start.clone());
            args.push(day_end.clone());
            let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, Option<f64>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<f64>>(3)?,
                    row.get::<_, Option<f64>>(4)?,
                ))
            })?;

            let mut kpis = TodayKpis::default();
            let mut dist_sum = 0.0;
            let mut dur_sum = 0.0;
            for row in rows {
                let (status, price, payment, distance, duration) = row?;
                kpis.trips_sent += 1;
                if is_accepted_order(&status) {
                    kpis.trips_accepted += 1;
                }
                if is_finished_order(&status) {
                    kpis.trips_finished += 1;
                    kpis.gmv += price.unwrap_or(0.0);
                    dist_sum += distance.unwrap_or(0.0);
                    dur_sum += duration.unwrap_or(0.0);
                    if payment
                        .as_deref()
                        .is_some_and(|p| p.to_ascii_lowercase().contains("cash"))
                    {
                        kpis.cash_trips += 1;
                    } else {
                        kpis.card_trips += 1;
                    }
                }
            }
            if kpis.trips_finished > 0 {
                kpis.avg_distance_km = dist_sum / kpis.trips_finished as f64;
                kpis.avg_duration_min = dur_sum / kpis.trips_finished as f64;
            }
            Ok(kpis)
        })
        .await
        .map_err(map_tr_err)
}

/// Cheap finished-trip count for the nudge and intraday workers.
pub async fn count_finished_orders(
    db: &Database,
    phones: &[String],
    day_start: &str,
    day_end: &str,
) -> Result<i64, DineoError> {
    if phones.is_empty() {
        return Ok(0);
    }
    let phones = phones.to_vec();
    let day_start = day_start.to_string();
    let day_end = day_end.to_string();
    db.connection()
        .call(move |conn| {
            let sql = format!(
                "SELECT COUNT(*) FROM bolt_orders_new
                 WHERE driver_phone IN ({})
                       AND order_created_at >= ?{} AND order_created_at < ?{}
                       AND LOWER(order_status) IN ('finished', 'completed', 'complete', 'done')",
                placeholders(phones.len()),
                phones.len() + 1,
                phones.len() + 2
            );
            let mut args: Vec<String> = phones.clone();
            args.push(day_start.clone());
            args.push(day_end.clone());
            let count = conn.query_row(&sql, rusqlite::params_from_iter(args.iter()), |row| {
                row.get(0)
            })?;
            Ok(count)
        })
        .await
        .map_err(map_tr_err)
}

/// Top pickup suburbs by finished-trip volume inside the given bounds.
pub async fn busy_suburbs(
    db: &Database,
    day_start: &str,
    day_end: &str,
    limit: i64,
) -> Result<Vec<(String, i64)>, DineoError> {
    let day_start = day_start.to_string();
    let day_end = day_end.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT pickup_suburb, COUNT(*) AS trips FROM bolt_orders_new
                 WHERE pickup_suburb IS NOT NULL AND pickup_suburb != ''
                       AND order_created_at >= ?1 AND order_created_at < ?2
                       AND LOWER(order_status) IN ('finished', 'completed', 'complete', 'done')
                 GROUP BY pickup_suburb ORDER BY trips DESC LIMIT ?3",
            )?;
            let rows = stmt.query_map(params![day_start, day_end, limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Finished-trip volume for pickup suburbs whose name appears in the given
/// free text, case insensitive. Matches "just here in Soweto" against the
/// suburb "Soweto"; empty when no suburb name occurs in the text.
pub async fn busy_suburbs_matching(
    db: &Database,
    text: &str,
    day_start: &str,
    day_end: &str,
    limit: i64,
) -> Result<Vec<(String, i64)>, DineoError> {
    let text = text.to_string();
    let day_start = day_start.to_string();
    let day_end = day_end.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT pickup_suburb, COUNT(*) AS trips FROM bolt_orders_new
                 WHERE pickup_suburb IS NOT NULL AND pickup_suburb != ''
                       AND instr(LOWER(?1), LOWER(pickup_suburb)) > 0
                       AND order_created_at >= ?2 AND order_created_at < ?3
                       AND LOWER(order_status) IN ('finished', 'completed', 'complete', 'done')
                 GROUP BY pickup_suburb ORDER BY trips DESC LIMIT ?4",
            )?;
            let rows = stmt.query_map(params![text, day_start, day_end, limit], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            let mut out = Vec::new();
            for row in rows {
                out.push(row?);
            }
            Ok(out)
        })
        .await
        .map_err(map_tr_err)
}

/// Sum of each contact's most recent Xero balance.
pub async fn latest_xero_balance(
    db: &Database,
    contact_ids: &[String],
) -> Result<Option<f64>, DineoError> {
    if contact_ids.is_empty() {
        return Ok(None);
    }
    let contact_ids = contact_ids.to_vec();
    db.connection()
        .call(move |conn| {
            let mut total = None;
            for contact_id in &contact_ids {
                let balance: Option<f64> = conn
                    .query_row(
                        "SELECT balance FROM xero_daily_balance
                         WHERE contact_id = ?1 ORDER BY as_of_date DESC, id DESC LIMIT 1",
                        params![contact_id],
                        |row| row.get(0),
                    )
                    .optional()?;
                if let Some(b) = balance {
                    total = Some(total.unwrap_or(0.0) + b);
                }
            }
            Ok(total)
        })
        .await
        .map_err(map_tr_err)
}

fn placeholders(n: usize) -> String {
    (1..=n).map(|i| format!("?{i}")).collect::<Vec<_>>().join(", ")
}

fn is_finished_order(status: &str) -> bool {
    matches!(
        status.to_ascii_lowercase().as_str(),
        "finished" | "completed" | "complete" | "done"
    )
}

fn is_accepted_order(status: &str) -> bool {
    !matches!(
        status.to_ascii_lowercase().as_str(),
        "driver_rejected" | "driver_did_not_respond" | "rejected" | "expired"
    )
}

const KPI_COLUMNS: &str = "report_date, phone, driver_id, personal_code, display_name, \
     asset_model, car_reg_number, online_hours, finished_trips, gross_earnings, acceptance_rate, \
     earnings_per_hour, xero_balance, payments_7d";

fn read_kpi(row: &rusqlite::Row<'_>) -> Result<KpiSummaryRow, rusqlite::Error> {
    Ok(KpiSummaryRow {
        report_date: row.get(0)?,
        phone: row.get(1)?,
        driver_id: row.get(2)?,
        personal_code: row.get(3)?,
        display_name: row.get(4)?,
        asset_model: row.get(5)?,
        car_reg_number: row.get(6)?,
        online_hours: row.get::<_, Option<f64>>(7)?.unwrap_or(0.0),
        finished_trips: row.get::<_, Option<i64>>(8)?.unwrap_or(0),
        gross_earnings: row.get::<_, Option<f64>>(9)?.unwrap_or(0.0),
        acceptance_rate: row.get(10)?,
        earnings_per_hour: row.get::<_, Option<f64>>(11)?.unwrap_or(0.0),
        xero_balance: row.get::<_, Option<f64>>(12)?.unwrap_or(0.0),
        payments_7d: row.get::<_, Option<f64>>(13)?.unwrap_or(0.0),
    })
}

fn read_roster(row: &rusqlite::Row<'_>) -> Result<RosterRow, rusqlite::Error> {
    let contact_ids: String = row.get(5)?;
    Ok(RosterRow {
        driver_id: row.get(0)?,
        personal_code: row.get(1)?,
        full_name: row.get(2)?,
        phone: row.get(3)?,
        status: row.get(4)?,
        contact_ids: serde_json::from_str(&contact_ids).unwrap_or_default(),
    })
}
