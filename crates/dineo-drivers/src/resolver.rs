// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Phone-variant driver resolution with a TTL identity cache.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use dineo_core::types::{Driver, KpiSnapshot, TodayKpis, WeeklyKpis};
use dineo_core::wa::{normalize_wa_id, phone_variants};
use dineo_core::DineoError;
use dineo_storage::queries::warehouse;
use dineo_storage::Database;
use tracing::debug;

/// Normalise an upstream acceptance-rate string to the 0-100 range.
///
/// Exports have shipped `0.65`, `65` and `65%` at different times. Values at
/// or below 1.0 are treated as fractions.
pub fn coerce_percent(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches('%').trim();
    let value: f64 = cleaned.parse().ok()?;
    if !value.is_finite() || value < 0.0 {
        return None;
    }
    let percent = if value <= 1.0 { value * 100.0 } else { value };
    Some(percent.min(100.0))
}

struct CacheEntry {
    driver: Option<Driver>,
    fetched_at: Instant,
}

/// Resolves drivers from the warehouse roster, caching identities.
///
/// KPI reads always hit the database; only the identity join is cached,
/// since roster rows change far less often than KPI snapshots.
pub struct DriverResolver {
    db: Database,
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
}

impl DriverResolver {
    pub fn new(db: Database, ttl: Duration) -> Self {
        Self {
            db,
            cache: DashMap::new(),
            ttl,
        }
    }

    /// Resolve a driver by wa_id, joining roster and KPI identity fields.
    pub async fn resolve(&self, wa_id: &str) -> Result<Option<Driver>, DineoError> {
        let wa_id = normalize_wa_id(wa_id);
        if let Some(entry) = self.cache.get(&wa_id)
            && entry.fetched_at.elapsed() < self.ttl
        {
            return Ok(entry.driver.clone());
        }

        let driver = self.resolve_uncached(&wa_id).await?;
        self.cache.insert(
            wa_id,
            CacheEntry {
                driver: driver.clone(),
                fetched_at: Instant::now(),
            },
        );
        Ok(driver)
    }

    async fn resolve_uncached(&self, wa_id: &str) -> Result<Option<Driver>, DineoError> {
        let variants = phone_variants(wa_id);
        let roster = warehouse::roster_by_phones(&self.db, &variants).await?;
        let kpi = warehouse::latest_kpi_for_phones(&self.db, &variants).await?;
        if roster.is_none() && kpi.is_none() {
            debug!(wa_id, "unknown driver");
            return Ok(None);
        }

        let roster = roster.unwrap_or_default();
        let kpi = kpi.unwrap_or_default();
        Ok(Some(Driver {
            wa_id: wa_id.to_string(),
            driver_id: roster.driver_id.or(kpi.driver_id),
            personal_code: roster.personal_code.or(kpi.personal_code),
            display_name: roster.full_name.or(kpi.display_name),
            asset_model: kpi.asset_model,
            car_reg_number: kpi.car_reg_number,
            contact_ids: roster.contact_ids,
        }))
    }

    /// Resolve a driver by roster personal code, used by account inquiries.
    pub async fn resolve_by_code(&self, personal_code: &str) -> Result<Option<Driver>, DineoError> {
        let roster = warehouse::roster_by_personal_code(&self.db, personal_code).await?;
        let Some(roster) = roster else {
            return Ok(None);
        };
        let wa_id = roster
            .phone
            .as_deref()
            .map(normalize_wa_id)
            .unwrap_or_default();
        let kpi = warehouse::latest_kpi_for_code(&self.db, personal_code)
            .await?
            .unwrap_or_default();
        Ok(Some(Driver {
            wa_id,
            driver_id: roster.driver_id.or(kpi.driver_id),
            personal_code: roster.personal_code,
            display_name: roster.full_name.or(kpi.display_name),
            asset_model: kpi.asset_model,
            car_reg_number: kpi.car_reg_number,
            contact_ids: roster.contact_ids,
        }))
    }

    /// Latest 7-day KPI roll-up, with the acceptance rate coerced to 0-100
    /// and the Xero balance refreshed from the daily-balance table when the
    /// driver's contact ids are on file.
    pub async fn weekly_kpis(&self, wa_id: &str) -> Result<Option<WeeklyKpis>, DineoError> {
        let wa_id = normalize_wa_id(wa_id);
        let variants = phone_variants(&wa_id);
        let Some(row) = warehouse::latest_kpi_for_phones(&self.db, &variants).await? else {
            return Ok(None);
        };

        let mut kpis = WeeklyKpis {
            report_date: row.report_date,
            online_hours: row.online_hours,
            finished_trips: row.finished_trips,
            gross_earnings: row.gross_earnings,
            acceptance_rate: row
                .acceptance_rate
                .as_deref()
                .and_then(coerce_percent)
                .unwrap_or(0.0),
            earnings_per_hour: row.earnings_per_hour,
            xero_balance: row.xero_balance,
            payments_7d: row.payments_7d,
        };
        if let Some(driver) = self.resolve(&wa_id).await?
            && let Some(fresh) =
                warehouse::latest_xero_balance(&self.db, &driver.contact_ids).await?
        {
            kpis.xero_balance = fresh;
        }
        Ok(Some(kpis))
    }

    /// Same-day aggregates over trip orders inside the given ISO bounds.
    pub async fn today_kpis(
        &self,
        wa_id: &str,
        day_start: &str,
        day_end: &str,
    ) -> Result<TodayKpis, DineoError> {
        let variants = phone_variants(&normalize_wa_id(wa_id));
        warehouse::today_order_aggregates(&self.db, &variants, day_start, day_end).await
    }

    /// Weekly and same-day KPIs in one structure.
    pub async fn kpi_snapshot(
        &self,
        wa_id: &str,
        day_start: &str,
        day_end: &str,
    ) -> Result<Option<KpiSnapshot>, DineoError> {
        let Some(weekly) = self.weekly_kpis(wa_id).await? else {
            return Ok(None);
        };
        let today = self.today_kpis(wa_id, day_start, day_end).await?;
        Ok(Some(KpiSnapshot { weekly, today }))
    }

    /// Finished-trip count for today, for the zero-trip and intraday workers.
    pub async fn finished_trips_between(
        &self,
        wa_id: &str,
        day_start: &str,
        day_end: &str,
    ) -> Result<i64, DineoError> {
        let variants = phone_variants(&normalize_wa_id(wa_id));
        warehouse::count_finished_orders(&self.db, &variants, day_start, day_end).await
    }

    /// Drop a cached identity, e.g. after a roster reload.
    pub fn invalidate(&self, wa_id: &str) {
        self.cache.remove(&normalize_wa_id(wa_id));
    }
}
