// SPDX-FileCopyrightText: 2026 Dineo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Johannesburg-local time helpers.
//!
//! All driver-facing timestamps, greeting bookkeeping and scheduled-worker
//! day windows use South African Standard Time. SAST is a fixed UTC+2 with
//! no daylight saving, so a `FixedOffset` is sufficient and we avoid
//! carrying a tz database.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, TimeZone, Utc};

/// Seconds east of UTC for SAST.
const SAST_OFFSET_SECS: i32 = 2 * 3600;

/// The fixed UTC+2 offset for Africa/Johannesburg.
pub fn jhb_offset() -> FixedOffset {
    // 2 * 3600 is always a valid offset.
    FixedOffset::east_opt(SAST_OFFSET_SECS).unwrap_or_else(|| unreachable!())
}

/// Current wall-clock time in Johannesburg.
pub fn now_jhb() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&jhb_offset())
}

/// Today's calendar date in Johannesburg.
pub fn today_jhb() -> NaiveDate {
    now_jhb().date_naive()
}

/// The `[00:00, next 00:00)` bounds of a Johannesburg calendar day, as
/// ISO-8601 strings suitable for lexicographic comparison in SQL.
pub fn day_bounds_iso(date: NaiveDate) -> (String, String) {
    let start = start_of_day(date);
    let end = start_of_day(date.succ_opt().unwrap_or(date));
    (start.to_rfc3339(), end.to_rfc3339())
}

/// Midnight at the start of the given Johannesburg date.
pub fn start_of_day(date: NaiveDate) -> DateTime<FixedOffset> {
    jhb_offset()
        .with_ymd_and_hms(date.year(), date.month(), date.day(), 0, 0, 0)
        .single()
        .unwrap_or_else(|| now_jhb())
}

/// ISO-8601 string for a Johannesburg timestamp (stable storage format).
pub fn iso(dt: DateTime<FixedOffset>) -> String {
    dt.to_rfc3339()
}

/// Current Johannesburg timestamp as ISO-8601, for storage columns.
pub fn now_iso() -> String {
    iso(now_jhb())
}

/// True when the given Johannesburg date falls on a Sunday.
pub fn is_sunday(date: NaiveDate) -> bool {
    date.weekday() == chrono::Weekday::Sun
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn offset_is_plus_two_hours() {
        assert_eq!(jhb_offset().local_minus_utc(), 7200);
    }

    #[test]
    fn day_bounds_cover_twenty_four_hours() {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        let (start, end) = day_bounds_iso(date);
        assert!(start.starts_with("2026-03-14T00:00:00"));
        assert!(end.starts_with("2026-03-15T00:00:00"));
        assert!(start < end);
    }

    #[test]
    fn start_of_day_is_midnight() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        let start = start_of_day(date);
        assert_eq!(start.hour(), 0);
        assert_eq!(start.minute(), 0);
    }

    #[test]
    fn sunday_detection() {
        // 2026-03-15 is a Sunday.
        assert!(is_sunday(NaiveDate::from_ymd_opt(2026, 3, 15).unwrap()));
        assert!(!is_sunday(NaiveDate::from_ymd_opt(2026, 3, 16).unwrap()));
    }
}
