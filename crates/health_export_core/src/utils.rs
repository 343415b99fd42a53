//! Utility functions for timestamp parsing and formatting.

use chrono::{
    DateTime, FixedOffset, Local, NaiveDate, NaiveDateTime, NaiveTime, SecondsFormat, TimeZone,
    Utc,
};

/// Parse a record timestamp.
///
/// Accepts:
/// - RFC3339 datetime (offset preserved)
/// - Naive datetime `YYYY-MM-DDTHH:MM:SS[.fff]`, read as device-local time
pub fn parse_timestamp(s: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt);
    }
    let naive = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

/// Parse a window bound.
///
/// Accepts:
/// - `YYYY-MM-DD` -> local midnight of that day
/// - anything [`parse_timestamp`] accepts
pub fn parse_date_bound(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(local_midnight(date));
    }
    parse_timestamp(s).map(|dt| dt.with_timezone(&Utc))
}

/// Start of `date` in the device-local zone.
pub fn local_midnight(date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

/// Calendar date of `t` in the device-local zone.
pub fn local_date<Tz: TimeZone>(t: &DateTime<Tz>) -> NaiveDate {
    t.with_timezone(&Local).date_naive()
}

pub fn format_timestamp<Tz: TimeZone>(t: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    t.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// `"YYYY-MM-DD to YYYY-MM-DD"`, or `"No data"` when either bound is missing.
pub fn date_range_label(earliest: Option<NaiveDate>, latest: Option<NaiveDate>) -> String {
    match (earliest, latest) {
        (Some(e), Some(l)) => format!("{} to {}", format_date(e), format_date(l)),
        _ => "No data".to_string(),
    }
}
