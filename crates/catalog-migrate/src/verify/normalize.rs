//! Value normalization for cross-catalog comparison.
//!
//! Timestamps read back as JSON differ in spelling between column types
//! (`timestamp` gives `2024-01-01T10:00:00`, `timestamptz` gives
//! `2024-01-01T10:00:00+00:00`). Both are folded into one ISO 8601 UTC form
//! before comparing:
//!
//! - values with an offset are converted to UTC
//! - values without one are taken as UTC
//! - fractional seconds are always written with 6 digits
//! - a bare date is midnight

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde_json::Value;

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse a JSON value as a UTC instant.
pub fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    let s = value.as_str()?.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // "2024-01-01 10:00:00+00" as printed by some drivers
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%#z") {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Normalize a timestamp value to ISO 8601 UTC with microseconds.
///
/// Null is None. Values that do not parse as timestamps are compared as
/// their trimmed text.
pub fn normalize_timestamp(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(
            parse_timestamp(value)
                .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Micros, true))
                .unwrap_or_else(|| s.trim().to_string()),
        ),
        other => Some(other.to_string()),
    }
}

/// Normalize to date granularity (`YYYY-MM-DD`), ignoring time of day.
pub fn normalize_date(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(
            parse_timestamp(value)
                .map(|dt| dt.date_naive().to_string())
                .unwrap_or_else(|| s.trim().to_string()),
        ),
        other => Some(other.to_string()),
    }
}
