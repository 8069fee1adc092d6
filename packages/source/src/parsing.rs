//! Shared parsing utilities for raw feed cells.
//!
//! CSV loading yields every cell as a string, while hand-built rows (and JSON
//! feeds) may carry numbers. The field helpers here accept either.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Date-only layouts tried after the date-time layouts.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Naive date-time layouts (no offset).
const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

/// Date-time layouts carrying an offset. `%#z` accepts `+00` as well as
/// `+00:00`.
const OFFSET_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f%#z",
    "%Y/%m/%d %H:%M:%S%.f%#z",
];

/// Parses a station open date or date-time into a calendar date.
///
/// The date is taken in the timestamp's own offset; no timezone conversion is
/// applied. Returns `None` for empty or unrecognized values.
#[must_use]
pub fn parse_open_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.date_naive());
        }
    }
    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.date());
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(date);
        }
    }
    None
}

/// Parses a population count, tolerating thousands separators and
/// integral floats (`"4,779,736"`, `"4779736.0"`).
#[must_use]
pub fn parse_population(s: &str) -> Option<u64> {
    let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return None;
    }
    if let Ok(n) = cleaned.parse::<u64>() {
        return Some(n);
    }
    let f = cleaned.parse::<f64>().ok()?;
    if !f.is_finite() || f < 0.0 || f.fract() != 0.0 || f > 9.0e15 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some(f as u64)
}

/// Gets a trimmed, non-empty string cell. Numeric cells are rendered with
/// their JSON representation.
#[must_use]
pub fn field_str(record: &serde_json::Value, field: &str) -> Option<String> {
    match record.get(field)? {
        serde_json::Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_owned())
        }
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Gets a finite floating-point cell from either a number or a string.
#[must_use]
pub fn field_f64(record: &serde_json::Value, field: &str) -> Option<f64> {
    let value = record.get(field)?;
    let parsed = value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse::<f64>().ok()))?;
    parsed.is_finite().then_some(parsed)
}

/// Gets an integer cell from either a number or a string.
#[must_use]
pub fn field_i32(record: &serde_json::Value, field: &str) -> Option<i32> {
    let value = record.get(field)?;
    if let Some(n) = value.as_i64() {
        return i32::try_from(n).ok();
    }
    value.as_str()?.trim().parse::<i32>().ok()
}

/// Gets a population cell from either a number or a string.
#[must_use]
pub fn field_population(record: &serde_json::Value, field: &str) -> Option<u64> {
    match record.get(field)? {
        serde_json::Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .and_then(|f| parse_population(&format!("{f}")))
        }),
        serde_json::Value::String(s) => parse_population(s),
        _ => None,
    }
}

/// Compares two geography codes. Numeric codes compare by value so that
/// `"040"` and `"40"` match; anything else compares trimmed text.
#[must_use]
pub fn codes_match(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a == b {
        return true;
    }
    match (a.parse::<u64>(), b.parse::<u64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}
