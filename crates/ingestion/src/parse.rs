//! Cell coercion: numbers, booleans, and permissive timestamps.
//!
//! Every function returns `None` for a value it cannot interpret; callers
//! drop the row rather than failing the table.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use finboard_core::from_epoch_ms;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
    "%d.%m.%Y %H:%M:%S",
];

const OFFSET_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S%.f%:z"];

// Month-first before day-first, as spreadsheet exports usually are.
const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%d.%m.%Y",
    "%d-%m-%Y",
    "%b %d, %Y",
    "%d %b %Y",
];

/// Parse a finite float. Empty, non-numeric, and non-finite values are `None`.
#[inline]
pub fn parse_number(cell: &str) -> Option<f64> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an integer id, accepting float spellings like `"42.0"`.
pub fn parse_integer(cell: &str) -> Option<i64> {
    let trimmed = cell.trim();
    if let Ok(v) = trimmed.parse::<i64>() {
        return Some(v);
    }
    parse_number(trimmed)
        .filter(|v| v.fract() == 0.0 && v.abs() < 9.0e15)
        .map(|v| v as i64)
}

/// Parse a boolean flag (`true`/`false`, `1`/`0`, `yes`/`no`).
pub fn parse_bool(cell: &str) -> Option<bool> {
    match cell.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}

/// Parse a timestamp into naive UTC.
///
/// Integers are classified by digit count: 8 digits are `YYYYMMDD`, 9-10
/// epoch seconds, 11-15 epoch milliseconds, 16 or more epoch microseconds.
/// Strings try RFC 3339, offset date-times, naive date-times, then dates.
pub fn parse_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return None;
    }

    let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
    if digits.bytes().all(|b| b.is_ascii_digit()) {
        return parse_epoch(trimmed, digits.len());
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.naive_utc());
    }
    for fmt in OFFSET_DATETIME_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(trimmed, fmt) {
            return Some(dt.naive_utc());
        }
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(trimmed, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Parse an exchange time cell. Integers are always epoch milliseconds,
/// however few digits they have; anything else goes through
/// [`parse_timestamp`].
pub fn parse_epoch_ms_or_timestamp(cell: &str) -> Option<NaiveDateTime> {
    let trimmed = cell.trim();
    match trimmed.parse::<i64>() {
        Ok(ms) => from_epoch_ms(ms),
        Err(_) => parse_timestamp(trimmed),
    }
}

fn parse_epoch(value: &str, digit_count: usize) -> Option<NaiveDateTime> {
    let n: i64 = value.parse().ok()?;
    match digit_count {
        8 => NaiveDate::parse_from_str(value, "%Y%m%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0)),
        9 | 10 => DateTime::from_timestamp(n, 0).map(|dt| dt.naive_utc()),
        11..=15 => from_epoch_ms(n),
        16..=19 => DateTime::from_timestamp(
            n.div_euclid(1_000_000),
            (n.rem_euclid(1_000_000) * 1_000) as u32,
        )
        .map(|dt| dt.naive_utc()),
        _ => None,
    }
}
