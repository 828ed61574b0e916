//! Strict calendar-date bounds.
//!
//! Date filters accept exactly `YYYY-MM-DD`: four-two-two digits with `-`
//! separators. Wrong separators and missing leading zeros are format errors;
//! a well-formed string naming an impossible date (month 13, Feb 30 outside
//! a leap year) is a calendar error. Both fail fast, before any external
//! call.

use chrono::NaiveDate;
use regex::Regex;

use crate::errors::{Result, SearchError};

/// Parse a strict `YYYY-MM-DD` date.
///
/// `flag` names the offending bound (`--after` or `--before`) in errors.
fn parse_strict(value: &str, flag: &str) -> Result<NaiveDate> {
    // Compiled per call; validation runs once per search.
    let shape = Regex::new(r"^(\d{4})-(\d{2})-(\d{2})$").expect("valid regex");
    let caps = shape.captures(value).ok_or_else(|| SearchError::InvalidDate {
        flag: flag.to_string(),
        value: value.to_string(),
    })?;

    let year: i32 = caps[1].parse().expect("four digits");
    let month: u32 = caps[2].parse().expect("two digits");
    let day: u32 = caps[3].parse().expect("two digits");

    NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| SearchError::NotCalendarDate { value: value.to_string() })
}

/// Millisecond timestamp of the first instant of the given day (UTC).
pub fn day_start_ms(value: &str, flag: &str) -> Result<i64> {
    let date = parse_strict(value, flag)?;
    let start = date.and_hms_opt(0, 0, 0).expect("midnight exists");
    Ok(start.and_utc().timestamp_millis())
}

/// Millisecond timestamp of the last instant of the given day (UTC), so the
/// bound is inclusive.
pub fn day_end_ms(value: &str, flag: &str) -> Result<i64> {
    let date = parse_strict(value, flag)?;
    let end = date.and_hms_milli_opt(23, 59, 59, 999).expect("end of day exists");
    Ok(end.and_utc().timestamp_millis())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
