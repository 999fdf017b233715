//! Elapsed-time arithmetic over loosely formatted timestamps.
//!
//! Inputs arrive either as full datetimes or as bare times of day, and are
//! sometimes out of order (night shifts) or corrupt. None of these functions
//! fail: unparseable input yields zero and results are clamped so downstream
//! aggregation stays monotonic.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const SECONDS_PER_HOUR: Decimal = dec!(3600);
const MAX_SHIFT_HOURS: Decimal = dec!(24);
const HOURS_SCALE: u32 = 2;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const TIME_FORMATS: &[&str] = &["%H:%M:%S", "%H:%M", "%I:%M:%S %p", "%I:%M %p"];

/// Parses a full datetime, or a bare time of day bound to `today`.
pub fn parse_timestamp(raw: &str, today: NaiveDate) -> Option<NaiveDateTime> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.naive_local());
    }

    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt);
        }
    }

    let upper = value.to_ascii_uppercase();
    for format in TIME_FORMATS {
        if let Ok(time) = NaiveTime::parse_from_str(&upper, format) {
            return Some(today.and_time(time));
        }
    }

    None
}

/// Hours worked between two timestamps.
///
/// An `end` earlier than `start` is read as an overnight shift and gains 24h.
/// The result is clamped to `[0, 24]`; unparseable input returns 0.
pub fn elapsed_hours(start: &str, end: &str, today: NaiveDate) -> Decimal {
    match (parse_timestamp(start, today), parse_timestamp(end, today)) {
        (Some(start), Some(end)) => elapsed_hours_between(start, end),
        _ => Decimal::ZERO,
    }
}

/// Break length between two same-day timestamps, floored at 0.
pub fn break_duration(start: &str, end: &str, today: NaiveDate) -> Decimal {
    match (parse_timestamp(start, today), parse_timestamp(end, today)) {
        (Some(start), Some(end)) => break_hours_between(start, end),
        _ => Decimal::ZERO,
    }
}

pub fn elapsed_hours_between(start: NaiveDateTime, end: NaiveDateTime) -> Decimal {
    let end = if end < start {
        end + Duration::hours(24)
    } else {
        end
    };
    to_hours(end - start).clamp(Decimal::ZERO, MAX_SHIFT_HOURS)
}

pub fn break_hours_between(start: NaiveDateTime, end: NaiveDateTime) -> Decimal {
    to_hours(end - start).max(Decimal::ZERO)
}

fn to_hours(span: Duration) -> Decimal {
    (Decimal::from(span.num_seconds()) / SECONDS_PER_HOUR).round_dp(HOURS_SCALE)
}
