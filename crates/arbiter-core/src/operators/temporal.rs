//! Date and time operators.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde_json::Value;

use super::{defined, OperatorEnv, OperatorFn};

const NAIVE_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
];

const WEEKDAYS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub(super) const OPERATORS: &[(&str, OperatorFn)] = &[
    ("before_date", before_date),
    ("after_date", after_date),
    ("within_days", within_days),
    ("day_of_week", day_of_week),
];

/// Parse a JSON value into a UTC instant.
///
/// Accepts RFC 3339 strings, naive `YYYY-MM-DD[ T]HH:MM:SS[.f]` strings and
/// `YYYY-MM-DD` dates (interpreted as UTC), and integer Unix timestamps in
/// seconds.
pub fn parse_datetime(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_datetime_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| Utc.timestamp_opt(secs, 0).single()),
        _ => None,
    }
}

fn parse_datetime_str(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn both_dates(actual: Option<&Value>, expected: &Value) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
    Some((parse_datetime(defined(actual)?)?, parse_datetime(expected)?))
}

fn before_date(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    both_dates(actual, expected).is_some_and(|(a, e)| a < e)
}

fn after_date(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    both_dates(actual, expected).is_some_and(|(a, e)| a > e)
}

/// `|actual - now| <= days`, in either direction.
fn within_days(actual: Option<&Value>, expected: &Value, env: &OperatorEnv) -> bool {
    let Some(date) = defined(actual).and_then(parse_datetime) else {
        return false;
    };
    let Some(days) = expected.as_f64().filter(|d| d.is_finite() && *d >= 0.0) else {
        return false;
    };

    let distance_ms = (date - env.now).num_milliseconds().unsigned_abs() as f64;
    distance_ms <= days * MILLIS_PER_DAY
}

/// Operand is a weekday name (full or three-letter, any case) or an index
/// with Sunday = 0.
fn day_of_week(actual: Option<&Value>, expected: &Value, _env: &OperatorEnv) -> bool {
    let Some(date) = defined(actual).and_then(parse_datetime) else {
        return false;
    };
    let Some(wanted) = weekday_index(expected) else {
        return false;
    };
    date.weekday().num_days_from_sunday() == wanted
}

fn weekday_index(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().filter(|i| *i < 7).map(|i| i as u32),
        Value::String(s) => {
            let name = s.trim().to_lowercase();
            if let Ok(index) = name.parse::<u32>() {
                return (index < 7).then_some(index);
            }
            WEEKDAYS
                .iter()
                .position(|day| *day == name || (name.len() == 3 && day.starts_with(&name)))
                .map(|i| i as u32)
        }
        _ => None,
    }
}
