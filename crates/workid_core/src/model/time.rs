//! Instant parsing.

use crate::error::ValidationError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Parses a client-submitted instant and normalizes it to UTC.
///
/// Accepted forms:
/// - RFC 3339 with any offset (`2024-05-01T09:30:00+02:00`)
/// - naive date-time, taken as UTC (`2024-05-01T09:30`, `2024-05-01 09:30:00.5`)
/// - a bare date, taken as midnight UTC (`2024-05-01`)
/// - integer unix seconds (`1714555800`)
///
/// # Errors
///
/// Returns [`ValidationError::InvalidTimestamp`] for anything else.
pub fn parse_instant(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    let text = input.trim();
    let invalid = || ValidationError::InvalidTimestamp(input.to_string());

    if !text.is_empty() && text.trim_start_matches('-').bytes().all(|b| b.is_ascii_digit()) {
        let seconds: i64 = text.parse().map_err(|_| invalid())?;
        return DateTime::from_timestamp(seconds, 0).ok_or_else(invalid);
    }

    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Ok(instant.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(invalid)
}
