//! Date parsing and rendering for filter bounds and document timestamps.
//!
//! Dates travel through the entities as epoch milliseconds where `0` means
//! "unset". Parsing never fails: a value no format understands becomes `0`
//! and is only reported at debug level.
//!
//! # Accepted inputs
//!
//! | Input | Example |
//! |-------|---------|
//! | ISO-8601 with offset and optional fraction | `2013-05-11T21:23:58.970460+07:00` |
//! | ISO-8601 date-time without offset (UTC) | `2013-05-11T21:23:58` |
//! | ISO-8601 date (UTC midnight) | `2013-05-11` |
//! | Epoch milliseconds | `1368282238970` |
//! | `yyyy-MM-dd HH:mm:ss` (UTC) | `2013-05-05 12:30:45` |
//!
//! Rendering always produces UTC with millisecond precision:
//!
//! ```rust
//! use entity::date;
//!
//! let millis = date::parse("2013-05-11T21:23:58.970460+07:00");
//! assert_eq!(date::format(millis).as_deref(), Some("2013-05-11T14:23:58.970Z"));
//! assert_eq!(date::format(0), None);
//! ```
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use tracing::debug;

const NAIVE_DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Parse `input` into epoch milliseconds, returning `0` when unset or unparseable.
pub fn parse(input: &str) -> i64 {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return 0;
    }
    match parse_millis(trimmed) {
        Some(millis) => millis,
        None => {
            debug!(input = %trimmed, "invalid date format");
            0
        }
    }
}

fn parse_millis(input: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = DateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.timestamp_millis());
    }
    for pattern in NAIVE_DATE_TIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, pattern) {
            return Some(naive.and_utc().timestamp_millis());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date
            .and_hms_opt(0, 0, 0)
            .map(|naive| naive.and_utc().timestamp_millis());
    }
    if is_epoch_millis(input) {
        return input.parse::<i64>().ok();
    }
    None
}

fn is_epoch_millis(input: &str) -> bool {
    let digits = input.strip_prefix('-').unwrap_or(input);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

/// Render epoch milliseconds as `yyyy-MM-ddTHH:mm:ss.SSSZ`, `None` for `0`.
pub fn format(millis: i64) -> Option<String> {
    if millis == 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis(millis)
        .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}
