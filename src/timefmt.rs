//! HTTP date handling for `Last-Modified`.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

/// RFC 1123 layout with a literal GMT zone
pub const HTTP_TIME_FORMAT: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Format a timestamp for a `Last-Modified` header.
///
/// The epoch stands for "unknown" and yields `None`.
pub fn format_http_date(time: DateTime<Utc>) -> Option<String> {
    if time.timestamp() == 0 {
        return None;
    }
    Some(time.format(HTTP_TIME_FORMAT).to_string())
}

/// Parse a `Last-Modified` header value.
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, HTTP_TIME_FORMAT) {
        return Some(naive.and_utc());
    }
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Whole-second UTC timestamp of a filesystem time.
pub fn from_system_time(time: SystemTime) -> Option<DateTime<Utc>> {
    let secs = time.duration_since(UNIX_EPOCH).ok()?.as_secs();
    DateTime::from_timestamp(secs as i64, 0)
}
