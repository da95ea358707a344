//! Timestamp utilities
//!
//! Timestamps are persisted as UTC RFC 3339 text with millisecond precision
//! (`2026-01-01T12:00:00.000Z`). The fixed width keeps lexical and
//! chronological order identical, which the review cursor relies on. SQLite
//! triggers write the same shape via `strftime('%Y-%m-%dT%H:%M:%fZ', 'now')`.

use chrono::{DateTime, SecondsFormat, Utc};

/// SQL expression producing a timestamp in the persisted format
pub const SQL_NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Format a timestamp for storage
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in storage format
pub fn now_db() -> String {
    to_db(&now())
}

/// Parse a stored timestamp
pub fn parse_db(column: &str, value: &str) -> crate::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| crate::Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Current time as unix epoch milliseconds
pub fn now_millis() -> i64 {
    now().timestamp_millis()
}
