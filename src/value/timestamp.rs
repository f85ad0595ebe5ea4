//! Timestamp formatting for storage
//!
//! Timestamps are persisted as fixed-width text with microsecond precision,
//! so lexical order in the database equals chronological order.

use chrono::{DateTime, NaiveDateTime, SubsecRound, Utc};

/// Storage text format for timestamps.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format a timestamp in storage format.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.format(STORAGE_FORMAT).to_string()
}

/// Parse a stored or user-supplied timestamp.
///
/// Accepts the storage format (fraction optional), the same with a `T`
/// separator, and RFC 3339 with any offset.
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    for pattern in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, pattern) {
            return Some(naive.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Drop precision below one microsecond.
pub fn truncate_to_micros(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(6)
}
