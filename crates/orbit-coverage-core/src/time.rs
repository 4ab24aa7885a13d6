//! Naive timestamp parsing and formatting.
//!
//! Footprint validity bounds are passed through without timezone
//! arithmetic. A trailing `Z` is accepted and dropped.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::error::NamingError;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y/%m/%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

/// Parses a footprint timestamp. Date-only values are midnight.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, NamingError> {
    let s = raw.trim();
    let s = s.strip_suffix('Z').unwrap_or(s);
    for format in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%Y/%m/%d"))
        .map(|d| d.and_time(NaiveTime::MIN))
        .map_err(|_| NamingError::InvalidTimestamp(raw.to_string()))
}

/// Timestamp as printed in summary tables.
pub fn format_summary(ts: &NaiveDateTime) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S").to_string()
}

/// Timestamp as embedded in artifact keys: the bare date at midnight,
/// otherwise a compact form without colons.
pub fn format_key(ts: &NaiveDateTime) -> String {
    if ts.time() == NaiveTime::MIN {
        ts.format("%Y-%m-%d").to_string()
    } else {
        ts.format("%Y%m%dT%H%M%S").to_string()
    }
}
