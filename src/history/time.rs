//! Browser-native timestamp conversion.
//!
//! Chrome-family browsers store microseconds since 1601-01-01 UTC (the webkit
//! epoch); Firefox stores microseconds since the Unix epoch. Both convert to the
//! same UTC ISO-8601 form the streams use. Anything that cannot be converted
//! becomes an empty string.

use crate::clock::format_timestamp;
use chrono::DateTime;

/// Microseconds between 1601-01-01 and 1970-01-01.
pub const WEBKIT_EPOCH_OFFSET_MICROS: i64 = 11_644_473_600_000_000;

/// Convert a Chrome `last_visit_time`.
pub fn chrome_time_to_iso(raw: i64) -> String {
    if raw <= 0 {
        return String::new();
    }
    raw.checked_sub(WEBKIT_EPOCH_OFFSET_MICROS)
        .and_then(DateTime::from_timestamp_micros)
        .map(|dt| format_timestamp(&dt))
        .unwrap_or_default()
}

/// Convert a Firefox `last_visit_date` (NULL for never visited).
pub fn firefox_time_to_iso(raw: Option<i64>) -> String {
    match raw {
        Some(micros) if micros > 0 => DateTime::from_timestamp_micros(micros)
            .map(|dt| format_timestamp(&dt))
            .unwrap_or_default(),
        _ => String::new(),
    }
}
