//! Process-wide record clock.
//!
//! Every record timestamp comes from a single [`MonotonicClock`]. Issued values
//! are truncated to microseconds, never go backwards (wall-clock adjustments are
//! absorbed) and are never repeated, so a clipboard entry's timestamp is a unique
//! identity that events can reference.

use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use std::sync::{Arc, Mutex, PoisonError};

/// Strictly increasing UTC timestamp source.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    last: Mutex<Option<DateTime<Utc>>>,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next timestamp.
    pub fn now(&self) -> DateTime<Utc> {
        self.issue(Utc::now())
    }

    /// Issue a timestamp for the observed wall-clock instant `observed`.
    fn issue(&self, observed: DateTime<Utc>) -> DateTime<Utc> {
        let observed = observed.trunc_subsecs(6);
        let mut last = self.last.lock().unwrap_or_else(PoisonError::into_inner);

        let next = match *last {
            Some(prev) if observed <= prev => prev + Duration::microseconds(1),
            _ => observed,
        };
        *last = Some(next);
        next
    }
}

/// Shared clock handle.
pub type SharedClock = Arc<MonotonicClock>;

/// Render a timestamp the way every stream stores it.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Serde support for record timestamps.
pub mod timestamp_serde {
    use super::format_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_timestamp(ts))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

/// Serde support for optional timestamp references.
pub mod option_timestamp_serde {
    use super::format_timestamp;
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(ts: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ts {
            Some(ts) => serializer.serialize_some(&format_timestamp(ts)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        match raw {
            Some(raw) if !raw.is_empty() => DateTime::parse_from_rfc3339(&raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(serde::de::Error::custom),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_clock_never_repeats() {
        let clock = MonotonicClock::new();
        let fixed = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let a = clock.issue(fixed);
        let b = clock.issue(fixed);
        let c = clock.issue(fixed);

        assert_eq!(a, fixed);
        assert_eq!(b, fixed + Duration::microseconds(1));
        assert_eq!(c, fixed + Duration::microseconds(2));
    }

    #[test]
    fn test_clock_absorbs_backwards_step() {
        let clock = MonotonicClock::new();
        let later = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 10).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

        let first = clock.issue(later);
        let second = clock.issue(earlier);
        assert!(second > first);
    }

    #[test]
    fn test_format_has_micros_and_z() {
        let ts = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(format_timestamp(&ts), "2024-05-01T12:00:00.000000Z");
    }
}
