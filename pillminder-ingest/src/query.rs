//! Day-range query for the medications endpoint.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use pillminder_core::time::local_day_bounds;

/// Dates are sent as `MM/DD/YYYY` of the UTC instant.
const QUERY_DATE_FORMAT: &str = "%m/%d/%Y";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DayRange {
    /// The local day in `tz` that contains `now`.
    pub fn today(now: DateTime<Utc>, tz: Tz) -> Result<Self> {
        let (start, end) = local_day_bounds(now, tz)?;
        Ok(Self { start, end })
    }

    /// `start` and `end` query parameters.
    pub fn query_pairs(&self) -> [(&'static str, String); 2] {
        [
            ("start", self.start.format(QUERY_DATE_FORMAT).to_string()),
            ("end", self.end.format(QUERY_DATE_FORMAT).to_string()),
        ]
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_toronto_evening_query() {
        // 21:00 EST on the 20th is already the 21st in UTC.
        let now = Utc.with_ymd_and_hms(2026, 2, 21, 2, 0, 0).unwrap();
        let range = DayRange::today(now, chrono_tz::America::Toronto).unwrap();

        let [(k1, start), (k2, end)] = range.query_pairs();
        assert_eq!((k1, start.as_str()), ("start", "02/20/2026"));
        assert_eq!((k2, end.as_str()), ("end", "02/21/2026"));
        assert!(range.contains(now));
        assert!(!range.contains(range.end));
    }

    #[test]
    fn test_utc_day_is_midnight_to_midnight() {
        let now = Utc.with_ymd_and_hms(2026, 12, 31, 23, 59, 0).unwrap();
        let range = DayRange::today(now, chrono_tz::UTC).unwrap();
        assert_eq!(range.start, Utc.with_ymd_and_hms(2026, 12, 31, 0, 0, 0).unwrap());
        assert_eq!(range.end, Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap());
    }
}
