//! Time utilities: timestamp parsing and timezone-aware day bounds.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Parse a timezone name like "America/Toronto".
pub fn parse_tz(tz: &str) -> Result<Tz> {
    tz.parse()
        .map_err(|_| anyhow::anyhow!("invalid timezone: {tz}"))
}

/// Parse a dose timestamp as sent by the medications API, returning UTC.
///
/// Accepts RFC 3339 ("2026-02-21T08:00:00.000Z") and the compact offset form
/// "2026-02-21T08:00:00.000+0000".
pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z")
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| anyhow::anyhow!("invalid timestamp '{raw}': {e}"))
}

/// Start of the local day containing `now`, and the start of the next one, in UTC.
///
/// On a DST gap at midnight the earliest valid local time is used.
pub fn local_day_bounds(now: DateTime<Utc>, tz: Tz) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let date = now.with_timezone(&tz).date_naive();
    let midnight = date.and_time(NaiveTime::MIN);

    let start = tz
        .from_local_datetime(&midnight)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(midnight + Duration::hours(1))).earliest())
        .ok_or_else(|| anyhow::anyhow!("no valid local midnight on {date} in {tz}"))?
        .with_timezone(&Utc);

    let end = start
        .checked_add_signed(Duration::days(1))
        .ok_or_else(|| anyhow::anyhow!("day range out of bounds after {start}"))?;

    Ok((start, end))
}

/// "HH:MM" in the given zone, for list rows and alerts.
pub fn format_local_time(dt: DateTime<Utc>, tz: Tz) -> String {
    dt.with_timezone(&tz).format("%H:%M").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_api_timestamps() {
        let expected = Utc.with_ymd_and_hms(2026, 2, 21, 13, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2026-02-21T13:30:00.000Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2026-02-21T13:30:00.000+0000").unwrap(), expected);
        assert_eq!(parse_timestamp("2026-02-21T08:30:00-05:00").unwrap(), expected);
        assert!(parse_timestamp("tomorrow").is_err());
    }

    #[test]
    fn test_toronto_day_bounds_in_winter() {
        // 02:00 UTC on the 21st is still the 20th in Toronto (EST, UTC-5).
        let now = Utc.with_ymd_and_hms(2026, 2, 21, 2, 0, 0).unwrap();
        let (start, end) = local_day_bounds(now, parse_tz("America/Toronto").unwrap()).unwrap();
        assert_eq!(start, Utc.with_ymd_and_hms(2026, 2, 20, 5, 0, 0).unwrap());
        assert_eq!(end, Utc.with_ymd_and_hms(2026, 2, 21, 5, 0, 0).unwrap());
    }

    #[test]
    fn test_rejects_unknown_timezone() {
        assert!(parse_tz("Mars/Olympus").is_err());
    }

    #[test]
    fn test_local_time_rendering() {
        let at = Utc.with_ymd_and_hms(2026, 7, 1, 12, 5, 0).unwrap();
        // EDT in July.
        assert_eq!(format_local_time(at, parse_tz("America/Toronto").unwrap()), "08:05");
    }
}
