//! Timestamp utilities
//!
//! Chat and address timestamps are epoch milliseconds. Watermarks are
//! business-day dates interpreted at a fixed UTC offset.

use crate::{Error, Result};
use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

fn offset(utc_offset_minutes: i32) -> Result<FixedOffset> {
    FixedOffset::east_opt(utc_offset_minutes * 60).ok_or_else(|| {
        Error::Config(format!("Invalid UTC offset: {} minutes", utc_offset_minutes))
    })
}

/// Epoch milliseconds of local midnight starting `date`
pub fn start_of_day_ms(date: NaiveDate, utc_offset_minutes: i32) -> Result<i64> {
    let tz = offset(utc_offset_minutes)?;
    date.and_hms_opt(0, 0, 0)
        .and_then(|midnight| tz.from_local_datetime(&midnight).single())
        .map(|dt| dt.timestamp_millis())
        .ok_or_else(|| Error::InvalidInput(format!("Unrepresentable date: {}", date)))
}

/// The business day before the one containing `now`
pub fn previous_day(now: DateTime<Utc>, utc_offset_minutes: i32) -> Result<NaiveDate> {
    let tz = offset(utc_offset_minutes)?;
    let today = now.with_timezone(&tz).date_naive();
    today
        .pred_opt()
        .ok_or_else(|| Error::InvalidInput(format!("No day before {}", today)))
}

/// Parse "HH:MM" into a time of day
pub fn parse_time_of_day(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|e| Error::Config(format!("Invalid time of day '{}': {}", value, e)))
}

/// Next instant strictly after `now` at local time `at`
pub fn next_daily_run(
    now: DateTime<Utc>,
    at: NaiveTime,
    utc_offset_minutes: i32,
) -> Result<DateTime<Utc>> {
    let tz = offset(utc_offset_minutes)?;
    let local_now = now.with_timezone(&tz);
    let mut candidate = local_now.date_naive().and_time(at);
    if candidate <= local_now.naive_local() {
        candidate += Duration::days(1);
    }
    tz.from_local_datetime(&candidate)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| Error::Internal(format!("Unrepresentable run time: {}", candidate)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CST: i32 = 8 * 60;

    #[test]
    fn test_start_of_day_applies_offset() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        // 2024-03-01T00:00+08:00 == 2024-02-29T16:00Z
        let expected = Utc
            .with_ymd_and_hms(2024, 2, 29, 16, 0, 0)
            .unwrap()
            .timestamp_millis();
        assert_eq!(start_of_day_ms(date, CST).unwrap(), expected);
    }

    #[test]
    fn test_previous_day_uses_local_calendar() {
        // 20:00Z is already the next day at +08:00
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        assert_eq!(
            previous_day(now, CST).unwrap(),
            NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
        );
        assert_eq!(
            previous_day(now, 0).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()
        );
    }

    #[test]
    fn test_next_daily_run_rolls_over() {
        let at = parse_time_of_day("02:00").unwrap();
        // 2024-03-01T10:00+08:00, already past 02:00 local
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 2, 0, 0).unwrap();
        let next = next_daily_run(now, at, CST).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 18, 0, 0).unwrap());
    }

    #[test]
    fn test_next_daily_run_same_day() {
        let at = parse_time_of_day("23:30").unwrap();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        let next = next_daily_run(now, at, 0).unwrap();
        assert_eq!(next, Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap());
    }

    #[test]
    fn test_invalid_time_of_day() {
        assert!(parse_time_of_day("25:99").is_err());
        assert!(parse_time_of_day("noon").is_err());
    }
}
