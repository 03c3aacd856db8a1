//! Recurrence arithmetic and start-time parsing
//!
//! Due times are unix seconds. Recurrence is anchored at the moment of a
//! successful publish, not at the previous due time, so a late cycle moves
//! every later post back by the same amount.

use chrono::{DateTime, Duration, Utc};

use crate::error::{CadenceError, Result};
use crate::types::Interval;

/// Next due time after a successful publish at `now`
pub fn next_post_time(now: i64, interval: &Interval) -> i64 {
    now.saturating_add(interval.duration().num_seconds())
}

/// Due time of a freshly created schedule with no explicit start
pub fn first_post_time(now: i64, interval: &Interval) -> i64 {
    next_post_time(now, interval)
}

/// Parse a `--start` value into an absolute time
///
/// Supports:
/// - `now`
/// - Relative durations: "30m", "2h", "1d 6h"
/// - Natural language and absolute times: "tomorrow 9am", "2025-11-20 15:00"
///
/// # Errors
///
/// Returns `InvalidInput` if the value is empty or cannot be parsed.
pub fn parse_start(input: &str, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CadenceError::InvalidInput(
            "Start time cannot be empty".to_string(),
        ));
    }

    if input.eq_ignore_ascii_case("now") {
        return Ok(now);
    }

    if let Ok(duration) = parse_duration(input) {
        return Ok(now + duration);
    }

    chrono_english::parse_date_string(input, now, chrono_english::Dialect::Us).map_err(|e| {
        CadenceError::InvalidInput(format!("Could not parse start time '{}': {}", input, e))
    })
}

fn parse_duration(input: &str) -> Result<Duration> {
    let std_duration = humantime::parse_duration(input)
        .map_err(|e| CadenceError::InvalidInput(format!("Could not parse duration: {}", e)))?;

    let seconds = i64::try_from(std_duration.as_secs())
        .map_err(|_| CadenceError::InvalidInput("Duration out of range".to_string()))?;

    Duration::try_seconds(seconds)
        .ok_or_else(|| CadenceError::InvalidInput("Duration out of range".to_string()))
}

/// Render a unix timestamp for CLI output
pub fn format_timestamp(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IntervalUnit;
    use chrono::TimeZone;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_next_post_time_adds_interval() {
        let interval = Interval::new(2, IntervalUnit::Hours).unwrap();
        assert_eq!(next_post_time(1_000, &interval), 1_000 + 7_200);

        let interval = Interval::new(15, IntervalUnit::Minutes).unwrap();
        assert_eq!(next_post_time(0, &interval), 900);

        let interval = Interval::new(3, IntervalUnit::Days).unwrap();
        assert_eq!(next_post_time(0, &interval), 3 * 86_400);
    }

    #[test]
    fn test_first_post_time_is_one_interval_out() {
        let interval = Interval::new(1, IntervalUnit::Days).unwrap();
        assert_eq!(first_post_time(500, &interval), 500 + 86_400);
    }

    #[test]
    fn test_next_post_time_saturates() {
        let interval = Interval::new(1, IntervalUnit::Days).unwrap();
        assert_eq!(next_post_time(i64::MAX - 10, &interval), i64::MAX);
    }

    #[test]
    fn test_parse_start_now() {
        assert_eq!(parse_start("now", fixed_now()).unwrap(), fixed_now());
        assert_eq!(parse_start("  NOW ", fixed_now()).unwrap(), fixed_now());
    }

    #[test]
    fn test_parse_start_relative_durations() {
        let now = fixed_now();
        assert_eq!(parse_start("30m", now).unwrap(), now + Duration::minutes(30));
        assert_eq!(parse_start("2h", now).unwrap(), now + Duration::hours(2));
        assert_eq!(
            parse_start("1d 6h", now).unwrap(),
            now + Duration::hours(30)
        );
    }

    #[test]
    fn test_parse_start_absolute_time() {
        let parsed = parse_start("2025-11-20 15:00", fixed_now()).unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2025, 11, 20, 15, 0, 0).unwrap());
    }

    #[test]
    fn test_parse_start_natural_language() {
        let parsed = parse_start("tomorrow", fixed_now()).unwrap();
        assert!(parsed > fixed_now());
        assert!(parsed - fixed_now() <= Duration::hours(36));
    }

    #[test]
    fn test_parse_start_rejects_garbage() {
        assert!(matches!(
            parse_start("", fixed_now()),
            Err(CadenceError::InvalidInput(_))
        ));
        assert!(matches!(
            parse_start("not a time", fixed_now()),
            Err(CadenceError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01 00:00:00 UTC");
    }
}
