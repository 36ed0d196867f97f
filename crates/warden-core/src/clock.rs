//! Calendar helpers for day-scoped counters and time-of-day windows

use chrono::{DateTime, Datelike, FixedOffset, Timelike};

use crate::prelude::*;

fn local(at: Timestamp, utc_offset_minutes: i32) -> WdResult<DateTime<FixedOffset>> {
	let offset = FixedOffset::east_opt(utc_offset_minutes * 60)
		.ok_or_else(|| Error::ConfigError(format!("invalid utc offset: {}", utc_offset_minutes)))?;
	let utc = DateTime::from_timestamp(at.0, 0)
		.ok_or_else(|| Error::Internal(format!("timestamp out of range: {}", at.0)))?;
	Ok(utc.with_timezone(&offset))
}

/// Calendar day (`YYYY-MM-DD`) containing `at` in the configured offset
pub fn day_key(at: Timestamp, utc_offset_minutes: i32) -> WdResult<String> {
	Ok(local(at, utc_offset_minutes)?.format("%Y-%m-%d").to_string())
}

/// Day of week (0 = Sunday) and `HH:MM` wall-clock time of `at`
pub fn weekday_and_time(at: Timestamp, utc_offset_minutes: i32) -> WdResult<(u8, String)> {
	let dt = local(at, utc_offset_minutes)?;
	let weekday = dt.weekday().num_days_from_sunday() as u8;
	Ok((weekday, format!("{:02}:{:02}", dt.hour(), dt.minute())))
}

#[cfg(test)]
mod tests {
	use super::*;

	// 2024-03-10 23:30:00 UTC, a Sunday
	const SUNDAY_LATE: Timestamp = Timestamp(1_710_113_400);

	#[test]
	fn test_day_key_utc() {
		assert_eq!(day_key(SUNDAY_LATE, 0).unwrap(), "2024-03-10");
	}

	#[test]
	fn test_day_key_with_offset_crosses_midnight() {
		assert_eq!(day_key(SUNDAY_LATE, 60).unwrap(), "2024-03-11");
		assert_eq!(day_key(SUNDAY_LATE, -60).unwrap(), "2024-03-10");
	}

	#[test]
	fn test_weekday_and_time() {
		assert_eq!(weekday_and_time(SUNDAY_LATE, 0).unwrap(), (0, "23:30".to_string()));
		assert_eq!(weekday_and_time(SUNDAY_LATE, 120).unwrap(), (1, "01:30".to_string()));
	}
}

// vim: ts=4
