use std::time::Duration;

use chrono::{DateTime, Days, NaiveTime, TimeZone, Timelike};
use chrono_tz::Tz;

use crate::errors::{Error, Result};

/// Default timezone for market schedules.
pub const DEFAULT_MARKET_TZ: Tz = chrono_tz::America::New_York;

/// Parses an IANA timezone name such as `America/New_York`.
pub fn parse_timezone(name: &str) -> Result<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| Error::InvalidConfigValue(format!("unknown timezone '{}'", name)))
}

/// Parses a wall-clock `HH:MM` string into minutes after midnight.
pub fn parse_hh_mm(value: &str) -> Result<u32> {
    let time = NaiveTime::parse_from_str(value.trim(), "%H:%M")
        .map_err(|_| Error::InvalidConfigValue(format!("expected HH:MM, got '{}'", value)))?;
    Ok(time.hour() * 60 + time.minute())
}

/// Minutes after midnight of a wall-clock time.
pub fn minute_of_day<T: Timelike>(time: &T) -> u32 {
    time.hour() * 60 + time.minute()
}

/// Time remaining until the next occurrence of `minutes` past midnight in
/// `now`'s timezone.
///
/// A target that falls into a DST gap fires at the first valid instant after it.
pub fn duration_until_daily<Z: TimeZone>(now: &DateTime<Z>, minutes: u32) -> Duration {
    let tz = now.timezone();
    let target_time = NaiveTime::from_hms_opt(minutes / 60 % 24, minutes % 60, 0)
        .unwrap_or(NaiveTime::MIN);

    let mut date = now.date_naive();
    for _ in 0..3 {
        let naive = date.and_time(target_time);
        let candidate = tz
            .from_local_datetime(&naive)
            .earliest()
            .or_else(|| tz.from_local_datetime(&(naive + chrono::Duration::hours(1))).earliest());

        if let Some(candidate) = candidate {
            if candidate > *now {
                return (candidate - now.clone()).to_std().unwrap_or_default();
            }
        }
        match date.checked_add_days(Days::new(1)) {
            Some(next) => date = next,
            None => break,
        }
    }
    Duration::from_secs(24 * 60 * 60)
}
