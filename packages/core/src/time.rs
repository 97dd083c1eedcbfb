//! Pacific-time helpers.
//!
//! The MyTurn API speaks in local California dates and times, so every
//! "today" and every slot timestamp in this crate is evaluated in
//! `US/Pacific`. The current instant comes from a [`Clock`] so discovery
//! can be exercised against a fixed point in time.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Time zone used for all API dates and slot times.
pub const PACIFIC: Tz = chrono_tz::US::Pacific;

/// Wire format for calendar dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Wire format for slot start times.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Source of the current instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Tz>;

    /// Today's calendar date in Pacific time.
    fn today(&self) -> NaiveDate {
        self.now().date_naive()
    }
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Tz> {
        Utc::now().with_timezone(&PACIFIC)
    }
}

/// Clock pinned to a single instant.
#[derive(Debug, Clone)]
pub struct FixedClock {
    instant: DateTime<Tz>,
}

impl FixedClock {
    pub fn new(instant: DateTime<Tz>) -> Self {
        Self { instant }
    }

    /// Pin the clock to `date` at `time` (`HH:MM:SS`) Pacific.
    pub fn at(date: NaiveDate, time: &str) -> Option<Self> {
        combine_date_and_time(date, time).map(Self::new)
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Tz> {
        self.instant
    }
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

/// Combine a calendar date with a local `HH:MM:SS` time of day in Pacific
/// time. Returns `None` for unparseable times and for local times skipped
/// by a DST transition; ambiguous times resolve to the earlier instant.
pub fn combine_date_and_time(date: NaiveDate, time: &str) -> Option<DateTime<Tz>> {
    let time = NaiveTime::parse_from_str(time, TIME_FORMAT).ok()?;
    PACIFIC.from_local_datetime(&date.and_time(time)).earliest()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn combine_builds_pacific_timestamp() {
        let ts = combine_date_and_time(date(2025, 2, 1), "10:30:00").unwrap();

        assert_eq!(ts.date_naive(), date(2025, 2, 1));
        assert_eq!(ts.hour(), 10);
        assert_eq!(ts.minute(), 30);
        // PST is UTC-8 in February
        assert_eq!(ts.with_timezone(&Utc).hour(), 18);
    }

    #[test]
    fn combine_accepts_single_digit_hour() {
        let ts = combine_date_and_time(date(2025, 2, 1), "8:00:00").unwrap();
        assert_eq!(ts.hour(), 8);
    }

    #[test]
    fn combine_rejects_garbage_time() {
        assert!(combine_date_and_time(date(2025, 2, 1), "not a time").is_none());
    }

    #[test]
    fn combine_skips_time_lost_to_spring_forward() {
        // 2025-03-09 02:30 does not exist in US/Pacific
        assert!(combine_date_and_time(date(2025, 3, 9), "02:30:00").is_none());
    }

    #[test]
    fn fixed_clock_reports_pacific_today() {
        let clock = FixedClock::at(date(2025, 1, 31), "23:30:00").unwrap();
        // Already Feb 1st in UTC, still Jan 31st locally
        assert_eq!(clock.today(), date(2025, 1, 31));
    }

    #[test]
    fn dates_use_iso_format() {
        assert_eq!(format_date(date(2025, 2, 1)), "2025-02-01");
        assert_eq!(parse_date("2025-02-01"), Some(date(2025, 2, 1)));
        assert_eq!(parse_date("02/01/2025"), None);
    }
}
