//! Date arithmetic anchored to the configured timezone
//!
//! "Today" is always the wall-clock date in the bot's timezone, never the
//! server's local date.

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;

use crate::error::{Error, Result};

/// Date format accepted from users and sent to the schedule API
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Default timezone of the school
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Moscow;

/// Source of the current date
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Clock reading the system time in a fixed timezone
#[derive(Debug, Clone, Copy)]
pub struct ZonedClock {
    tz: Tz,
}

impl ZonedClock {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// Calendar date of the instant `now` in this clock's timezone
    pub fn today_at(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.tz).date_naive()
    }
}

impl Default for ZonedClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl Clock for ZonedClock {
    fn today(&self) -> NaiveDate {
        self.today_at(Utc::now())
    }
}

/// Clock pinned to one date (tests, replays)
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

pub fn tomorrow(today: NaiveDate) -> NaiveDate {
    today + Days::new(1)
}

/// Monday of the week containing `today`
pub fn week_start(today: NaiveDate) -> NaiveDate {
    today - Days::new(u64::from(today.weekday().num_days_from_monday()))
}

/// Monday of the following week, always `week_start + 7`
pub fn next_week_start(today: NaiveDate) -> NaiveDate {
    week_start(today) + Days::new(7)
}

/// Monday..Friday starting at `monday`
pub fn work_week(monday: NaiveDate) -> [NaiveDate; 5] {
    std::array::from_fn(|i| monday + Days::new(i as u64))
}

/// Parse a literal `YYYY-MM-DD` date typed by a user
pub fn parse_date(text: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
        .map_err(|_| Error::MalformedDate(text.to_string()))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

/// Russian weekday name used in week replies
pub fn weekday_name(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Понедельник",
        Weekday::Tue => "Вторник",
        Weekday::Wed => "Среда",
        Weekday::Thu => "Четверг",
        Weekday::Fri => "Пятница",
        Weekday::Sat => "Суббота",
        Weekday::Sun => "Воскресенье",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_week_start_every_weekday() {
        // 2024-01-15 is a Monday
        for offset in 0..7 {
            let today = date("2024-01-15") + Days::new(offset);
            assert_eq!(week_start(today), date("2024-01-15"), "today = {}", today);
        }
    }

    #[test]
    fn test_next_week_is_week_start_plus_seven() {
        for offset in 0..7 {
            let today = date("2024-01-15") + Days::new(offset);
            assert_eq!(next_week_start(today), week_start(today) + Days::new(7));
            assert_eq!(next_week_start(today), date("2024-01-22"));
            assert_eq!(next_week_start(today).weekday(), Weekday::Mon);
        }
    }

    #[test]
    fn test_work_week_crosses_month() {
        let days = work_week(date("2024-01-29"));
        assert_eq!(days[0], date("2024-01-29"));
        assert_eq!(days[4], date("2024-02-02"));
        assert_eq!(days[4].weekday(), Weekday::Fri);
    }

    #[test]
    fn test_weekend_detection() {
        assert!(is_weekend(date("2024-01-13")));
        assert!(is_weekend(date("2024-01-14")));
        assert!(!is_weekend(date("2024-01-15")));
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-15").unwrap(), date("2024-01-15"));
        assert_eq!(parse_date(" 2024-01-15 ").unwrap(), date("2024-01-15"));
        assert!(matches!(parse_date("15.01.2024"), Err(Error::MalformedDate(_))));
        assert!(matches!(parse_date("2024-02-30"), Err(Error::MalformedDate(_))));
        assert!(matches!(parse_date("hello"), Err(Error::MalformedDate(_))));
    }

    #[test]
    fn test_tomorrow_rolls_over_year() {
        assert_eq!(tomorrow(date("2024-12-31")), date("2025-01-01"));
    }

    #[test]
    fn test_zoned_clock_uses_moscow_date() {
        let clock = ZonedClock::default();
        // 22:30 UTC on Sunday is already 01:30 Monday in Moscow
        let now = DateTime::parse_from_rfc3339("2024-01-14T22:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(clock.today_at(now), date("2024-01-15"));
        assert_eq!(now.date_naive(), date("2024-01-14"));

        let evening = DateTime::parse_from_rfc3339("2024-01-14T20:59:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(clock.today_at(evening), date("2024-01-14"));
    }

    #[test]
    fn test_fixed_clock() {
        let clock = FixedClock(date("2024-03-01"));
        assert_eq!(clock.today(), date("2024-03-01"));
    }
}
