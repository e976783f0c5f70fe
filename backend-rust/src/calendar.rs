//! # calendar
//!
//! Business-week arithmetic and roster date enumeration.
//!
//! The business week starts on Monday at 03:00 local time instead of midnight,
//! so a late Sunday-night service still belongs to the week that is ending.
//! A week is the half-open interval `[start, end)`.

use chrono::{DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Timelike, Utc, Weekday};

/// Hour of the Monday rollover.
pub const WEEK_ROLLOVER_HOUR: u32 = 3;

fn rollover_time() -> NaiveTime {
    NaiveTime::MIN + Duration::hours(WEEK_ROLLOVER_HOUR as i64)
}

/// Most recent Monday 03:00 (local) that is at or before `at`.
pub fn week_start<Tz: TimeZone>(at: &DateTime<Tz>) -> DateTime<Tz> {
    let local = at.naive_local();
    let mut days_back = local.weekday().num_days_from_monday() as i64;
    if local.weekday() == Weekday::Mon && local.hour() < WEEK_ROLLOVER_HOUR {
        days_back = 7;
    }
    let date = local.date() - Duration::days(days_back);
    resolve_local(&at.timezone(), date.and_time(rollover_time()))
}

/// The next Monday 03:00 (local) after `week_start(at)`.
pub fn week_end<Tz: TimeZone>(at: &DateTime<Tz>) -> DateTime<Tz> {
    let start = week_start(at);
    let date = start.naive_local().date() + Duration::days(7);
    resolve_local(&start.timezone(), date.and_time(rollover_time()))
}

/// Maps a local wall-clock time to an instant.
///
/// Ambiguous times (DST fall-back) take the earliest instant. Times that do not
/// exist (DST spring-forward) move forward hour by hour until they do.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> DateTime<Tz> {
    let mut candidate = naive;
    loop {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => candidate += Duration::hours(1),
        }
    }
}

/// `[start, end)` window of one business week.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekWindow<Tz: TimeZone> {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> WeekWindow<Tz> {
    pub fn containing(at: &DateTime<Tz>) -> Self {
        Self {
            start: week_start(at),
            end: week_end(at),
        }
    }

    /// Storage key of the week.
    pub fn start_utc(&self) -> DateTime<Utc> {
        self.start.with_timezone(&Utc)
    }
}

/// Every Sunday of `year`, ascending.
pub fn sundays_of_year(year: i32) -> Vec<NaiveDate> {
    let Some(jan_first) = NaiveDate::from_ymd_opt(year, 1, 1) else {
        return Vec::new();
    };
    let offset = (7 - jan_first.weekday().num_days_from_sunday()) % 7;
    let mut date = jan_first + Duration::days(offset as i64);

    let mut sundays = Vec::with_capacity(53);
    while date.year() == year {
        sundays.push(date);
        date += Duration::days(7);
    }
    sundays
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    fn brt() -> FixedOffset {
        FixedOffset::west_opt(3 * 3600).unwrap()
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> DateTime<FixedOffset> {
        brt().with_ymd_and_hms(y, m, d, h, min, s).unwrap()
    }

    // 2026-10-12 is a Monday.

    #[test]
    fn monday_before_rollover_belongs_to_previous_week() {
        assert_eq!(week_start(&at(2026, 10, 12, 2, 59, 59)), at(2026, 10, 5, 3, 0, 0));
    }

    #[test]
    fn monday_at_rollover_starts_the_week() {
        assert_eq!(week_start(&at(2026, 10, 12, 3, 0, 0)), at(2026, 10, 12, 3, 0, 0));
    }

    #[test]
    fn sunday_belongs_to_week_started_six_days_before() {
        assert_eq!(week_start(&at(2026, 10, 18, 23, 30, 0)), at(2026, 10, 12, 3, 0, 0));
        assert_eq!(week_start(&at(2026, 10, 18, 0, 0, 0)), at(2026, 10, 12, 3, 0, 0));
    }

    #[test]
    fn midweek_clamps_to_monday_rollover() {
        assert_eq!(week_start(&at(2026, 10, 15, 17, 45, 12)), at(2026, 10, 12, 3, 0, 0));
    }

    #[test]
    fn week_end_is_seven_days_after_start() {
        for reference in [at(2026, 10, 12, 2, 0, 0), at(2026, 10, 14, 9, 0, 0), at(2026, 10, 18, 22, 0, 0)] {
            assert_eq!(week_end(&reference), week_start(&reference) + Duration::days(7));
        }
    }

    #[test]
    fn window_is_half_open() {
        let window = WeekWindow::containing(&at(2026, 10, 14, 10, 0, 0));
        assert_eq!(window.start, at(2026, 10, 12, 3, 0, 0));
        assert_eq!(window.end, at(2026, 10, 19, 3, 0, 0));
        assert_eq!(WeekWindow::containing(&at(2026, 10, 19, 2, 59, 59)), window);
        assert_ne!(WeekWindow::containing(&at(2026, 10, 19, 3, 0, 0)), window);
        assert_eq!(window.start_utc(), Utc.with_ymd_and_hms(2026, 10, 12, 6, 0, 0).unwrap());
    }

    #[test]
    fn sundays_cover_the_whole_year() {
        let sundays = sundays_of_year(2027);
        assert_eq!(sundays.len(), 52);
        assert_eq!(sundays[0], NaiveDate::from_ymd_opt(2027, 1, 3).unwrap());
        assert!(sundays.iter().all(|d| d.weekday() == Weekday::Sun));

        // 2023 starts on a Sunday and has 53 of them.
        let sundays = sundays_of_year(2023);
        assert_eq!(sundays.len(), 53);
        assert_eq!(sundays[0], NaiveDate::from_ymd_opt(2023, 1, 1).unwrap());
        assert_eq!(sundays[52], NaiveDate::from_ymd_opt(2023, 12, 31).unwrap());
    }
}
