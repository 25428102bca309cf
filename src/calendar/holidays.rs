//! Regional public holiday calendars.
//!
//! Only Belgium is shipped. Movable feasts are derived from Easter Sunday,
//! which is computed with the anonymous Gregorian algorithm.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeSet;

/// A single public holiday.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Holiday {
    pub date: NaiveDate,
    pub name: &'static str,
}

/// A source of public holidays for one region.
pub trait HolidayCalendar {
    /// Short region name used in log output.
    fn region(&self) -> &'static str;

    /// All holidays falling in `year`, ordered by date.
    fn holidays(&self, year: i32) -> Vec<Holiday>;

    /// Holiday dates for every year in `first..=last`.
    fn holiday_dates(&self, first: i32, last: i32) -> BTreeSet<NaiveDate> {
        (first..=last)
            .flat_map(|year| self.holidays(year))
            .map(|h| h.date)
            .collect()
    }

    fn is_holiday(&self, date: NaiveDate) -> bool {
        self.holidays(date.year()).iter().any(|h| h.date == date)
    }
}

/// Belgian public holidays.
#[derive(Debug, Clone, Copy, Default)]
pub struct Belgium;

/// Fixed-date Belgian holidays as (month, day, name).
const BELGIUM_FIXED: &[(u32, u32, &str)] = &[
    (1, 1, "New year"),
    (5, 1, "Labour Day"),
    (7, 21, "National Day"),
    (8, 15, "Assumption of Mary to Heaven"),
    (11, 1, "All Saints Day"),
    (11, 11, "Armistice of 1918"),
    (12, 25, "Christmas Day"),
];

/// Easter-relative Belgian holidays as (offset in days, name).
const BELGIUM_EASTER: &[(i64, &str)] = &[
    (0, "Easter Sunday"),
    (1, "Easter Monday"),
    (39, "Ascension Thursday"),
    (49, "Whit Sunday"),
    (50, "Whit Monday"),
];

impl HolidayCalendar for Belgium {
    fn region(&self) -> &'static str {
        "BE"
    }

    fn holidays(&self, year: i32) -> Vec<Holiday> {
        let mut days: Vec<Holiday> = BELGIUM_FIXED
            .iter()
            .filter_map(|&(month, day, name)| {
                NaiveDate::from_ymd_opt(year, month, day).map(|date| Holiday { date, name })
            })
            .collect();

        if let Some(easter) = easter_sunday(year) {
            days.extend(BELGIUM_EASTER.iter().map(|&(offset, name)| Holiday {
                date: easter + Duration::days(offset),
                name,
            }));
        }

        days.sort_by_key(|h| h.date);
        days
    }
}

/// Western (Gregorian) Easter Sunday for `year`.
pub fn easter_sunday(year: i32) -> Option<NaiveDate> {
    let a = year.rem_euclid(19);
    let b = year.div_euclid(100);
    let c = year.rem_euclid(100);
    let d = b / 4;
    let e = b % 4;
    let f = (b + 8) / 25;
    let g = (b - f + 1) / 3;
    let h = (19 * a + b - d - g + 15) % 30;
    let i = c / 4;
    let k = c % 4;
    let l = (32 + 2 * e + 2 * i - h - k) % 7;
    let m = (a + 11 * h + 22 * l) / 451;
    let month = (h + l - 7 * m + 114) / 31;
    let day = (h + l - 7 * m + 114) % 31 + 1;

    NaiveDate::from_ymd_opt(year, month as u32, day as u32)
}
