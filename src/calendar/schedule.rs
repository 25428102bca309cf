//! Weekly schedules evaluated over a timestamp index.
//!
//! A [`WeekSchedule`] marks an instant as open when its weekday is one of
//! the requested days and its wall-clock time falls in the half-open
//! window `[on, off)`. Public holidays of the supplied calendar and any
//! explicitly closed dates are forced to closed afterwards.

use crate::calendar::holidays::HolidayCalendar;
use chrono::{Datelike, NaiveDate, NaiveTime, Timelike, Weekday};
use serde::{Deserialize, Deserializer};
use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default opening time when none is given.
pub const DEFAULT_ON_TIME: &str = "09:00";

/// Default closing time when none is given.
pub const DEFAULT_OFF_TIME: &str = "17:00";

/// Errors raised while building schedules or loading opening hours.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Opening hours not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Index mismatch: {left} vs {right} timestamps")]
    IndexMismatch { left: usize, right: usize },
}

// ---------------------------------------------------------------------------
// Time of day
// ---------------------------------------------------------------------------

/// A wall-clock time parsed from `"HH:MM"` (or `"HH:MM:SS"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    pub fn new(hour: u32, minute: u32) -> Result<Self, ScheduleError> {
        NaiveTime::from_hms_opt(hour, minute, 0)
            .map(Self)
            .ok_or_else(|| ScheduleError::Parse(format!("invalid time {hour}:{minute:02}")))
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }

    /// Seconds since midnight, ignoring sub-second precision.
    fn seconds(&self) -> u32 {
        self.0.num_seconds_from_midnight()
    }
}

impl FromStr for TimeOfDay {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .map(Self)
            .map_err(|e| ScheduleError::Parse(format!("invalid time of day '{s}': {e}")))
    }
}

impl From<NaiveTime> for TimeOfDay {
    fn from(time: NaiveTime) -> Self {
        Self(time)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Parse a weekday name such as `"Monday"` or `"mon"`.
pub fn parse_weekday(name: &str) -> Result<Weekday, ScheduleError> {
    name.trim()
        .parse::<Weekday>()
        .map_err(|_| ScheduleError::Parse(format!("unknown weekday '{name}'")))
}

// ---------------------------------------------------------------------------
// Mask
// ---------------------------------------------------------------------------

/// One boolean per timestamp of an index.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask<T> {
    index: Vec<T>,
    values: Vec<bool>,
}

impl<T: Clone> Mask<T> {
    /// An all-closed mask over `index`.
    pub fn closed(index: &[T]) -> Self {
        Self {
            index: index.to_vec(),
            values: vec![false; index.len()],
        }
    }

    pub fn from_parts(index: Vec<T>, values: Vec<bool>) -> Result<Self, ScheduleError> {
        if index.len() != values.len() {
            return Err(ScheduleError::IndexMismatch {
                left: index.len(),
                right: values.len(),
            });
        }
        Ok(Self { index, values })
    }

    pub fn index(&self) -> &[T] {
        &self.index
    }

    pub fn values(&self) -> &[bool] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of open instants.
    pub fn open_count(&self) -> usize {
        self.values.iter().filter(|&&v| v).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&T, bool)> {
        self.index.iter().zip(self.values.iter().copied())
    }

    /// Logical OR with another mask over the same index.
    pub fn union(&self, other: &Mask<T>) -> Result<Mask<T>, ScheduleError> {
        if self.len() != other.len() {
            return Err(ScheduleError::IndexMismatch {
                left: self.len(),
                right: other.len(),
            });
        }
        Ok(Mask {
            index: self.index.clone(),
            values: self
                .values
                .iter()
                .zip(&other.values)
                .map(|(a, b)| *a || *b)
                .collect(),
        })
    }
}

impl<T: Datelike> Mask<T> {
    /// Force every instant falling on one of `dates` to closed.
    pub fn close_dates(&mut self, dates: &BTreeSet<NaiveDate>) {
        if dates.is_empty() {
            return;
        }
        for (ts, value) in self.index.iter().zip(self.values.iter_mut()) {
            if *value && dates.contains(&naive_date(ts)) {
                *value = false;
            }
        }
    }
}

fn naive_date<T: Datelike>(ts: &T) -> NaiveDate {
    // Datelike values always carry a valid proleptic Gregorian date.
    NaiveDate::from_num_days_from_ce_opt(ts.num_days_from_ce()).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Week schedule
// ---------------------------------------------------------------------------

/// A recurring `[on, off)` window active on a set of weekdays.
#[derive(Debug, Clone)]
pub struct WeekSchedule {
    days: Vec<Weekday>,
    on: TimeOfDay,
    off: TimeOfDay,
    exclude_holidays: bool,
    closed: Vec<NaiveDate>,
}

impl WeekSchedule {
    /// Schedule open 09:00-17:00 on `days`, excluding public holidays.
    pub fn new(days: &[Weekday]) -> Self {
        Self {
            days: days.to_vec(),
            on: TimeOfDay(NaiveTime::from_hms_opt(9, 0, 0).unwrap_or_default()),
            off: TimeOfDay(NaiveTime::from_hms_opt(17, 0, 0).unwrap_or_default()),
            exclude_holidays: true,
            closed: Vec::new(),
        }
    }

    /// Build from weekday names, e.g. `["Monday", "Friday"]`.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ScheduleError> {
        let days = names
            .iter()
            .map(|n| parse_weekday(n.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::new(&days))
    }

    pub fn on_time(mut self, on: impl Into<TimeOfDay>) -> Self {
        self.on = on.into();
        self
    }

    pub fn off_time(mut self, off: impl Into<TimeOfDay>) -> Self {
        self.off = off.into();
        self
    }

    /// Set the window from `"HH:MM"` strings.
    pub fn hours(self, on: &str, off: &str) -> Result<Self, ScheduleError> {
        let on: TimeOfDay = on.parse()?;
        let off: TimeOfDay = off.parse()?;
        Ok(self.on_time(on).off_time(off))
    }

    pub fn exclude_holidays(mut self, exclude: bool) -> Self {
        self.exclude_holidays = exclude;
        self
    }

    /// Dates that are closed regardless of the holiday flag.
    pub fn closed(mut self, dates: &[NaiveDate]) -> Self {
        self.closed = dates.to_vec();
        self
    }

    pub fn days(&self) -> &[Weekday] {
        &self.days
    }

    pub fn window(&self) -> (TimeOfDay, TimeOfDay) {
        (self.on, self.off)
    }

    /// Whether a weekday and wall-clock time fall inside the window.
    pub fn contains(&self, weekday: Weekday, seconds_from_midnight: u32) -> bool {
        seconds_from_midnight >= self.on.seconds()
            && seconds_from_midnight < self.off.seconds()
            && self.days.contains(&weekday)
    }

    /// Evaluate the schedule over `index`.
    pub fn mask<T, C>(&self, index: &[T], calendar: &C) -> Mask<T>
    where
        T: Datelike + Timelike + Clone,
        C: HolidayCalendar + ?Sized,
    {
        let values = index
            .iter()
            .map(|ts| self.contains(ts.weekday(), ts.num_seconds_from_midnight()))
            .collect();
        let mut mask = Mask {
            index: index.to_vec(),
            values,
        };

        if self.exclude_holidays {
            if let (Some(first), Some(last)) = (index.first(), index.last()) {
                let holidays = calendar.holiday_dates(first.year(), last.year());
                tracing::debug!(
                    region = calendar.region(),
                    first_year = first.year(),
                    last_year = last.year(),
                    holidays = holidays.len(),
                    "excluding public holidays"
                );
                mask.close_dates(&holidays);
            }
        }

        if !self.closed.is_empty() {
            let closed: BTreeSet<NaiveDate> = self.closed.iter().copied().collect();
            mask.close_dates(&closed);
        }

        mask
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::holidays::Belgium;
    use chrono::{Duration, NaiveDateTime};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn hourly(start: NaiveDateTime, hours: i64) -> Vec<NaiveDateTime> {
        (0..hours).map(|h| start + Duration::hours(h)).collect()
    }

    #[test]
    fn test_time_of_day_parsing() {
        assert_eq!("09:00".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(9, 0).unwrap());
        assert_eq!("9:30".parse::<TimeOfDay>().unwrap(), TimeOfDay::new(9, 30).unwrap());
        assert_eq!(
            "17:15:00".parse::<TimeOfDay>().unwrap(),
            TimeOfDay::new(17, 15).unwrap()
        );
        assert!(matches!(
            "nine".parse::<TimeOfDay>(),
            Err(ScheduleError::Parse(_))
        ));
        assert!("25:00".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_weekday_parsing() {
        assert_eq!(parse_weekday("Monday").unwrap(), Weekday::Mon);
        assert_eq!(parse_weekday("sat").unwrap(), Weekday::Sat);
        assert!(matches!(parse_weekday("Caturday"), Err(ScheduleError::Parse(_))));
    }

    #[test]
    fn test_half_open_window() {
        // 2018-03-05 is a Monday
        let index = vec![
            at(2018, 3, 5, 8, 59),
            at(2018, 3, 5, 9, 0),
            at(2018, 3, 5, 16, 59),
            at(2018, 3, 5, 17, 0),
        ];
        let mask = WeekSchedule::new(&[Weekday::Mon]).mask(&index, &Belgium);
        assert_eq!(mask.values(), &[false, true, true, false]);
    }

    #[test]
    fn test_other_weekdays_closed() {
        let index = hourly(at(2018, 3, 5, 0, 0), 24 * 7);
        let mask = WeekSchedule::new(&[Weekday::Wed]).mask(&index, &Belgium);
        assert_eq!(mask.open_count(), 8);
        assert!(mask.iter().filter(|(_, open)| *open).all(|(ts, _)| ts.weekday() == Weekday::Wed));
    }

    #[test]
    fn test_holidays_excluded() {
        // 2018-04-02 is Easter Monday
        let index = hourly(at(2018, 4, 2, 0, 0), 24);
        let mask = WeekSchedule::new(&[Weekday::Mon]).mask(&index, &Belgium);
        assert_eq!(mask.open_count(), 0);

        let mask = WeekSchedule::new(&[Weekday::Mon])
            .exclude_holidays(false)
            .mask(&index, &Belgium);
        assert_eq!(mask.open_count(), 8);
    }

    #[test]
    fn test_closed_dates_apply_without_holiday_exclusion() {
        let index = hourly(at(2018, 4, 25, 0, 0), 24);
        let closed = [NaiveDate::from_ymd_opt(2018, 4, 25).unwrap()];
        let mask = WeekSchedule::new(&[Weekday::Wed])
            .exclude_holidays(false)
            .closed(&closed)
            .mask(&index, &Belgium);
        assert_eq!(mask.open_count(), 0);
    }

    #[test]
    fn test_empty_index() {
        let index: Vec<NaiveDateTime> = Vec::new();
        let mask = WeekSchedule::new(&[Weekday::Mon]).mask(&index, &Belgium);
        assert!(mask.is_empty());
    }

    #[test]
    fn test_custom_hours() {
        let index = hourly(at(2018, 3, 6, 0, 0), 24);
        let mask = WeekSchedule::from_names(&["Tuesday"])
            .unwrap()
            .hours("7:00", "12:00")
            .unwrap()
            .mask(&index, &Belgium);
        assert_eq!(mask.open_count(), 5);
    }

    #[test]
    fn test_union_length_mismatch() {
        let a = Mask::closed(&hourly(at(2018, 1, 1, 0, 0), 3));
        let b = Mask::closed(&hourly(at(2018, 1, 1, 0, 0), 4));
        assert!(matches!(
            a.union(&b),
            Err(ScheduleError::IndexMismatch { left: 3, right: 4 })
        ));
    }
}
