//! Per-location opening hours.
//!
//! Each location has a YAML file `<dir>/<location>.yml` listing day
//! entries, every entry mapping a weekday to `[on, off]` pairs:
//!
//! ```yaml
//! - Monday:
//!     - ["08:00", "12:00"]
//!     - ["13:00", "17:30"]
//! - Saturday:
//!     - ["10:00", "14:00"]
//! ```
//!
//! The opening-hours mask is the union of one [`WeekSchedule`] per window.

use crate::calendar::holidays::{Belgium, HolidayCalendar};
use crate::calendar::schedule::{parse_weekday, Mask, ScheduleError, TimeOfDay, WeekSchedule};
use chrono::{Datelike, NaiveDate, Timelike, Weekday};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Dates closed at every location on top of the regional holidays,
/// as (year, month, day).
///
/// 2018-04-25 is missing from the regional calendar but the sites were
/// closed that day.
pub const SUPPLEMENTAL_CLOSED_DATES: &[(i32, u32, u32)] = &[(2018, 4, 25)];

/// Extension of the per-location configuration files.
pub const OPENING_HOURS_EXTENSION: &str = "yml";

/// Raw YAML layout: a list of `{weekday: [[on, off], ...]}` mappings.
type RawOpeningHours = Vec<BTreeMap<String, Vec<(TimeOfDay, TimeOfDay)>>>;

/// Opening windows for one weekday entry.
#[derive(Debug, Clone, PartialEq)]
pub struct DayHours {
    pub day: Weekday,
    pub windows: Vec<(TimeOfDay, TimeOfDay)>,
}

/// Parsed opening hours of a single location.
#[derive(Debug, Clone, PartialEq)]
pub struct OpeningHours {
    pub location: String,
    pub days: Vec<DayHours>,
}

impl OpeningHours {
    /// Parse a YAML opening-hours document.
    pub fn from_yaml(location: &str, yaml: &str) -> Result<Self, ScheduleError> {
        let raw: RawOpeningHours = serde_yaml::from_str(yaml)
            .map_err(|e| ScheduleError::Parse(format!("{location}: {e}")))?;

        let mut days = Vec::new();
        for entry in raw {
            for (name, windows) in entry {
                days.push(DayHours {
                    day: parse_weekday(&name)?,
                    windows,
                });
            }
        }

        Ok(Self {
            location: location.to_string(),
            days,
        })
    }

    /// Total number of weekly windows.
    pub fn window_count(&self) -> usize {
        self.days.iter().map(|d| d.windows.len()).sum()
    }

    /// One single-day schedule per window.
    pub fn schedules(&self, closed: &[NaiveDate]) -> Vec<WeekSchedule> {
        self.days
            .iter()
            .flat_map(|day| {
                day.windows.iter().map(move |&(on, off)| {
                    WeekSchedule::new(&[day.day])
                        .on_time(on)
                        .off_time(off)
                        .closed(closed)
                })
            })
            .collect()
    }

    /// Union of every window's mask over `index`.
    pub fn mask<T, C>(
        &self,
        index: &[T],
        calendar: &C,
        closed: &[NaiveDate],
    ) -> Result<Mask<T>, ScheduleError>
    where
        T: Datelike + Timelike + Clone,
        C: HolidayCalendar + ?Sized,
    {
        self.schedules(closed)
            .iter()
            .try_fold(Mask::closed(index), |acc, schedule| {
                acc.union(&schedule.mask(index, calendar))
            })
    }
}

/// Resolves location identifiers to opening-hours files.
#[derive(Debug, Clone)]
pub struct OpeningHoursStore<C = Belgium> {
    dir: PathBuf,
    closed: Vec<NaiveDate>,
    calendar: C,
}

impl OpeningHoursStore<Belgium> {
    /// Store reading from `dir` with the Belgian calendar.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self::with_calendar(dir, Belgium)
    }
}

impl<C: HolidayCalendar> OpeningHoursStore<C> {
    pub fn with_calendar(dir: impl Into<PathBuf>, calendar: C) -> Self {
        Self {
            dir: dir.into(),
            closed: supplemental_closed_dates(),
            calendar,
        }
    }

    /// Replace the supplemental closed-date list.
    pub fn with_closed_dates(mut self, closed: Vec<NaiveDate>) -> Self {
        self.closed = closed;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn closed_dates(&self) -> &[NaiveDate] {
        &self.closed
    }

    pub fn calendar(&self) -> &C {
        &self.calendar
    }

    /// Path of the configuration file for `location`.
    pub fn path_for(&self, location: &str) -> PathBuf {
        self.dir
            .join(format!("{location}.{OPENING_HOURS_EXTENSION}"))
    }

    /// Load and parse the opening hours of `location`.
    pub fn load(&self, location: &str) -> Result<OpeningHours, ScheduleError> {
        let path = self.path_for(location);
        let content = std::fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ScheduleError::NotFound(path.clone())
            } else {
                ScheduleError::Io(format!("{}: {e}", path.display()))
            }
        })?;
        OpeningHours::from_yaml(location, &content)
    }

    /// Opening-hours mask of `location` over `index`.
    pub fn opening_hours<T>(&self, location: &str, index: &[T]) -> Result<Mask<T>, ScheduleError>
    where
        T: Datelike + Timelike + Clone,
    {
        let hours = self.load(location)?;
        tracing::debug!(
            location,
            windows = hours.window_count(),
            timestamps = index.len(),
            "computing opening hours"
        );
        hours.mask(index, &self.calendar, &self.closed)
    }
}

fn supplemental_closed_dates() -> Vec<NaiveDate> {
    SUPPLEMENTAL_CLOSED_DATES
        .iter()
        .filter_map(|&(y, m, d)| NaiveDate::from_ymd_opt(y, m, d))
        .collect()
}
