//! Calendar utilities.
//!
//! This module contains:
//! - Regional public holiday calendars
//! - Weekly `[on, off)` schedules evaluated into boolean masks
//! - Per-location opening hours loaded from YAML

pub mod holidays;
pub mod opening_hours;
pub mod schedule;

// Re-export commonly used types
pub use holidays::{easter_sunday, Belgium, Holiday, HolidayCalendar};
pub use opening_hours::{
    DayHours, OpeningHours, OpeningHoursStore, SUPPLEMENTAL_CLOSED_DATES,
};
pub use schedule::{parse_weekday, Mask, ScheduleError, TimeOfDay, WeekSchedule};
