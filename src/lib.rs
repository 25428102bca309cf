//! Joule Telemetry - energy sensor sync, export and calendar toolkit.
//!
//! This library pulls counter readings for groups of energy sensors from a
//! remote telemetry service, writes them to per-group files, and provides
//! the calendar tools used to analyse them: public holidays, weekly
//! schedules and per-location opening hours.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Joule Telemetry                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Sensors +  │──▶│  Telemetry  │──▶│   Export    │       │
//! │  │  Metadata   │   │  (sync/get) │   │ (csv/json)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │              │
//! │                                              ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Calendar   │   │   Series    │   │   Ledger    │       │
//! │  │ (schedules) │   │ (trimming)  │   │  (totals)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use joule_telemetry::calendar::{Belgium, WeekSchedule};
//! use chrono::{NaiveDate, Weekday};
//!
//! let schedule = WeekSchedule::new(&[Weekday::Mon, Weekday::Tue])
//!     .hours("08:00", "18:00")
//!     .expect("valid hours");
//!
//! let day = NaiveDate::from_ymd_opt(2018, 6, 4).unwrap();
//! let index: Vec<_> = (0..24).map(|h| day.and_hms_opt(h, 0, 0).unwrap()).collect();
//! let mask = schedule.mask(&index, &Belgium);
//! assert_eq!(mask.open_count(), 10);
//! ```

pub mod calendar;
pub mod config;
pub mod data;
pub mod export;
pub mod ledger;
pub mod telemetry;

// Re-export key types at crate root for convenience
pub use calendar::{Belgium, HolidayCalendar, Mask, OpeningHoursStore, WeekSchedule};
pub use config::{Config, ConfigError};
pub use data::{Filter, MetadataTable, Series, TrimBounds};
pub use export::{export_data, ExportError, ExportOptions, ExportSummary, SensorTokens};
pub use ledger::{ExportLog, LedgerError};
pub use telemetry::{
    DataRequest, FluksoConfig, FluksoSession, Frame, Layout, Resolution, TelemetrySession,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
