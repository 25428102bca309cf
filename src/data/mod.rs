//! Tabular data handling.
//!
//! - `table`: string tables loaded from CSV
//! - `metadata`: the sensor metadata repository and its filters
//! - `series`: nullable numeric series and outlier trimming

pub mod metadata;
pub mod series;
pub mod table;

pub use metadata::{Filter, MetadataTable, SENSOR_ID_COLUMN};
pub use series::{
    percentile_sorted, trim_table, OutlierError, Series, TrimBounds, DEFAULT_LOWER_PERCENTILE,
    DEFAULT_UPPER_PERCENTILE,
};
pub use table::{Table, TableError};
