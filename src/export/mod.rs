//! Grouped export of synchronized sensor data.
//!
//! This module contains:
//! - Sensor/token tables and grouping by metadata columns
//! - CSV and JSON writers for both frame layouts
//! - The per-group sync-and-write pipeline

pub mod grouping;
pub mod pipeline;
pub mod writer;

use crate::data::table::TableError;
use crate::telemetry::session::TelemetryError;

/// Errors that abort an export run.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("Export IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Export CSV error: {0}")]
    Csv(String),
    #[error("Export serialization error: {0}")]
    Serialization(String),
}

impl From<csv::Error> for ExportError {
    fn from(e: csv::Error) -> Self {
        ExportError::Csv(e.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(e: serde_json::Error) -> Self {
        ExportError::Serialization(e.to_string())
    }
}

// Re-export commonly used types
pub use grouping::{GroupKey, SensorGroup, SensorTokens, DEFAULT_GROUP_NAME, TOKEN_COLUMN};
pub use pipeline::{export_data, sync_and_get, ExportOptions, ExportSummary, GroupReport};
pub use writer::{output_path, write_frame, FileFormat};
