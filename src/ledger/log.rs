//! Running totals of export activity.
//!
//! The ledger counts what the tool has pulled from the telemetry service
//! and written to disk, and survives between runs as a small JSON file.

use crate::export::pipeline::GroupReport;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the persisted ledger inside the data directory.
pub const LEDGER_FILE_NAME: &str = "export_log.json";

/// Ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Ledger IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Ledger parse error: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Export counters accumulated over every run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExportStats {
    pub groups_exported: u64,
    pub sensors_synced: u64,
    #[serde(default)]
    pub readings_fetched: u64,
    pub rows_written: u64,
    pub files_written: u64,
    /// When the ledger was last saved
    #[serde(default)]
    pub last_export: Option<DateTime<Utc>>,
}

/// Export counters, optionally backed by a file.
#[derive(Debug, Default)]
pub struct ExportLog {
    stats: ExportStats,
    persist_path: Option<PathBuf>,
}

impl ExportLog {
    /// An in-memory ledger starting from zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the ledger stored at `path`; a missing file starts from zero.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let stats = if path.exists() {
            read_stats(&path)?
        } else {
            ExportStats::default()
        };
        Ok(Self {
            stats,
            persist_path: Some(path),
        })
    }

    /// Record one exported group.
    pub fn record_group(&mut self, report: &GroupReport) {
        self.stats.groups_exported += 1;
        self.stats.files_written += 1;
        self.stats.sensors_synced += report.sensors as u64;
        self.stats.readings_fetched += report.new_readings as u64;
        self.stats.rows_written += report.rows as u64;
    }

    pub fn stats(&self) -> &ExportStats {
        &self.stats
    }

    /// Human-readable summary for the `status` command.
    pub fn summary(&self) -> String {
        let stats = &self.stats;
        let last = stats
            .last_export
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "never".to_string());
        format!(
            "Export Statistics:\n\
             - Groups exported: {}\n\
             - Sensors synchronized: {}\n\
             - Readings fetched: {}\n\
             - Rows written: {}\n\
             - Files written: {}\n\
             - Last export: {}",
            stats.groups_exported,
            stats.sensors_synced,
            stats.readings_fetched,
            stats.rows_written,
            stats.files_written,
            last
        )
    }

    /// Stamp and save the totals. A ledger without a path only stamps.
    pub fn save(&mut self) -> Result<(), LedgerError> {
        self.stats.last_export = Some(Utc::now());
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, serde_json::to_string_pretty(&self.stats)?)?;
        }
        Ok(())
    }
}

fn read_stats(path: &Path) -> Result<ExportStats, LedgerError> {
    let content = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(sensors: usize, rows: usize) -> GroupReport {
        GroupReport {
            group: "siteA".to_string(),
            path: PathBuf::from("siteA.csv"),
            sensors,
            rows,
            new_readings: 10,
        }
    }

    #[test]
    fn test_export_log_counting() {
        let mut log = ExportLog::new();
        log.record_group(&report(2, 96));
        log.record_group(&report(3, 4));

        let stats = log.stats();
        assert_eq!(stats.groups_exported, 2);
        assert_eq!(stats.files_written, 2);
        assert_eq!(stats.sensors_synced, 5);
        assert_eq!(stats.readings_fetched, 20);
        assert_eq!(stats.rows_written, 100);
        assert!(stats.last_export.is_none());
    }

    #[test]
    fn test_persistence_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join(LEDGER_FILE_NAME);

        let mut log = ExportLog::open(&path).unwrap();
        log.record_group(&report(4, 12));
        log.save().unwrap();

        let mut reloaded = ExportLog::open(&path).unwrap();
        assert_eq!(reloaded.stats(), log.stats());
        assert!(reloaded.stats().last_export.is_some());

        // A second run adds to the stored totals
        reloaded.record_group(&report(1, 3));
        reloaded.save().unwrap();
        let stats = ExportLog::open(&path).unwrap().stats().clone();
        assert_eq!(stats.groups_exported, 2);
        assert_eq!(stats.rows_written, 15);
    }

    #[test]
    fn test_corrupt_ledger_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LEDGER_FILE_NAME);
        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(ExportLog::open(&path), Err(LedgerError::Parse(_))));
    }

    #[test]
    fn test_summary_format() {
        let summary = ExportLog::new().summary();
        assert!(summary.contains("Groups exported: 0"));
        assert!(summary.contains("Last export: never"));
    }
}
