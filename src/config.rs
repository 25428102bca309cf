//! Configuration for the joule toolkit.

use crate::ledger::LEDGER_FILE_NAME;
use crate::telemetry::FluksoConfig;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Sensor metadata CSV
    pub metadata_path: PathBuf,

    /// Directory holding `<location>.yml` opening-hours files
    pub opening_hours_dir: PathBuf,

    /// Default output directory of `export`
    pub export_path: PathBuf,

    /// Path for storing the export ledger
    pub data_path: PathBuf,

    /// IANA time zone name used for exported timestamps
    pub timezone: String,

    /// Telemetry service settings
    pub telemetry: FluksoConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("joule-telemetry");

        Self {
            metadata_path: PathBuf::from("jouleboulevard_metadata.csv"),
            opening_hours_dir: PathBuf::from("data"),
            export_path: data_dir.join("exports"),
            data_path: data_dir,
            timezone: "Europe/Brussels".to_string(),
            telemetry: FluksoConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when absent.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            let content =
                std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
            let config: Config =
                serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Write the configuration as pretty JSON, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("joule-telemetry")
            .join("config.json")
    }

    /// Location of the persisted export ledger.
    pub fn ledger_path(&self) -> PathBuf {
        self.data_path.join(LEDGER_FILE_NAME)
    }

    /// The configured time zone.
    pub fn tz(&self) -> Result<Tz, ConfigError> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| ConfigError::Parse(format!("timezone '{}': {e}", self.timezone)))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialize error: {0}")]
    Serialize(String),
}
