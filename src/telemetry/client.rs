//! Client for the Flukso sensor API.
//!
//! The async [`FluksoClient`] talks HTTP; [`BlockingFluksoClient`] drives
//! it on a single-threaded runtime so the export pipeline stays
//! synchronous. [`FluksoSession`] puts both behind the
//! [`TelemetrySession`] contract.

use crate::telemetry::frame::Frame;
use crate::telemetry::session::{
    DataRequest, Reading, ReadingCache, TelemetryError, TelemetrySession,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Telemetry service configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FluksoConfig {
    /// API root, e.g. `https://api.flukso.net`
    pub base_url: String,
    /// Unit requested from the sensor endpoint
    pub unit: String,
    /// Value of the `X-Version` header
    pub api_version: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for FluksoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.flukso.net".to_string(),
            unit: "lifetime".to_string(),
            api_version: "1.0".to_string(),
            timeout_secs: 30,
        }
    }
}

impl FluksoConfig {
    /// Configuration pointing at `base_url` with default settings.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Readings endpoint of a sensor.
    pub fn sensor_url(&self, sensor_id: &str) -> String {
        format!("{}/sensor/{}", self.base_url.trim_end_matches('/'), sensor_id)
    }
}

/// Async Flukso API client.
pub struct FluksoClient {
    config: FluksoConfig,
    client: reqwest::Client,
}

impl FluksoClient {
    pub fn new(config: FluksoConfig) -> Result<Self, TelemetryError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| TelemetryError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    pub fn config(&self) -> &FluksoConfig {
        &self.config
    }

    /// Fetch counter readings of one sensor in `[start, end]` (unix seconds).
    pub async fn fetch_readings(
        &self,
        sensor_id: &str,
        token: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Reading>, TelemetryError> {
        let response = self
            .client
            .get(self.config.sensor_url(sensor_id))
            .header("Accept", "application/json")
            .header("X-Version", &self.config.api_version)
            .header("X-Token", token)
            .query(&[
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("resolution", "minute".to_string()),
                ("unit", self.config.unit.clone()),
            ])
            .send()
            .await
            .map_err(|e| TelemetryError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(TelemetryError::Server {
                status: status.as_u16(),
                message,
            });
        }

        let body: Vec<(Value, Value)> = response
            .json()
            .await
            .map_err(|e| TelemetryError::Serialization(e.to_string()))?;

        Ok(parse_readings(sensor_id, body))
    }
}

/// Convert `[timestamp, value]` pairs, dropping `"nan"` and null values.
fn parse_readings(sensor_id: &str, body: Vec<(Value, Value)>) -> Vec<Reading> {
    let total = body.len();
    let readings: Vec<Reading> = body
        .into_iter()
        .filter_map(|(ts, value)| {
            let timestamp = ts.as_i64().or_else(|| ts.as_f64().map(|f| f as i64))?;
            let value = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            }?;
            (!value.is_nan()).then_some(Reading { timestamp, value })
        })
        .collect();

    if readings.len() < total {
        tracing::warn!(
            sensor_id,
            skipped = total - readings.len(),
            "dropped readings without a numeric value"
        );
    }
    readings
}

/// Blocking wrapper around [`FluksoClient`].
pub struct BlockingFluksoClient {
    inner: FluksoClient,
    runtime: tokio::runtime::Runtime,
}

impl BlockingFluksoClient {
    pub fn new(config: FluksoConfig) -> Result<Self, TelemetryError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| TelemetryError::Config(format!("Failed to create runtime: {e}")))?;

        Ok(Self {
            inner: FluksoClient::new(config)?,
            runtime,
        })
    }

    pub fn fetch_readings(
        &self,
        sensor_id: &str,
        token: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Reading>, TelemetryError> {
        self.runtime
            .block_on(self.inner.fetch_readings(sensor_id, token, start, end))
    }

    pub fn config(&self) -> &FluksoConfig {
        self.inner.config()
    }
}

/// A [`TelemetrySession`] backed by the Flukso API.
///
/// Readings are kept in memory for the lifetime of the session; each
/// `sync` only asks for readings newer than the last one seen.
pub struct FluksoSession {
    client: BlockingFluksoClient,
    tokens: BTreeMap<String, String>,
    cache: ReadingCache,
    sync_start: DateTime<Utc>,
    sync_end: Option<DateTime<Utc>>,
}

impl FluksoSession {
    pub fn new(config: FluksoConfig) -> Result<Self, TelemetryError> {
        Ok(Self {
            client: BlockingFluksoClient::new(config)?,
            tokens: BTreeMap::new(),
            cache: ReadingCache::new(),
            sync_start: DateTime::<Utc>::default(),
            sync_end: None,
        })
    }

    /// Oldest instant fetched for sensors that were never synced.
    pub fn sync_from(mut self, start: DateTime<Utc>) -> Self {
        self.sync_start = start;
        self
    }

    /// Newest instant fetched; defaults to the time of each sync.
    pub fn sync_until(mut self, end: Option<DateTime<Utc>>) -> Self {
        self.sync_end = end;
        self
    }

    pub fn cache(&self) -> &ReadingCache {
        &self.cache
    }

    pub fn is_registered(&self, sensor_id: &str) -> bool {
        self.tokens.contains_key(sensor_id)
    }
}

impl TelemetrySession for FluksoSession {
    fn add(&mut self, sensor_id: &str, token: &str) {
        self.tokens.insert(sensor_id.to_string(), token.to_string());
    }

    fn sync(&mut self, sensor_ids: &[&str]) -> Result<usize, TelemetryError> {
        let end = self.sync_end.unwrap_or_else(Utc::now).timestamp();
        let mut added = 0;

        for &sid in sensor_ids {
            let token = self
                .tokens
                .get(sid)
                .ok_or_else(|| TelemetryError::UnknownSensor(sid.to_string()))?;
            let start = self
                .cache
                .last_timestamp(sid)
                .map(|ts| ts + 1)
                .unwrap_or_else(|| self.sync_start.timestamp());
            if start > end {
                tracing::debug!(sensor_id = sid, "already up to date");
                continue;
            }

            let readings = self.client.fetch_readings(sid, token, start, end)?;
            let fetched = readings.len();
            let new = self.cache.merge(sid, readings);
            tracing::debug!(sensor_id = sid, start, end, fetched, new, "synced sensor");
            added += new;
        }

        Ok(added)
    }

    fn get_data(&self, request: &DataRequest) -> Result<Frame, TelemetryError> {
        Ok(self.cache.frame(request))
    }
}
