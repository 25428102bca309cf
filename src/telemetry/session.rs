//! Telemetry session contract and the in-memory reading cache.
//!
//! A session registers sensor/token pairs, synchronizes counter readings
//! from the remote service and answers data requests from what it has
//! synchronized so far.

use crate::telemetry::frame::{Column, Frame};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

/// Time zone readings are reported in unless a request says otherwise.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Brussels;

/// Telemetry errors.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    #[error("Telemetry config error: {0}")]
    Config(String),
    #[error("Telemetry network error: {0}")]
    Network(String),
    #[error("Telemetry server error ({status}): {message}")]
    Server { status: u16, message: String },
    #[error("Telemetry serialization error: {0}")]
    Serialization(String),
    #[error("Sensor '{0}' is not registered with this session")]
    UnknownSensor(String),
}

/// A raw counter reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    /// Unix timestamp in seconds
    pub timestamp: i64,
    pub value: f64,
}

impl Reading {
    pub fn new(timestamp: i64, value: f64) -> Self {
        Self { timestamp, value }
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resampling resolution of a data request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Resolution {
    /// No resampling.
    #[default]
    Raw,
    Minutes(u32),
    Hours(u32),
    /// Calendar days in the request time zone.
    Day,
}

impl Resolution {
    /// Start of the bin containing `ts`, as a unix timestamp.
    pub fn bin_start(&self, ts: i64, tz: &Tz) -> i64 {
        let width = match self {
            Resolution::Raw => return ts,
            Resolution::Minutes(n) => i64::from(*n) * 60,
            Resolution::Hours(n) => i64::from(*n) * 3600,
            Resolution::Day => return local_midnight(ts, tz),
        };
        ts.div_euclid(width) * width
    }

    /// Every bin start from `first` to `last`, both bin starts.
    ///
    /// Raw data has no grid and yields only `first`.
    pub fn grid(&self, first: i64, last: i64, tz: &Tz) -> Vec<i64> {
        let mut bins = Vec::new();
        let mut bin = first;
        while bin <= last {
            bins.push(bin);
            let next = match self {
                Resolution::Raw => break,
                Resolution::Minutes(n) => bin + i64::from(*n) * 60,
                Resolution::Hours(n) => bin + i64::from(*n) * 3600,
                // Local days last 23 to 25 hours
                Resolution::Day => local_midnight(bin + 26 * 3600, tz),
            };
            if next <= bin {
                break;
            }
            bin = next;
        }
        bins
    }

    /// Nominal bin width; `None` for raw data.
    pub fn step(&self) -> Option<chrono::Duration> {
        match self {
            Resolution::Raw => None,
            Resolution::Minutes(n) => Some(chrono::Duration::minutes(i64::from(*n))),
            Resolution::Hours(n) => Some(chrono::Duration::hours(i64::from(*n))),
            Resolution::Day => Some(chrono::Duration::days(1)),
        }
    }
}

fn local_midnight(ts: i64, tz: &Tz) -> i64 {
    let Some(utc) = DateTime::from_timestamp(ts, 0) else {
        return ts;
    };
    let Some(midnight) = utc.with_timezone(tz).date_naive().and_hms_opt(0, 0, 0) else {
        return ts;
    };
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|dt| dt.timestamp())
        .unwrap_or_else(|| Utc.from_utc_datetime(&midnight).timestamp())
}

impl FromStr for Resolution {
    type Err = String;

    /// Accepts `raw`, `15min`, `min`, `h`, `2h`, `d`, `day`, and the
    /// pandas-style aliases `15T` and `1H`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        if s.is_empty() || s == "raw" {
            return Ok(Resolution::Raw);
        }

        let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
        let (count, unit) = s.split_at(split);
        let count: u32 = if count.is_empty() {
            1
        } else {
            count
                .parse()
                .map_err(|e| format!("invalid resolution '{s}': {e}"))?
        };
        if count == 0 {
            return Err(format!("invalid resolution '{s}': zero width"));
        }

        match unit {
            "min" | "t" | "m" => Ok(Resolution::Minutes(count)),
            "h" | "hour" => Ok(Resolution::Hours(count)),
            "d" | "day" if count == 1 => Ok(Resolution::Day),
            _ => Err(format!("invalid resolution '{s}'")),
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resolution::Raw => write!(f, "raw"),
            Resolution::Minutes(n) => write!(f, "{n}min"),
            Resolution::Hours(n) => write!(f, "{n}h"),
            Resolution::Day => write!(f, "d"),
        }
    }
}

// ---------------------------------------------------------------------------
// Data request
// ---------------------------------------------------------------------------

/// Parameters of a `get_data` call.
#[derive(Debug, Clone)]
pub struct DataRequest {
    pub sensor_ids: Vec<String>,
    pub head: Option<DateTime<Utc>>,
    pub tail: Option<DateTime<Utc>>,
    pub resolution: Resolution,
    pub timezone: Tz,
    pub diff: bool,
}

impl DataRequest {
    /// Raw, undifferenced data over all synchronized time.
    pub fn new<S: AsRef<str>>(sensor_ids: &[S]) -> Self {
        Self {
            sensor_ids: sensor_ids.iter().map(|s| s.as_ref().to_string()).collect(),
            head: None,
            tail: None,
            resolution: Resolution::Raw,
            timezone: DEFAULT_TIMEZONE,
            diff: false,
        }
    }

    pub fn range(mut self, head: Option<DateTime<Utc>>, tail: Option<DateTime<Utc>>) -> Self {
        self.head = head;
        self.tail = tail;
        self
    }

    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn timezone(mut self, timezone: Tz) -> Self {
        self.timezone = timezone;
        self
    }

    pub fn diff(mut self, diff: bool) -> Self {
        self.diff = diff;
        self
    }

    fn contains(&self, ts: i64) -> bool {
        self.head.map_or(true, |h| ts >= h.timestamp())
            && self.tail.map_or(true, |t| ts <= t.timestamp())
    }
}

// ---------------------------------------------------------------------------
// Session contract
// ---------------------------------------------------------------------------

/// A session against a remote telemetry service.
pub trait TelemetrySession {
    /// Register credentials for a sensor.
    fn add(&mut self, sensor_id: &str, token: &str);

    /// Fetch new readings for every sensor, blocking until done.
    ///
    /// Returns the number of readings added to the session.
    fn sync(&mut self, sensor_ids: &[&str]) -> Result<usize, TelemetryError>;

    /// Build a frame from synchronized readings.
    fn get_data(&self, request: &DataRequest) -> Result<Frame, TelemetryError>;
}

// ---------------------------------------------------------------------------
// Reading cache
// ---------------------------------------------------------------------------

/// Synchronized readings per sensor, ordered and deduplicated.
#[derive(Debug, Clone, Default)]
pub struct ReadingCache {
    readings: HashMap<String, Vec<Reading>>,
}

impl ReadingCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge readings for `sensor_id`; returns how many were new.
    ///
    /// A reading at an already known timestamp replaces the old value.
    pub fn merge(&mut self, sensor_id: &str, new: impl IntoIterator<Item = Reading>) -> usize {
        let entry = self.readings.entry(sensor_id.to_string()).or_default();
        let mut by_ts: BTreeMap<i64, f64> = entry.iter().map(|r| (r.timestamp, r.value)).collect();
        let before = by_ts.len();
        for reading in new {
            by_ts.insert(reading.timestamp, reading.value);
        }
        let added = by_ts.len() - before;
        *entry = by_ts
            .into_iter()
            .map(|(timestamp, value)| Reading { timestamp, value })
            .collect();
        added
    }

    pub fn readings(&self, sensor_id: &str) -> &[Reading] {
        self.readings
            .get(sensor_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Timestamp of the newest reading of `sensor_id`.
    pub fn last_timestamp(&self, sensor_id: &str) -> Option<i64> {
        self.readings(sensor_id).last().map(|r| r.timestamp)
    }

    /// Resample, optionally difference, and align the requested sensors.
    ///
    /// Raw data is aligned on the union of reading timestamps and each
    /// sensor is differenced over its own readings. Resampled data lies on
    /// a regular grid from the first to the last occupied bin; empty bins
    /// are missing and only adjacent bins are differenced.
    pub fn frame(&self, request: &DataRequest) -> Frame {
        let tz = &request.timezone;
        let resolution = request.resolution;

        let binned: Vec<BTreeMap<i64, f64>> = request
            .sensor_ids
            .iter()
            .map(|sid| {
                let mut bins = BTreeMap::new();
                for r in self.readings(sid) {
                    if request.contains(r.timestamp) && !r.value.is_nan() {
                        bins.insert(resolution.bin_start(r.timestamp, tz), r.value);
                    }
                }
                bins
            })
            .collect();

        let keys: Vec<i64> = if resolution == Resolution::Raw {
            let union: BTreeSet<i64> = binned.iter().flat_map(|b| b.keys().copied()).collect();
            union.into_iter().collect()
        } else {
            let first = binned.iter().filter_map(|b| b.keys().next()).min();
            let last = binned.iter().filter_map(|b| b.keys().next_back()).max();
            match (first, last) {
                (Some(&first), Some(&last)) => resolution.grid(first, last, tz),
                _ => Vec::new(),
            }
        };

        let index = keys
            .iter()
            .filter_map(|&k| DateTime::from_timestamp(k, 0))
            .map(|dt| dt.with_timezone(tz))
            .collect();
        let columns = request
            .sensor_ids
            .iter()
            .zip(&binned)
            .map(|(sid, bins)| {
                let values = if resolution == Resolution::Raw {
                    let series: BTreeMap<i64, Option<f64>> = if request.diff {
                        difference(bins)
                    } else {
                        bins.iter().map(|(&k, &v)| (k, Some(v))).collect()
                    };
                    keys.iter().map(|k| series.get(k).copied().flatten()).collect()
                } else {
                    let aligned: Vec<Option<f64>> =
                        keys.iter().map(|k| bins.get(k).copied()).collect();
                    if request.diff {
                        adjacent_difference(&aligned)
                    } else {
                        aligned
                    }
                };
                Column {
                    name: sid.clone(),
                    values,
                }
            })
            .collect();

        Frame::new(index, columns).unwrap_or_else(|| Frame::empty(&request.sensor_ids))
    }
}

/// A session over preloaded readings, with no remote service.
///
/// `sync` only checks that sensors were registered.
#[derive(Debug, Clone, Default)]
pub struct MemorySession {
    tokens: BTreeMap<String, String>,
    cache: ReadingCache,
    syncs: usize,
}

impl MemorySession {
    pub fn new(cache: ReadingCache) -> Self {
        Self {
            cache,
            ..Self::default()
        }
    }

    /// Number of `sync` calls made so far.
    pub fn sync_count(&self) -> usize {
        self.syncs
    }

    pub fn token(&self, sensor_id: &str) -> Option<&str> {
        self.tokens.get(sensor_id).map(String::as_str)
    }
}

impl TelemetrySession for MemorySession {
    fn add(&mut self, sensor_id: &str, token: &str) {
        self.tokens.insert(sensor_id.to_string(), token.to_string());
    }

    fn sync(&mut self, sensor_ids: &[&str]) -> Result<usize, TelemetryError> {
        if let Some(missing) = sensor_ids.iter().find(|sid| !self.tokens.contains_key(**sid)) {
            return Err(TelemetryError::UnknownSensor(missing.to_string()));
        }
        self.syncs += 1;
        Ok(0)
    }

    fn get_data(&self, request: &DataRequest) -> Result<Frame, TelemetryError> {
        Ok(self.cache.frame(request))
    }
}

/// Consecutive differences; the first bin has no predecessor.
fn difference(bins: &BTreeMap<i64, f64>) -> BTreeMap<i64, Option<f64>> {
    let mut previous: Option<f64> = None;
    bins.iter()
        .map(|(&k, &v)| {
            let delta = previous.map(|p| v - p);
            previous = Some(v);
            (k, delta)
        })
        .collect()
}

/// Differences between neighbouring slots; missing next to a missing slot.
fn adjacent_difference(values: &[Option<f64>]) -> Vec<Option<f64>> {
    std::iter::once(None)
        .chain(values.windows(2).map(|w| match (w[0], w[1]) {
            (Some(prev), Some(cur)) => Some(cur - prev),
            _ => None,
        }))
        .take(values.len())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn cache() -> ReadingCache {
        // 2018-01-01T00:00:00Z, one reading every 5 minutes, counter +2 each
        let start = utc("2018-01-01T00:00:00Z").timestamp();
        let mut cache = ReadingCache::new();
        cache.merge(
            "s1",
            (0..12).map(|i| Reading::new(start + i * 300, 100.0 + 2.0 * i as f64)),
        );
        cache
    }

    #[test]
    fn test_resolution_parsing() {
        assert_eq!("15min".parse::<Resolution>().unwrap(), Resolution::Minutes(15));
        assert_eq!("15T".parse::<Resolution>().unwrap(), Resolution::Minutes(15));
        assert_eq!("h".parse::<Resolution>().unwrap(), Resolution::Hours(1));
        assert_eq!("2H".parse::<Resolution>().unwrap(), Resolution::Hours(2));
        assert_eq!("d".parse::<Resolution>().unwrap(), Resolution::Day);
        assert_eq!("raw".parse::<Resolution>().unwrap(), Resolution::Raw);
        assert!("0min".parse::<Resolution>().is_err());
        assert!("3d".parse::<Resolution>().is_err());
        assert!("fortnight".parse::<Resolution>().is_err());
    }

    #[test]
    fn test_resolution_step() {
        assert_eq!(Resolution::Raw.step(), None);
        assert_eq!(
            Resolution::Minutes(15).step(),
            Some(chrono::Duration::minutes(15))
        );
        assert_eq!(Resolution::Day.step(), Some(chrono::Duration::hours(24)));
    }

    #[test]
    fn test_merge_deduplicates() {
        let mut cache = cache();
        let start = utc("2018-01-01T00:00:00Z").timestamp();
        let added = cache.merge("s1", vec![Reading::new(start, 100.0), Reading::new(start + 3600, 124.0)]);
        assert_eq!(added, 1);
        assert_eq!(cache.readings("s1").len(), 13);
        assert_eq!(cache.last_timestamp("s1"), Some(start + 3600));
    }

    #[test]
    fn test_raw_frame_in_local_time() {
        let frame = cache().frame(&DataRequest::new(&["s1"]));
        assert_eq!(frame.len(), 12);
        assert_eq!(
            crate::telemetry::frame::format_timestamp(&frame.index()[0]),
            "2018-01-01 01:00:00+01:00"
        );
    }

    #[test]
    fn test_resampled_diff() {
        let request = DataRequest::new(&["s1"])
            .resolution(Resolution::Minutes(15))
            .diff(true);
        let frame = cache().frame(&request);

        // 4 bins, last reading per bin: 104, 110, 116, 122
        assert_eq!(frame.len(), 4);
        let values = &frame.column("s1").unwrap().values;
        assert_eq!(values, &vec![None, Some(6.0), Some(6.0), Some(6.0)]);
    }

    #[test]
    fn test_resampled_gap_stays_on_grid() {
        let start = utc("2018-01-01T00:00:00Z").timestamp();
        let mut cache = ReadingCache::new();
        cache.merge(
            "s1",
            vec![
                Reading::new(start, 100.0),
                Reading::new(start + 300, 110.0),
                Reading::new(start + 7200, 150.0),
                Reading::new(start + 7500, 160.0),
            ],
        );

        let request = DataRequest::new(&["s1"]).resolution(Resolution::Minutes(15));
        let frame = cache.frame(&request);
        // 00:00 through 02:00 UTC in quarter hours
        assert_eq!(frame.len(), 9);
        assert_eq!(
            crate::telemetry::frame::format_timestamp(&frame.index()[8]),
            "2018-01-01 03:00:00+01:00"
        );
        let values = &frame.column("s1").unwrap().values;
        assert_eq!(values[0], Some(110.0));
        assert!(values[1..8].iter().all(Option::is_none));
        assert_eq!(values[8], Some(160.0));

        // No consumption is charged across the gap
        let diffed = cache.frame(&request.diff(true));
        assert_eq!(diffed.len(), 9);
        assert!(diffed.column("s1").unwrap().values.iter().all(Option::is_none));
    }

    #[test]
    fn test_day_grid_across_dst() {
        let tz = DEFAULT_TIMEZONE;
        // Local midnights of 24, 25 (23 hours long) and 26 March 2018
        let first = utc("2018-03-23T23:00:00Z").timestamp();
        let last = utc("2018-03-25T22:00:00Z").timestamp();
        let grid = Resolution::Day.grid(first, last, &tz);
        assert_eq!(
            grid,
            vec![first, utc("2018-03-24T23:00:00Z").timestamp(), last]
        );
    }

    #[test]
    fn test_range_is_inclusive() {
        let request = DataRequest::new(&["s1"]).range(
            Some(utc("2018-01-01T00:10:00Z")),
            Some(utc("2018-01-01T00:20:00Z")),
        );
        assert_eq!(cache().frame(&request).len(), 3);
    }

    #[test]
    fn test_unknown_sensor_gives_empty_column() {
        let frame = cache().frame(&DataRequest::new(&["s1", "nope"]));
        let missing = frame.column("nope").unwrap();
        assert_eq!(missing.values.len(), 12);
        assert!(missing.values.iter().all(Option::is_none));
    }

    #[test]
    fn test_day_bins_align_to_local_midnight() {
        // 23:30 UTC on Jan 1 is already Jan 2 in Brussels
        let ts = utc("2018-01-01T23:30:00Z").timestamp();
        let bin = Resolution::Day.bin_start(ts, &DEFAULT_TIMEZONE);
        assert_eq!(bin, utc("2018-01-01T23:00:00Z").timestamp());
    }
}
