//! Wide and long layouts of synchronized readings.

use chrono::DateTime;
use chrono_tz::Tz;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Timestamp format used in exported files, e.g. `2018-01-01 00:15:00+01:00`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";

/// Header of the timestamp column.
pub const TIMESTAMP_COLUMN: &str = "Timestamp";

/// Output layout of an exported frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layout {
    /// One column per sensor.
    #[default]
    Multicolumn,
    /// One `SensorId, Timestamp, Value` row per reading.
    Normalized,
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "multicolumn" | "wide" => Ok(Layout::Multicolumn),
            "normalized" | "long" => Ok(Layout::Normalized),
            other => Err(format!("unknown layout '{other}' (multicolumn or normalized)")),
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Layout::Multicolumn => write!(f, "multicolumn"),
            Layout::Normalized => write!(f, "normalized"),
        }
    }
}

/// Values of a single sensor aligned on the frame index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

/// Readings indexed by timestamp with one column per sensor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    #[serde(serialize_with = "serialize_index")]
    index: Vec<DateTime<Tz>>,
    columns: Vec<Column>,
}

/// A single long-format reading.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedRow {
    #[serde(rename = "SensorId")]
    pub sensor_id: String,
    #[serde(rename = "Timestamp", serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Tz>,
    #[serde(rename = "Value")]
    pub value: Option<f64>,
}

impl Frame {
    /// Build a frame; every column must match the index length.
    pub fn new(index: Vec<DateTime<Tz>>, columns: Vec<Column>) -> Option<Self> {
        columns
            .iter()
            .all(|c| c.values.len() == index.len())
            .then_some(Self { index, columns })
    }

    /// A frame with no rows and one empty column per name.
    pub fn empty(names: &[String]) -> Self {
        Self {
            index: Vec::new(),
            columns: names
                .iter()
                .map(|name| Column {
                    name: name.clone(),
                    values: Vec::new(),
                })
                .collect(),
        }
    }

    pub fn index(&self) -> &[DateTime<Tz>] {
        &self.index
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of index rows.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Long layout ordered by sensor, then timestamp.
    pub fn normalize(&self) -> Vec<NormalizedRow> {
        self.columns
            .iter()
            .flat_map(|column| {
                self.index
                    .iter()
                    .zip(&column.values)
                    .map(move |(ts, value)| NormalizedRow {
                        sensor_id: column.name.clone(),
                        timestamp: *ts,
                        value: *value,
                    })
            })
            .collect()
    }

    /// Number of rows the frame occupies in `layout`.
    pub fn row_count(&self, layout: Layout) -> usize {
        match layout {
            Layout::Multicolumn => self.len(),
            Layout::Normalized => self.len() * self.columns.len(),
        }
    }
}

pub fn format_timestamp(ts: &DateTime<Tz>) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn serialize_timestamp<S>(ts: &DateTime<Tz>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&format_timestamp(ts))
}

fn serialize_index<S>(index: &[DateTime<Tz>], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(index.iter().map(format_timestamp))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Brussels;

    fn frame() -> Frame {
        let index = vec![
            Brussels.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap(),
            Brussels.with_ymd_and_hms(2018, 1, 1, 0, 15, 0).unwrap(),
        ];
        Frame::new(
            index,
            vec![
                Column {
                    name: "a".to_string(),
                    values: vec![Some(1.0), None],
                },
                Column {
                    name: "b".to_string(),
                    values: vec![Some(3.0), Some(4.0)],
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_layout_parsing() {
        assert_eq!("normalized".parse::<Layout>().unwrap(), Layout::Normalized);
        assert_eq!("Multicolumn".parse::<Layout>().unwrap(), Layout::Multicolumn);
        assert!("pivot".parse::<Layout>().is_err());
    }

    #[test]
    fn test_normalize_orders_by_sensor() {
        let rows = frame().normalize();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].sensor_id, "a");
        assert_eq!(rows[1].sensor_id, "a");
        assert_eq!(rows[1].value, None);
        assert_eq!(rows[2].sensor_id, "b");
        assert!(rows[2].timestamp < rows[3].timestamp);
    }

    #[test]
    fn test_timestamp_format() {
        let f = frame();
        assert_eq!(format_timestamp(&f.index()[1]), "2018-01-01 00:15:00+01:00");
    }

    #[test]
    fn test_column_length_checked() {
        let index = frame().index().to_vec();
        let bad = Column {
            name: "x".to_string(),
            values: vec![Some(1.0)],
        };
        assert!(Frame::new(index, vec![bad]).is_none());
    }

    #[test]
    fn test_json_shape() {
        let json = serde_json::to_value(frame()).unwrap();
        assert_eq!(json["index"][0], "2018-01-01 00:00:00+01:00");
        assert_eq!(json["columns"][0]["values"][1], serde_json::Value::Null);
    }
}
