//! File writers for exported frames.

use crate::export::grouping::GroupKey;
use crate::export::ExportError;
use crate::telemetry::frame::{format_timestamp, Frame, Layout, TIMESTAMP_COLUMN};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Header of the normalized layout.
pub const NORMALIZED_HEADER: [&str; 3] = ["SensorId", TIMESTAMP_COLUMN, "Value"];

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Csv,
    /// Serialized table as JSON.
    Json,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Csv => "csv",
            FileFormat::Json => "json",
        }
    }
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(FileFormat::Csv),
            "json" => Ok(FileFormat::Json),
            other => Err(format!("unknown file format '{other}' (csv or json)")),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// `<dir>/<group key stem>.<ext>`, relative to the working directory
/// when no directory is given.
pub fn output_path(dir: Option<&Path>, key: &GroupKey, format: FileFormat) -> PathBuf {
    let file_name = format!("{}.{}", key.file_stem(), format.extension());
    match dir {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Write `frame` to `path`; returns the number of data rows written.
pub fn write_frame(
    frame: &Frame,
    layout: Layout,
    format: FileFormat,
    path: &Path,
) -> Result<usize, ExportError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    match (format, layout) {
        (FileFormat::Csv, Layout::Multicolumn) => write_multicolumn_csv(frame, &mut writer)?,
        (FileFormat::Csv, Layout::Normalized) => write_normalized_csv(frame, &mut writer)?,
        (FileFormat::Json, Layout::Multicolumn) => serde_json::to_writer_pretty(&mut writer, frame)?,
        (FileFormat::Json, Layout::Normalized) => {
            serde_json::to_writer_pretty(&mut writer, &frame.normalize())?
        }
    }
    writer.flush()?;

    Ok(frame.row_count(layout))
}

/// `Timestamp,<sensor>...` with one row per index timestamp.
pub fn write_multicolumn_csv<W: Write>(frame: &Frame, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![TIMESTAMP_COLUMN.to_string()];
    header.extend(frame.columns().iter().map(|c| c.name.clone()));
    csv.write_record(&header)?;

    for (row, ts) in frame.index().iter().enumerate() {
        let mut record = vec![format_timestamp(ts)];
        record.extend(frame.columns().iter().map(|c| format_value(c.values[row])));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

/// `SensorId,Timestamp,Value` ordered by sensor, then timestamp.
pub fn write_normalized_csv<W: Write>(frame: &Frame, writer: W) -> Result<(), ExportError> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(NORMALIZED_HEADER)?;
    for row in frame.normalize() {
        csv.write_record([
            row.sensor_id,
            format_timestamp(&row.timestamp),
            format_value(row.value),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

fn format_value(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::frame::Column;
    use chrono::TimeZone;
    use chrono_tz::Europe::Brussels;

    fn frame() -> Frame {
        let index = vec![
            Brussels.with_ymd_and_hms(2018, 6, 1, 12, 0, 0).unwrap(),
            Brussels.with_ymd_and_hms(2018, 6, 1, 12, 15, 0).unwrap(),
        ];
        Frame::new(
            index,
            vec![
                Column {
                    name: "s1".to_string(),
                    values: vec![None, Some(1.5)],
                },
                Column {
                    name: "s2".to_string(),
                    values: vec![Some(2.0), Some(3.0)],
                },
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_output_path() {
        let key = GroupKey::new(["siteA", "2020"]);
        assert_eq!(
            output_path(Some(Path::new("out")), &key, FileFormat::Csv),
            PathBuf::from("out/siteA_2020.csv")
        );
        assert_eq!(
            output_path(None, &key, FileFormat::Json),
            PathBuf::from("siteA_2020.json")
        );
    }

    #[test]
    fn test_multicolumn_csv() {
        let mut buf = Vec::new();
        write_multicolumn_csv(&frame(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "Timestamp,s1,s2");
        assert_eq!(lines[1], "2018-06-01 12:00:00+02:00,,2");
        assert_eq!(lines[2], "2018-06-01 12:15:00+02:00,1.5,3");
    }

    #[test]
    fn test_normalized_csv() {
        let mut buf = Vec::new();
        write_normalized_csv(&frame(), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "SensorId,Timestamp,Value");
        assert_eq!(lines[1], "s1,2018-06-01 12:00:00+02:00,");
        assert_eq!(lines[4], "s2,2018-06-01 12:15:00+02:00,3");
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<FileFormat>().unwrap(), FileFormat::Csv);
        assert_eq!("json".parse::<FileFormat>().unwrap(), FileFormat::Json);
        assert!("pkl".parse::<FileFormat>().is_err());
    }
}
