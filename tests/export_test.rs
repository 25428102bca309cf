//! Integration tests for the grouped export pipeline

use joule_telemetry::export::{
    export_data, ExportOptions, FileFormat, GroupKey, SensorTokens,
};
use joule_telemetry::telemetry::{
    Layout, MemorySession, Reading, ReadingCache, Resolution, TelemetryError,
};

const SENSORS: &str = "SensorId,Token,Site,Year\n\
                       s1,t1,siteA,2020\n\
                       s2,t2,siteA,2020\n\
                       s3,t3,siteB,2020\n";

fn cache() -> ReadingCache {
    // 2020-01-06T00:00:00Z, 8 readings 15 minutes apart
    let start = 1578268800;
    let mut cache = ReadingCache::new();
    for (sid, step) in [("s1", 1.0), ("s2", 2.0), ("s3", 5.0)] {
        cache.merge(
            sid,
            (0..8).map(|i| Reading::new(start + i * 900, step * i as f64)),
        );
    }
    cache
}

fn sensors() -> SensorTokens {
    SensorTokens::from_reader(SENSORS.as_bytes()).unwrap()
}

#[test]
fn test_export_one_file_per_group() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out");
    let options = ExportOptions {
        grouper: vec!["Site".to_string(), "Year".to_string()],
        resolution: Resolution::Hours(1),
        output_dir: Some(output.clone()),
        ..ExportOptions::default()
    };

    let mut progress = Vec::new();
    let summary = export_data(
        &sensors(),
        &options,
        |_key: &GroupKey| Ok::<_, TelemetryError>(MemorySession::new(cache())),
        |i, n, report| progress.push((i, n, report.group.clone())),
    )
    .unwrap();

    assert_eq!(summary.files_written(), 2);
    assert_eq!(summary.sensors(), 3);
    assert_eq!(
        progress,
        vec![
            (1, 2, "(siteA, 2020)".to_string()),
            (2, 2, "(siteB, 2020)".to_string())
        ]
    );

    let text = std::fs::read_to_string(output.join("siteA_2020.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Timestamp,s1,s2");
    // Hourly bins keep the last reading: 3, 7 for s1; first bin has no delta
    assert_eq!(lines[1], "2020-01-06 01:00:00+01:00,,");
    assert_eq!(lines[2], "2020-01-06 02:00:00+01:00,4,8");
    assert_eq!(lines.len(), 3);

    assert!(output.join("siteB_2020.csv").exists());
}

#[test]
fn test_export_normalized_single_group() {
    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        layout: Layout::Normalized,
        diff: false,
        output_dir: Some(dir.path().to_path_buf()),
        ..ExportOptions::default()
    };

    let summary = export_data(
        &sensors(),
        &options,
        |_key: &GroupKey| Ok::<_, TelemetryError>(MemorySession::new(cache())),
        |_, _, _| {},
    )
    .unwrap();

    assert_eq!(summary.files_written(), 1);
    assert_eq!(summary.rows(), 24);

    let text = std::fs::read_to_string(dir.path().join("data.csv")).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "SensorId,Timestamp,Value");
    assert_eq!(lines[1], "s1,2020-01-06 01:00:00+01:00,0");
    assert!(lines[9].starts_with("s2,"));
    assert_eq!(lines.len(), 25);
}

#[test]
fn test_export_json() {
    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        format: FileFormat::Json,
        output_dir: Some(dir.path().to_path_buf()),
        ..ExportOptions::default()
    };

    export_data(
        &sensors(),
        &options,
        |_key: &GroupKey| Ok::<_, TelemetryError>(MemorySession::new(cache())),
        |_, _, _| {},
    )
    .unwrap();

    let text = std::fs::read_to_string(dir.path().join("data.json")).unwrap();
    let json: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert!(json["index"].is_array());
    assert_eq!(json["columns"][0]["name"], "s1");
    assert!(json["columns"][0]["values"][0].is_null());
}

#[test]
fn test_session_failure_stops_export() {
    let dir = tempfile::tempdir().unwrap();
    let options = ExportOptions {
        grouper: vec!["Site".to_string()],
        output_dir: Some(dir.path().to_path_buf()),
        ..ExportOptions::default()
    };

    let mut opened = 0;
    let result = export_data(
        &sensors(),
        &options,
        |_key: &GroupKey| {
            opened += 1;
            if opened > 1 {
                Err(TelemetryError::Network("connection refused".to_string()))
            } else {
                Ok(MemorySession::new(cache()))
            }
        },
        |_, _, _| {},
    );

    assert!(result.is_err());
    assert!(dir.path().join("siteA.csv").exists());
    assert!(!dir.path().join("siteB.csv").exists());
}
