//! Joule Telemetry CLI
//!
//! Energy sensor sync, export and opening-hours calendar toolkit.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use joule_telemetry::{
    calendar::{Belgium, HolidayCalendar, OpeningHoursStore},
    config::Config,
    data::{trim_table, Filter, MetadataTable, Table, TrimBounds},
    export::{export_data, ExportOptions, FileFormat, SensorTokens},
    ledger::ExportLog,
    telemetry::{format_timestamp, FluksoSession, Layout, Resolution},
    VERSION,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "joule")]
#[command(version = VERSION)]
#[command(about = "Energy sensor sync, export and opening-hours toolkit", long_about = None)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sync sensor groups and write one file per group
    Export {
        /// CSV with SensorId and Token columns
        #[arg(long)]
        sensors: PathBuf,

        /// Column to group sensors by (repeatable)
        #[arg(long = "group-by")]
        group_by: Vec<String>,

        /// Start of the range (YYYY-MM-DD, local midnight, or RFC 3339)
        #[arg(long)]
        start: Option<String>,

        /// End of the range (YYYY-MM-DD, local midnight, or RFC 3339)
        #[arg(long)]
        end: Option<String>,

        /// Resampling resolution (raw, 15min, h, d, ...)
        #[arg(long, default_value = "raw")]
        resolution: Resolution,

        /// Output layout (multicolumn or normalized)
        #[arg(long, default_value = "multicolumn")]
        layout: Layout,

        /// File format (csv or json)
        #[arg(long, default_value = "csv")]
        format: FileFormat,

        /// Output directory
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Export cumulative counter values instead of deltas
        #[arg(long)]
        no_diff: bool,

        /// Time zone of exported timestamps
        #[arg(long)]
        timezone: Option<Tz>,
    },

    /// Print metadata rows matching column=value constraints
    Meta {
        /// Metadata CSV (defaults to the configured path)
        #[arg(long)]
        metadata: Option<PathBuf>,

        /// Constraint `column=value` (repeatable)
        #[arg(long = "where")]
        constraints: Vec<String>,
    },

    /// Blank out values outside a percentile range in a multicolumn CSV
    Trim {
        #[arg(long, short)]
        input: PathBuf,

        /// Output CSV (stdout if omitted)
        #[arg(long, short)]
        output: Option<PathBuf>,

        #[arg(long, default_value = "0.05")]
        lower: f64,

        #[arg(long, default_value = "0.95")]
        upper: f64,

        /// Column holding the timestamps
        #[arg(long, default_value = "Timestamp")]
        index_column: String,
    },

    /// Print the opening-hours mask of a location
    OpeningHours {
        location: String,

        /// First day (YYYY-MM-DD)
        #[arg(long)]
        start: NaiveDate,

        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: NaiveDate,

        /// Spacing of the generated timestamps
        #[arg(long, default_value = "15min")]
        freq: Resolution,

        /// Directory with <location>.yml files
        #[arg(long)]
        dir: Option<PathBuf>,
    },

    /// List public holidays
    Holidays {
        #[arg(long)]
        year: i32,

        /// Last year, inclusive
        #[arg(long)]
        to_year: Option<i32>,
    },

    /// Show cumulative export statistics
    Status,

    /// Show configuration
    Config {
        /// Write the active configuration to the config file
        #[arg(long)]
        init: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading config: {e:#}");
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Export {
            sensors,
            group_by,
            start,
            end,
            resolution,
            layout,
            format,
            output,
            no_diff,
            timezone,
        } => {
            let tz = match timezone {
                Some(tz) => Ok(tz),
                None => config.tz().context("invalid configured timezone"),
            };
            tz.and_then(|tz| {
                let options = ExportOptions {
                    grouper: group_by,
                    start: start.as_deref().map(|s| parse_instant(s, tz)).transpose()?,
                    end: end.as_deref().map(|s| parse_instant(s, tz)).transpose()?,
                    resolution,
                    timezone: tz,
                    diff: !no_diff,
                    layout,
                    format,
                    output_dir: output.or_else(|| Some(config.export_path.clone())),
                };
                cmd_export(&config, &sensors, &options)
            })
        }
        Commands::Meta {
            metadata,
            constraints,
        } => cmd_meta(metadata.unwrap_or_else(|| config.metadata_path.clone()), &constraints),
        Commands::Trim {
            input,
            output,
            lower,
            upper,
            index_column,
        } => cmd_trim(&input, output, lower, upper, &index_column),
        Commands::OpeningHours {
            location,
            start,
            end,
            freq,
            dir,
        } => cmd_opening_hours(
            dir.unwrap_or_else(|| config.opening_hours_dir.clone()),
            &location,
            start,
            end,
            freq,
        ),
        Commands::Holidays { year, to_year } => cmd_holidays(year, to_year.unwrap_or(year)),
        Commands::Status => cmd_status(&config),
        Commands::Config { init } => cmd_config(&config, cli.config.as_deref(), init),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    Ok(config)
}

/// `YYYY-MM-DD` is local midnight in `tz`; anything else must be RFC 3339.
fn parse_instant(s: &str, tz: Tz) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0).context("invalid midnight")?;
        let local = tz
            .from_local_datetime(&midnight)
            .earliest()
            .with_context(|| format!("{s} has no midnight in {tz}"))?;
        return Ok(local.with_timezone(&Utc));
    }
    let instant = DateTime::parse_from_rfc3339(s)
        .with_context(|| format!("invalid date '{s}' (YYYY-MM-DD or RFC 3339)"))?;
    Ok(instant.with_timezone(&Utc))
}

fn cmd_export(config: &Config, sensors_path: &Path, options: &ExportOptions) -> Result<()> {
    let sensors = SensorTokens::from_path(sensors_path)
        .with_context(|| format!("loading sensors from {}", sensors_path.display()))?;
    if sensors.is_empty() {
        println!("No sensors in {}", sensors_path.display());
        return Ok(());
    }

    let mut ledger = ExportLog::open(config.ledger_path()).unwrap_or_else(|e| {
        tracing::warn!("Could not load previous export ledger, starting afresh: {e}");
        ExportLog::new()
    });
    let telemetry = config.telemetry.clone();
    let (start, end) = (options.start, options.end);

    println!("Joule Telemetry v{VERSION}");
    println!(
        "Exporting {} sensor(s) from {}",
        sensors.len(),
        telemetry.base_url
    );

    let summary = export_data(
        &sensors,
        options,
        |_key| {
            FluksoSession::new(telemetry.clone())
                .map(|s| s.sync_from(start.unwrap_or_default()).sync_until(end))
        },
        |position, total, report| {
            println!(
                "[{position}/{total}] {}: {} sensor(s), {} row(s)",
                report.group, report.sensors, report.rows
            );
            println!("Wrote {}", report.path.display());
            ledger.record_group(report);
            if let Err(e) = ledger.save() {
                tracing::warn!("Could not save export ledger: {e}");
            }
        },
    )?;

    println!();
    println!(
        "Exported {} group(s), {} sensor(s), {} row(s)",
        summary.files_written(),
        summary.sensors(),
        summary.rows()
    );
    Ok(())
}

fn cmd_meta(path: PathBuf, constraints: &[String]) -> Result<()> {
    let metadata = MetadataTable::from_path(&path)
        .with_context(|| format!("loading metadata from {}", path.display()))?;
    let filter = Filter::from_pairs(constraints)?;
    let selected = metadata.filter(&filter)?;

    let stdout = std::io::stdout();
    selected.table().write_csv(stdout.lock())?;
    Ok(())
}

fn cmd_trim(
    input: &Path,
    output: Option<PathBuf>,
    lower: f64,
    upper: f64,
    index_column: &str,
) -> Result<()> {
    let bounds = TrimBounds::new(lower, upper)?;
    let table = Table::from_path(input)
        .with_context(|| format!("loading {}", input.display()))?;
    let trimmed = trim_table(&table, index_column, bounds)?;

    match output {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("creating {}", path.display()))?;
            trimmed.write_csv(std::io::BufWriter::new(file))?;
            println!("Wrote {}", path.display());
        }
        None => trimmed.write_csv(std::io::stdout().lock())?,
    }
    Ok(())
}

fn cmd_opening_hours(
    dir: PathBuf,
    location: &str,
    start: NaiveDate,
    end: NaiveDate,
    freq: Resolution,
) -> Result<()> {
    let Some(step) = freq.step() else {
        bail!("--freq must be a fixed interval such as 15min or h");
    };
    if end < start {
        bail!("--end {end} is before --start {start}");
    }

    let index = regular_index(start, end, step)?;
    let store = OpeningHoursStore::new(dir);
    let mask = store.opening_hours(location, &index)?;

    let mut out = csv::Writer::from_writer(std::io::stdout().lock());
    out.write_record(["Timestamp", "Open"])?;
    for (ts, open) in mask.iter() {
        out.write_record([ts.format(TIMESTAMP_FORMAT_NAIVE).to_string(), open.to_string()])?;
    }
    out.flush()?;
    tracing::info!(
        location,
        timestamps = mask.len(),
        open = mask.open_count(),
        "opening hours computed"
    );
    Ok(())
}

/// Wall-clock format of naive timestamps: the export format without the offset.
const TIMESTAMP_FORMAT_NAIVE: &str = "%Y-%m-%d %H:%M:%S";

/// Timestamps every `step` from `start` midnight up to the end of `end`.
fn regular_index(
    start: NaiveDate,
    end: NaiveDate,
    step: chrono::Duration,
) -> Result<Vec<NaiveDateTime>> {
    let first = start.and_hms_opt(0, 0, 0).context("invalid start")?;
    let stop = end
        .succ_opt()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .context("invalid end")?;

    let mut index = Vec::new();
    let mut ts = first;
    while ts < stop {
        index.push(ts);
        ts += step;
    }
    Ok(index)
}

fn cmd_holidays(first: i32, last: i32) -> Result<()> {
    if last < first {
        bail!("--to-year {last} is before --year {first}");
    }
    let calendar = Belgium;
    for year in first..=last {
        for holiday in calendar.holidays(year) {
            println!("{}  {}", holiday.date, holiday.name);
        }
    }
    Ok(())
}

fn cmd_status(config: &Config) -> Result<()> {
    println!("Joule Telemetry Status");
    println!("======================");
    println!();

    println!("Configuration:");
    println!("  Telemetry service: {}", config.telemetry.base_url);
    println!("  Metadata: {}", config.metadata_path.display());
    println!("  Opening hours: {}", config.opening_hours_dir.display());
    println!("  Export directory: {}", config.export_path.display());
    println!("  Time zone: {}", config.timezone);
    println!();

    let ledger_path = config.ledger_path();
    if ledger_path.exists() {
        let ledger = ExportLog::open(&ledger_path)
            .with_context(|| format!("loading ledger {}", ledger_path.display()))?;
        println!("{}", ledger.summary());
    } else {
        println!("No previous export data found.");
    }

    let now = Utc::now().with_timezone(&config.tz()?);
    println!();
    println!("Local time: {}", format_timestamp(&now));
    Ok(())
}

fn cmd_config(config: &Config, path: Option<&Path>, init: bool) -> Result<()> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(Config::config_path);
    if init {
        config
            .save_to(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
        return Ok(());
    }

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {path:?}");
    println!();
    println!("{}", serde_json::to_string_pretty(config)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_instant_date_is_local_midnight() {
        let tz: Tz = "Europe/Brussels".parse().unwrap();
        let instant = parse_instant("2018-06-01", tz).unwrap();
        assert_eq!(instant.to_rfc3339(), "2018-05-31T22:00:00+00:00");

        let instant = parse_instant("2018-06-01T12:00:00Z", tz).unwrap();
        assert_eq!(instant.to_rfc3339(), "2018-06-01T12:00:00+00:00");

        assert!(parse_instant("June 1st", tz).is_err());
    }

    #[test]
    fn test_regular_index_covers_end_day() {
        let day = NaiveDate::from_ymd_opt(2018, 6, 1).unwrap();
        let index = regular_index(day, day, chrono::Duration::minutes(15)).unwrap();
        assert_eq!(index.len(), 96);
        assert_eq!(index[95].format(TIMESTAMP_FORMAT_NAIVE).to_string(), "2018-06-01 23:45:00");
    }

    #[test]
    fn test_config_init_writes_loadable_file() {
        let cli = Cli::try_parse_from(["joule", "config", "--init"]).unwrap();
        assert!(matches!(cli.command, Commands::Config { init: true }));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("joule").join("config.json");
        let config = Config {
            timezone: "UTC".to_string(),
            ..Config::default()
        };
        cmd_config(&config, Some(path.as_path()), true).unwrap();
        assert_eq!(Config::load_from(&path).unwrap().timezone, "UTC");
    }

    #[test]
    fn test_naive_format_matches_offset_format() {
        assert!(joule_telemetry::telemetry::TIMESTAMP_FORMAT.starts_with(TIMESTAMP_FORMAT_NAIVE));
    }
}
