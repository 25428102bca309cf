//! Sensor/token tables and their grouping.

use crate::data::metadata::SENSOR_ID_COLUMN;
use crate::data::table::{Table, TableError};
use std::fmt;
use std::path::Path;

/// Column holding the access token of each sensor.
pub const TOKEN_COLUMN: &str = "Token";

/// Name of the single group produced when no grouping key is given.
pub const DEFAULT_GROUP_NAME: &str = "data";

/// The values of the grouping columns shared by a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey(Vec<String>);

impl GroupKey {
    pub fn new<S: Into<String>>(parts: impl IntoIterator<Item = S>) -> Self {
        Self(parts.into_iter().map(Into::into).collect())
    }

    pub fn parts(&self) -> &[String] {
        &self.0
    }

    /// File name stem: parts joined with underscores, e.g. `siteA_2020`.
    ///
    /// Path separators and control characters become `_`, as does a part
    /// that is empty or only dots, so the stem never leaves its directory.
    pub fn file_stem(&self) -> String {
        self.0
            .iter()
            .map(|part| sanitize_part(part))
            .collect::<Vec<_>>()
            .join("_")
    }
}

fn sanitize_part(part: &str) -> String {
    if part.chars().all(|c| c == '.') {
        return "_".repeat(part.len().max(1));
    }
    part.chars()
        .map(|c| match c {
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.as_slice() {
            [single] => write!(f, "{single}"),
            parts => write!(f, "({})", parts.join(", ")),
        }
    }
}

/// Sensors with the tokens needed to read them.
#[derive(Debug, Clone)]
pub struct SensorTokens {
    table: Table,
}

impl SensorTokens {
    /// Wrap a table, checking for the `SensorId` and `Token` columns.
    pub fn new(table: Table) -> Result<Self, TableError> {
        table.require_columns(&[SENSOR_ID_COLUMN, TOKEN_COLUMN])?;
        Ok(Self { table })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        Self::new(Table::from_path(path)?)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, TableError> {
        Self::new(Table::from_reader(reader)?)
    }

    /// Build from `(sensor_id, token)` pairs.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[(S, S)]) -> Self {
        let rows = pairs
            .iter()
            .map(|(sid, token)| vec![sid.as_ref().to_string(), token.as_ref().to_string()])
            .collect();
        Self {
            table: Table::new(
                vec![SENSOR_ID_COLUMN.to_string(), TOKEN_COLUMN.to_string()],
                rows,
            )
            .unwrap_or_default(),
        }
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn sensor_ids(&self) -> Vec<&str> {
        self.table.column(SENSOR_ID_COLUMN).unwrap_or_default()
    }

    /// `(sensor_id, token)` pairs in table order.
    pub fn pairs(&self) -> Vec<(&str, &str)> {
        let ids = self.sensor_ids();
        let tokens = self.table.column(TOKEN_COLUMN).unwrap_or_default();
        ids.into_iter().zip(tokens).collect()
    }

    /// Split into groups ordered by key.
    ///
    /// With no grouping columns the whole table is one group named
    /// [`DEFAULT_GROUP_NAME`].
    pub fn group_by(&self, columns: &[String]) -> Result<Vec<SensorGroup>, TableError> {
        if columns.is_empty() {
            return Ok(vec![SensorGroup {
                key: GroupKey::new([DEFAULT_GROUP_NAME]),
                sensors: self.clone(),
            }]);
        }

        Ok(self
            .table
            .group_by(columns)?
            .into_iter()
            .map(|(key, table)| SensorGroup {
                key: GroupKey(key),
                sensors: SensorTokens { table },
            })
            .collect())
    }
}

/// One group of sensors exported to a single file.
#[derive(Debug, Clone)]
pub struct SensorGroup {
    pub key: GroupKey,
    pub sensors: SensorTokens,
}
