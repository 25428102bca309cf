//! Sensor metadata repository.
//!
//! The metadata CSV is loaded once and handed to consumers explicitly.
//! Filtering is an equality projection over columns that exist in the
//! loaded file.

use crate::data::table::{Table, TableError};
use std::collections::BTreeMap;
use std::path::Path;

/// Column holding the unique sensor identifier.
pub const SENSOR_ID_COLUMN: &str = "SensorId";

/// Equality constraints, column name to expected value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    constraints: BTreeMap<String, String>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `column == value` constraint.
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.constraints.insert(column.into(), value.into());
        self
    }

    /// Parse `column=value` pairs such as CLI arguments.
    pub fn from_pairs<S: AsRef<str>>(pairs: &[S]) -> Result<Self, TableError> {
        pairs.iter().try_fold(Self::new(), |filter, pair| {
            let pair = pair.as_ref();
            match pair.split_once('=') {
                Some((col, value)) if !col.trim().is_empty() => {
                    Ok(filter.eq(col.trim(), value.trim()))
                }
                _ => Err(TableError::Parse(format!(
                    "expected column=value, got '{pair}'"
                ))),
            }
        })
    }

    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    pub fn constraints(&self) -> &BTreeMap<String, String> {
        &self.constraints
    }
}

/// Immutable sensor metadata keyed by `SensorId`.
#[derive(Debug, Clone)]
pub struct MetadataTable {
    table: Table,
}

impl MetadataTable {
    /// Wrap a table, checking for the `SensorId` column.
    pub fn new(table: Table) -> Result<Self, TableError> {
        table.require_columns(&[SENSOR_ID_COLUMN])?;
        Ok(Self { table })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let table = Table::from_path(path)?;
        Self::new(table)
    }

    pub fn from_reader<R: std::io::Read>(reader: R) -> Result<Self, TableError> {
        Self::new(Table::from_reader(reader)?)
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// Columns that can be used in a [`Filter`].
    pub fn columns(&self) -> &[String] {
        self.table.headers()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Rows satisfying every constraint of `filter`.
    ///
    /// An empty filter returns the whole table. Unknown columns are
    /// rejected rather than matching nothing.
    pub fn filter(&self, filter: &Filter) -> Result<MetadataTable, TableError> {
        let table = self.table.filter_eq(filter.constraints())?;
        tracing::debug!(
            constraints = filter.constraints().len(),
            matched = table.len(),
            "filtered metadata"
        );
        Ok(MetadataTable { table })
    }

    /// Sensor ids in table order.
    pub fn sensor_ids(&self) -> Vec<&str> {
        self.table.column(SENSOR_ID_COLUMN).unwrap_or_default()
    }

    /// Look up a single column value for a sensor.
    pub fn get(&self, sensor_id: &str, column: &str) -> Option<&str> {
        let row = self
            .sensor_ids()
            .iter()
            .position(|id| *id == sensor_id)?;
        self.table.cell(row, column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> MetadataTable {
        let csv = "SensorId,group,Unit\n1,A,kWh\n2,B,m3\n";
        MetadataTable::from_reader(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_filter_single_column() {
        let res = meta().filter(&Filter::new().eq("group", "A")).unwrap();
        assert_eq!(res.sensor_ids(), vec!["1"]);
    }

    #[test]
    fn test_empty_filter_returns_everything() {
        let res = meta().filter(&Filter::new()).unwrap();
        assert_eq!(res.len(), 2);
    }

    #[test]
    fn test_filter_does_not_touch_source() {
        let source = meta();
        let _ = source.filter(&Filter::new().eq("group", "B")).unwrap();
        assert_eq!(source.len(), 2);
    }

    #[test]
    fn test_missing_sensor_id_column() {
        let csv = "id,group\n1,A\n";
        assert!(matches!(
            MetadataTable::from_reader(csv.as_bytes()),
            Err(TableError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_filter_from_pairs() {
        let filter = Filter::from_pairs(&["group=A", " Unit = kWh "]).unwrap();
        assert_eq!(filter.constraints().get("Unit").map(String::as_str), Some("kWh"));
        assert!(Filter::from_pairs(&["broken"]).is_err());
    }

    #[test]
    fn test_get_value() {
        assert_eq!(meta().get("2", "Unit"), Some("m3"));
        assert_eq!(meta().get("9", "Unit"), None);
    }
}
