//! String tables loaded from CSV.
//!
//! Both the sensor metadata and the sensor/token list are plain CSV files
//! whose columns are only partly known in advance, so rows are kept as
//! strings and looked up by header name.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

/// Errors raised while loading or querying tables.
#[derive(Debug, thiserror::Error)]
pub enum TableError {
    #[error("IO error: {0}")]
    Io(String),
    #[error("CSV error: {0}")]
    Csv(String),
    #[error("Missing required column '{0}'")]
    MissingColumn(String),
    #[error("Unknown column '{0}'")]
    UnknownColumn(String),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<csv::Error> for TableError {
    fn from(e: csv::Error) -> Self {
        TableError::Csv(e.to_string())
    }
}

/// An immutable table of string cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table from headers and rows.
    ///
    /// Every row must have exactly one cell per header.
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        if let Some(bad) = rows.iter().position(|r| r.len() != headers.len()) {
            return Err(TableError::Parse(format!(
                "row {} has {} cells, expected {}",
                bad,
                rows[bad].len(),
                headers.len()
            )));
        }
        Ok(Self { headers, rows })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)
            .map_err(|e| TableError::Io(format!("{}: {e}", path.display())))?;
        Self::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TableError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            rows.push(record.iter().map(String::from).collect());
        }

        Self::new(headers, rows)
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of `name` among the headers.
    pub fn column_index(&self, name: &str) -> Result<usize, TableError> {
        self.headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| TableError::UnknownColumn(name.to_string()))
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.headers.iter().any(|h| h == name)
    }

    /// Fail with `MissingColumn` unless every name is a header.
    pub fn require_columns(&self, names: &[&str]) -> Result<(), TableError> {
        match names.iter().find(|n| !self.has_column(n)) {
            Some(missing) => Err(TableError::MissingColumn(missing.to_string())),
            None => Ok(()),
        }
    }

    /// All cells of one column.
    pub fn column(&self, name: &str) -> Result<Vec<&str>, TableError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Cell of `row` in column `name`.
    pub fn cell(&self, row: usize, name: &str) -> Option<&str> {
        let idx = self.headers.iter().position(|h| h == name)?;
        self.rows.get(row).map(|r| r[idx].as_str())
    }

    /// Rows matching every `column == value` constraint.
    pub fn filter_eq(&self, constraints: &BTreeMap<String, String>) -> Result<Table, TableError> {
        let resolved = constraints
            .iter()
            .map(|(col, value)| Ok((self.column_index(col)?, value.as_str())))
            .collect::<Result<Vec<_>, TableError>>()?;

        let rows = self
            .rows
            .iter()
            .filter(|row| resolved.iter().all(|(idx, value)| row[*idx] == *value))
            .cloned()
            .collect();

        Ok(Table {
            headers: self.headers.clone(),
            rows,
        })
    }

    /// Split rows by the values of `keys`, ordered by key.
    pub fn group_by(&self, keys: &[String]) -> Result<BTreeMap<Vec<String>, Table>, TableError> {
        let indices = keys
            .iter()
            .map(|k| self.column_index(k))
            .collect::<Result<Vec<_>, _>>()?;

        let mut groups: BTreeMap<Vec<String>, Table> = BTreeMap::new();
        for row in &self.rows {
            let key: Vec<String> = indices.iter().map(|&i| row[i].clone()).collect();
            groups
                .entry(key)
                .or_insert_with(|| Table {
                    headers: self.headers.clone(),
                    rows: Vec::new(),
                })
                .rows
                .push(row.clone());
        }
        Ok(groups)
    }

    /// Write the table as CSV.
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<(), TableError> {
        let mut writer = csv::Writer::from_writer(writer);
        writer.write_record(&self.headers)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .map_err(|e| TableError::Io(e.to_string()))?;
        Ok(())
    }
}
