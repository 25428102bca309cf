//! Nullable numeric series and outlier trimming.

use crate::data::table::{Table, TableError};
use serde::{Deserialize, Serialize};

/// Default lower percentile for [`Series::trim_outliers`].
pub const DEFAULT_LOWER_PERCENTILE: f64 = 0.05;

/// Default upper percentile for [`Series::trim_outliers`].
pub const DEFAULT_UPPER_PERCENTILE: f64 = 0.95;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OutlierError {
    #[error("Invalid percentile bounds [{lower}, {upper}]: need 0 <= lower <= upper <= 1")]
    InvalidBounds { lower: f64, upper: f64 },
}

/// Percentile bounds used to trim a series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrimBounds {
    pub lower: f64,
    pub upper: f64,
}

impl Default for TrimBounds {
    fn default() -> Self {
        Self {
            lower: DEFAULT_LOWER_PERCENTILE,
            upper: DEFAULT_UPPER_PERCENTILE,
        }
    }
}

impl TrimBounds {
    pub fn new(lower: f64, upper: f64) -> Result<Self, OutlierError> {
        let valid = (0.0..=1.0).contains(&lower) && (0.0..=1.0).contains(&upper) && lower <= upper;
        if valid {
            Ok(Self { lower, upper })
        } else {
            Err(OutlierError::InvalidBounds { lower, upper })
        }
    }
}

/// An ordered sequence of (index, nullable value) pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series<I> {
    pub name: String,
    index: Vec<I>,
    values: Vec<Option<f64>>,
}

impl<I: Clone> Series<I> {
    /// Build a series; `index` and `values` must have the same length.
    pub fn new(name: impl Into<String>, index: Vec<I>, values: Vec<Option<f64>>) -> Option<Self> {
        (index.len() == values.len()).then(|| Self {
            name: name.into(),
            index,
            values,
        })
    }

    pub fn index(&self) -> &[I] {
        &self.index
    }

    pub fn values(&self) -> &[Option<f64>] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of missing values.
    pub fn missing_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_none()).count()
    }

    /// Percentile thresholds `(low, high)` of the non-missing values.
    pub fn thresholds(&self, bounds: TrimBounds) -> Option<(f64, f64)> {
        let mut sorted: Vec<f64> = self
            .values
            .iter()
            .flatten()
            .copied()
            .filter(|v| !v.is_nan())
            .collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(f64::total_cmp);
        Some((
            percentile_sorted(&sorted, bounds.lower),
            percentile_sorted(&sorted, bounds.upper),
        ))
    }

    /// Copy of the series with values outside the percentile range
    /// replaced by missing values.
    pub fn trim_outliers(&self, bounds: TrimBounds) -> Series<I> {
        let mut trimmed = self.clone();
        // NaN never falls inside the thresholds
        for value in trimmed.values.iter_mut() {
            if matches!(*value, Some(v) if v.is_nan()) {
                *value = None;
            }
        }
        let Some((low, high)) = self.thresholds(bounds) else {
            return trimmed;
        };

        for value in trimmed.values.iter_mut() {
            if matches!(*value, Some(v) if v < low || v > high) {
                *value = None;
            }
        }

        tracing::debug!(
            series = %self.name,
            low,
            high,
            removed = trimmed.missing_count() - self.missing_count(),
            "trimmed outliers"
        );
        trimmed
    }
}

/// Linear interpolation between closest ranks of an ascending slice.
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

/// Trim every value column of a multicolumn table.
///
/// `index_column` is kept as is; every other column is parsed as numbers
/// (empty cells are missing) and trimmed independently.
pub fn trim_table(
    table: &Table,
    index_column: &str,
    bounds: TrimBounds,
) -> Result<Table, TableError> {
    let index: Vec<String> = table
        .column(index_column)?
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut columns = Vec::new();
    for name in table.headers().iter().filter(|h| h.as_str() != index_column) {
        let values = table
            .column(name)?
            .into_iter()
            .map(|cell| parse_cell(name, cell))
            .collect::<Result<Vec<_>, _>>()?;
        let series = Series::new(name.clone(), index.clone(), values)
            .ok_or_else(|| TableError::Parse(format!("column '{name}' length mismatch")))?;
        columns.push(series.trim_outliers(bounds));
    }

    let mut headers = vec![index_column.to_string()];
    headers.extend(columns.iter().map(|s| s.name.clone()));
    let rows = index
        .iter()
        .enumerate()
        .map(|(row, ts)| {
            let mut cells = vec![ts.clone()];
            cells.extend(
                columns
                    .iter()
                    .map(|s| s.values()[row].map(|v| v.to_string()).unwrap_or_default()),
            );
            cells
        })
        .collect();
    Table::new(headers, rows)
}

fn parse_cell(column: &str, cell: &str) -> Result<Option<f64>, TableError> {
    if cell.is_empty() {
        return Ok(None);
    }
    cell.parse::<f64>()
        .map(Some)
        .map_err(|e| TableError::Parse(format!("column '{column}': '{cell}': {e}")))
}
