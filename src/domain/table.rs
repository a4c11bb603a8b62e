// ============================================================
// Layer 3 — In-memory Data Table
// ============================================================
// A column-oriented table: an ordered list of named columns,
// each either numeric (f64) or categorical (String).
//
// Column order is significant: it is the CSV header order,
// and the preprocessing layer relies on it to produce a
// stable feature layout.
//
// Invariants (checked on every mutation):
//   - all columns have the same number of rows
//   - column names are unique

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

/// The values of one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(v)     => v.len(),
            ColumnData::Categorical(v) => v.len(),
        }
    }

    /// True for `Numeric`.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    /// Gather the given rows (in the given order, repeats allowed).
    pub fn take(&self, rows: &[usize]) -> ColumnData {
        match self {
            ColumnData::Numeric(v) => {
                ColumnData::Numeric(rows.iter().map(|&r| v[r]).collect())
            }
            ColumnData::Categorical(v) => {
                ColumnData::Categorical(rows.iter().map(|&r| v[r].clone()).collect())
            }
        }
    }

    /// Re-type a column as categorical.
    ///
    /// Whole numbers print without a trailing `.0` so that a
    /// numeric code column (`1`, `2`, ...) keeps its natural labels.
    pub fn into_categorical(self) -> ColumnData {
        match self {
            ColumnData::Categorical(v) => ColumnData::Categorical(v),
            ColumnData::Numeric(v) => ColumnData::Categorical(
                v.into_iter().map(format_level).collect(),
            ),
        }
    }
}

fn format_level(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        v.to_string()
    }
}

/// A named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self { name: name.into(), data: ColumnData::Numeric(values) }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<String>) -> Self {
        Self { name: name.into(), data: ColumnData::Categorical(values) }
    }
}

/// Ordered, named, equal-length columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTable {
    columns: Vec<Column>,
    n_rows:  usize,
}

impl DataTable {
    /// Build a table, validating lengths and name uniqueness.
    pub fn from_columns(columns: Vec<Column>) -> Result<Self, PipelineError> {
        let mut table = DataTable::default();
        for column in columns {
            table.push_column(column)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Names in column order.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Look a column up by exact name.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Append a column at the end of the table.
    pub fn push_column(&mut self, column: Column) -> Result<(), PipelineError> {
        if self.contains(&column.name) {
            return Err(PipelineError::Schema(format!(
                "duplicate column name '{}'",
                column.name
            )));
        }
        if !self.columns.is_empty() && column.data.len() != self.n_rows {
            return Err(PipelineError::Schema(format!(
                "column '{}' has {} rows but the table has {}",
                column.name,
                column.data.len(),
                self.n_rows
            )));
        }
        self.n_rows = column.data.len();
        self.columns.push(column);
        Ok(())
    }

    /// Rename `from` to `to` in place. Returns false if `from` is absent.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<bool, PipelineError> {
        let Some(idx) = self.position(from) else {
            return Ok(false);
        };
        if from != to && self.contains(to) {
            return Err(PipelineError::Schema(format!(
                "cannot rename '{from}' to '{to}': '{to}' already exists"
            )));
        }
        self.columns[idx].name = to.to_string();
        Ok(true)
    }

    /// Remove and return a column, keeping the order of the rest.
    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let idx = self.position(name)?;
        let column = self.columns.remove(idx);
        if self.columns.is_empty() {
            self.n_rows = 0;
        }
        Some(column)
    }

    /// Swap the data of an existing column (row count must not change).
    pub fn replace_data(&mut self, name: &str, data: ColumnData) -> Result<(), PipelineError> {
        let idx = self
            .position(name)
            .ok_or_else(|| PipelineError::missing(name, "cannot replace an absent column"))?;
        if data.len() != self.n_rows {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} rows", self.n_rows),
                actual:   format!("{} rows", data.len()),
            });
        }
        self.columns[idx].data = data;
        Ok(())
    }

    /// Borrow a numeric column.
    ///
    /// Errors with `MissingColumn` if it is absent and `Schema` if
    /// it holds strings.
    pub fn numeric(&self, name: &str) -> Result<&[f64], PipelineError> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Numeric(v)) => Ok(v),
            Some(ColumnData::Categorical(_)) => Err(PipelineError::Schema(format!(
                "column '{name}' is not numeric"
            ))),
            None => Err(PipelineError::missing(name, "expected a numeric column")),
        }
    }

    /// Borrow a categorical column; the string counterpart of `numeric`.
    pub fn categorical(&self, name: &str) -> Result<&[String], PipelineError> {
        match self.column(name).map(|c| &c.data) {
            Some(ColumnData::Categorical(v)) => Ok(v),
            Some(ColumnData::Numeric(_)) => Err(PipelineError::Schema(format!(
                "column '{name}' is not categorical"
            ))),
            None => Err(PipelineError::missing(name, "expected a categorical column")),
        }
    }

    /// New table containing only `rows`, in that order.
    pub fn take_rows(&self, rows: &[usize]) -> DataTable {
        let columns = self
            .columns
            .iter()
            .map(|c| Column { name: c.name.clone(), data: c.data.take(rows) })
            .collect::<Vec<_>>();
        let n_rows = if columns.is_empty() { 0 } else { rows.len() };
        DataTable { columns, n_rows }
    }
}
