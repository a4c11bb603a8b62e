// ============================================================
// Layer 5 — Column Preprocessing
// ============================================================
// Two column-wise transforms composed by role:
//
//   numerical columns   → StandardScaler  (zero mean, unit variance)
//   categorical columns → OneHotEncoder   (drop first level)
//
// ColumnTransformer fits both on the TRAINING rows only and
// then applies the frozen parameters to any table, emitting
//
//   [scaled numerical, in role order] ++ [indicators, column-then-level]
//
// as one dense ndarray matrix.
//
// Standardisation uses the population standard deviation
// (divide by n). A constant column has std 0; it is centred
// but not divided, so it becomes all zeros instead of NaN.
//
// One-hot levels are the sorted distinct training values. The
// smallest level is the reference: it is dropped, so a column
// with k levels gives k-1 indicators and the reference row
// encodes as all zeros.

use ndarray::{Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

use crate::domain::error::PipelineError;
use crate::domain::schema::ColumnRoles;
use crate::domain::table::DataTable;

// ─── StandardScaler ───────────────────────────────────────────────────────────

/// Per-column centring and scaling with statistics frozen at fit time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Option<Vec<f64>>,
    std:  Option<Vec<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Learn per-column mean and population std from `x`.
    pub fn fit(&mut self, x: ArrayView2<'_, f64>) -> Result<(), PipelineError> {
        let n = x.nrows();
        if n == 0 {
            return Err(PipelineError::Schema("cannot fit a scaler on zero rows".into()));
        }

        let mut mean = Vec::with_capacity(x.ncols());
        let mut std  = Vec::with_capacity(x.ncols());
        for col in x.axis_iter(Axis(1)) {
            let m = col.sum() / n as f64;
            let var = col.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n as f64;
            mean.push(m);
            std.push(var.sqrt());
        }

        self.mean = Some(mean);
        self.std  = Some(std);
        Ok(())
    }

    /// Apply the frozen statistics. A column whose std was zero is
    /// centred but not divided.
    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, PipelineError> {
        let (mean, std) = match (&self.mean, &self.std) {
            (Some(m), Some(s)) => (m, s),
            _ => return Err(PipelineError::NotFitted("StandardScaler")),
        };
        if x.ncols() != mean.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} columns", mean.len()),
                actual:   format!("{} columns", x.ncols()),
            });
        }

        let mut out = x.to_owned();
        for (j, mut col) in out.axis_iter_mut(Axis(1)).enumerate() {
            let scale = if std[j] > 1e-12 { std[j] } else { 1.0 };
            col.mapv_inplace(|v| (v - mean[j]) / scale);
        }
        Ok(out)
    }
}

// ─── OneHotEncoder ────────────────────────────────────────────────────────────

/// What to do with a categorical value that was not seen during fit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCategory {
    /// Fail the transform with `PipelineError::UnknownCategory`.
    #[default]
    Error,
    /// Encode the value as all-zero indicators (same as the reference level).
    Ignore,
}

impl fmt::Display for UnknownCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownCategory::Error  => write!(f, "error"),
            UnknownCategory::Ignore => write!(f, "ignore"),
        }
    }
}

impl FromStr for UnknownCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error"  => Ok(UnknownCategory::Error),
            "ignore" => Ok(UnknownCategory::Ignore),
            other    => Err(format!("expected 'error' or 'ignore', got '{other}'")),
        }
    }
}

/// Drop-first one-hot encoder over a fixed list of columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    /// Sorted levels per column, reference level first.
    levels:  Option<Vec<Vec<String>>>,
    unknown: UnknownCategory,
}

impl OneHotEncoder {
    pub fn new(columns: Vec<String>, unknown: UnknownCategory) -> Self {
        Self { columns, levels: None, unknown }
    }

    /// Number of indicator columns produced (sum of k-1).
    pub fn n_outputs(&self) -> usize {
        self.levels
            .as_ref()
            .map(|ls| ls.iter().map(|l| l.len().saturating_sub(1)).sum())
            .unwrap_or(0)
    }

    /// Record the sorted distinct values of each column.
    pub fn fit(&mut self, table: &DataTable) -> Result<(), PipelineError> {
        let mut levels = Vec::with_capacity(self.columns.len());
        for name in &self.columns {
            let mut distinct: Vec<String> = table.categorical(name)?.to_vec();
            distinct.sort_unstable();
            distinct.dedup();
            tracing::debug!("One-hot '{}': {} levels, reference '{}'", name, distinct.len(),
                distinct.first().map(String::as_str).unwrap_or(""));
            levels.push(distinct);
        }
        self.levels = Some(levels);
        Ok(())
    }

    /// Indicator matrix, `n_outputs()` columns wide. Unseen values
    /// error or encode as zeros depending on the `UnknownCategory` policy.
    pub fn transform(&self, table: &DataTable) -> Result<Array2<f64>, PipelineError> {
        let levels = self.levels.as_ref().ok_or(PipelineError::NotFitted("OneHotEncoder"))?;

        let n = table.n_rows();
        let mut out = Array2::<f64>::zeros((n, self.n_outputs()));
        let mut offset = 0;

        for (name, col_levels) in self.columns.iter().zip(levels) {
            let values = table.categorical(name)?;
            for (row, value) in values.iter().enumerate() {
                match col_levels.binary_search(value) {
                    // Reference level: all zeros
                    Ok(0) => {}
                    Ok(pos) => out[[row, offset + pos - 1]] = 1.0,
                    Err(_) => match self.unknown {
                        UnknownCategory::Ignore => {}
                        UnknownCategory::Error => {
                            return Err(PipelineError::UnknownCategory {
                                column: name.clone(),
                                value:  value.clone(),
                            })
                        }
                    },
                }
            }
            offset += col_levels.len().saturating_sub(1);
        }
        Ok(out)
    }

    /// `"{column}_{level}"` for every non-reference level.
    pub fn feature_names(&self) -> Vec<String> {
        let Some(levels) = &self.levels else {
            return Vec::new();
        };
        self.columns
            .iter()
            .zip(levels)
            .flat_map(|(name, ls)| ls.iter().skip(1).map(move |l| format!("{name}_{l}")))
            .collect()
    }
}

// ─── ColumnTransformer ────────────────────────────────────────────────────────

/// Routes each role to its transform and concatenates the results.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnTransformer {
    roles:   ColumnRoles,
    scaler:  StandardScaler,
    encoder: OneHotEncoder,
}

impl ColumnTransformer {
    pub fn new(roles: ColumnRoles, unknown: UnknownCategory) -> Self {
        let encoder = OneHotEncoder::new(roles.categorical.clone(), unknown);
        Self { roles, scaler: StandardScaler::new(), encoder }
    }

    pub fn fit(&mut self, table: &DataTable) -> Result<(), PipelineError> {
        let numeric = self.numeric_block(table)?;
        self.scaler.fit(numeric.view())?;
        self.encoder.fit(table)
    }

    /// Scaled numerical block followed by the one-hot block.
    pub fn transform(&self, table: &DataTable) -> Result<Array2<f64>, PipelineError> {
        let scaled  = self.scaler.transform(self.numeric_block(table)?.view())?;
        let encoded = self.encoder.transform(table)?;
        ndarray::concatenate(Axis(1), &[scaled.view(), encoded.view()]).map_err(|e| {
            PipelineError::DimensionMismatch {
                expected: "equal row counts in both branches".into(),
                actual:   e.to_string(),
            }
        })
    }

    pub fn fit_transform(&mut self, table: &DataTable) -> Result<Array2<f64>, PipelineError> {
        self.fit(table)?;
        self.transform(table)
    }

    /// Output column names, aligned with `transform`'s columns.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names = self.roles.numerical.clone();
        names.extend(self.encoder.feature_names());
        names
    }

    /// Gather the numerical role columns into a rows × cols matrix.
    fn numeric_block(&self, table: &DataTable) -> Result<Array2<f64>, PipelineError> {
        let n = table.n_rows();
        let mut block = Array2::<f64>::zeros((n, self.roles.numerical.len()));
        for (j, name) in self.roles.numerical.iter().enumerate() {
            let values = table.numeric(name)?;
            for (i, v) in values.iter().enumerate() {
                block[[i, j]] = *v;
            }
        }
        Ok(block)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Column;
    use ndarray::array;

    fn table() -> DataTable {
        DataTable::from_columns(vec![
            Column::numeric("hours", vec![100.0, 200.0, 300.0, 400.0]),
            Column::numeric("flag",  vec![1.0, 1.0, 1.0, 1.0]),
            Column::categorical(
                "department",
                vec!["sales".into(), "IT".into(), "hr".into(), "IT".into()],
            ),
            Column::categorical(
                "salary",
                vec!["low".into(), "high".into(), "low".into(), "medium".into()],
            ),
        ])
        .unwrap()
    }

    fn roles() -> ColumnRoles {
        ColumnRoles::new(
            vec!["hours".into(), "flag".into()],
            vec!["department".into(), "salary".into()],
        )
        .unwrap()
    }

    #[test]
    fn test_scaler_zero_mean_unit_variance() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let mut s = StandardScaler::new();
        s.fit(x.view()).unwrap();
        let out = s.transform(x.view()).unwrap();

        let col = out.column(0);
        assert!((col.sum()).abs() < 1e-12);
        let var = col.iter().map(|v| v * v).sum::<f64>() / 3.0;
        assert!((var - 1.0).abs() < 1e-12);

        // Constant column: centred, not divided by zero
        assert!(out.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_scaler_stats_frozen_after_fit() {
        let train = array![[0.0], [2.0]];
        let mut s = StandardScaler::new();
        s.fit(train.view()).unwrap();
        // mean 1, std 1 → 5 maps to 4 regardless of the new data
        let out = s.transform(array![[5.0]].view()).unwrap();
        assert_eq!(out[[0, 0]], 4.0);
    }

    #[test]
    fn test_scaler_unfitted_and_shape_errors() {
        let s = StandardScaler::new();
        assert!(matches!(
            s.transform(array![[1.0]].view()),
            Err(PipelineError::NotFitted(_))
        ));

        let mut s = StandardScaler::new();
        s.fit(array![[1.0, 2.0]].view()).unwrap();
        assert!(s.transform(array![[1.0]].view()).is_err());
    }

    #[test]
    fn test_one_hot_drops_reference_level() {
        let t = table();
        let mut enc = OneHotEncoder::new(vec!["department".into()], UnknownCategory::Error);
        enc.fit(&t).unwrap();

        // levels sorted: IT, hr, sales → IT is the reference
        assert_eq!(enc.feature_names(), vec!["department_hr", "department_sales"]);
        let out = enc.transform(&t).unwrap();
        assert_eq!(out.ncols(), 2);
        assert_eq!(out.row(0).to_vec(), vec![0.0, 1.0]); // sales
        assert_eq!(out.row(1).to_vec(), vec![0.0, 0.0]); // IT (reference)
        assert_eq!(out.row(2).to_vec(), vec![1.0, 0.0]); // hr
        assert_eq!(enc.feature_names(), vec!["department_hr", "department_sales"]);
    }

    #[test]
    fn test_unknown_category_policies() {
        let t = table();
        let unseen = DataTable::from_columns(vec![Column::categorical(
            "department",
            vec!["legal".into()],
        )])
        .unwrap();

        let mut strict = OneHotEncoder::new(vec!["department".into()], UnknownCategory::Error);
        strict.fit(&t).unwrap();
        assert!(matches!(
            strict.transform(&unseen),
            Err(PipelineError::UnknownCategory { .. })
        ));

        let mut lenient = OneHotEncoder::new(vec!["department".into()], UnknownCategory::Ignore);
        lenient.fit(&t).unwrap();
        let out = lenient.transform(&unseen).unwrap();
        assert!(out.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_unknown_category_parses() {
        assert_eq!("IGNORE".parse::<UnknownCategory>().unwrap(), UnknownCategory::Ignore);
        assert!("maybe".parse::<UnknownCategory>().is_err());
    }

    #[test]
    fn test_column_transformer_layout() {
        let t = table();
        let mut ct = ColumnTransformer::new(roles(), UnknownCategory::Error);
        let out = ct.fit_transform(&t).unwrap();

        // 2 numerical + (3-1) department + (3-1) salary
        assert_eq!(out.dim(), (4, 6));
        assert_eq!(
            ct.feature_names(),
            vec![
                "hours",
                "flag",
                "department_hr",
                "department_sales",
                "salary_low",
                "salary_medium",
            ]
        );
        // row 1: IT / high → both reference levels
        assert_eq!(out.row(1).slice(ndarray::s![2..]).to_vec(), vec![0.0; 4]);
    }

    #[test]
    fn test_column_transformer_ignores_extra_columns() {
        let mut t = table();
        let mut ct = ColumnTransformer::new(roles(), UnknownCategory::Error);
        ct.fit(&t).unwrap();
        t.push_column(Column::numeric("unused", vec![0.0; 4])).unwrap();
        assert_eq!(ct.transform(&t).unwrap().ncols(), 6);
    }
}
