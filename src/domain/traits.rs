// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The seams between layers:
//
//   TableSource — anything that can produce a DataTable
//                 (CsvLoader today; a database reader later)
//
//   Regressor   — anything that can be fitted on a dense
//                 feature matrix and predict a real value
//                 (DecisionTreeRegressor, RandomForestRegressor)
//
// The application layer and the model pipeline program
// against these traits, not the concrete types.

use anyhow::Result;
use ndarray::{Array2, ArrayView2};

use crate::domain::error::PipelineError;
use crate::domain::table::DataTable;

// ─── TableSource ──────────────────────────────────────────────────────────────
/// Any component that can load a tabular dataset.
pub trait TableSource {
    /// Load the full table.
    fn load(&self) -> Result<DataTable>;
}

// ─── Regressor ────────────────────────────────────────────────────────────────
/// A supervised model mapping a row of features to one real value.
pub trait Regressor {
    /// Fit on `x` (n_samples × n_features) and targets `y` (n_samples).
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<(), PipelineError>;

    /// Predict one value per row of `x`.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, PipelineError>;

    /// Number of features seen during `fit`, `None` if unfitted.
    fn n_features(&self) -> Option<usize>;
}
