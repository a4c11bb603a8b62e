// ============================================================
// Layer 5 — Regression Metrics
// ============================================================

use serde::Serialize;
use std::fmt;

use crate::domain::error::PipelineError;

fn check_lengths(y_true: &[f64], y_pred: &[f64]) -> Result<(), PipelineError> {
    if y_true.len() != y_pred.len() {
        return Err(PipelineError::DimensionMismatch {
            expected: format!("{} predictions", y_true.len()),
            actual:   format!("{} predictions", y_pred.len()),
        });
    }
    if y_true.is_empty() {
        return Err(PipelineError::Schema("cannot score an empty evaluation set".into()));
    }
    Ok(())
}

/// Mean of squared residuals.
pub fn mean_squared_error(y_true: &[f64], y_pred: &[f64]) -> Result<f64, PipelineError> {
    check_lengths(y_true, y_pred)?;
    let sse: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();
    Ok(sse / y_true.len() as f64)
}

/// Coefficient of determination, 1 - SS_res / SS_tot.
///
/// A constant `y_true` has SS_tot = 0: the score is 1.0 for a
/// perfect prediction and 0.0 otherwise.
pub fn r2_score(y_true: &[f64], y_pred: &[f64]) -> Result<f64, PipelineError> {
    check_lengths(y_true, y_pred)?;
    let mean = y_true.iter().sum::<f64>() / y_true.len() as f64;
    let ss_tot: f64 = y_true.iter().map(|t| (t - mean).powi(2)).sum();
    let ss_res: f64 = y_true.iter().zip(y_pred).map(|(t, p)| (t - p).powi(2)).sum();

    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Held-out scores printed after each fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub mse: f64,
    pub r2:  f64,
}

impl EvaluationReport {
    pub fn compute(y_true: &[f64], y_pred: &[f64]) -> Result<Self, PipelineError> {
        Ok(Self {
            mse: mean_squared_error(y_true, y_pred)?,
            r2:  r2_score(y_true, y_pred)?,
        })
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{'Mean Squared Error': {}, 'R-squared': {}}}", self.mse, self.r2)
    }
}
