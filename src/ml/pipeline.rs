// ============================================================
// Layer 5 — Model Pipeline
// ============================================================
// The unit that is trained, evaluated, searched over, saved
// and reloaded:
//
//   DataTable ─► ColumnTransformer ─► dense matrix ─► RandomForestRegressor ─► Vec<f64>
//
// Fitting fits the preprocessor on the given rows first, then
// the forest on the transformed matrix. Prediction reuses the
// frozen preprocessing parameters, so a reloaded pipeline
// scores new rows exactly like the one that was saved.

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;
use crate::domain::schema::ColumnRoles;
use crate::domain::table::DataTable;
use crate::domain::traits::Regressor;
use crate::ml::forest::{ForestParams, RandomForestRegressor};
use crate::ml::metrics::EvaluationReport;
use crate::ml::preprocess::{ColumnTransformer, UnknownCategory};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPipeline {
    preprocessor: ColumnTransformer,
    regressor:    RandomForestRegressor,
}

impl ModelPipeline {
    pub fn new(
        roles:   ColumnRoles,
        params:  ForestParams,
        seed:    u64,
        unknown: UnknownCategory,
    ) -> Self {
        Self {
            preprocessor: ColumnTransformer::new(roles, unknown),
            regressor:    RandomForestRegressor::new(params, seed),
        }
    }

    pub fn params(&self) -> &ForestParams {
        self.regressor.params()
    }

    pub fn is_fitted(&self) -> bool {
        self.regressor.n_features().is_some()
    }

    /// Fit the preprocessor, then the forest on its output.
    pub fn fit(&mut self, table: &DataTable, target: &[f64]) -> Result<(), PipelineError> {
        if table.n_rows() != target.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} targets", table.n_rows()),
                actual:   format!("{} targets", target.len()),
            });
        }
        let x = self.preprocessor.fit_transform(table)?;
        self.regressor.fit(&x, target)
    }

    pub fn predict(&self, table: &DataTable) -> Result<Vec<f64>, PipelineError> {
        if !self.is_fitted() {
            return Err(PipelineError::NotFitted("ModelPipeline"));
        }
        let x = self.preprocessor.transform(table)?;
        self.regressor.predict(x.view())
    }

    /// Predict `table` and score against `target`.
    pub fn evaluate(&self, table: &DataTable, target: &[f64]) -> Result<EvaluationReport, PipelineError> {
        let predictions = self.predict(table)?;
        EvaluationReport::compute(target, &predictions)
    }

    /// Names of the encoded columns the forest sees.
    pub fn feature_names(&self) -> Vec<String> {
        self.preprocessor.feature_names()
    }

    /// (encoded feature name, importance), in matrix column order.
    pub fn feature_importances(&self) -> Result<Vec<(String, f64)>, PipelineError> {
        let importances = self.regressor.feature_importances()?;
        Ok(self.feature_names().into_iter().zip(importances).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Column;

    fn table(n: usize) -> (DataTable, Vec<f64>) {
        let hours: Vec<f64> = (0..n).map(|i| 100.0 + (i * 37 % 200) as f64).collect();
        let projects: Vec<f64> = (0..n).map(|i| (i % 6 + 2) as f64).collect();
        let salary: Vec<String> = (0..n)
            .map(|i| ["low", "medium", "high"][i % 3].to_string())
            .collect();
        let target: Vec<f64> = (0..n)
            .map(|i| hours[i] / 400.0 + if i % 3 == 2 { 0.2 } else { 0.0 })
            .collect();

        let table = DataTable::from_columns(vec![
            Column::numeric("average_monthly_hours", hours),
            Column::numeric("number_project", projects),
            Column::categorical("salary", salary),
        ])
        .unwrap();
        (table, target)
    }

    fn roles() -> ColumnRoles {
        ColumnRoles::new(
            vec!["average_monthly_hours".into(), "number_project".into()],
            vec!["salary".into()],
        )
        .unwrap()
    }

    fn params() -> ForestParams {
        ForestParams { n_estimators: 15, ..ForestParams::default() }
    }

    #[test]
    fn test_fit_predict_and_evaluate() {
        let (data, y) = table(90);
        let mut pipeline = ModelPipeline::new(roles(), params(), 42, UnknownCategory::Error);
        pipeline.fit(&data, &y).unwrap();

        let report = pipeline.evaluate(&data, &y).unwrap();
        assert!(report.r2 > 0.8, "training r2 was {}", report.r2);
        assert_eq!(pipeline.predict(&data).unwrap().len(), 90);
    }

    #[test]
    fn test_importances_align_with_feature_names() {
        let (data, y) = table(60);
        let mut pipeline = ModelPipeline::new(roles(), params(), 7, UnknownCategory::Error);
        pipeline.fit(&data, &y).unwrap();

        let imp = pipeline.feature_importances().unwrap();
        let names: Vec<&str> = imp.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec!["average_monthly_hours", "number_project", "salary_low", "salary_medium"]
        );
        assert!((imp.iter().map(|(_, v)| v).sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_unfitted_pipeline_refuses_to_predict() {
        let (data, _) = table(5);
        let pipeline = ModelPipeline::new(roles(), params(), 0, UnknownCategory::Error);
        assert!(matches!(pipeline.predict(&data), Err(PipelineError::NotFitted(_))));
    }

    #[test]
    fn test_target_length_must_match() {
        let (data, _) = table(5);
        let mut pipeline = ModelPipeline::new(roles(), params(), 0, UnknownCategory::Error);
        assert!(pipeline.fit(&data, &[0.1, 0.2]).is_err());
    }
}
