// ============================================================
// Layer 2 — Predict Use Case
// ============================================================
// Scores a CSV with a previously saved model:
//
//   model file ─► ModelStore::load ─► ModelPipeline
//   input CSV  ─► load ─► rename ─► drop target (if any) ─► derive per-year hours
//                                   │
//                                   ▼
//                             predictions (+ evaluation when the
//                             file still has satisfaction_level)
//
// Without an explicit delimiter the one recorded in
// `<model>.config.json` is reused, falling back to ','.
//
// Predictions are written as `row,prediction` when an output
// path is given.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::PathBuf;

use crate::data::{
    features::prepare_for_inference,
    loader::{ascii_delimiter, CsvLoader},
    renamer::normalize_column_names,
};
use crate::domain::traits::TableSource;
use crate::infra::model_store::ModelStore;
use crate::ml::metrics::EvaluationReport;

#[derive(Debug, Serialize)]
struct PredictionRow {
    row:        usize,
    prediction: f64,
}

pub struct PredictReport {
    pub predictions: Vec<f64>,
    pub evaluation:  Option<EvaluationReport>,
    pub output:      Option<PathBuf>,
}

pub struct PredictUseCase {
    store: ModelStore,
}

impl PredictUseCase {
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self { store: ModelStore::new(model_path) }
    }

    pub fn execute(
        &self,
        input:     &str,
        delimiter: Option<char>,
        output:    Option<PathBuf>,
    ) -> Result<PredictReport> {
        let pipeline = self
            .store
            .load()
            .context("Have you run 'train' first?")?;
        tracing::info!("Model loaded from '{}'", self.store.path().display());

        let delimiter = match delimiter {
            Some(c) => c,
            None => self.training_delimiter()?,
        };
        let mut table = CsvLoader::new(input)
            .with_delimiter(ascii_delimiter(delimiter)?)
            .load()?;
        normalize_column_names(&mut table)?;
        let (features, target) = prepare_for_inference(table)?;

        let predictions = pipeline
            .predict(&features)
            .with_context(|| format!("Cannot score rows from '{input}'"))?;

        let evaluation = match &target {
            Some(y) => Some(EvaluationReport::compute(y, &predictions)?),
            None => None,
        };

        if let Some(path) = &output {
            let mut writer = csv::Writer::from_path(path)
                .with_context(|| format!("Cannot create '{}'", path.display()))?;
            for (row, &prediction) in predictions.iter().enumerate() {
                writer.serialize(PredictionRow { row, prediction })?;
            }
            writer.flush()?;
            tracing::info!("Wrote {} predictions to '{}'", predictions.len(), path.display());
        }

        Ok(PredictReport { predictions, evaluation, output })
    }

    /// Delimiter of the run that produced the model, or ',' when no
    /// config was saved beside it.
    fn training_delimiter(&self) -> Result<char> {
        if !self.store.config_path().exists() {
            return Ok(',');
        }
        let cfg = self.store.load_config()?;
        tracing::info!(
            "Model trained on '{}' (seed {}, delimiter '{}')",
            cfg.data_path,
            cfg.seed,
            cfg.delimiter
        );
        Ok(cfg.delimiter)
    }
}
