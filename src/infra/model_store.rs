// ============================================================
// Layer 6 — Model Store
// ============================================================
// Persists a fitted ModelPipeline as one file:
//
//   ModelEnvelope { format_version, pipeline }
//        │  rmp_serde (named MessagePack fields)
//        ▼
//   gzip (flate2)  ──►  employee_satisfaction_level_model.mpk.gz
//
// Saving overwrites silently. Loading checks format_version
// before handing back the pipeline.
//
// `reload` is what the training run calls right after saving:
// a missing file is reported (ReloadOutcome::Missing) instead
// of failing the run; any other error still propagates.
//
// The TrainConfig used for the run is written beside the model
// as pretty JSON: <model>.config.json

use anyhow::{Context, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{self, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

use crate::application::train_use_case::TrainConfig;
use crate::domain::error::PipelineError;
use crate::ml::pipeline::ModelPipeline;

pub const DEFAULT_MODEL_FILE: &str = "employee_satisfaction_level_model.mpk.gz";
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
pub struct ModelEnvelope {
    pub format_version: u32,
    pub pipeline:       ModelPipeline,
}

/// Result of the post-save reload.
#[derive(Debug)]
pub enum ReloadOutcome {
    Loaded(ModelPipeline),
    Missing(PathBuf),
}

pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `<model file>.config.json`
    pub fn config_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".config.json");
        self.path.with_file_name(name)
    }

    /// Write the versioned envelope as gzip-compressed MessagePack,
    /// replacing any existing file.
    pub fn save(&self, pipeline: &ModelPipeline) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir)
                .with_context(|| format!("Cannot create directory '{}'", dir.display()))?;
        }

        let file = File::create(&self.path)
            .with_context(|| format!("Cannot create model file '{}'", self.path.display()))?;
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());

        let envelope = EnvelopeRef { format_version: FORMAT_VERSION, pipeline };
        rmp_serde::encode::write_named(&mut encoder, &envelope)
            .with_context(|| format!("Failed to encode model to '{}'", self.path.display()))?;

        encoder.finish()?.flush()?;
        tracing::info!("Model saved to '{}'", self.path.display());
        Ok(())
    }

    /// Read a model written by `save`, rejecting other format versions.
    pub fn load(&self) -> Result<ModelPipeline> {
        let file = File::open(&self.path)
            .with_context(|| format!("Cannot open model file '{}'", self.path.display()))?;
        self.decode(file)
    }

    /// Load after save; NotFound is an outcome, not an error.
    pub fn reload(&self) -> Result<ReloadOutcome> {
        match File::open(&self.path) {
            Ok(file) => Ok(ReloadOutcome::Loaded(self.decode(file)?)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("Model file '{}' not found after save", self.path.display());
                Ok(ReloadOutcome::Missing(self.path.clone()))
            }
            Err(e) => Err(e)
                .with_context(|| format!("Cannot open model file '{}'", self.path.display())),
        }
    }

    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.config_path();
        let json = serde_json::to_string_pretty(cfg)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        tracing::debug!("Saved training config to '{}'", path.display());
        Ok(())
    }

    /// The `TrainConfig` saved beside the model by `save_config`.
    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.config_path();
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }

    fn decode(&self, file: File) -> Result<ModelPipeline> {
        let decoder = GzDecoder::new(BufReader::new(file));
        let envelope: ModelEnvelope = rmp_serde::decode::from_read(decoder)
            .with_context(|| format!("Cannot decode model file '{}'", self.path.display()))?;

        if envelope.format_version != FORMAT_VERSION {
            return Err(PipelineError::ModelFormat(format!(
                "file has version {}, this build reads version {}",
                envelope.format_version, FORMAT_VERSION
            ))
            .into());
        }
        tracing::debug!("Decoded model from '{}'", self.path.display());
        Ok(envelope.pipeline)
    }
}

/// Borrowing twin of ModelEnvelope so saving doesn't clone the forest.
#[derive(Serialize)]
struct EnvelopeRef<'a> {
    format_version: u32,
    pipeline:       &'a ModelPipeline,
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::schema::ColumnRoles;
    use crate::domain::table::{Column, DataTable};
    use crate::ml::forest::ForestParams;
    use crate::ml::preprocess::UnknownCategory;

    fn fitted() -> (ModelPipeline, DataTable) {
        let n = 40;
        let table = DataTable::from_columns(vec![
            Column::numeric("last_evaluation", (0..n).map(|i| (i % 10) as f64 / 10.0).collect()),
            Column::categorical(
                "salary",
                (0..n).map(|i| ["low", "high"][i % 2].to_string()).collect(),
            ),
        ])
        .unwrap();
        let y: Vec<f64> = (0..n).map(|i| (i % 7) as f64 / 7.0).collect();
        let roles = ColumnRoles::new(vec!["last_evaluation".into()], vec!["salary".into()]).unwrap();

        let params = ForestParams { n_estimators: 8, ..ForestParams::default() };
        let mut pipeline = ModelPipeline::new(roles, params, 42, UnknownCategory::Error);
        pipeline.fit(&table, &y).unwrap();
        (pipeline, table)
    }

    #[test]
    fn test_save_load_gives_identical_predictions() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join(DEFAULT_MODEL_FILE));
        let (pipeline, table) = fitted();

        store.save(&pipeline).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(pipeline.predict(&table).unwrap(), loaded.predict(&table).unwrap());
    }

    #[test]
    fn test_reload_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("nope.mpk.gz"));
        assert!(matches!(store.reload().unwrap(), ReloadOutcome::Missing(_)));
        assert!(store.load().is_err());
    }

    #[test]
    fn test_reload_after_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("nested/model.mpk.gz"));
        let (pipeline, _) = fitted();
        store.save(&pipeline).unwrap();
        assert!(matches!(store.reload().unwrap(), ReloadOutcome::Loaded(_)));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.mpk.gz");
        fs::write(&path, b"not gzip at all").unwrap();
        assert!(ModelStore::new(path).reload().is_err());
    }

    #[test]
    fn test_wrong_format_version() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("old.mpk.gz");
        let (pipeline, _) = fitted();

        let mut encoder = GzEncoder::new(File::create(&path).unwrap(), Compression::default());
        let envelope = ModelEnvelope { format_version: 0, pipeline };
        rmp_serde::encode::write_named(&mut encoder, &envelope).unwrap();
        encoder.finish().unwrap();

        let err = ModelStore::new(path).load().unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::ModelFormat(_))
        ));
    }

    #[test]
    fn test_config_sits_next_to_model() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("m.mpk.gz"));
        assert_eq!(store.config_path(), dir.path().join("m.mpk.gz.config.json"));

        let cfg = TrainConfig::default();
        store.save_config(&cfg).unwrap();
        assert_eq!(store.load_config().unwrap().seed, cfg.seed);
    }
}
