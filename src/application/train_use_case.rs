// ============================================================
// Layer 2 — Train Use Case
// ============================================================
// Runs the whole training workflow once, top to bottom:
//
//   1. Load the CSV                      (data::loader)
//   2. Fix legacy column names           (data::renamer)
//   3. Target, roles, derived feature    (data::features)
//   4. Exploratory plots, unless --no-plots (infra::plots)
//   5. Seeded train/test split           (data::splitter)
//   6. Fit + evaluate the default pipeline, plot importances
//   7. Randomized search over the forest (ml::search),
//      evaluate + plot the refit best model
//   8. Save the model, its config and the trial log (infra)
//   9. Reload the saved file to prove it round-trips
//
// The use case returns a TrainReport; printing is the CLI's job.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::data::{
    features::{derive_features, FeatureSet},
    loader::{ascii_delimiter, CsvLoader},
    renamer::normalize_column_names,
    splitter::train_test_split,
};
use crate::domain::traits::TableSource;
use crate::infra::{
    model_store::{ModelStore, ReloadOutcome, DEFAULT_MODEL_FILE},
    plots::PlotWriter,
    trial_log::TrialLogger,
};
use crate::ml::{
    forest::ForestParams,
    metrics::EvaluationReport,
    pipeline::ModelPipeline,
    preprocess::UnknownCategory,
    search::{ParamDistributions, RandomizedSearch},
};

/// Every knob of a training run. Saved as JSON beside the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    pub data_path:          String,
    pub delimiter:          char,
    pub model_path:         String,
    /// Where search_trials.csv goes
    pub output_dir:         String,
    pub plots_dir:          String,
    pub plots:              bool,
    pub test_size:          f64,
    pub seed:               u64,
    pub n_iter:             usize,
    pub cv:                 usize,
    /// Search worker threads, 0 = all cores
    pub jobs:               usize,
    pub unknown_categories: UnknownCategory,
    pub skip_search:        bool,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data_path:          "HR_comma_sep.csv".to_string(),
            delimiter:          ',',
            model_path:         DEFAULT_MODEL_FILE.to_string(),
            output_dir:         ".".to_string(),
            plots_dir:          "plots".to_string(),
            plots:              true,
            test_size:          0.2,
            seed:               42,
            n_iter:             100,
            cv:                 5,
            jobs:               0,
            unknown_categories: UnknownCategory::Error,
            skip_search:        false,
        }
    }
}

/// Summary of the hyperparameter search.
#[derive(Debug, Clone)]
pub struct SearchSummary {
    pub best_params: ForestParams,
    pub best_score:  f64,
    pub n_trials:    usize,
    pub n_failed:    usize,
    pub trial_log:   PathBuf,
}

#[derive(Debug, Clone)]
pub enum ReloadStatus {
    Loaded(PathBuf),
    Missing(PathBuf),
}

/// What happened during a training run.
#[derive(Debug, Clone)]
pub struct TrainReport {
    pub n_train:     usize,
    pub n_test:      usize,
    pub initial:     EvaluationReport,
    pub search:      Option<SearchSummary>,
    pub optimized:   Option<EvaluationReport>,
    pub importances: Vec<(String, f64)>,
    pub model_path:  PathBuf,
    pub reload:      ReloadStatus,
    pub plots:       Vec<PathBuf>,
}

pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    pub fn execute(&self) -> Result<TrainReport> {
        let cfg = &self.config;

        let features = load_features(&cfg.data_path, cfg.delimiter)?;
        let FeatureSet { features: table, target, roles } = &features;

        let plotter = if cfg.plots { Some(PlotWriter::new(&cfg.plots_dir)?) } else { None };
        let mut plots = Vec::new();
        if let Some(p) = &plotter {
            plots.extend(p.render_eda(table, roles)?);
        }

        let (train_idx, test_idx) = train_test_split(table.n_rows(), cfg.test_size, cfg.seed)?;
        let x_train = table.take_rows(&train_idx);
        let x_test  = table.take_rows(&test_idx);
        let y_train: Vec<f64> = train_idx.iter().map(|&i| target[i]).collect();
        let y_test:  Vec<f64> = test_idx.iter().map(|&i| target[i]).collect();
        tracing::info!("Split: {} train, {} test", x_train.n_rows(), x_test.n_rows());

        // ── Initial model with default hyperparameters ──
        let mut model = ModelPipeline::new(
            roles.clone(),
            ForestParams::default(),
            cfg.seed,
            cfg.unknown_categories,
        );
        tracing::info!("Fitting initial model: {}", model.params());
        model.fit(&x_train, &y_train)?;
        let initial = model.evaluate(&x_test, &y_test)?;
        let mut importances = model.feature_importances()?;
        if let Some(p) = &plotter {
            plots.push(p.render_importances(&importances, "initial")?);
        }

        // ── Randomized search ──
        let mut search_summary = None;
        let mut optimized = None;
        if !cfg.skip_search {
            let search = RandomizedSearch {
                distributions: ParamDistributions::default(),
                n_iter:        cfg.n_iter,
                cv:            cfg.cv,
                seed:          cfg.seed,
                unknown:       cfg.unknown_categories,
                jobs:          cfg.jobs,
            };
            let outcome = search.run(roles, &x_train, &y_train)?;

            let logger = TrialLogger::new(&cfg.output_dir)?;
            logger.log_all(&outcome.trials, cfg.seed)?;

            optimized   = Some(outcome.best_pipeline.evaluate(&x_test, &y_test)?);
            importances = outcome.best_pipeline.feature_importances()?;
            if let Some(p) = &plotter {
                plots.push(p.render_importances(&importances, "optimized")?);
            }

            search_summary = Some(SearchSummary {
                best_params: outcome.best_params,
                best_score:  outcome.best_score,
                n_trials:    outcome.trials.len(),
                n_failed:    outcome.trials.iter().filter(|t| t.failed()).count(),
                trial_log:   logger.csv_path().to_path_buf(),
            });
            model = outcome.best_pipeline;
        }

        // ── Persist and reload ──
        let store = ModelStore::new(&cfg.model_path);
        store.save(&model)?;
        store.save_config(cfg)?;

        let reload = match store.reload()? {
            ReloadOutcome::Loaded(reloaded) => {
                anyhow::ensure!(
                    reloaded.predict(&x_test)? == model.predict(&x_test)?,
                    "Reloaded model from '{}' predicts differently from the saved one",
                    store.path().display()
                );
                ReloadStatus::Loaded(store.path().to_path_buf())
            }
            ReloadOutcome::Missing(path) => ReloadStatus::Missing(path),
        };

        Ok(TrainReport {
            n_train: x_train.n_rows(),
            n_test:  x_test.n_rows(),
            initial,
            search: search_summary,
            optimized,
            importances,
            model_path: store.path().to_path_buf(),
            reload,
            plots,
        })
    }
}

/// Load → rename → derive. Shared by `train` and `plot`.
pub fn load_features(data_path: &str, delimiter: char) -> Result<FeatureSet> {
    let delimiter = ascii_delimiter(delimiter)?;

    let mut table = CsvLoader::new(data_path).with_delimiter(delimiter).load()?;
    let renamed = normalize_column_names(&mut table)?;
    tracing::debug!("Renamed {} legacy columns", renamed);

    derive_features(table).with_context(|| format!("Cannot prepare features from '{data_path}'"))
}

/// The `plot` subcommand: exploratory charts only, no training.
pub fn render_exploratory_plots(
    data_path: &str,
    delimiter: char,
    plots_dir: impl AsRef<Path>,
) -> Result<Vec<PathBuf>> {
    let features = load_features(data_path, delimiter)?;
    PlotWriter::new(plots_dir.as_ref())?.render_eda(&features.features, &features.roles)
}
