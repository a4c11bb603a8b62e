// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Every flag has a default, so `hr-satisfaction train` alone
// reproduces the reference run on HR_comma_sep.csv.
//
// TrainArgs converts into the application's TrainConfig via
// From, keeping clap out of the application layer.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::application::train_use_case::TrainConfig;
use crate::infra::model_store::DEFAULT_MODEL_FILE;
use crate::ml::preprocess::UnknownCategory;

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fit, tune, evaluate and save the satisfaction model
    Train(TrainArgs),

    /// Score a CSV with a saved model
    Predict(PredictArgs),

    /// Render the exploratory plots only
    Plot(PlotArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// HR dataset (CSV with a header row)
    #[arg(long, default_value = "HR_comma_sep.csv")]
    pub data: String,

    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    #[arg(long, default_value = DEFAULT_MODEL_FILE)]
    pub model_path: String,

    /// Directory for search_trials.csv
    #[arg(long, default_value = ".")]
    pub output_dir: String,

    #[arg(long, default_value = "plots")]
    pub plots_dir: String,

    /// Skip all SVG output
    #[arg(long)]
    pub no_plots: bool,

    /// Fraction of rows held out for evaluation
    #[arg(long, default_value_t = 0.2)]
    pub test_size: f64,

    /// Shared seed for the split, the forests and the search
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of sampled hyperparameter candidates
    #[arg(long, default_value_t = 100)]
    pub n_iter: usize,

    /// Cross-validation folds per candidate
    #[arg(long, default_value_t = 5)]
    pub cv: usize,

    /// Search worker threads (0 = all cores)
    #[arg(long, default_value_t = 0)]
    pub jobs: usize,

    /// What to do with categories not seen during fit: error | ignore
    #[arg(long, default_value_t = UnknownCategory::Error)]
    pub unknown_categories: UnknownCategory,

    /// Save the default-parameter model without tuning
    #[arg(long)]
    pub skip_search: bool,
}

impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data_path:          a.data,
            delimiter:          a.delimiter,
            model_path:         a.model_path,
            output_dir:         a.output_dir,
            plots_dir:          a.plots_dir,
            plots:              !a.no_plots,
            test_size:          a.test_size,
            seed:               a.seed,
            n_iter:             a.n_iter,
            cv:                 a.cv,
            jobs:               a.jobs,
            unknown_categories: a.unknown_categories,
            skip_search:        a.skip_search,
        }
    }
}

#[derive(Args, Debug)]
pub struct PredictArgs {
    #[arg(long, default_value = DEFAULT_MODEL_FILE)]
    pub model_path: PathBuf,

    /// CSV to score; satisfaction_level is optional
    #[arg(long)]
    pub input: String,

    /// Write `row,prediction` here instead of printing a preview
    #[arg(long)]
    pub output: Option<PathBuf>,

    /// Defaults to the delimiter the model was trained with
    #[arg(long)]
    pub delimiter: Option<char>,
}

#[derive(Args, Debug)]
pub struct PlotArgs {
    #[arg(long, default_value = "HR_comma_sep.csv")]
    pub data: String,

    #[arg(long, default_value_t = ',')]
    pub delimiter: char,

    #[arg(long, default_value = "plots")]
    pub plots_dir: String,
}
