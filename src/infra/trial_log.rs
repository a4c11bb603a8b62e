// ============================================================
// Layer 6 — Search Trial Logger
// ============================================================
// One CSV row per hyperparameter candidate:
//
//   run,seed,candidate,n_estimators,max_features,max_depth,min_samples_split,min_samples_leaf,mean_score,std_score
//   1760690112345,42,0,121,sqrt,20,4,1,-0.031522,0.001874
//   1760690112345,42,1,77,auto,,9,3,-0.029871,0.001502
//
// `run` is the logger's creation time in Unix milliseconds, so
// rows from separate runs stay apart even though `candidate`
// restarts at 0. max_depth is empty for an unlimited tree;
// failed candidates log NaN scores. The header is written only
// when the file is new, so repeated runs append to the same log.

use anyhow::{Context, Result};
use serde::Serialize;
use std::{
    fs::{self, OpenOptions},
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::ml::search::Trial;

pub const TRIAL_LOG_FILE: &str = "search_trials.csv";

#[derive(Debug, Serialize)]
struct TrialRow {
    run:               u64,
    seed:              u64,
    candidate:         usize,
    n_estimators:      usize,
    max_features:      String,
    max_depth:         Option<usize>,
    min_samples_split: usize,
    min_samples_leaf:  usize,
    mean_score:        f64,
    std_score:         f64,
}

impl TrialRow {
    fn new(run: u64, seed: u64, t: &Trial) -> Self {
        Self {
            run,
            seed,
            candidate:         t.candidate,
            n_estimators:      t.params.n_estimators,
            max_features:      t.params.max_features.to_string(),
            max_depth:         t.params.max_depth,
            min_samples_split: t.params.min_samples_split,
            min_samples_leaf:  t.params.min_samples_leaf,
            mean_score:        t.mean_score,
            std_score:         t.std_score,
        }
    }
}

/// Appends search trials to `<dir>/search_trials.csv`.
pub struct TrialLogger {
    csv_path: PathBuf,
    run:      u64,
}

impl TrialLogger {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create output directory '{}'", dir.display()))?;
        let run = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .context("System clock is before the Unix epoch")?
            .as_millis() as u64;
        Ok(Self { csv_path: dir.join(TRIAL_LOG_FILE), run })
    }

    /// Append one row per trial, tagged with this logger's run id
    /// and the search seed.
    pub fn log_all(&self, trials: &[Trial], seed: u64) -> Result<()> {
        let is_new = !self.csv_path.exists();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.csv_path)
            .with_context(|| format!("Cannot open trial log '{}'", self.csv_path.display()))?;

        let mut writer = csv::WriterBuilder::new().has_headers(is_new).from_writer(file);
        for trial in trials {
            writer.serialize(TrialRow::new(self.run, seed, trial))?;
        }
        writer.flush()?;

        tracing::debug!(
            "Logged {} trials for run {} to '{}'",
            trials.len(),
            self.run,
            self.csv_path.display()
        );
        Ok(())
    }

    pub fn csv_path(&self) -> &Path {
        &self.csv_path
    }
}
