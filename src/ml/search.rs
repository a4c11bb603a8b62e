// ============================================================
// Layer 5 — Randomized Hyperparameter Search
// ============================================================
// Draws `n_iter` forest configurations, scores each with
// K-fold cross-validation, keeps the best:
//
//   StdRng(seed) ─► candidate 0..n_iter        (sequential draws)
//                      │
//                      ▼
//   (candidate, fold) jobs ─► rayon pool ─► -MSE per job
//                      │                    (collected in order)
//                      ▼
//   mean / std per candidate ─► best (earliest wins ties)
//                      │
//                      ▼
//   refit best on the full training rows
//
// Each job fits its own pipeline; nothing mutable is shared
// between workers, so the outcome does not depend on --jobs.

use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use rayon::prelude::*;
use std::ops::Range;

use crate::data::splitter::KFold;
use crate::domain::error::PipelineError;
use crate::domain::schema::ColumnRoles;
use crate::domain::table::DataTable;
use crate::ml::forest::ForestParams;
use crate::ml::metrics::mean_squared_error;
use crate::ml::pipeline::ModelPipeline;
use crate::ml::preprocess::UnknownCategory;
use crate::ml::tree::MaxFeatures;

/// Where each hyperparameter is drawn from. Integer ranges are
/// half-open; choices are picked uniformly.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDistributions {
    pub n_estimators:      Range<usize>,
    pub max_features:      Vec<MaxFeatures>,
    pub max_depth:         Vec<Option<usize>>,
    pub min_samples_split: Range<usize>,
    pub min_samples_leaf:  Range<usize>,
}

impl Default for ParamDistributions {
    fn default() -> Self {
        Self {
            n_estimators:      50..200,
            max_features:      vec![MaxFeatures::All, MaxFeatures::Sqrt, MaxFeatures::Log2],
            max_depth:         vec![None, Some(10), Some(20), Some(30)],
            min_samples_split: 2..11,
            min_samples_leaf:  1..5,
        }
    }
}

impl ParamDistributions {
    pub fn validate(&self) -> Result<(), PipelineError> {
        let ranges = [
            ("n_estimators",      &self.n_estimators,      1),
            ("min_samples_split", &self.min_samples_split, 2),
            ("min_samples_leaf",  &self.min_samples_leaf,  1),
        ];
        for (name, range, floor) in ranges {
            if range.is_empty() {
                return Err(PipelineError::invalid_param(
                    name,
                    format!("{}..{}", range.start, range.end),
                    "range must not be empty",
                ));
            }
            if range.start < floor {
                return Err(PipelineError::invalid_param(
                    name,
                    range.start,
                    format!("lower bound must be at least {floor}"),
                ));
            }
        }
        if self.max_features.is_empty() {
            return Err(PipelineError::invalid_param("max_features", "[]", "needs at least one choice"));
        }
        if self.max_depth.is_empty() {
            return Err(PipelineError::invalid_param("max_depth", "[]", "needs at least one choice"));
        }
        if self.max_depth.contains(&Some(0)) {
            return Err(PipelineError::invalid_param("max_depth", 0, "must be at least 1 or None"));
        }
        Ok(())
    }

    /// One draw. Parameters are sampled in alphabetical order.
    pub fn sample(&self, rng: &mut StdRng) -> ForestParams {
        let max_depth         = *self.max_depth.choose(rng).unwrap_or(&None);
        let max_features      = *self.max_features.choose(rng).unwrap_or(&MaxFeatures::All);
        let min_samples_leaf  = rng.gen_range(self.min_samples_leaf.clone());
        let min_samples_split = rng.gen_range(self.min_samples_split.clone());
        let n_estimators      = rng.gen_range(self.n_estimators.clone());
        ForestParams { n_estimators, max_features, max_depth, min_samples_split, min_samples_leaf }
    }
}

/// One evaluated candidate.
#[derive(Debug, Clone)]
pub struct Trial {
    pub candidate:   usize,
    pub params:      ForestParams,
    /// Negative MSE per fold; NaN where the fold failed.
    pub fold_scores: Vec<f64>,
    pub mean_score:  f64,
    pub std_score:   f64,
}

impl Trial {
    pub fn failed(&self) -> bool {
        self.mean_score.is_nan()
    }
}

#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub best_params:   ForestParams,
    pub best_score:    f64,
    pub trials:        Vec<Trial>,
    pub best_pipeline: ModelPipeline,
}

#[derive(Debug, Clone)]
pub struct RandomizedSearch {
    pub distributions: ParamDistributions,
    pub n_iter:        usize,
    pub cv:            usize,
    pub seed:          u64,
    pub unknown:       UnknownCategory,
    /// Worker threads; 0 lets rayon pick (all cores).
    pub jobs:          usize,
}

impl Default for RandomizedSearch {
    fn default() -> Self {
        Self {
            distributions: ParamDistributions::default(),
            n_iter:        100,
            cv:            5,
            seed:          42,
            unknown:       UnknownCategory::Error,
            jobs:          0,
        }
    }
}

impl RandomizedSearch {
    /// Draw the candidate list without fitting anything.
    pub fn candidates(&self) -> Vec<ForestParams> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        (0..self.n_iter).map(|_| self.distributions.sample(&mut rng)).collect()
    }

    /// Score every candidate with K-fold CV on a pool of `jobs`
    /// threads, pick the best mean negative MSE (earliest wins ties)
    /// and refit it on the full table.
    pub fn run(
        &self,
        roles:  &ColumnRoles,
        table:  &DataTable,
        target: &[f64],
    ) -> Result<SearchOutcome, PipelineError> {
        self.distributions.validate()?;
        if self.n_iter == 0 {
            return Err(PipelineError::invalid_param("n_iter", 0, "must be at least 1"));
        }
        if table.n_rows() != target.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} targets", table.n_rows()),
                actual:   format!("{} targets", target.len()),
            });
        }

        let folds      = KFold::new(self.cv)?.split(table.n_rows())?;
        let candidates = self.candidates();

        tracing::info!(
            "Fitting {} folds for each of {} candidates, totalling {} fits",
            folds.len(),
            candidates.len(),
            folds.len() * candidates.len()
        );

        let jobs: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
            .map_err(|e| PipelineError::Search(format!("cannot start worker pool: {e}")))?;

        let scores: Vec<f64> = pool.install(|| {
            jobs.par_iter()
                .map(|&(c, f)| {
                    let (train, test) = &folds[f];
                    match self.score_fold(roles, candidates[c], table, target, train, test) {
                        Ok(score) => score,
                        Err(e) => {
                            tracing::warn!("Candidate {c} failed on fold {f}: {e}");
                            f64::NAN
                        }
                    }
                })
                .collect()
        });

        let trials: Vec<Trial> = candidates
            .iter()
            .zip(scores.chunks(folds.len()))
            .enumerate()
            .map(|(candidate, (&params, fold_scores))| {
                let (mean_score, std_score) = mean_std(fold_scores);
                Trial { candidate, params, fold_scores: fold_scores.to_vec(), mean_score, std_score }
            })
            .collect();

        let best = trials
            .iter()
            .filter(|t| !t.failed())
            .fold(None::<&Trial>, |best, t| match best {
                Some(b) if b.mean_score >= t.mean_score => Some(b),
                _ => Some(t),
            })
            .ok_or_else(|| PipelineError::Search(format!("all {} candidates failed", trials.len())))?;

        tracing::info!("Best candidate {} scored {:.6}", best.candidate, best.mean_score);
        tracing::debug!("Best candidate fold scores: {:?}", best.fold_scores);

        let mut best_pipeline = ModelPipeline::new(roles.clone(), best.params, self.seed, self.unknown);
        best_pipeline.fit(table, target)?;

        Ok(SearchOutcome {
            best_params: best.params,
            best_score:  best.mean_score,
            best_pipeline,
            trials,
        })
    }

    fn score_fold(
        &self,
        roles:  &ColumnRoles,
        params: ForestParams,
        table:  &DataTable,
        target: &[f64],
        train:  &[usize],
        test:   &[usize],
    ) -> Result<f64, PipelineError> {
        let gather = |rows: &[usize]| rows.iter().map(|&i| target[i]).collect::<Vec<f64>>();

        let mut pipeline = ModelPipeline::new(roles.clone(), params, self.seed, self.unknown);
        pipeline.fit(&table.take_rows(train), &gather(train))?;
        let predictions = pipeline.predict(&table.take_rows(test))?;
        Ok(-mean_squared_error(&gather(test), &predictions)?)
    }
}

/// Mean and population std; NaN if any fold failed.
fn mean_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() || values.iter().any(|v| v.is_nan()) {
        return (f64::NAN, f64::NAN);
    }
    let n    = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var  = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::Column;

    fn data(n: usize) -> (DataTable, Vec<f64>, ColumnRoles) {
        let hours: Vec<f64> = (0..n).map(|i| 120.0 + (i * 53 % 150) as f64).collect();
        let dept: Vec<String> = (0..n).map(|i| ["sales", "IT"][i % 2].to_string()).collect();
        let y: Vec<f64> = hours.iter().map(|h| h / 300.0).collect();
        let table = DataTable::from_columns(vec![
            Column::numeric("average_monthly_hours", hours),
            Column::categorical("department", dept),
        ])
        .unwrap();
        let roles = ColumnRoles::new(
            vec!["average_monthly_hours".into()],
            vec!["department".into()],
        )
        .unwrap();
        (table, y, roles)
    }

    fn tiny_search(jobs: usize) -> RandomizedSearch {
        RandomizedSearch {
            distributions: ParamDistributions { n_estimators: 3..6, ..ParamDistributions::default() },
            n_iter: 4,
            cv: 3,
            seed: 42,
            unknown: UnknownCategory::Error,
            jobs,
        }
    }

    #[test]
    fn test_samples_stay_inside_distributions() {
        let dist = ParamDistributions::default();
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..200 {
            let p = dist.sample(&mut rng);
            assert!(dist.n_estimators.contains(&p.n_estimators));
            assert!(dist.min_samples_split.contains(&p.min_samples_split));
            assert!(dist.min_samples_leaf.contains(&p.min_samples_leaf));
            assert!(dist.max_depth.contains(&p.max_depth));
            assert!(dist.max_features.contains(&p.max_features));
        }
    }

    #[test]
    fn test_candidates_are_reproducible() {
        let search = RandomizedSearch { n_iter: 10, ..RandomizedSearch::default() };
        assert_eq!(search.candidates(), search.candidates());
    }

    #[test]
    fn test_search_picks_best_mean_score() {
        let (table, y, roles) = data(30);
        let outcome = tiny_search(2).run(&roles, &table, &y).unwrap();

        assert_eq!(outcome.trials.len(), 4);
        assert!(outcome.trials.iter().all(|t| t.fold_scores.len() == 3));
        let max = outcome
            .trials
            .iter()
            .map(|t| t.mean_score)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(outcome.best_score, max);
        assert!(outcome.best_score <= 0.0);
        assert!(outcome.best_pipeline.is_fitted());
    }

    #[test]
    fn test_outcome_independent_of_thread_count() {
        let (table, y, roles) = data(30);
        let one  = tiny_search(1).run(&roles, &table, &y).unwrap();
        let four = tiny_search(4).run(&roles, &table, &y).unwrap();

        assert_eq!(one.best_params, four.best_params);
        let a: Vec<f64> = one.trials.iter().map(|t| t.mean_score).collect();
        let b: Vec<f64> = four.trials.iter().map(|t| t.mean_score).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_unseen_category_fails_candidates() {
        // "hr" only appears in the last fold, so the Error policy
        // rejects every candidate on that fold
        let (mut table, y, roles) = data(30);
        let dept: Vec<String> = (0..30)
            .map(|i| if i >= 27 { "hr".to_string() } else { ["sales", "IT"][i % 2].to_string() })
            .collect();
        table.replace_data("department", crate::domain::table::ColumnData::Categorical(dept)).unwrap();

        let err = tiny_search(1).run(&roles, &table, &y).unwrap_err();
        assert!(matches!(err, PipelineError::Search(_)));

        let mut lenient = tiny_search(1);
        lenient.unknown = UnknownCategory::Ignore;
        assert!(lenient.run(&roles, &table, &y).is_ok());
    }

    #[test]
    fn test_invalid_settings_rejected() {
        let (table, y, roles) = data(10);

        let mut search = tiny_search(1);
        search.n_iter = 0;
        assert!(matches!(
            search.run(&roles, &table, &y),
            Err(PipelineError::InvalidHyperparameter { .. })
        ));

        let mut search = tiny_search(1);
        search.distributions.min_samples_leaf = 3..3;
        assert!(search.run(&roles, &table, &y).is_err());

        let mut search = tiny_search(1);
        search.cv = 11;
        assert!(search.run(&roles, &table, &y).is_err());
    }

    #[test]
    fn test_mean_std() {
        assert_eq!(mean_std(&[-1.0, -3.0]), (-2.0, 1.0));
        assert!(mean_std(&[-1.0, f64::NAN]).0.is_nan());
    }
}
