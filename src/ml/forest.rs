// ============================================================
// Layer 5 — Random Forest Regressor
// ============================================================
// Bagged ensemble of CART trees:
//
//   random_state ──► StdRng ──► one u64 seed per tree
//                                   │
//        ┌──────────────────────────┼───────────── rayon ──┐
//        ▼                          ▼                      ▼
//   bootstrap draw n rows     bootstrap draw …        bootstrap …
//   grow tree(seed')          grow tree(seed')        grow tree …
//        └──────────────────────────┴──────────────────────┘
//                                   │
//                    prediction = mean of tree outputs
//
// Seeds are drawn sequentially before the parallel fan-out, so
// the fitted forest does not depend on thread scheduling.

use ndarray::{Array2, ArrayView2};
use rand::{rngs::StdRng, Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::PipelineError;
use crate::domain::traits::Regressor;
use crate::ml::tree::{validate_tree_params, DecisionTreeRegressor, MaxFeatures, TreeParams};

/// Hyperparameters of the forest (the search space of the tuner).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators:      usize,
    pub max_features:      MaxFeatures,
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators:      100,
            max_features:      MaxFeatures::All,
            max_depth:         None,
            min_samples_split: 2,
            min_samples_leaf:  1,
        }
    }
}

impl ForestParams {
    pub fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth:         self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf:  self.min_samples_leaf,
            max_features:      self.max_features,
        }
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.n_estimators == 0 {
            return Err(PipelineError::invalid_param("n_estimators", 0, "must be at least 1"));
        }
        validate_tree_params(&self.tree_params())
    }
}

impl fmt::Display for ForestParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let depth = self
            .max_depth
            .map_or_else(|| "None".to_string(), |d| d.to_string());
        write!(
            f,
            "{{'n_estimators': {}, 'min_samples_split': {}, 'min_samples_leaf': {}, \
             'max_features': '{}', 'max_depth': {}}}",
            self.n_estimators, self.min_samples_split, self.min_samples_leaf, self.max_features, depth
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params:       ForestParams,
    random_state: u64,
    trees:        Vec<DecisionTreeRegressor>,
    n_features:   Option<usize>,
}

impl RandomForestRegressor {
    pub fn new(params: ForestParams, random_state: u64) -> Self {
        Self { params, random_state, trees: Vec::new(), n_features: None }
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    /// Mean-decrease-in-impurity importances, one per feature,
    /// summing to 1. Uniform when no tree ever split.
    pub fn feature_importances(&self) -> Result<Vec<f64>, PipelineError> {
        let n = self.n_features.ok_or(PipelineError::NotFitted("RandomForestRegressor"))?;

        let mut total = vec![0.0; n];
        for tree in &self.trees {
            let raw = tree.impurity_decrease();
            let sum: f64 = raw.iter().sum();
            if sum > 0.0 {
                for (t, r) in total.iter_mut().zip(raw) {
                    *t += r / sum;
                }
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            total.iter_mut().for_each(|t| *t /= sum);
        } else {
            total.fill(1.0 / n as f64);
        }
        Ok(total)
    }
}

impl Regressor for RandomForestRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<(), PipelineError> {
        self.params.validate()?;
        let n = x.nrows();
        if n != y.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{n} targets"),
                actual:   format!("{} targets", y.len()),
            });
        }
        if n == 0 {
            return Err(PipelineError::Schema("cannot fit a forest on zero rows".into()));
        }

        let mut rng = StdRng::seed_from_u64(self.random_state);
        let seeds: Vec<u64> = (0..self.params.n_estimators).map(|_| rng.gen()).collect();
        let tree_params = self.params.tree_params();

        let trees = seeds
            .into_par_iter()
            .map(|seed| {
                let mut tree_rng = StdRng::seed_from_u64(seed);
                let samples: Vec<usize> = (0..n).map(|_| tree_rng.gen_range(0..n)).collect();
                let mut tree = DecisionTreeRegressor::new(tree_params).with_seed(tree_rng.gen());
                tree.fit_samples(x.view(), y, samples)?;
                Ok(tree)
            })
            .collect::<Result<Vec<_>, PipelineError>>()?;

        tracing::debug!(
            "Fitted {} trees ({} nodes, max depth {}) on {} rows × {} features",
            trees.len(),
            trees.iter().map(DecisionTreeRegressor::node_count).sum::<usize>(),
            trees.iter().map(DecisionTreeRegressor::depth).max().unwrap_or(0),
            n,
            x.ncols()
        );

        self.trees      = trees;
        self.n_features = Some(x.ncols());
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, PipelineError> {
        if self.trees.is_empty() {
            return Err(PipelineError::NotFitted("RandomForestRegressor"));
        }
        let mut sum = vec![0.0; x.nrows()];
        for tree in &self.trees {
            for (s, p) in sum.iter_mut().zip(tree.predict(x)?) {
                *s += p;
            }
        }
        let k = self.trees.len() as f64;
        Ok(sum.into_iter().map(|s| s / k).collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}
