// ============================================================
// Layer 5 — CART Regression Tree
// ============================================================
// A binary regression tree grown greedily with the squared
// error (variance) criterion:
//
//   for each candidate feature:
//       sort the node's rows by that feature
//       sweep left→right keeping running Σy and Σy²
//       SSE(side) = Σy² - (Σy)² / n
//       keep the cut with the lowest SSE(left) + SSE(right)
//
// Cuts sit halfway between consecutive distinct values, and a
// row goes left when `x <= threshold`.
//
// Randomness (which features a split may look at) comes from
// a per-tree StdRng, so a tree is reproducible from its seed.
//
// The tree is stored as a flat arena of nodes; children are
// indices into the arena. This keeps the serialized form
// shallow no matter how deep the tree grows.

use ndarray::{Array2, ArrayView2};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::error::PipelineError;
use crate::domain::traits::Regressor;

/// How many features a split may consider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Every feature ("auto" for regressors).
    #[default]
    #[serde(rename = "auto")]
    All,
    #[serde(rename = "sqrt")]
    Sqrt,
    #[serde(rename = "log2")]
    Log2,
}

impl MaxFeatures {
    pub fn resolve(self, n_features: usize) -> usize {
        let k = match self {
            MaxFeatures::All  => n_features,
            MaxFeatures::Sqrt => (n_features as f64).sqrt().floor() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2().floor() as usize,
        };
        k.clamp(1, n_features.max(1))
    }
}

impl fmt::Display for MaxFeatures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaxFeatures::All  => write!(f, "auto"),
            MaxFeatures::Sqrt => write!(f, "sqrt"),
            MaxFeatures::Log2 => write!(f, "log2"),
        }
    }
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Root has depth 0; `None` grows until leaves are pure.
    pub max_depth:         Option<usize>,
    pub min_samples_split: usize,
    pub min_samples_leaf:  usize,
    pub max_features:      MaxFeatures,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth:         None,
            min_samples_split: 2,
            min_samples_leaf:  1,
            max_features:      MaxFeatures::All,
        }
    }
}

/// One arena slot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TreeNode {
    Leaf {
        value:     f64,
    },
    Split {
        feature:   usize,
        threshold: f64,
        left:      usize,
        right:     usize,
    },
}

/// CART regressor. `fit` uses all rows; the forest calls
/// `fit_samples` with a bootstrap draw instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    params:      TreeParams,
    seed:        u64,
    nodes:       Vec<TreeNode>,
    n_features:  Option<usize>,
    /// Total squared-error decrease attributed to each feature.
    importances: Vec<f64>,
}

impl DecisionTreeRegressor {
    pub fn new(params: TreeParams) -> Self {
        Self {
            params,
            seed: 0,
            nodes: Vec::new(),
            n_features: None,
            importances: Vec::new(),
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path (a lone leaf has depth 0).
    pub fn depth(&self) -> usize {
        fn walk(nodes: &[TreeNode], idx: usize) -> usize {
            match nodes[idx] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + walk(nodes, left).max(walk(nodes, right)),
            }
        }
        if self.nodes.is_empty() { 0 } else { walk(&self.nodes, 0) }
    }

    /// Raw (unnormalised) squared-error decrease per feature.
    pub fn impurity_decrease(&self) -> &[f64] {
        &self.importances
    }

    /// Fit on the given row indices of `x` (repeats act as weights).
    pub fn fit_samples<'a>(
        &mut self,
        x:       ArrayView2<'a, f64>,
        y:       &'a [f64],
        samples: Vec<usize>,
    ) -> Result<(), PipelineError> {
        if x.nrows() != y.len() {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{} targets", x.nrows()),
                actual:   format!("{} targets", y.len()),
            });
        }
        if samples.is_empty() || x.ncols() == 0 {
            return Err(PipelineError::Schema("cannot fit a tree on an empty matrix".into()));
        }
        validate_tree_params(&self.params)?;

        let mut builder = TreeBuilder {
            x,
            y,
            params:       self.params,
            max_features: self.params.max_features.resolve(x.ncols()),
            rng:          StdRng::seed_from_u64(self.seed),
            features:     (0..x.ncols()).collect(),
            nodes:        Vec::new(),
            importances:  vec![0.0; x.ncols()],
            scratch:      Vec::with_capacity(samples.len()),
        };
        builder.grow(samples, 0);

        self.nodes       = builder.nodes;
        self.importances = builder.importances;
        self.n_features  = Some(x.ncols());
        Ok(())
    }

    fn predict_row(&self, row: ndarray::ArrayView1<'_, f64>) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split { feature, threshold, left, right, .. } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<(), PipelineError> {
        self.fit_samples(x.view(), y, (0..x.nrows()).collect())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>, PipelineError> {
        let n_features = self.n_features.ok_or(PipelineError::NotFitted("DecisionTreeRegressor"))?;
        if x.ncols() != n_features {
            return Err(PipelineError::DimensionMismatch {
                expected: format!("{n_features} features"),
                actual:   format!("{} features", x.ncols()),
            });
        }
        Ok(x.rows().into_iter().map(|row| self.predict_row(row)).collect())
    }

    fn n_features(&self) -> Option<usize> {
        self.n_features
    }
}

pub(crate) fn validate_tree_params(p: &TreeParams) -> Result<(), PipelineError> {
    if p.min_samples_split < 2 {
        return Err(PipelineError::invalid_param(
            "min_samples_split",
            p.min_samples_split,
            "must be at least 2",
        ));
    }
    if p.min_samples_leaf < 1 {
        return Err(PipelineError::invalid_param(
            "min_samples_leaf",
            p.min_samples_leaf,
            "must be at least 1",
        ));
    }
    if p.max_depth == Some(0) {
        return Err(PipelineError::invalid_param("max_depth", 0, "must be at least 1 or None"));
    }
    Ok(())
}

// ─── Tree growing ─────────────────────────────────────────────────────────────

struct BestSplit {
    feature:   usize,
    threshold: f64,
    child_sse: f64,
}

struct TreeBuilder<'a> {
    x:            ArrayView2<'a, f64>,
    y:            &'a [f64],
    params:       TreeParams,
    max_features: usize,
    rng:          StdRng,
    features:     Vec<usize>,
    nodes:        Vec<TreeNode>,
    importances:  Vec<f64>,
    /// (feature value, target) pairs reused across splits
    scratch:      Vec<(f64, f64)>,
}

impl TreeBuilder<'_> {
    /// Grow the subtree for `samples`; returns its arena index.
    fn grow(&mut self, samples: Vec<usize>, depth: usize) -> usize {
        let n    = samples.len();
        let mean = samples.iter().map(|&i| self.y[i]).sum::<f64>() / n as f64;
        let sse  = samples.iter().map(|&i| (self.y[i] - mean).powi(2)).sum::<f64>();

        let idx = self.nodes.len();
        self.nodes.push(TreeNode::Leaf { value: mean });

        let p = self.params;
        if n < p.min_samples_split
            || n < 2 * p.min_samples_leaf
            || p.max_depth.is_some_and(|d| depth >= d)
            || sse <= f64::EPSILON
        {
            return idx;
        }

        let Some(split) = self.best_split(&samples) else {
            return idx;
        };

        self.importances[split.feature] += (sse - split.child_sse).max(0.0);

        let (left, right): (Vec<usize>, Vec<usize>) = samples
            .into_iter()
            .partition(|&i| self.x[[i, split.feature]] <= split.threshold);

        let left  = self.grow(left, depth + 1);
        let right = self.grow(right, depth + 1);

        self.nodes[idx] = TreeNode::Split {
            feature:   split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        idx
    }

    fn best_split(&mut self, samples: &[usize]) -> Option<BestSplit> {
        let n        = samples.len();
        let min_leaf = self.params.min_samples_leaf;

        self.features.shuffle(&mut self.rng);

        let mut best: Option<BestSplit> = None;
        let mut examined = 0;

        for fi in 0..self.features.len() {
            if examined >= self.max_features {
                break;
            }
            let feature = self.features[fi];

            self.scratch.clear();
            self.scratch
                .extend(samples.iter().map(|&i| (self.x[[i, feature]], self.y[i])));
            self.scratch.sort_unstable_by(|a, b| a.0.total_cmp(&b.0));

            // Constant features don't count towards max_features
            if self.scratch[0].0 >= self.scratch[n - 1].0 {
                continue;
            }
            examined += 1;

            let (total_sum, total_sq) = self
                .scratch
                .iter()
                .fold((0.0, 0.0), |(s, q), &(_, y)| (s + y, q + y * y));

            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for k in 0..n - 1 {
                let (value, y) = self.scratch[k];
                left_sum += y;
                left_sq  += y * y;

                let next = self.scratch[k + 1].0;
                if value >= next {
                    continue;
                }
                let n_left  = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq  = total_sq - left_sq;
                let child_sse = (left_sq - left_sum * left_sum / n_left as f64)
                    + (right_sq - right_sum * right_sum / n_right as f64);

                if best.as_ref().map_or(true, |b| child_sse < b.child_sse) {
                    let mut threshold = value + (next - value) / 2.0;
                    if threshold >= next || !threshold.is_finite() {
                        threshold = value;
                    }
                    best = Some(BestSplit { feature, threshold, child_sse });
                }
            }
        }

        best
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn step_data() -> (Array2<f64>, Vec<f64>) {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];
        (x, y)
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::All.resolve(18), 18);
        assert_eq!(MaxFeatures::Sqrt.resolve(18), 4);
        assert_eq!(MaxFeatures::Log2.resolve(18), 4);
        assert_eq!(MaxFeatures::Log2.resolve(1), 1);
        assert_eq!(MaxFeatures::Sqrt.to_string(), "sqrt");
    }

    #[test]
    fn test_learns_a_step_function() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new(TreeParams::default());
        tree.fit(&x, &y).unwrap();

        assert_eq!(tree.depth(), 1);
        let pred = tree.predict(x.view()).unwrap();
        assert_eq!(pred, y);

        // Threshold sits halfway between 3 and 10
        let probe = array![[6.4], [6.6]];
        assert_eq!(tree.predict(probe.view()).unwrap(), vec![0.0, 1.0]);
    }

    #[test]
    fn test_constant_target_is_a_single_leaf() {
        let (x, _) = step_data();
        let mut tree = DecisionTreeRegressor::new(TreeParams::default());
        tree.fit(&x, &[0.5; 6]).unwrap();
        assert_eq!(tree.node_count(), 1);
        assert!(tree.impurity_decrease().iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_max_depth_limits_growth() {
        let x = Array2::from_shape_fn((32, 1), |(i, _)| i as f64);
        let y: Vec<f64> = (0..32).map(|i| (i * i) as f64).collect();

        let mut shallow = DecisionTreeRegressor::new(TreeParams {
            max_depth: Some(2),
            ..TreeParams::default()
        });
        shallow.fit(&x, &y).unwrap();
        assert!(shallow.depth() <= 2);

        let mut deep = DecisionTreeRegressor::new(TreeParams::default());
        deep.fit(&x, &y).unwrap();
        assert!(deep.depth() > 2);
        // Fully grown tree memorises the training set
        assert_eq!(deep.predict(x.view()).unwrap(), y);
    }

    #[test]
    fn test_min_samples_leaf_is_respected() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new(TreeParams {
            min_samples_leaf: 4,
            ..TreeParams::default()
        });
        tree.fit(&x, &y).unwrap();
        // Any split would leave fewer than 4 rows on one side
        assert_eq!(tree.node_count(), 1);
    }

    #[test]
    fn test_importance_goes_to_informative_feature() {
        // Column 0 is noise-free signal, column 1 is constant
        let x = array![[1.0, 5.0], [2.0, 5.0], [8.0, 5.0], [9.0, 5.0]];
        let y = vec![1.0, 1.0, 4.0, 4.0];
        let mut tree = DecisionTreeRegressor::new(TreeParams::default());
        tree.fit(&x, &y).unwrap();
        let imp = tree.impurity_decrease();
        assert!(imp[0] > 0.0);
        assert_eq!(imp[1], 0.0);
    }

    #[test]
    fn test_same_seed_same_tree() {
        let x = Array2::from_shape_fn((40, 6), |(i, j)| ((i * 7 + j * 13) % 17) as f64);
        let y: Vec<f64> = (0..40).map(|i| (i % 5) as f64).collect();
        let params = TreeParams { max_features: MaxFeatures::Sqrt, ..TreeParams::default() };

        let mut a = DecisionTreeRegressor::new(params).with_seed(9);
        let mut b = DecisionTreeRegressor::new(params).with_seed(9);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(x.view()).unwrap(), b.predict(x.view()).unwrap());
    }

    #[test]
    fn test_predict_before_fit_and_wrong_width() {
        let tree = DecisionTreeRegressor::new(TreeParams::default());
        assert!(matches!(
            tree.predict(array![[1.0]].view()),
            Err(PipelineError::NotFitted(_))
        ));

        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new(TreeParams::default());
        tree.fit(&x, &y).unwrap();
        assert!(tree.predict(array![[1.0, 2.0]].view()).is_err());
    }

    #[test]
    fn test_fit_on_repeated_sample_indices() {
        // Bootstrap draws repeat rows; only rows 0 and 5 are used
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new(TreeParams::default());
        tree.fit_samples(x.view(), &y, vec![0, 0, 5, 5, 5]).unwrap();
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.predict(x.view()).unwrap(), vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let (x, y) = step_data();
        let mut tree = DecisionTreeRegressor::new(TreeParams {
            min_samples_split: 1,
            ..TreeParams::default()
        });
        assert!(matches!(
            tree.fit(&x, &y),
            Err(PipelineError::InvalidHyperparameter { .. })
        ));
    }
}
