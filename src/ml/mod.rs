// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// Everything that learns from or scores the feature table:
//
//   preprocess.rs — StandardScaler + drop-first OneHotEncoder,
//                   routed by column role (ColumnTransformer)
//
//   tree.rs       — CART regression tree (variance criterion)
//
//   forest.rs     — bootstrap-aggregated trees, fitted in
//                   parallel with rayon
//
//   pipeline.rs   — preprocessing + forest as one fitted,
//                   serialisable unit
//
//   metrics.rs    — MSE, R², the evaluation report line
//
//   search.rs     — randomized search with K-fold CV
//
// No file I/O happens here; persistence lives in infra.

pub mod preprocess;

/// Single regression tree
pub mod tree;

/// Random forest regressor
pub mod forest;

pub mod pipeline;

pub mod metrics;

/// Randomized hyperparameter search
pub mod search;
