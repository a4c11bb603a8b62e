// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Everything that touches the filesystem on behalf of the
// use cases:
//
//   model_store.rs — gzip + MessagePack model file, the
//                    post-save reload, the JSON run config
//
//   trial_log.rs   — one CSV row per search candidate,
//                    appended across runs
//
//   plots.rs       — SVG charts via plotters
//
// The ML layer never does I/O itself; it hands fitted values
// to these types.

/// Model persistence and the saved TrainConfig
pub mod model_store;

/// Hyperparameter search CSV log
pub mod trial_log;

pub mod plots;
