// ============================================================
// Layer 2 — Application / Use Cases
// ============================================================
// Orchestrates the other layers to reach one goal each:
// training a model, or scoring new rows with a saved one.
//
// Rules for this layer:
//   - No ML math here (that's Layer 5)
//   - No printing here (that's Layer 1)
//   - Only workflow coordination

/// Load, explore, fit, search, save, reload
pub mod train_use_case;

/// Score a CSV with a saved model
pub mod predict_use_case;
