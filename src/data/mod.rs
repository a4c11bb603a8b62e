// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// Everything between the CSV file on disk and a model-ready
// feature table:
//
//   HR_comma_sep.csv
//       │
//       ▼
//   CsvLoader          → typed DataTable
//       │
//       ▼
//   normalize_column_names → legacy header spellings fixed
//       │
//       ▼
//   derive_features    → features + target + column roles,
//       │                with average_monthly_hours_per_year
//       ▼
//   train_test_split   → seeded 80/20 row indices
//   KFold              → cross-validation folds for the search
//
// Each step is independently testable.

/// Reads delimited files with the `csv` crate
pub mod loader;

/// Fixes the legacy HR column names
pub mod renamer;

/// Target extraction, column roles and the derived feature
pub mod features;

/// Seeded train/test split and K-fold cross-validation
pub mod splitter;
