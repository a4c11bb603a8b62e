// ============================================================
// Layer 3 — HR Dataset Schema
// ============================================================
// The fixed names the pipeline depends on, and the split of
// feature columns into numerical vs categorical roles.
//
// The raw HR export has three inconsistently named columns:
//
//   average_montly_hours → average_monthly_hours
//   time_spend_company   → time_spent_company
//   Department           → department
//
// Everything downstream uses the canonical (right-hand) names.

use serde::{Deserialize, Serialize};

use crate::domain::error::PipelineError;

/// The column being predicted.
pub const TARGET_COLUMN: &str = "satisfaction_level";

/// (legacy name, canonical name)
pub const LEGACY_RENAMES: [(&str, &str); 3] = [
    ("average_montly_hours", "average_monthly_hours"),
    ("time_spend_company",   "time_spent_company"),
    ("Department",           "department"),
];

/// Columns always treated as categorical, whatever their cell type.
pub const CATEGORICAL_COLUMNS: [&str; 2] = ["department", "salary"];

pub const MONTHLY_HOURS_COLUMN: &str = "average_monthly_hours";
pub const YEARLY_HOURS_COLUMN:  &str = "average_monthly_hours_per_year";
pub const MONTHS_PER_YEAR:      f64  = 12.0;

/// Which feature columns go to which preprocessing branch.
///
/// Both lists are ordered; that order is the order of the
/// encoded feature matrix.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnRoles {
    pub numerical:   Vec<String>,
    pub categorical: Vec<String>,
}

impl ColumnRoles {
    /// Build a role split, rejecting a column that appears twice.
    pub fn new(numerical: Vec<String>, categorical: Vec<String>) -> Result<Self, PipelineError> {
        let mut seen = std::collections::HashSet::new();
        for name in numerical.iter().chain(categorical.iter()) {
            if !seen.insert(name.as_str()) {
                return Err(PipelineError::Schema(format!(
                    "column '{name}' is assigned to more than one role"
                )));
            }
        }
        Ok(Self { numerical, categorical })
    }
}
