// ============================================================
// Layer 4 — Column Name Normaliser
// ============================================================
// Rewrites the three legacy HR column names to their
// canonical spelling (see domain::schema::LEGACY_RENAMES).
//
// For each (legacy, canonical) pair:
//   legacy present                  → renamed, data untouched
//   legacy absent, canonical present → already normalised, no-op
//   neither present                  → MissingColumn error

use crate::domain::error::PipelineError;
use crate::domain::schema::LEGACY_RENAMES;
use crate::domain::table::DataTable;

/// Normalise legacy column names in place.
/// Returns how many columns were actually renamed.
pub fn normalize_column_names(table: &mut DataTable) -> Result<usize, PipelineError> {
    let mut renamed = 0;

    for (legacy, canonical) in LEGACY_RENAMES {
        if table.rename_column(legacy, canonical)? {
            tracing::debug!("Renamed column '{}' → '{}'", legacy, canonical);
            renamed += 1;
        } else if !table.contains(canonical) {
            return Err(PipelineError::missing(
                legacy,
                format!("expected '{legacy}' or '{canonical}' in the header"),
            ));
        }
    }

    Ok(renamed)
}
