// ============================================================
// Layer 3 — Pipeline Error Taxonomy
// ============================================================
// Every failure the pipeline can detect on its own is one of
// these variants. I/O and CSV parse failures are NOT listed
// here; they bubble up through anyhow with file context.
//
// The application layer wraps these in anyhow::Error, so the
// CLI prints them with the full context chain.

use thiserror::Error;

/// Errors raised by the data, preprocessing and modelling layers.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A column the pipeline depends on is not in the table.
    #[error("missing column '{column}': {hint}")]
    MissingColumn { column: String, hint: String },

    /// The table is structurally wrong (ragged, duplicate names, wrong type...).
    #[error("schema mismatch: {0}")]
    Schema(String),

    /// A categorical value was not seen when the encoder was fitted.
    #[error("unknown category '{value}' in column '{column}'")]
    UnknownCategory { column: String, value: String },

    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: String, actual: String },

    #[error("invalid hyperparameter {param}={value}: {constraint}")]
    InvalidHyperparameter {
        param: String,
        value: String,
        constraint: String,
    },

    #[error("{0} has not been fitted")]
    NotFitted(&'static str),

    #[error("hyperparameter search failed: {0}")]
    Search(String),

    /// The persisted model blob is not one this build can read.
    #[error("unsupported model format: {0}")]
    ModelFormat(String),
}

impl PipelineError {
    pub fn missing(column: impl Into<String>, hint: impl Into<String>) -> Self {
        Self::MissingColumn {
            column: column.into(),
            hint: hint.into(),
        }
    }

    pub fn invalid_param(
        param: impl Into<String>,
        value: impl ToString,
        constraint: impl Into<String>,
    ) -> Self {
        Self::InvalidHyperparameter {
            param: param.into(),
            value: value.to_string(),
            constraint: constraint.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_column() {
        let err = PipelineError::missing("salary", "expected a categorical column");
        assert!(err.to_string().contains("'salary'"));

        let err = PipelineError::UnknownCategory {
            column: "department".into(),
            value:  "legal".into(),
        };
        assert_eq!(
            err.to_string(),
            "unknown category 'legal' in column 'department'"
        );
    }

    #[test]
    fn test_invalid_param_formats_value() {
        let err = PipelineError::invalid_param("cv", 1, "must be at least 2");
        assert_eq!(err.to_string(), "invalid hyperparameter cv=1: must be at least 2");
    }
}
