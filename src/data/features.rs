// ============================================================
// Layer 4 — Feature Deriver
// ============================================================
// Turns the normalised table into model inputs:
//
//   1. Pull out the target column (satisfaction_level)
//   2. Everything else is a feature
//   3. Split feature columns into roles:
//        categorical = department, salary (fixed)
//        numerical   = every other numeric column, file order
//   4. Derive average_monthly_hours_per_year = hours * 12
//      and append it to the table AND to the numerical role
//
// Every feature column must land in exactly one role. A text
// column that is not a declared categorical is rejected rather
// than silently dropped by the preprocessor.

use crate::domain::error::PipelineError;
use crate::domain::schema::{
    ColumnRoles, CATEGORICAL_COLUMNS, MONTHLY_HOURS_COLUMN, MONTHS_PER_YEAR, TARGET_COLUMN,
    YEARLY_HOURS_COLUMN,
};
use crate::domain::table::{Column, ColumnData, DataTable};

/// Model-ready features plus the target they predict.
#[derive(Debug, Clone)]
pub struct FeatureSet {
    pub features: DataTable,
    pub target:   Vec<f64>,
    pub roles:    ColumnRoles,
}

/// Split a training table into features, target and column roles.
pub fn derive_features(mut table: DataTable) -> Result<FeatureSet, PipelineError> {
    let target = match table.drop_column(TARGET_COLUMN) {
        Some(Column { data: ColumnData::Numeric(v), .. }) => v,
        Some(_) => {
            return Err(PipelineError::Schema(format!(
                "target column '{TARGET_COLUMN}' must be numeric"
            )))
        }
        None => return Err(PipelineError::missing(TARGET_COLUMN, "the target is required for training")),
    };

    let roles = classify_columns(&mut table)?;
    let features = add_yearly_hours(table)?;

    tracing::info!(
        "Features: {} numerical, {} categorical, {} rows",
        roles.numerical.len(),
        roles.categorical.len(),
        features.n_rows()
    );

    Ok(FeatureSet { features, target, roles })
}

/// Prepare a scoring table: drop the target if present and derive
/// the yearly-hours column. Roles come from the fitted model.
pub fn prepare_for_inference(
    mut table: DataTable,
) -> Result<(DataTable, Option<Vec<f64>>), PipelineError> {
    let target = match table.drop_column(TARGET_COLUMN) {
        Some(Column { data: ColumnData::Numeric(v), .. }) => Some(v),
        Some(_) => {
            return Err(PipelineError::Schema(format!(
                "target column '{TARGET_COLUMN}' must be numeric"
            )))
        }
        None => None,
    };

    for name in CATEGORICAL_COLUMNS {
        retype_categorical(&mut table, name)?;
    }

    Ok((add_yearly_hours(table)?, target))
}

/// Assign roles, retyping declared categoricals that happen to
/// be numeric (e.g. a salary band coded as 1/2/3).
fn classify_columns(table: &mut DataTable) -> Result<ColumnRoles, PipelineError> {
    let mut categorical = Vec::with_capacity(CATEGORICAL_COLUMNS.len());
    for name in CATEGORICAL_COLUMNS {
        if !table.contains(name) {
            return Err(PipelineError::missing(name, "declared categorical column is absent"));
        }
        retype_categorical(table, name)?;
        categorical.push(name.to_string());
    }

    let mut numerical = Vec::new();
    for column in table.columns() {
        if categorical.contains(&column.name) {
            continue;
        }
        if !column.data.is_numeric() {
            return Err(PipelineError::Schema(format!(
                "column '{}' is neither numeric nor a declared categorical",
                column.name
            )));
        }
        numerical.push(column.name.clone());
    }

    if table.contains(YEARLY_HOURS_COLUMN) {
        return Err(PipelineError::Schema(format!(
            "input already has a '{YEARLY_HOURS_COLUMN}' column"
        )));
    }
    numerical.push(YEARLY_HOURS_COLUMN.to_string());

    ColumnRoles::new(numerical, categorical)
}

fn retype_categorical(table: &mut DataTable, name: &str) -> Result<(), PipelineError> {
    let Some(column) = table.column(name) else {
        return Ok(());
    };
    if column.data.is_numeric() {
        let data = column.data.clone().into_categorical();
        table.replace_data(name, data)?;
    }
    Ok(())
}

fn add_yearly_hours(mut table: DataTable) -> Result<DataTable, PipelineError> {
    let yearly: Vec<f64> = table
        .numeric(MONTHLY_HOURS_COLUMN)?
        .iter()
        .map(|h| h * MONTHS_PER_YEAR)
        .collect();
    table.push_column(Column::numeric(YEARLY_HOURS_COLUMN, yearly))?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{loader::parse_csv, renamer::normalize_column_names};
    use std::collections::BTreeSet;

    const THREE_ROWS: &str = "\
satisfaction_level,last_evaluation,number_project,average_montly_hours,time_spend_company,Work_accident,left,promotion_last_5years,Department,salary
0.38,0.53,2,157,3,0,1,0,sales,low
0.80,0.86,5,262,6,0,1,0,technical,medium
0.72,0.87,5,223,5,0,0,1,IT,high
";

    fn load_three_rows() -> (DataTable, FeatureSet) {
        let mut raw = parse_csv(THREE_ROWS.as_bytes(), b',').unwrap();
        normalize_column_names(&mut raw).unwrap();
        let set = derive_features(raw.clone()).unwrap();
        (raw, set)
    }

    #[test]
    fn test_end_to_end_three_row_table() {
        let (raw, set) = load_three_rows();

        // input columns minus target, plus one derived column
        assert_eq!(set.features.n_cols(), raw.n_cols() - 1 + 1);
        assert_eq!(set.features.n_rows(), 3);
        assert_eq!(set.target, vec![0.38, 0.80, 0.72]);
        assert_eq!(
            set.features.numeric(YEARLY_HOURS_COLUMN).unwrap(),
            &[157.0 * 12.0, 262.0 * 12.0, 223.0 * 12.0]
        );
    }

    #[test]
    fn test_yearly_hours_is_exactly_twelve_times_monthly() {
        let (_, set) = load_three_rows();
        let monthly = set.features.numeric(MONTHLY_HOURS_COLUMN).unwrap();
        let yearly  = set.features.numeric(YEARLY_HOURS_COLUMN).unwrap();
        for (m, y) in monthly.iter().zip(yearly) {
            assert_eq!(*y, m * 12.0);
        }
    }

    #[test]
    fn test_roles_are_disjoint_and_cover_all_columns() {
        let (raw, set) = load_three_rows();

        let numerical: BTreeSet<&str>   = set.roles.numerical.iter().map(String::as_str).collect();
        let categorical: BTreeSet<&str> = set.roles.categorical.iter().map(String::as_str).collect();
        assert!(numerical.is_disjoint(&categorical));

        let mut union: BTreeSet<&str> = numerical.union(&categorical).copied().collect();
        union.insert(TARGET_COLUMN);

        let mut expected: BTreeSet<&str> = raw.column_names().into_iter().collect();
        expected.insert(YEARLY_HOURS_COLUMN);
        assert_eq!(union, expected);

        assert_eq!(set.roles.categorical, vec!["department", "salary"]);
        assert_eq!(set.roles.numerical.last().unwrap(), YEARLY_HOURS_COLUMN);
    }

    #[test]
    fn test_numeric_coded_categorical_is_retyped() {
        let text = "satisfaction_level,average_monthly_hours,time_spent_company,department,salary\n\
                    0.5,100,2,1,1\n0.6,120,3,2,3\n";
        let raw = parse_csv(text.as_bytes(), b',').unwrap();
        let set = derive_features(raw).unwrap();
        assert_eq!(set.features.categorical("department").unwrap(), &["1", "2"]);
        assert!(!set.roles.numerical.contains(&"salary".to_string()));
    }

    #[test]
    fn test_undeclared_text_column_is_rejected() {
        let text = "satisfaction_level,average_monthly_hours,department,salary,name\n\
                    0.5,100,sales,low,ann\n";
        let raw = parse_csv(text.as_bytes(), b',').unwrap();
        assert!(matches!(derive_features(raw), Err(PipelineError::Schema(_))));
    }

    #[test]
    fn test_missing_target_is_reported() {
        let text = "average_monthly_hours,department,salary\n100,sales,low\n";
        let raw = parse_csv(text.as_bytes(), b',').unwrap();
        assert!(matches!(
            derive_features(raw),
            Err(PipelineError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_inference_table_without_target() {
        let text = "average_monthly_hours,department,salary\n100,sales,low\n";
        let raw = parse_csv(text.as_bytes(), b',').unwrap();
        let (features, target) = prepare_for_inference(raw).unwrap();
        assert!(target.is_none());
        assert_eq!(features.numeric(YEARLY_HOURS_COLUMN).unwrap(), &[1200.0]);
    }
}
