// ============================================================
// Layer 4 — CSV Loader
// ============================================================
// Reads a delimited text file with a header row into a
// DataTable using the `csv` crate.
//
// Column types are inferred after the whole file is read:
//   - every cell parses as f64  → Numeric
//   - anything else             → Categorical (raw strings)
//
// This matches the usual "int64/float64 columns are numeric"
// rule for HR exports: `satisfaction_level`, `number_project`,
// ... become numeric; `Department` and `salary` stay strings.
//
// Cells are trimmed. Rows with the wrong number of fields are
// a hard error (csv reports the line number).

use anyhow::{Context, Result};
use std::{io::Read, path::PathBuf};

use crate::domain::error::PipelineError;
use crate::domain::table::{Column, DataTable};
use crate::domain::traits::TableSource;

/// Loads a delimited file from disk.
pub struct CsvLoader {
    path:      PathBuf,
    delimiter: u8,
}

impl CsvLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), delimiter: b',' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }
}

impl TableSource for CsvLoader {
    fn load(&self) -> Result<DataTable> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("Cannot open dataset '{}'", self.path.display()))?;

        let table = parse_csv(file, self.delimiter)
            .with_context(|| format!("Cannot parse dataset '{}'", self.path.display()))?;

        tracing::info!(
            "Loaded '{}': {} rows x {} columns",
            self.path.display(),
            table.n_rows(),
            table.n_cols()
        );
        tracing::debug!("Columns: {}", table.column_names().join(", "));
        Ok(table)
    }
}

/// The csv crate takes a single byte; anything outside ASCII is rejected.
pub fn ascii_delimiter(c: char) -> Result<u8> {
    u8::try_from(c)
        .ok()
        .filter(u8::is_ascii)
        .with_context(|| format!("Delimiter '{c}' must be a single ASCII character"))
}

/// Parse CSV text from any reader into a typed table.
pub fn parse_csv<R: Read>(reader: R, delimiter: u8) -> Result<DataTable> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = rdr
        .headers()
        .context("Cannot read header row")?
        .iter()
        .map(str::to_string)
        .collect();

    if headers.is_empty() {
        return Err(PipelineError::Schema("header row is empty".into()).into());
    }

    // One Vec<String> per column, filled row by row
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in rdr.records() {
        let record = record.context("Malformed CSV record")?;
        for (col, field) in cells.iter_mut().zip(record.iter()) {
            col.push(field.to_string());
        }
    }

    if cells[0].is_empty() {
        return Err(PipelineError::Schema("file has a header but no data rows".into()).into());
    }

    let columns = headers
        .into_iter()
        .zip(cells)
        .map(|(name, raw)| infer_column(name, raw))
        .collect();

    Ok(DataTable::from_columns(columns)?)
}

/// Numeric if every cell parses, otherwise categorical.
fn infer_column(name: String, raw: Vec<String>) -> Column {
    let parsed: Option<Vec<f64>> = raw.iter().map(|s| s.parse::<f64>().ok()).collect();
    match parsed {
        Some(values) => Column::numeric(name, values),
        None => {
            tracing::debug!("Column '{}' inferred as categorical", name);
            Column::categorical(name, raw)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::table::ColumnData;

    const HR_SAMPLE: &str = "\
satisfaction_level,last_evaluation,number_project,average_montly_hours,time_spend_company,Work_accident,left,promotion_last_5years,Department,salary
0.38,0.53,2,157,3,0,1,0,sales,low
0.80,0.86,5,262,6,0,1,0,sales,medium
0.11,0.88,7,272,4,0,1,0,IT,medium
";

    #[test]
    fn test_infers_numeric_and_categorical() {
        let t = parse_csv(HR_SAMPLE.as_bytes(), b',').unwrap();
        assert_eq!(t.n_rows(), 3);
        assert_eq!(t.n_cols(), 10);
        assert_eq!(t.numeric("average_montly_hours").unwrap(), &[157.0, 262.0, 272.0]);
        assert_eq!(t.categorical("Department").unwrap(), &["sales", "sales", "IT"]);
        assert!(matches!(
            t.column("salary").unwrap().data,
            ColumnData::Categorical(_)
        ));
    }

    #[test]
    fn test_custom_delimiter_and_trimming() {
        let text = "a; b\n 1 ;x\n2;y\n";
        let t = parse_csv(text.as_bytes(), b';').unwrap();
        assert_eq!(t.column_names(), vec!["a", "b"]);
        assert_eq!(t.numeric("a").unwrap(), &[1.0, 2.0]);
    }

    #[test]
    fn test_ascii_delimiter_accepts_bytes_only() {
        assert_eq!(ascii_delimiter(';').unwrap(), b';');
        assert_eq!(ascii_delimiter('\t').unwrap(), b'\t');
        assert!(ascii_delimiter('é').is_err());
        assert!(ascii_delimiter('→').is_err());
    }

    #[test]
    fn test_header_only_is_an_error() {
        assert!(parse_csv("a,b\n".as_bytes(), b',').is_err());
    }

    #[test]
    fn test_ragged_row_is_an_error() {
        assert!(parse_csv("a,b\n1,2\n3\n".as_bytes(), b',').is_err());
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = CsvLoader::new("definitely/not/here.csv").load().unwrap_err();
        assert!(format!("{err:#}").contains("definitely/not/here.csv"));
    }
}
