//! Dataset loading utilities

use crate::error::{CardspendError, Result};
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// Loader for the training/evaluation CSV dataset.
pub struct DatasetLoader {
    infer_schema_rows: usize,
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DatasetLoader {
    pub fn new() -> Self {
        Self {
            infer_schema_rows: 1000,
        }
    }

    /// Set how many rows to scan for schema inference.
    pub fn with_infer_schema_rows(mut self, rows: usize) -> Self {
        self.infer_schema_rows = rows;
        self
    }

    /// Load a CSV file with a header row.
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<DataFrame> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            CardspendError::Data(format!("cannot open {}: {e}", path.display()))
        })?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_rows))
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| CardspendError::Data(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "age,income,owner").unwrap();
        writeln!(file, "35,4.5,yes").unwrap();
        writeln!(file, "42,3.1,no").unwrap();
        file.flush().unwrap();

        let df = DatasetLoader::new().load_csv(file.path()).unwrap();
        assert_eq!(df.height(), 2);
        assert_eq!(df.width(), 3);
    }

    #[test]
    fn test_missing_file() {
        let result = DatasetLoader::new().load_csv("does_not_exist.csv");
        assert!(result.is_err());
    }
}
