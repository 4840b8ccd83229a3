//! Data loading for experiment tables

use super::MappingRules;
use crate::error::{KolosalError, Result};
use polars::prelude::*;
use std::fs::File;
use tracing::info;

/// Loads CSV, JSON and Parquet tables and applies mapping rules
#[derive(Debug, Clone)]
pub struct DataLoader {
    rules: MappingRules,
    infer_schema_length: Option<usize>,
}

impl Default for DataLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl DataLoader {
    /// Create a new data loader
    pub fn new() -> Self {
        Self {
            rules: MappingRules::default(),
            infer_schema_length: Some(1000),
        }
    }

    /// Builder method to set mapping rules
    pub fn with_rules(mut self, rules: MappingRules) -> Self {
        self.rules = rules;
        self
    }

    /// Load a CSV file
    pub fn load_csv(&self, path: &str) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| KolosalError::DataError(format!("{}: {}", path, e)))?;

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(self.infer_schema_length)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| KolosalError::DataError(e.to_string()))
    }

    /// Load a Parquet file
    pub fn load_parquet(&self, path: &str) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| KolosalError::DataError(format!("{}: {}", path, e)))?;

        ParquetReader::new(file)
            .finish()
            .map_err(|e| KolosalError::DataError(e.to_string()))
    }

    /// Load a JSON file (array of records or line-delimited)
    pub fn load_json(&self, path: &str) -> Result<DataFrame> {
        let file = File::open(path).map_err(|e| KolosalError::DataError(format!("{}: {}", path, e)))?;

        let format = if path.to_lowercase().ends_with(".jsonl") || path.to_lowercase().ends_with(".ndjson") {
            JsonFormat::JsonLines
        } else {
            JsonFormat::Json
        };

        JsonReader::new(file)
            .with_json_format(format)
            .finish()
            .map_err(|e| KolosalError::DataError(e.to_string()))
    }

    /// Detect the format from the extension, load, then apply the mapping rules
    pub fn load(&self, path: &str) -> Result<DataFrame> {
        let path_lower = path.to_lowercase();

        let df = if path_lower.ends_with(".parquet") || path_lower.ends_with(".pq") {
            self.load_parquet(path)?
        } else if path_lower.ends_with(".json")
            || path_lower.ends_with(".jsonl")
            || path_lower.ends_with(".ndjson")
        {
            self.load_json(path)?
        } else {
            self.load_csv(path)?
        };

        info!(path, rows = df.height(), cols = df.width(), "Loaded table");

        if self.rules.is_empty() {
            return Ok(df);
        }
        let mapped = self.rules.apply(df)?;
        info!(rows = mapped.height(), "Applied mapping rules");
        Ok(mapped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_load_csv_with_rules() {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "dismantled,flag,beached").unwrap();
        writeln!(file, "1,KNA,1").unwrap();
        writeln!(file, "0,NLD,0").unwrap();
        writeln!(file, "1,NLD,0").unwrap();
        file.flush().unwrap();

        let rules = MappingRules::new()
            .with_row_filter("dismantled", 1.0)
            .with_binarize("flag", vec!["KNA".to_string()]);
        let loader = DataLoader::new().with_rules(rules);
        let df = loader.load(file.path().to_str().unwrap()).unwrap();

        assert_eq!(df.height(), 2);
        let flags: Vec<Option<i32>> = df.column("flag").unwrap().i32().unwrap().into_iter().collect();
        assert_eq!(flags, vec![Some(1), Some(0)]);
    }

    #[test]
    fn test_missing_file() {
        let loader = DataLoader::new();
        assert!(matches!(
            loader.load("/nonexistent/table.csv"),
            Err(KolosalError::DataError(_))
        ));
    }
}
