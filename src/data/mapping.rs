//! Dataset-specific value mapping applied right after loading

use super::{float_column, label_column};
use crate::error::{KolosalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Map a column to 1 for listed values and 0 for everything else (nulls included)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BinarizeRule {
    pub column: String,
    pub positive_values: Vec<String>,
}

/// Keep only rows where a numeric column equals a value
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowFilter {
    pub column: String,
    pub equals: f64,
}

/// Mapping rules for raw experiment tables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MappingRules {
    /// Row filter applied before anything else
    pub row_filter: Option<RowFilter>,
    /// Protected attribute binarization
    pub binarize: Vec<BinarizeRule>,
    /// Categorical columns whose missing-like values are normalized
    pub normalize_missing: Vec<String>,
    /// Replacement label for missing-like values
    pub missing_label: String,
    /// Case-insensitive substrings marking a value as missing
    pub missing_substrings: Vec<String>,
    /// Case-insensitive exact values marking a value as missing
    pub missing_exact: Vec<String>,
}

impl Default for MappingRules {
    fn default() -> Self {
        Self {
            row_filter: None,
            binarize: Vec::new(),
            normalize_missing: Vec::new(),
            missing_label: "missing".to_string(),
            missing_substrings: vec!["unknown".to_string(), "unspecified".to_string()],
            missing_exact: vec!["unk".to_string()],
        }
    }
}

impl MappingRules {
    /// Create rules that leave the table untouched
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to keep only rows where `column == value`
    pub fn with_row_filter(mut self, column: impl Into<String>, equals: f64) -> Self {
        self.row_filter = Some(RowFilter {
            column: column.into(),
            equals,
        });
        self
    }

    /// Builder method to binarize a column against a list of positive values
    pub fn with_binarize(mut self, column: impl Into<String>, positive_values: Vec<String>) -> Self {
        self.binarize.push(BinarizeRule {
            column: column.into(),
            positive_values,
        });
        self
    }

    /// Builder method to normalize missing-like categories in the given columns
    pub fn with_normalize_missing(mut self, columns: Vec<String>) -> Self {
        self.normalize_missing = columns;
        self
    }

    /// Whether any rule is configured
    pub fn is_empty(&self) -> bool {
        self.row_filter.is_none() && self.binarize.is_empty() && self.normalize_missing.is_empty()
    }

    /// Apply the rules in order: row filter, binarization, missing normalization
    pub fn apply(&self, df: DataFrame) -> Result<DataFrame> {
        let mut df = match &self.row_filter {
            Some(filter) => self.filter_rows(&df, filter)?,
            None => df,
        };

        for rule in &self.binarize {
            let values = label_column(&df, &rule.column)?;
            let mapped: Vec<i32> = values
                .iter()
                .map(|v| match v {
                    Some(v) if rule.positive_values.iter().any(|p| p == v) => 1,
                    _ => 0,
                })
                .collect();
            let positives = mapped.iter().filter(|&&v| v == 1).count();
            debug!(column = %rule.column, positives, "Binarized column");
            df.with_column(Series::new(rule.column.as_str().into(), mapped))?;
        }

        for name in &self.normalize_missing {
            let values = label_column(&df, name)?;
            let normalized: StringChunked = values
                .iter()
                .map(|v| Some(self.normalize_value(v.as_deref())))
                .collect();
            df.with_column(normalized.with_name(name.as_str().into()).into_series())?;
        }

        Ok(df)
    }

    fn filter_rows(&self, df: &DataFrame, filter: &RowFilter) -> Result<DataFrame> {
        let values = float_column(df, &filter.column).map_err(|err| match err {
            KolosalError::PreprocessingError(msg) => KolosalError::DataError(msg),
            other => other,
        })?;
        let mask: BooleanChunked = values
            .iter()
            .map(|v| *v == Some(filter.equals))
            .collect();
        let filtered = df.filter(&mask)?;
        debug!(
            column = %filter.column,
            kept = filtered.height(),
            dropped = df.height() - filtered.height(),
            "Applied row filter"
        );
        Ok(filtered)
    }

    fn normalize_value<'a>(&'a self, value: Option<&'a str>) -> &'a str {
        let Some(value) = value else {
            return &self.missing_label;
        };
        let lower = value.to_lowercase();
        let missing = self.missing_substrings.iter().any(|s| lower.contains(s.as_str()))
            || self.missing_exact.iter().any(|s| lower == *s);
        if missing {
            &self.missing_label
        } else {
            value
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_rules_are_empty() {
        let rules = MappingRules::default();
        assert!(rules.is_empty());
        assert_eq!(rules.missing_label, "missing");
    }

    #[test]
    fn test_binarize() {
        let df = df!("flag" => [Some("KNA"), Some("NLD"), None, Some("COM")]).unwrap();
        let rules = MappingRules::new()
            .with_binarize("flag", vec!["KNA".to_string(), "COM".to_string()]);
        let out = rules.apply(df).unwrap();
        let col = out.column("flag").unwrap().i32().unwrap();
        let values: Vec<Option<i32>> = col.into_iter().collect();
        assert_eq!(values, vec![Some(1), Some(0), Some(0), Some(1)]);
    }

    #[test]
    fn test_normalize_missing() {
        let df = df!("vessel" => [Some("Tanker"), None, Some("Unknown type"), Some("UNK"), Some("Unspecified")]).unwrap();
        let rules = MappingRules::new().with_normalize_missing(vec!["vessel".to_string()]);
        let out = rules.apply(df).unwrap();
        let col = out.column("vessel").unwrap().str().unwrap();
        let values: Vec<Option<&str>> = col.into_iter().collect();
        assert_eq!(
            values,
            vec![Some("Tanker"), Some("missing"), Some("missing"), Some("missing"), Some("missing")]
        );
    }

    #[test]
    fn test_row_filter() {
        let df = df!(
            "dismantled" => [1i32, 0, 1],
            "x" => [1.0, 2.0, 3.0]
        )
        .unwrap();
        let rules = MappingRules::new().with_row_filter("dismantled", 1.0);
        let out = rules.apply(df).unwrap();
        assert_eq!(out.height(), 2);
    }
}
