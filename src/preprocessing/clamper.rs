//! Rare-category clamping

use crate::data::label_column;
use crate::error::{KolosalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Collapses infrequent categories into a single `other` label.
///
/// Categories are ranked by training count (descending, ties lexical). With `n`
/// distinct categories and relative frequencies `p_i`, the retained set is the
/// ranked prefix that ends just before the first category whose `p_i` is
/// closest to `1/n`. Everything else, including unseen and missing values,
/// becomes the other label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Clamper {
    other_label: String,
    columns: Vec<String>,
    /// Retained categories per column, in rank order
    retained: HashMap<String, Vec<String>>,
    is_fitted: bool,
}

impl Default for Clamper {
    fn default() -> Self {
        Self::new("other")
    }
}

impl Clamper {
    /// Create a new clamper with the given replacement label
    pub fn new(other_label: impl Into<String>) -> Self {
        Self {
            other_label: other_label.into(),
            columns: Vec::new(),
            retained: HashMap::new(),
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.columns.clear();
        self.retained.clear();

        for col_name in columns {
            let values = label_column(df, col_name)?;
            let keep = Self::values_to_keep(&values);
            debug!(column = %col_name, retained = keep.len(), "Fitted clamper");

            self.columns.push(col_name.to_string());
            self.retained.insert(col_name.to_string(), keep);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every fitted column with its clamped String version
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }

        let mut result = df.clone();
        for col_name in &self.columns {
            let keep: HashSet<&str> = self.retained[col_name].iter().map(String::as_str).collect();
            let clamped: StringChunked = label_column(df, col_name)?
                .iter()
                .map(|v| match v {
                    Some(v) if keep.contains(v.as_str()) => Some(v.as_str()),
                    _ => Some(self.other_label.as_str()),
                })
                .collect();
            result.with_column(clamped.with_name(col_name.as_str().into()).into_series())?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Retained categories for a column, in rank order
    pub fn retained(&self, column: &str) -> Option<&[String]> {
        self.retained.get(column).map(Vec::as_slice)
    }

    fn values_to_keep(values: &[Option<String>]) -> Vec<String> {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for v in values.iter().flatten() {
            *counts.entry(v.as_str()).or_insert(0) += 1;
        }
        if counts.is_empty() {
            return Vec::new();
        }

        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        let total: usize = ranked.iter().map(|(_, c)| c).sum();
        let threshold = 1.0 / ranked.len() as f64;

        let mut cut = 0;
        let mut best_gap = f64::INFINITY;
        for (i, (_, count)) in ranked.iter().enumerate() {
            let gap = (*count as f64 / total as f64 - threshold).abs();
            if gap < best_gap {
                best_gap = gap;
                cut = i;
            }
        }

        ranked[..cut].iter().map(|(v, _)| v.to_string()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> DataFrame {
        // a: 5, b: 3, c: 1, d: 1 -> p = [.5, .3, .1, .1], 1/n = .25, closest is b
        df!("cat" => ["a", "a", "a", "a", "a", "b", "b", "b", "c", "d"]).unwrap()
    }

    #[test]
    fn test_retained_prefix() {
        let mut clamper = Clamper::default();
        clamper.fit(&frame(), &["cat"]).unwrap();
        assert_eq!(clamper.retained("cat").unwrap(), &["a".to_string()]);
    }

    #[test]
    fn test_unseen_and_missing_become_other() {
        let mut clamper = Clamper::default();
        clamper.fit(&frame(), &["cat"]).unwrap();

        let test = df!("cat" => [Some("a"), Some("zzz"), None, Some("b")]).unwrap();
        let out = clamper.transform(&test).unwrap();
        let values: Vec<Option<&str>> = out.column("cat").unwrap().str().unwrap().into_iter().collect();
        assert_eq!(values, vec![Some("a"), Some("other"), Some("other"), Some("other")]);
    }

    #[test]
    fn test_transform_is_idempotent() {
        let mut clamper = Clamper::default();
        let once = clamper.fit_transform(&frame(), &["cat"]).unwrap();
        let twice = clamper.transform(&once).unwrap();
        assert!(once.equals(&twice));
    }

    #[test]
    fn test_uniform_categories_clamp_everything() {
        // every p_i equals 1/n, so the first category is closest and nothing is kept
        let df = df!("cat" => ["x", "y", "z"]).unwrap();
        let mut clamper = Clamper::default();
        clamper.fit(&df, &["cat"]).unwrap();
        assert!(clamper.retained("cat").unwrap().is_empty());
    }

    #[test]
    fn test_integer_categories() {
        let df = df!("code" => [1i32, 1, 1, 2, 3]).unwrap();
        let mut clamper = Clamper::default();
        let out = clamper.fit_transform(&df, &["code"]).unwrap();
        assert_eq!(out.column("code").unwrap().dtype(), &DataType::String);
    }
}
