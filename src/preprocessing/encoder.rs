//! One-hot categorical encoding

use crate::data::label_column;
use crate::error::{KolosalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One-hot encoder with categories sorted lexically.
///
/// Categories not seen during fit (and nulls) encode as all zeros.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    columns: Vec<String>,
    categories: HashMap<String, Vec<String>>,
    is_fitted: bool,
}

impl Default for OneHotEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl OneHotEncoder {
    /// Create a new encoder
    pub fn new() -> Self {
        Self {
            columns: Vec::new(),
            categories: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit the encoder to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.columns.clear();
        self.categories.clear();

        for col_name in columns {
            let values = label_column(df, col_name)?;
            let categories: BTreeSet<String> = values.into_iter().flatten().collect();
            self.columns.push(col_name.to_string());
            self.categories
                .insert(col_name.to_string(), categories.into_iter().collect());
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Encode the fitted columns; returns only the indicator columns
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }

        let mut encoded: Vec<Column> = Vec::with_capacity(self.n_outputs());
        for col_name in &self.columns {
            let values = label_column(df, col_name)?;
            for category in &self.categories[col_name] {
                let indicator: Vec<f64> = values
                    .iter()
                    .map(|v| if v.as_deref() == Some(category.as_str()) { 1.0 } else { 0.0 })
                    .collect();
                encoded.push(Column::new(
                    format!("{}_{}", col_name, category).into(),
                    indicator,
                ));
            }
        }

        if encoded.is_empty() {
            return Ok(DataFrame::empty());
        }
        Ok(DataFrame::new(encoded)?)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Learned categories for a column
    pub fn categories(&self, column: &str) -> Option<&[String]> {
        self.categories.get(column).map(Vec::as_slice)
    }

    /// Output column names in order
    pub fn feature_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .flat_map(|col| {
                self.categories[col]
                    .iter()
                    .map(move |cat| format!("{}_{}", col, cat))
            })
            .collect()
    }

    fn n_outputs(&self) -> usize {
        self.categories.values().map(Vec::len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_onehot_sorted_categories() {
        let df = df!("color" => ["red", "blue", "green", "blue"]).unwrap();
        let mut encoder = OneHotEncoder::new();
        let out = encoder.fit_transform(&df, &["color"]).unwrap();

        assert_eq!(
            encoder.feature_names(),
            vec!["color_blue", "color_green", "color_red"]
        );
        let blue: Vec<Option<f64>> = out.column("color_blue").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(blue, vec![Some(0.0), Some(1.0), Some(0.0), Some(1.0)]);
    }

    #[test]
    fn test_unknown_category_is_all_zero() {
        let train = df!("color" => ["red", "blue"]).unwrap();
        let test = df!("color" => ["purple"]).unwrap();

        let mut encoder = OneHotEncoder::new();
        encoder.fit(&train, &["color"]).unwrap();
        let out = encoder.transform(&test).unwrap();

        for name in encoder.feature_names() {
            assert_eq!(out.column(&name).unwrap().f64().unwrap().get(0), Some(0.0));
        }
    }
}
