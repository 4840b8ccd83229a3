//! Missing value imputation for numeric columns

use crate::data::float_column;
use crate::error::{KolosalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Strategy for filling missing numeric values
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ImputeStrategy {
    /// Mean of the observed training values
    Mean,
    /// Median of the observed training values
    Median,
    /// A fixed value
    Constant(f64),
}

/// Numeric imputer. A column with no observed values during fit imputes to 0.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Imputer {
    strategy: ImputeStrategy,
    columns: Vec<String>,
    fill_values: HashMap<String, f64>,
    is_fitted: bool,
}

impl Imputer {
    /// Create a new imputer
    pub fn new(strategy: ImputeStrategy) -> Self {
        Self {
            strategy,
            columns: Vec::new(),
            fill_values: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit the imputer to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.columns.clear();
        self.fill_values.clear();

        for col_name in columns {
            let ca: Float64Chunked = float_column(df, col_name)?.into_iter().collect();
            let fill = match &self.strategy {
                ImputeStrategy::Mean => ca.mean(),
                ImputeStrategy::Median => ca.median(),
                ImputeStrategy::Constant(v) => Some(*v),
            }
            .unwrap_or(0.0);

            self.columns.push(col_name.to_string());
            self.fill_values.insert(col_name.to_string(), fill);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Fill nulls in every fitted column
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }

        let mut result = df.clone();
        for col_name in &self.columns {
            let fill = self.fill_values[col_name];
            let filled: Vec<f64> = float_column(df, col_name)?
                .into_iter()
                .map(|v| v.unwrap_or(fill))
                .collect();
            result.with_column(Series::new(col_name.as_str().into(), filled))?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Fitted fill value for a column
    pub fn fill_value(&self, column: &str) -> Option<f64> {
        self.fill_values.get(column).copied()
    }
}
