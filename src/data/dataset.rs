//! Dataset schema and aligned row storage

use super::{float_column, label_column, take_rows};
use crate::error::{KolosalError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Label used for protected values that are null in the source table
const MISSING_PROTECTED: &str = "missing";

/// Which columns play which role in an experiment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSchema {
    /// Binary target column (values 0/1)
    pub target: String,
    /// Protected attribute columns; the first one drives stratification
    pub protected: Vec<String>,
    /// Predictor columns; empty means every remaining column
    #[serde(default)]
    pub predictors: Vec<String>,
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self {
            target: "target".to_string(),
            protected: Vec::new(),
            predictors: Vec::new(),
        }
    }
}

impl DatasetSchema {
    /// Create a schema for the given target column
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            ..Default::default()
        }
    }

    /// Builder method to set the protected columns
    pub fn with_protected(mut self, columns: Vec<String>) -> Self {
        self.protected = columns;
        self
    }

    /// Builder method to set the predictor columns
    pub fn with_predictors(mut self, columns: Vec<String>) -> Self {
        self.predictors = columns;
        self
    }

    /// Primary protected column
    pub fn primary_protected(&self) -> Result<&str> {
        self.protected
            .first()
            .map(String::as_str)
            .ok_or_else(|| KolosalError::ConfigError("at least one protected column is required".to_string()))
    }

    /// Resolve the predictor list against a frame, dropping target and protected columns
    pub fn resolve_predictors(&self, df: &DataFrame) -> Vec<String> {
        let candidates: Vec<String> = if self.predictors.is_empty() {
            df.get_column_names()
                .into_iter()
                .map(|name| name.to_string())
                .collect()
        } else {
            self.predictors.clone()
        };

        candidates
            .into_iter()
            .filter(|name| {
                let excluded = *name == self.target || self.protected.contains(name);
                if excluded {
                    debug!(column = %name, "Excluding target/protected column from predictors");
                }
                !excluded
            })
            .collect()
    }
}

/// Predictors, labels and protected attributes kept aligned by row
#[derive(Debug, Clone)]
pub struct Dataset {
    schema: DatasetSchema,
    features: DataFrame,
    labels: Array1<f64>,
    /// One vector of string values per protected column
    protected: Vec<Vec<String>>,
    /// Primary protected column as 0/1
    protected_indicator: Array1<f64>,
}

impl Dataset {
    /// Build a dataset from a frame, validating every declared column
    pub fn from_frame(df: &DataFrame, schema: DatasetSchema) -> Result<Self> {
        schema.primary_protected()?;

        let labels = Self::extract_labels(df, &schema.target)?;

        let mut protected = Vec::with_capacity(schema.protected.len());
        for name in &schema.protected {
            let values = label_column(df, name).or_else(|err| match err {
                // Protected attributes may legitimately be stored as floats (e.g. 0.0/1.0)
                KolosalError::PreprocessingError(_) => float_column(df, name).map(|values| {
                    values
                        .into_iter()
                        .map(|v| v.map(|x| format!("{}", x)))
                        .collect()
                }),
                other => Err(other),
            })?;
            protected.push(
                values
                    .into_iter()
                    .map(|v| v.unwrap_or_else(|| MISSING_PROTECTED.to_string()))
                    .collect::<Vec<_>>(),
            );
        }

        let predictors = schema.resolve_predictors(df);
        if predictors.is_empty() {
            return Err(KolosalError::ValidationError(
                "no predictor columns left after excluding target and protected".to_string(),
            ));
        }
        for name in &predictors {
            if df.column(name).is_err() {
                return Err(KolosalError::FeatureNotFound(name.clone()));
            }
        }
        let features = df.select(predictors.iter().map(String::as_str))?;
        let protected_indicator = Self::indicator(&protected[0]);

        debug!(
            rows = df.height(),
            predictors = predictors.len(),
            protected = schema.protected.len(),
            "Dataset assembled"
        );

        Ok(Self {
            schema,
            features,
            labels,
            protected,
            protected_indicator,
        })
    }

    fn extract_labels(df: &DataFrame, target: &str) -> Result<Array1<f64>> {
        let values = float_column(df, target).map_err(|err| match err {
            KolosalError::FeatureNotFound(name) => {
                KolosalError::DataError(format!("target column '{}' not found", name))
            }
            other => other,
        })?;

        let mut labels = Vec::with_capacity(values.len());
        for (row, value) in values.into_iter().enumerate() {
            match value {
                Some(v) if v == 0.0 || v == 1.0 => labels.push(v),
                Some(v) => {
                    return Err(KolosalError::DataError(format!(
                        "target '{}' must be binary 0/1, found {} at row {}",
                        target, v, row
                    )))
                }
                None => {
                    return Err(KolosalError::DataError(format!(
                        "target '{}' is missing at row {}",
                        target, row
                    )))
                }
            }
        }
        Ok(Array1::from_vec(labels))
    }

    /// 1.0 for every value other than the lexically smallest one
    fn indicator(values: &[String]) -> Array1<f64> {
        let reference = values
            .iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .next()
            .cloned();
        values
            .iter()
            .map(|v| if Some(v) == reference.as_ref() { 0.0 } else { 1.0 })
            .collect()
    }

    /// Number of rows
    pub fn n_samples(&self) -> usize {
        self.labels.len()
    }

    pub fn schema(&self) -> &DatasetSchema {
        &self.schema
    }

    /// Predictor columns only
    pub fn features(&self) -> &DataFrame {
        &self.features
    }

    pub fn labels(&self) -> &Array1<f64> {
        &self.labels
    }

    /// String values of every protected column
    pub fn protected_columns(&self) -> &[Vec<String>] {
        &self.protected
    }

    /// String values of the primary protected column
    pub fn primary_protected(&self) -> &[String] {
        &self.protected[0]
    }

    /// Primary protected column encoded as 0/1
    pub fn protected_indicator(&self) -> &Array1<f64> {
        &self.protected_indicator
    }

    /// Joint stratification key `label|protected` per row
    pub fn stratification_keys(&self) -> Vec<String> {
        self.labels
            .iter()
            .zip(self.primary_protected())
            .map(|(&y, s)| format!("{}|{}", y as i64, s))
            .collect()
    }

    /// Rows at the given positions, in order
    pub fn subset(&self, indices: &[usize]) -> Result<Self> {
        let n = self.n_samples();
        if let Some(&bad) = indices.iter().find(|&&i| i >= n) {
            return Err(KolosalError::DataError(format!(
                "row index {} out of bounds for {} rows",
                bad, n
            )));
        }

        Ok(Self {
            schema: self.schema.clone(),
            features: take_rows(&self.features, indices)?,
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
            protected: self
                .protected
                .iter()
                .map(|col| indices.iter().map(|&i| col[i].clone()).collect())
                .collect(),
            protected_indicator: indices.iter().map(|&i| self.protected_indicator[i]).collect(),
        })
    }
}
