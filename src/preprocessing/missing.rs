//! Missing-value indicator columns

use crate::data::float_column;
use crate::error::{KolosalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Appends one 0/1 indicator column per fitted column, named `{column}{suffix}`.
///
/// Every fitted column gets an indicator whether or not it had missing values
/// during fit, so the output width depends only on the declared columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MissingIndicator {
    suffix: String,
    columns: Vec<String>,
    is_fitted: bool,
}

impl Default for MissingIndicator {
    fn default() -> Self {
        Self::new("_missing")
    }
}

impl MissingIndicator {
    /// Create a new indicator with the given column-name suffix
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            columns: Vec::new(),
            is_fitted: false,
        }
    }

    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        for col_name in columns {
            if df.column(col_name).is_err() {
                return Err(KolosalError::FeatureNotFound(col_name.to_string()));
            }
        }
        self.columns = columns.iter().map(|c| c.to_string()).collect();
        self.is_fitted = true;
        Ok(self)
    }

    /// Append the indicator columns; the source columns are left untouched
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }

        let mut result = df.clone();
        for (col_name, out_name) in self.columns.iter().zip(self.output_names()) {
            let flags: Vec<f64> = float_column(df, col_name)?
                .into_iter()
                .map(|v| if v.is_none() { 1.0 } else { 0.0 })
                .collect();
            result.with_column(Series::new(out_name.as_str().into(), flags))?;
        }
        Ok(result)
    }

    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Names of the appended indicator columns, in fit order
    pub fn output_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .map(|c| format!("{}{}", c, self.suffix))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_flags_nulls() {
        let df = df!(
            "a" => [Some(1.0), None, Some(3.0)],
            "b" => [Some(1.0), Some(2.0), Some(3.0)]
        )
        .unwrap();

        let mut indicator = MissingIndicator::default();
        let out = indicator.fit_transform(&df, &["a", "b"]).unwrap();

        let a: Vec<Option<f64>> = out.column("a_missing").unwrap().f64().unwrap().into_iter().collect();
        assert_eq!(a, vec![Some(0.0), Some(1.0), Some(0.0)]);
        // Emitted even though "b" has no missing values
        assert!(out.column("b_missing").is_ok());
        assert_eq!(out.width(), 4);
    }
}
