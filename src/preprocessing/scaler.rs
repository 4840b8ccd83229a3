//! Feature scaling

use crate::data::float_column;
use crate::error::{KolosalError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Type of scaler to use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ScalerType {
    /// Robust scaling using median and IQR
    Robust,
    /// No scaling
    None,
}

/// Parameters for a fitted scaler
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ScalerParams {
    center: f64, // median
    scale: f64,  // IQR
}

/// Feature scaler; output columns are Float64 with nulls kept as nulls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    columns: Vec<String>,
    params: HashMap<String, ScalerParams>,
    is_fitted: bool,
}

impl Scaler {
    /// Create a new scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            columns: Vec::new(),
            params: HashMap::new(),
            is_fitted: false,
        }
    }

    /// Fit the scaler to the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        self.columns.clear();
        self.params.clear();

        for col_name in columns {
            let values = float_column(df, col_name)?;
            let params = self.compute_params(values)?;
            self.columns.push(col_name.to_string());
            self.params.insert(col_name.to_string(), params);
        }

        self.is_fitted = true;
        Ok(self)
    }

    /// Replace every fitted column with its scaled Float64 version
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }

        let mut result = df.clone();
        for col_name in &self.columns {
            let params = &self.params[col_name];
            let scaled: Float64Chunked = float_column(df, col_name)?
                .into_iter()
                .map(|opt| opt.map(|v| (v - params.center) / params.scale))
                .collect();
            result.with_column(scaled.with_name(col_name.as_str().into()).into_series())?;
        }

        Ok(result)
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.fit(df, columns)?;
        self.transform(df)
    }

    /// Fitted (center, scale) for a column
    pub fn params(&self, column: &str) -> Option<(f64, f64)> {
        self.params.get(column).map(|p| (p.center, p.scale))
    }

    fn compute_params(&self, values: Vec<Option<f64>>) -> Result<ScalerParams> {
        match self.scaler_type {
            ScalerType::Robust => {
                let ca: Float64Chunked = values.into_iter().collect();
                let median = ca.median().unwrap_or(0.0);
                let q1 = ca.quantile(0.25, QuantileMethod::Linear)?.unwrap_or(0.0);
                let q3 = ca.quantile(0.75, QuantileMethod::Linear)?.unwrap_or(0.0);
                let iqr = q3 - q1;
                Ok(ScalerParams {
                    center: median,
                    scale: if iqr == 0.0 { 1.0 } else { iqr },
                })
            }
            ScalerType::None => Ok(ScalerParams {
                center: 0.0,
                scale: 1.0,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_robust_scaler() {
        let df = df!("a" => [1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();

        let mut scaler = Scaler::new(ScalerType::Robust);
        let result = scaler.fit_transform(&df, &["a"]).unwrap();

        // median 3, q1 2, q3 4
        assert_eq!(scaler.params("a"), Some((3.0, 2.0)));
        let col = result.column("a").unwrap().f64().unwrap();
        assert!((col.get(0).unwrap() + 1.0).abs() < 1e-12);
        assert!((col.get(4).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_robust_scaler_ignores_missing_and_nan() {
        let df = df!("a" => [Some(1.0), None, Some(f64::NAN), Some(3.0), Some(5.0)]).unwrap();

        let mut scaler = Scaler::new(ScalerType::Robust);
        let result = scaler.fit_transform(&df, &["a"]).unwrap();

        // median of [1, 3, 5] is 3, q1 = 2, q3 = 4
        assert_eq!(scaler.params("a"), Some((3.0, 2.0)));
        let col = result.column("a").unwrap().f64().unwrap();
        assert_eq!(col.get(1), None);
        assert_eq!(col.get(2), None);
    }

    #[test]
    fn test_zero_iqr_uses_unit_scale() {
        let df = df!("a" => [7.0, 7.0, 7.0]).unwrap();
        let mut scaler = Scaler::new(ScalerType::Robust);
        scaler.fit(&df, &["a"]).unwrap();
        assert_eq!(scaler.params("a"), Some((7.0, 1.0)));
    }

    #[test]
    fn test_integer_columns_are_scaled() {
        let df = df!("n" => [1i64, 2, 3]).unwrap();
        let mut scaler = Scaler::new(ScalerType::Robust);
        let result = scaler.fit_transform(&df, &["n"]).unwrap();
        assert_eq!(result.column("n").unwrap().dtype(), &DataType::Float64);
    }

    #[test]
    fn test_transform_before_fit() {
        let df = df!("a" => [1.0]).unwrap();
        let scaler = Scaler::new(ScalerType::Robust);
        assert!(matches!(scaler.transform(&df), Err(KolosalError::ModelNotFitted)));
    }
}
