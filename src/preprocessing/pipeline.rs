//! Column-wise preprocessing pipeline

use super::{
    clamper::Clamper,
    config::PreprocessingConfig,
    encoder::OneHotEncoder,
    imputer::Imputer,
    missing::MissingIndicator,
    scaler::Scaler,
};
use crate::data::float_column;
use crate::error::{KolosalError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Turns a predictor frame into a dense feature matrix.
///
/// Output layout, left to right:
/// 1. scaled numeric columns (missing values imputed)
/// 2. one missingness indicator per numeric column
/// 3. one-hot columns of the (clamped) categorical columns
/// 4. passthrough columns, i.e. every other input column, cast to f64
///
/// All fitted state comes from the frame passed to [`ColumnPipeline::fit`]; build a
/// fresh pipeline per training partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnPipeline {
    config: PreprocessingConfig,
    scaler: Option<Scaler>,
    indicator: Option<MissingIndicator>,
    imputer: Option<Imputer>,
    clamper: Option<Clamper>,
    encoder: Option<OneHotEncoder>,
    passthrough_columns: Vec<String>,
    feature_names: Vec<String>,
    is_fitted: bool,
}

impl ColumnPipeline {
    /// Create a new, unfitted pipeline
    pub fn new(config: PreprocessingConfig) -> Self {
        Self {
            config,
            scaler: None,
            indicator: None,
            imputer: None,
            clamper: None,
            encoder: None,
            passthrough_columns: Vec::new(),
            feature_names: Vec::new(),
            is_fitted: false,
        }
    }

    fn validate(&self) -> Result<()> {
        let numeric: HashSet<&String> = self.config.numeric_columns.iter().collect();
        if let Some(dup) = self
            .config
            .categorical_columns
            .iter()
            .find(|c| numeric.contains(c))
        {
            return Err(KolosalError::ConfigError(format!(
                "column '{}' is declared both numeric and categorical",
                dup
            )));
        }
        Ok(())
    }

    /// Fit every step on the given training frame
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.validate()?;

        let numeric: Vec<&str> = self.config.numeric_columns.iter().map(String::as_str).collect();
        let categorical: Vec<&str> = self
            .config
            .categorical_columns
            .iter()
            .map(String::as_str)
            .collect();

        let mut names = Vec::new();

        if numeric.is_empty() {
            self.scaler = None;
            self.indicator = None;
            self.imputer = None;
        } else {
            let mut scaler = Scaler::new(self.config.scaler_type.clone());
            let scaled = scaler.fit_transform(df, &numeric)?;

            let mut indicator = MissingIndicator::new(self.config.missing_suffix.clone());
            let flagged = indicator.fit_transform(&scaled, &numeric)?;

            let mut imputer = Imputer::new(self.config.impute_strategy.clone());
            imputer.fit(&flagged, &numeric)?;

            names.extend(numeric.iter().map(|c| c.to_string()));
            names.extend(indicator.output_names());

            self.scaler = Some(scaler);
            self.indicator = Some(indicator);
            self.imputer = Some(imputer);
        }

        if categorical.is_empty() {
            self.clamper = None;
            self.encoder = None;
        } else {
            let clamped = if self.config.clamp_categories {
                let mut clamper = Clamper::new(self.config.other_label.clone());
                let clamped = clamper.fit_transform(df, &categorical)?;
                self.clamper = Some(clamper);
                clamped
            } else {
                self.clamper = None;
                df.clone()
            };

            let mut encoder = OneHotEncoder::new();
            encoder.fit(&clamped, &categorical)?;
            names.extend(encoder.feature_names());
            self.encoder = Some(encoder);
        }

        let declared: HashSet<&str> = numeric.iter().chain(categorical.iter()).copied().collect();
        self.passthrough_columns = df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .filter(|name| !declared.contains(name.as_str()))
            .collect();
        for name in &self.passthrough_columns {
            // Fail at fit time rather than on the first transform
            passthrough_column(df, name)?;
        }
        names.extend(self.passthrough_columns.iter().cloned());

        debug!(
            rows = df.height(),
            numeric = numeric.len(),
            categorical = categorical.len(),
            passthrough = self.passthrough_columns.len(),
            features = names.len(),
            "Fitted preprocessing pipeline"
        );

        self.feature_names = names;
        self.is_fitted = true;
        Ok(self)
    }

    /// Transform a frame with the fitted steps
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(KolosalError::ModelNotFitted);
        }

        let mut columns: Vec<Vec<f64>> = Vec::with_capacity(self.feature_names.len());

        if let (Some(scaler), Some(indicator), Some(imputer)) =
            (&self.scaler, &self.indicator, &self.imputer)
        {
            let scaled = scaler.transform(df)?;
            let flagged = indicator.transform(&scaled)?;
            let imputed = imputer.transform(&flagged)?;

            for name in &self.config.numeric_columns {
                columns.push(dense_column(&imputed, name)?);
            }
            for name in indicator.output_names() {
                columns.push(dense_column(&imputed, &name)?);
            }
        }

        if let Some(encoder) = &self.encoder {
            let encoded = match &self.clamper {
                Some(clamper) => encoder.transform(&clamper.transform(df)?)?,
                None => encoder.transform(df)?,
            };
            for name in encoder.feature_names() {
                columns.push(dense_column(&encoded, &name)?);
            }
        }

        for name in &self.passthrough_columns {
            columns.push(passthrough_column(df, name)?);
        }

        let n_rows = df.height();
        let n_cols = columns.len();
        Ok(Array2::from_shape_fn((n_rows, n_cols), |(i, j)| columns[j][i]))
    }

    /// Fit and transform in one step
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<Array2<f64>> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Names of the output columns, in matrix order
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    pub fn config(&self) -> &PreprocessingConfig {
        &self.config
    }
}

/// Float column with nulls rendered as NaN
fn dense_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    Ok(float_column(df, name)?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Undeclared column copied as is; it is neither imputed nor flagged, so gaps are errors
fn passthrough_column(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let values = float_column(df, name)?;
    if let Some(row) = values.iter().position(|v| !v.is_some_and(f64::is_finite)) {
        return Err(KolosalError::PreprocessingError(format!(
            "passthrough column '{}' has a missing or non-finite value at row {}; declare it numeric to impute",
            name, row
        )));
    }
    Ok(values.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PreprocessingConfig {
        PreprocessingConfig::new()
            .with_numeric(vec!["speed".to_string()])
            .with_categorical(vec!["port".to_string()])
    }

    fn train_frame() -> DataFrame {
        df!(
            "speed" => [Some(1.0), Some(2.0), None, Some(4.0), Some(5.0)],
            "port" => ["a", "a", "a", "b", "c"],
            "tonnage" => [10i64, 20, 30, 40, 50]
        )
        .unwrap()
    }

    #[test]
    fn test_layout_and_names() {
        let mut pipeline = ColumnPipeline::new(config());
        let x = pipeline.fit_transform(&train_frame()).unwrap();

        // a: 3/5 = .6, b, c: .2 each; 1/n = .333 -> closest is b (index 1) -> keep [a]
        assert_eq!(
            pipeline.feature_names(),
            &["speed", "speed_missing", "port_a", "port_other", "tonnage"]
        );
        assert_eq!(x.dim(), (5, 5));
        assert_eq!(x[[2, 1]], 1.0);
        assert_eq!(x[[4, 3]], 1.0);
        assert_eq!(x[[0, 4]], 10.0);
    }

    #[test]
    fn test_missing_value_imputed_with_scaled_mean() {
        let mut pipeline = ColumnPipeline::new(config());
        let x = pipeline.fit_transform(&train_frame()).unwrap();

        // observed [1, 2, 4, 5]: median 3, IQR 2.5 -> scaled mean is 0
        assert!(x[[2, 0]].abs() < 1e-12);
        assert!(x.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_transform_uses_training_state() {
        let mut pipeline = ColumnPipeline::new(config());
        pipeline.fit(&train_frame()).unwrap();

        let test = df!(
            "speed" => [Some(3.0)],
            "port" => ["zzz"],
            "tonnage" => [60i64]
        )
        .unwrap();
        let x = pipeline.transform(&test).unwrap();
        assert_eq!(x.dim(), (1, 5));
        assert!(x[[0, 0]].abs() < 1e-12);
        assert_eq!(x[[0, 2]], 0.0);
        assert_eq!(x[[0, 3]], 1.0);
    }

    #[test]
    fn test_string_numeric_column_fails() {
        let mut pipeline = ColumnPipeline::new(
            PreprocessingConfig::new().with_numeric(vec!["port".to_string()]),
        );
        assert!(matches!(
            pipeline.fit(&train_frame()),
            Err(KolosalError::PreprocessingError(_))
        ));
    }

    #[test]
    fn test_missing_declared_column_fails() {
        let mut pipeline = ColumnPipeline::new(
            PreprocessingConfig::new().with_numeric(vec!["draft".to_string()]),
        );
        assert!(matches!(
            pipeline.fit(&train_frame()),
            Err(KolosalError::FeatureNotFound(_))
        ));
    }

    #[test]
    fn test_passthrough_gaps_fail() {
        let with_null = df!(
            "port" => ["a", "b", "a"],
            "tonnage" => [Some(10.0), None, Some(30.0)]
        )
        .unwrap();
        let mut pipeline = ColumnPipeline::new(
            PreprocessingConfig::new().with_categorical(vec!["port".to_string()]),
        );
        assert!(matches!(
            pipeline.fit(&with_null),
            Err(KolosalError::PreprocessingError(_))
        ));

        pipeline.fit(&train_frame().drop("speed").unwrap()).unwrap();
        let with_nan = df!(
            "port" => ["a"],
            "tonnage" => [f64::NAN]
        )
        .unwrap();
        assert!(matches!(
            pipeline.transform(&with_nan),
            Err(KolosalError::PreprocessingError(_))
        ));
    }

    #[test]
    fn test_transform_before_fit() {
        let pipeline = ColumnPipeline::new(config());
        assert!(matches!(
            pipeline.transform(&train_frame()),
            Err(KolosalError::ModelNotFitted)
        ));
    }
}
