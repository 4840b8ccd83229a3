//! Preprocessing configuration

use super::{ImputeStrategy, ScalerType};
use serde::{Deserialize, Serialize};

/// Configuration for the column-wise preprocessing pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessingConfig {
    /// Columns that are scaled, flagged for missingness and imputed
    pub numeric_columns: Vec<String>,

    /// Columns that are clamped and one-hot encoded
    pub categorical_columns: Vec<String>,

    /// Type of scaler to use for numeric features
    pub scaler_type: ScalerType,

    /// Strategy for filling missing numeric values after scaling
    pub impute_strategy: ImputeStrategy,

    /// Whether rare categories are collapsed before encoding
    pub clamp_categories: bool,

    /// Replacement label for clamped categories
    pub other_label: String,

    /// Suffix of the missingness indicator columns
    pub missing_suffix: String,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            numeric_columns: Vec::new(),
            categorical_columns: Vec::new(),
            scaler_type: ScalerType::Robust,
            impute_strategy: ImputeStrategy::Mean,
            clamp_categories: true,
            other_label: "other".to_string(),
            missing_suffix: "_missing".to_string(),
        }
    }
}

impl PreprocessingConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set numeric columns
    pub fn with_numeric(mut self, columns: Vec<String>) -> Self {
        self.numeric_columns = columns;
        self
    }

    /// Builder method to set categorical columns
    pub fn with_categorical(mut self, columns: Vec<String>) -> Self {
        self.categorical_columns = columns;
        self
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler_type: ScalerType) -> Self {
        self.scaler_type = scaler_type;
        self
    }

    /// Builder method to set the numeric impute strategy
    pub fn with_impute_strategy(mut self, strategy: ImputeStrategy) -> Self {
        self.impute_strategy = strategy;
        self
    }

    /// Builder method to toggle category clamping
    pub fn with_clamping(mut self, enabled: bool) -> Self {
        self.clamp_categories = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = PreprocessingConfig::default();
        assert!(matches!(config.scaler_type, ScalerType::Robust));
        assert!(matches!(config.impute_strategy, ImputeStrategy::Mean));
        assert!(config.clamp_categories);
        assert_eq!(config.other_label, "other");
    }

    #[test]
    fn test_builder_pattern() {
        let config = PreprocessingConfig::new()
            .with_numeric(vec!["speed".to_string()])
            .with_categorical(vec!["port".to_string()])
            .with_clamping(false);

        assert_eq!(config.numeric_columns, vec!["speed"]);
        assert_eq!(config.categorical_columns, vec!["port"]);
        assert!(!config.clamp_categories);
    }
}
