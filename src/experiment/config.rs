//! Experiment configuration

use crate::data::{DatasetSchema, MappingRules};
use crate::error::{KolosalError, Result};
use crate::optimizer::OptimizationConfig;
use crate::preprocessing::PreprocessingConfig;
use crate::training::ClassifierFamily;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// `[0.0, 0.1, ..., 1.0]`
pub fn default_thetas() -> Vec<f64> {
    (0..=10).map(|i| i as f64 / 10.0).collect()
}

/// Everything needed to run a theta sweep
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Input table (CSV, JSON or Parquet)
    pub data_path: Option<PathBuf>,
    pub schema: DatasetSchema,
    /// Value mapping applied right after loading
    pub mapping: MappingRules,
    pub preprocessing: PreprocessingConfig,
    pub optimization: OptimizationConfig,
    pub family: ClassifierFamily,
    pub outer_folds: usize,
    /// Folds of the cross-validated search objective
    pub inner_folds: usize,
    pub thetas: Vec<f64>,
    pub random_state: u64,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_path: None,
            schema: DatasetSchema::default(),
            mapping: MappingRules::default(),
            preprocessing: PreprocessingConfig::default(),
            optimization: OptimizationConfig::default(),
            family: ClassifierFamily::FairForest,
            outer_folds: 10,
            inner_folds: 10,
            thetas: default_thetas(),
            random_state: 42,
        }
    }
}

impl ExperimentConfig {
    pub fn new(schema: DatasetSchema) -> Self {
        Self {
            schema,
            ..Self::default()
        }
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_path = Some(path.into());
        self
    }

    pub fn with_mapping(mut self, mapping: MappingRules) -> Self {
        self.mapping = mapping;
        self
    }

    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    pub fn with_optimization(mut self, optimization: OptimizationConfig) -> Self {
        self.optimization = optimization;
        self
    }

    pub fn with_family(mut self, family: ClassifierFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_folds(mut self, outer: usize, inner: usize) -> Self {
        self.outer_folds = outer;
        self.inner_folds = inner;
        self
    }

    pub fn with_thetas(mut self, thetas: Vec<f64>) -> Self {
        self.thetas = thetas;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Load a configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.schema.primary_protected()?;
        if self.outer_folds < 2 || self.inner_folds < 2 {
            return Err(KolosalError::ConfigError(format!(
                "fold counts must be at least 2 (outer {}, inner {})",
                self.outer_folds, self.inner_folds
            )));
        }
        if self.optimization.n_trials == 0 {
            return Err(KolosalError::ConfigError("n_trials must be positive".to_string()));
        }
        if self.thetas.is_empty() {
            return Err(KolosalError::ConfigError("theta grid is empty".to_string()));
        }
        if let Some(bad) = self.thetas.iter().find(|t| !(0.0..=1.0).contains(*t)) {
            return Err(KolosalError::InvalidParameter {
                name: "theta".to_string(),
                value: bad.to_string(),
                reason: "must lie in [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}
