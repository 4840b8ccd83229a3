//! Kolosal FairLab - fairness-aware model selection
//!
//! Trains binary classifiers under a tunable performance/fairness trade-off `theta`,
//! selects hyperparameters with a cross-validated, fairness-weighted objective and
//! reports ROC AUC together with strong demographic parity over a grid of `theta`.
//!
//! # Modules
//!
//! - [`data`] - Loading, value mapping and dataset roles (target, protected, predictors)
//! - [`preprocessing`] - Column pipeline: robust scaling, missingness, clamping, one-hot
//! - [`metrics`] - ROC AUC, strong demographic parity and fold reductions
//! - [`training`] - Classifier contract, stratified folds and the built-in families
//! - [`optimizer`] - TPE / random hyperparameter search
//! - [`experiment`] - Cross-validated objective and the theta sweep
//! - [`cli`] - Command-line interface
//!
//! # Example
//!
//! ```no_run
//! use kolosal_fairlab::prelude::*;
//!
//! # fn main() -> kolosal_fairlab::error::Result<()> {
//! let config = ExperimentConfig::from_file("experiment.json")?;
//! let df = DataLoader::new()
//!     .with_rules(config.mapping.clone())
//!     .load("ships.csv")?;
//! let dataset = Dataset::from_frame(&df, config.schema.clone())?;
//! let results = ThetaSweep::new(&config).run(&config.family, &dataset)?;
//! println!("{:?}", results.mean_fairness);
//! # Ok(())
//! # }
//! ```

// Core error handling
pub mod error;

pub mod data;
pub mod experiment;
pub mod metrics;
pub mod optimizer;
pub mod preprocessing;
pub mod training;

pub mod cli;

/// Commonly used types
pub mod prelude {
    pub use crate::data::{DataLoader, Dataset, DatasetSchema, MappingRules};
    pub use crate::error::{KolosalError, Result};
    pub use crate::experiment::{
        CrossValidatedObjective, ExperimentConfig, ObjectiveScore, SweepResults, ThetaSweep,
    };
    pub use crate::metrics::{
        fairness_proxy_auc, roc_auc_score, strong_demographic_parity_score, ParityScore,
    };
    pub use crate::optimizer::{HyperOptX, OptimizationConfig, SamplerType, SearchSpace};
    pub use crate::preprocessing::{ColumnPipeline, PreprocessingConfig};
    pub use crate::training::{
        ClassifierFamily, ClassifierSpec, FairClassifier, ModelFamily, StratifiedKFold,
    };
}
