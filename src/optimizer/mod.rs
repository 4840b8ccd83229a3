//! Hyperparameter optimization module (HyperOptX)
//!
//! Sequential model-based search over a declarative search space:
//! - Tree-structured Parzen Estimators (TPE), the default
//! - Random search
//!
//! Trials whose objective errors or yields a non-finite loss are kept in the
//! [`Study`] as failed and never selected.

mod config;
#[allow(clippy::module_inception)]
mod optimizer;
mod samplers;
mod search_space;

pub use config::OptimizationConfig;
pub use optimizer::{HyperOptX, Study, TrialResult, TrialStatus};
pub use samplers::{create_sampler, RandomSampler, Sampler, SamplerType, TPESampler};
pub use search_space::{Distribution, Parameter, ParameterValue, SearchSpace, TrialParams};
