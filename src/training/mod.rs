//! Model training module
//!
//! Provides the classifier contract used by the experiment harness and three
//! built-in families:
//! - L1/L2/elastic-net logistic regression
//! - Fair random forests (split gain penalized by protected-attribute purity)
//! - Adversarial debiasing
//!
//! plus stratified K-fold splitting.

pub mod adversarial;
pub mod cross_validation;
pub mod fair_forest;
mod family;
pub mod logistic;
mod models;

pub use adversarial::{AdversarialConfig, AdversarialDebiasing};
pub use cross_validation::{CVSplit, StratifiedKFold};
pub use fair_forest::{FairForestConfig, FairRandomForest};
pub use family::{ClassifierFamily, ClassifierSpec, ModelFamily};
pub use logistic::{ClassWeight, LogisticConfig, LogisticRegression, Penalty};
pub use models::{ConstantClassifier, FairClassifier};

pub(crate) use models::{check_inputs, stack_proba};
