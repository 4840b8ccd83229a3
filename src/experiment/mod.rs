//! Fairness-aware experiment harness
//!
//! [`CrossValidatedObjective`] scores one classifier configuration with stratified
//! K-fold cross-validation; [`ThetaSweep`] wraps it in a hyperparameter search per
//! outer fold and per theta, producing mean/std performance and fairness curves.

mod config;
mod objective;
mod sweep;

pub use config::{default_thetas, ExperimentConfig};
pub use objective::{CrossValidatedObjective, ObjectiveScore};
pub use sweep::{FoldRecord, SweepResults, ThetaResult, ThetaSweep};
