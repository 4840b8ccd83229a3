//! Optimization configuration

use super::SamplerType;
use serde::{Deserialize, Serialize};

/// Configuration for hyperparameter search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizationConfig {
    /// Number of trials to run
    pub n_trials: usize,

    /// Sampler type
    pub sampler: SamplerType,

    /// Number of initial random samples before TPE takes over
    pub n_startup_trials: usize,

    /// Quantile of losses forming the "good" set
    pub gamma: f64,

    /// Candidates drawn per parameter per TPE proposal
    pub n_candidates: usize,

    /// Random seed
    pub random_state: Option<u64>,
}

impl Default for OptimizationConfig {
    fn default() -> Self {
        Self {
            n_trials: 100,
            sampler: SamplerType::TPE,
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
            random_state: Some(42),
        }
    }
}

impl OptimizationConfig {
    /// Create a new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set number of trials
    pub fn with_n_trials(mut self, n: usize) -> Self {
        self.n_trials = n;
        self
    }

    /// Builder method to set sampler
    pub fn with_sampler(mut self, sampler: SamplerType) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn with_n_startup_trials(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}
