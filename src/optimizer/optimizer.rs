//! HyperOptX - sequential hyperparameter search driver

use super::{
    config::OptimizationConfig,
    samplers::{create_sampler, Sampler},
    search_space::{SearchSpace, TrialParams},
};
use crate::error::{KolosalError, Result};
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Outcome of a single trial
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialStatus {
    Ok,
    /// The objective returned an error or a non-finite loss
    Failed,
}

/// Result of a single trial
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrialResult<P> {
    /// Trial number
    pub trial_id: usize,
    /// Parameters used
    pub params: TrialParams,
    /// Objective value, `f64::INFINITY` for failed trials
    pub loss: f64,
    pub status: TrialStatus,
    /// Whatever the objective attached on success
    pub payload: Option<P>,
    /// Trial duration in seconds
    pub duration_secs: f64,
    /// Error message of a failed trial
    pub error: Option<String>,
}

impl<P> TrialResult<P> {
    pub fn is_ok(&self) -> bool {
        self.status == TrialStatus::Ok
    }
}

/// Log of all trials in evaluation order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Study<P> {
    pub trials: Vec<TrialResult<P>>,
    pub total_duration_secs: f64,
}

impl<P> Default for Study<P> {
    fn default() -> Self {
        Self {
            trials: Vec::new(),
            total_duration_secs: 0.0,
        }
    }
}

impl<P> Study<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the lowest-loss successful trial; the first one wins ties
    pub fn best_trial_idx(&self) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (idx, trial) in self.trials.iter().enumerate() {
            if !trial.is_ok() {
                continue;
            }
            match best {
                Some((_, loss)) if trial.loss >= loss => {}
                _ => best = Some((idx, trial.loss)),
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// Get the best trial
    pub fn best_trial(&self) -> Result<&TrialResult<P>> {
        self.best_trial_idx()
            .map(|idx| &self.trials[idx])
            .ok_or(KolosalError::NoValidTrial {
                trials: self.trials.len(),
            })
    }

    pub fn best_loss(&self) -> Option<f64> {
        self.best_trial_idx().map(|idx| self.trials[idx].loss)
    }

    /// Number of failed trials
    pub fn n_failed(&self) -> usize {
        self.trials.iter().filter(|t| !t.is_ok()).count()
    }

    /// Append a trial result
    pub fn add_trial(&mut self, result: TrialResult<P>) {
        self.trials.push(result);
    }
}

/// Main hyperparameter optimizer
pub struct HyperOptX {
    config: OptimizationConfig,
    search_space: SearchSpace,
    sampler: Box<dyn Sampler>,
}

impl HyperOptX {
    /// Create a new optimizer
    pub fn new(config: OptimizationConfig, search_space: SearchSpace) -> Self {
        let sampler = create_sampler(
            config.sampler,
            config.random_state,
            config.n_startup_trials,
            config.gamma,
            config.n_candidates,
        );
        Self {
            config,
            search_space,
            sampler,
        }
    }

    /// Replace the sampling strategy
    pub fn with_sampler(mut self, sampler: Box<dyn Sampler>) -> Self {
        self.sampler = sampler;
        self
    }

    pub fn search_space(&self) -> &SearchSpace {
        &self.search_space
    }

    /// Run `n_trials` evaluations of `objective`.
    ///
    /// The objective returns the loss to minimize together with a payload kept on the
    /// trial record. Training failures and non-finite losses are recorded and do not stop
    /// the search; an empty set of successful trials is only reported by
    /// [`Study::best_trial`]. Data and configuration errors
    /// ([`KolosalError::is_data_error`]) abort the search and are returned as is.
    pub fn optimize<P, F>(&mut self, mut objective: F) -> Result<Study<P>>
    where
        F: FnMut(&TrialParams) -> Result<(f64, P)>,
    {
        self.search_space.validate()?;
        if self.config.n_trials == 0 {
            return Err(KolosalError::OptimizationError(
                "n_trials must be at least 1".to_string(),
            ));
        }

        let start = Instant::now();
        let mut study = Study::new();

        for trial_id in 0..self.config.n_trials {
            let trial_start = Instant::now();

            // Sample parameters
            let params = self.sampler.propose(&self.search_space);

            let (loss, status, payload, error) = match objective(&params) {
                Ok((loss, payload)) if loss.is_finite() => {
                    self.sampler.observe(&params, loss);
                    (loss, TrialStatus::Ok, Some(payload), None)
                }
                Ok((loss, _)) => (
                    f64::INFINITY,
                    TrialStatus::Failed,
                    None,
                    Some(format!("non-finite loss {}", loss)),
                ),
                Err(e) if e.is_data_error() => return Err(e),
                Err(e) => (f64::INFINITY, TrialStatus::Failed, None, Some(e.to_string())),
            };

            match &error {
                None => debug!(trial = trial_id, loss, "Trial complete"),
                Some(reason) => debug!(trial = trial_id, reason = %reason, "Trial failed"),
            }

            study.add_trial(TrialResult {
                trial_id,
                params,
                loss,
                status,
                payload,
                duration_secs: trial_start.elapsed().as_secs_f64(),
                error,
            });
        }

        study.total_duration_secs = start.elapsed().as_secs_f64();
        info!(
            trials = study.trials.len(),
            failed = study.n_failed(),
            best_loss = study.best_loss().unwrap_or(f64::NAN),
            "Search finished"
        );

        Ok(study)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::SamplerType;

    fn trial(id: usize, loss: f64, status: TrialStatus) -> TrialResult<()> {
        TrialResult {
            trial_id: id,
            params: TrialParams::new(),
            loss,
            status,
            payload: Some(()),
            duration_secs: 0.0,
            error: None,
        }
    }

    #[test]
    fn test_best_trial_is_argmin() {
        let mut study = Study::new();
        for (i, loss) in [0.3, -0.1, 0.5].into_iter().enumerate() {
            study.add_trial(trial(i, loss, TrialStatus::Ok));
        }
        assert_eq!(study.best_trial_idx(), Some(1));
    }

    #[test]
    fn test_ties_keep_first() {
        let mut study = Study::new();
        study.add_trial(trial(0, 0.2, TrialStatus::Ok));
        study.add_trial(trial(1, 0.2, TrialStatus::Ok));
        assert_eq!(study.best_trial().unwrap().trial_id, 0);
    }

    #[test]
    fn test_failed_trials_excluded() {
        let mut study = Study::new();
        study.add_trial(trial(0, -5.0, TrialStatus::Failed));
        study.add_trial(trial(1, 1.0, TrialStatus::Ok));
        assert_eq!(study.best_trial_idx(), Some(1));
    }

    #[test]
    fn test_no_valid_trial() {
        let mut study: Study<()> = Study::new();
        study.add_trial(trial(0, f64::INFINITY, TrialStatus::Failed));
        assert!(matches!(
            study.best_trial(),
            Err(KolosalError::NoValidTrial { trials: 1 })
        ));
    }

    #[test]
    fn test_optimization() {
        let config = OptimizationConfig::new().with_n_trials(30);
        let space = SearchSpace::new().uniform("x", -5.0, 5.0).uniform("y", -5.0, 5.0);

        let mut optimizer = HyperOptX::new(config, space);
        let study = optimizer
            .optimize(|params| {
                let x = params["x"].as_float().unwrap_or(0.0);
                let y = params["y"].as_float().unwrap_or(0.0);
                Ok((x * x + y * y, x))
            })
            .unwrap();

        assert_eq!(study.trials.len(), 30);
        let best = study.best_trial().unwrap();
        assert_eq!(best.payload, best.params["x"].as_float());
        assert!(best.loss < 25.0);
    }

    #[test]
    fn test_errors_and_nan_become_failed() {
        let config = OptimizationConfig::new()
            .with_n_trials(6)
            .with_sampler(SamplerType::Random);
        let space = SearchSpace::new().uniform("x", 0.0, 1.0);
        let mut calls = 0;

        let study = HyperOptX::new(config, space)
            .optimize(|_| {
                calls += 1;
                match calls % 3 {
                    0 => Err(KolosalError::TrainingError("boom".to_string())),
                    1 => Ok((f64::NAN, ())),
                    _ => Ok((calls as f64, ())),
                }
            })
            .unwrap();

        assert_eq!(study.n_failed(), 4);
        assert_eq!(study.best_trial().unwrap().trial_id, 1);
    }

    #[test]
    fn test_data_errors_abort_search() {
        let config = OptimizationConfig::new().with_n_trials(5);
        let space = SearchSpace::new().uniform("x", 0.0, 1.0);
        let mut calls = 0;

        let result = HyperOptX::new(config, space).optimize(|_| {
            calls += 1;
            Err::<(f64, ()), _>(KolosalError::FeatureNotFound("sped".to_string()))
        });

        assert!(matches!(result, Err(KolosalError::FeatureNotFound(name)) if name == "sped"));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_all_failed_reports_no_valid_trial() {
        let config = OptimizationConfig::new().with_n_trials(3);
        let space = SearchSpace::new().uniform("x", 0.0, 1.0);
        let study = HyperOptX::new(config, space)
            .optimize(|_| Ok::<_, KolosalError>((f64::INFINITY, ())))
            .unwrap();
        assert!(study.best_trial().is_err());
    }
}
