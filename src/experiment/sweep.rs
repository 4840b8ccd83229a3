//! Theta sweep with nested cross-validated hyperparameter search

use super::config::ExperimentConfig;
use super::objective::{
    check_preprocessing, fit_and_predict, CrossValidatedObjective, ObjectiveScore,
};
use crate::data::Dataset;
use crate::error::{KolosalError, Result};
use crate::metrics::{nan_mean, nan_std, roc_auc_or_chance, strong_demographic_parity_score};
use crate::optimizer::{HyperOptX, TrialParams};
use crate::training::{ModelFamily, StratifiedKFold};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Outcome of one outer fold
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldRecord<S> {
    pub fold: usize,
    /// Test-partition ROC AUC
    pub performance: f64,
    /// Test-partition strong demographic parity (worst column)
    pub fairness: f64,
    /// Loss of the selected trial on the inner folds
    pub best_loss: f64,
    pub best_params: TrialParams,
    pub spec: S,
    pub failed_trials: usize,
}

/// All outer folds of one theta and their reductions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThetaResult<S> {
    pub theta: f64,
    pub folds: Vec<FoldRecord<S>>,
    pub mean_performance: f64,
    pub mean_fairness: f64,
    pub std_performance: f64,
    pub std_fairness: f64,
}

impl<S> ThetaResult<S> {
    fn from_folds(theta: f64, folds: Vec<FoldRecord<S>>) -> Self {
        let performance: Vec<f64> = folds.iter().map(|f| f.performance).collect();
        let fairness: Vec<f64> = folds.iter().map(|f| f.fairness).collect();
        Self {
            theta,
            mean_performance: nan_mean(&performance),
            mean_fairness: nan_mean(&fairness),
            std_performance: nan_std(&performance),
            std_fairness: nan_std(&fairness),
            folds,
        }
    }
}

/// Curves over the theta grid, one entry per theta in grid order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepResults<S> {
    pub thetas: Vec<f64>,
    pub mean_performance: Vec<f64>,
    pub mean_fairness: Vec<f64>,
    pub std_performance: Vec<f64>,
    pub std_fairness: Vec<f64>,
    pub per_theta: Vec<ThetaResult<S>>,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
}

impl<S> SweepResults<S> {
    fn from_thetas(per_theta: Vec<ThetaResult<S>>, started_at: DateTime<Utc>, duration_secs: f64) -> Self {
        Self {
            thetas: per_theta.iter().map(|r| r.theta).collect(),
            mean_performance: per_theta.iter().map(|r| r.mean_performance).collect(),
            mean_fairness: per_theta.iter().map(|r| r.mean_fairness).collect(),
            std_performance: per_theta.iter().map(|r| r.std_performance).collect(),
            std_fairness: per_theta.iter().map(|r| r.std_fairness).collect(),
            per_theta,
            started_at,
            duration_secs,
        }
    }
}

impl<S: Serialize> SweepResults<S> {
    /// Write the results as pretty JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Runs the outer experiment loop for every theta of a configuration
pub struct ThetaSweep<'a> {
    config: &'a ExperimentConfig,
}

impl<'a> ThetaSweep<'a> {
    pub fn new(config: &'a ExperimentConfig) -> Self {
        Self { config }
    }

    /// Sweep the configured theta grid.
    ///
    /// For each theta the dataset is split into outer stratified folds. The search runs
    /// on each outer training partition with its own inner folds; the selected
    /// specification is refit on the whole outer training partition and scored once on
    /// the outer test partition.
    pub fn run<M: ModelFamily>(&self, family: &M, dataset: &Dataset) -> Result<SweepResults<M::Spec>> {
        self.config.validate()?;
        check_preprocessing(&self.config.preprocessing, dataset)?;

        let started_at = Utc::now();
        let start = Instant::now();
        let outer = StratifiedKFold::new(self.config.outer_folds)
            .with_random_state(self.config.random_state)
            .split(&dataset.stratification_keys())?;

        let n_thetas = self.config.thetas.len();
        let mut per_theta = Vec::with_capacity(n_thetas);

        for (theta_idx, &theta) in self.config.thetas.iter().enumerate() {
            let mut folds = Vec::with_capacity(outer.len());
            for split in &outer {
                let train = dataset.subset(&split.train_indices)?;
                let test = dataset.subset(&split.test_indices)?;
                folds.push(self.run_fold(family, theta, split.fold_idx, &train, &test)?);
            }

            let result = ThetaResult::from_folds(theta, folds);
            info!(
                theta,
                performance = result.mean_performance,
                fairness = result.mean_fairness,
                progress = format!("{:.1}%", 100.0 * (theta_idx + 1) as f64 / n_thetas as f64),
                "Theta complete"
            );
            per_theta.push(result);
        }

        Ok(SweepResults::from_thetas(
            per_theta,
            started_at,
            start.elapsed().as_secs_f64(),
        ))
    }

    fn run_fold<M: ModelFamily>(
        &self,
        family: &M,
        theta: f64,
        fold: usize,
        train: &Dataset,
        test: &Dataset,
    ) -> Result<FoldRecord<M::Spec>> {
        let config = self.config;
        let objective = CrossValidatedObjective::new(train, &config.preprocessing)
            .with_folds(config.inner_folds)
            .with_random_state(config.random_state);

        let mut optimizer = HyperOptX::new(config.optimization.clone(), family.search_space(theta));
        let study = optimizer.optimize(|params| {
            let spec = family.spec_from_params(params)?;
            let score = objective.evaluate(|| family.build(&spec))?;
            Ok((score.loss(theta), spec))
        })?;

        let best = study.best_trial()?;
        let spec = best.payload.clone().ok_or(KolosalError::NoValidTrial {
            trials: study.trials.len(),
        })?;
        debug!(theta, fold, trial = best.trial_id, loss = best.loss, "Selected trial");

        let mut classifier = family.build(&spec);
        let probs = fit_and_predict(classifier.as_mut(), &config.preprocessing, train, test)?;

        let (performance, fairness) = if probs.iter().all(|p| p.is_finite()) {
            (
                roc_auc_or_chance(test.labels(), &probs)?,
                strong_demographic_parity_score(test.protected_columns(), &probs)?.worst(),
            )
        } else {
            warn!(theta, fold, "Non-finite predictions on outer test fold, scoring as chance");
            (ObjectiveScore::SENTINEL.performance, ObjectiveScore::SENTINEL.fairness)
        };

        Ok(FoldRecord {
            fold,
            performance,
            fairness,
            best_loss: best.loss,
            best_params: best.params.clone(),
            spec,
            failed_trials: study.n_failed(),
        })
    }
}
