//! Cross-validated performance/fairness objective

use crate::data::Dataset;
use crate::error::Result;
use crate::metrics::{fairness_proxy_auc, nan_mean, roc_auc_or_chance, CHANCE_AUC};
use crate::preprocessing::{ColumnPipeline, PreprocessingConfig};
use crate::training::{FairClassifier, StratifiedKFold};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Performance and fairness of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveScore {
    /// ROC AUC of the label
    pub performance: f64,
    /// Fairness value; higher is less fair
    pub fairness: f64,
}

impl ObjectiveScore {
    /// Score recorded for a fold whose predictions are not all finite
    pub const SENTINEL: ObjectiveScore = ObjectiveScore {
        performance: CHANCE_AUC,
        fairness: CHANCE_AUC,
    };

    /// Search loss `-((1 - theta) * performance - theta * fairness)`
    pub fn loss(&self, theta: f64) -> f64 {
        -((1.0 - theta) * self.performance - theta * self.fairness)
    }
}

/// Fit a fresh pipeline and classifier on `train`, return positive probabilities on `test`
pub(crate) fn fit_and_predict(
    classifier: &mut dyn FairClassifier,
    preprocessing: &PreprocessingConfig,
    train: &Dataset,
    test: &Dataset,
) -> Result<Array1<f64>> {
    let mut pipeline = ColumnPipeline::new(preprocessing.clone());
    let x_train = pipeline.fit_transform(train.features())?;
    let x_test = pipeline.transform(test.features())?;

    classifier.fit(&x_train, train.labels(), train.protected_indicator())?;
    classifier.predict_positive(&x_test)
}

/// Fit the pipeline once on every predictor row so that undeclared, mistyped or gappy
/// columns are reported before any fold is trained
pub(crate) fn check_preprocessing(preprocessing: &PreprocessingConfig, dataset: &Dataset) -> Result<()> {
    ColumnPipeline::new(preprocessing.clone()).fit(dataset.features())?;
    Ok(())
}

/// Stratified K-fold evaluation of a classifier on one dataset.
///
/// Folds are stratified on `label|protected` with a fixed seed, so every call on the
/// same dataset sees the same partitions.
#[derive(Debug, Clone)]
pub struct CrossValidatedObjective<'a> {
    dataset: &'a Dataset,
    preprocessing: &'a PreprocessingConfig,
    n_folds: usize,
    random_state: u64,
}

impl<'a> CrossValidatedObjective<'a> {
    pub fn new(dataset: &'a Dataset, preprocessing: &'a PreprocessingConfig) -> Self {
        Self {
            dataset,
            preprocessing,
            n_folds: 10,
            random_state: 42,
        }
    }

    pub fn with_folds(mut self, n_folds: usize) -> Self {
        self.n_folds = n_folds;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Mean fold AUC and mean fold fairness proxy `0.5 + |0.5 - AUC(s, p)|`.
    ///
    /// `build` is called once per fold for an unfitted classifier.
    pub fn evaluate<F>(&self, build: F) -> Result<ObjectiveScore>
    where
        F: Fn() -> Box<dyn FairClassifier>,
    {
        check_preprocessing(self.preprocessing, self.dataset)?;

        let splits = StratifiedKFold::new(self.n_folds)
            .with_random_state(self.random_state)
            .split(&self.dataset.stratification_keys())?;

        let mut performance = Vec::with_capacity(splits.len());
        let mut fairness = Vec::with_capacity(splits.len());

        for split in &splits {
            let train = self.dataset.subset(&split.train_indices)?;
            let test = self.dataset.subset(&split.test_indices)?;

            let mut classifier = build();
            let probs = fit_and_predict(classifier.as_mut(), self.preprocessing, &train, &test)?;

            let score = if probs.iter().all(|p| p.is_finite()) {
                ObjectiveScore {
                    performance: roc_auc_or_chance(test.labels(), &probs)?,
                    fairness: fairness_proxy_auc(test.protected_indicator(), &probs)?,
                }
            } else {
                warn!(
                    fold = split.fold_idx,
                    model = classifier.name(),
                    "Non-finite predictions, scoring fold as chance"
                );
                ObjectiveScore::SENTINEL
            };

            debug!(
                fold = split.fold_idx,
                performance = score.performance,
                fairness = score.fairness,
                "Fold evaluated"
            );
            performance.push(score.performance);
            fairness.push(score.fairness);
        }

        Ok(ObjectiveScore {
            performance: nan_mean(&performance),
            fairness: nan_mean(&fairness),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DatasetSchema;
    use crate::error::KolosalError;
    use crate::training::ConstantClassifier;
    use ndarray::Array2;
    use polars::prelude::*;

    fn dataset(n: usize) -> Dataset {
        let y: Vec<i32> = (0..n).map(|i| (i % 2) as i32).collect();
        let s: Vec<&str> = (0..n).map(|i| if (i / 2) % 2 == 0 { "a" } else { "b" }).collect();
        let x: Vec<f64> = (0..n).map(|i| (i % 7) as f64).collect();
        let df = df!("y" => y, "flag" => s, "x" => x).unwrap();
        Dataset::from_frame(&df, DatasetSchema::new("y").with_protected(vec!["flag".to_string()]))
            .unwrap()
    }

    /// Returns NaN for every row
    struct NanClassifier;

    impl FairClassifier for NanClassifier {
        fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>, _s: &Array1<f64>) -> Result<()> {
            Ok(())
        }

        fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
            Ok(Array2::from_elem((x.nrows(), 2), f64::NAN))
        }

        fn name(&self) -> &'static str {
            "nan"
        }
    }

    /// Fails to fit
    struct BrokenClassifier;

    impl FairClassifier for BrokenClassifier {
        fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>, _s: &Array1<f64>) -> Result<()> {
            Err(KolosalError::TrainingError("diverged".to_string()))
        }

        fn predict_proba(&self, _x: &Array2<f64>) -> Result<Array2<f64>> {
            Err(KolosalError::ModelNotFitted)
        }

        fn name(&self) -> &'static str {
            "broken"
        }
    }

    #[test]
    fn test_loss_weights() {
        let score = ObjectiveScore { performance: 0.8, fairness: 0.6 };
        assert!((score.loss(0.0) + 0.8).abs() < 1e-12);
        assert!((score.loss(1.0) - 0.6).abs() < 1e-12);
        assert!((score.loss(0.5) + 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_constant_classifier_scores_chance() {
        let data = dataset(80);
        let config = PreprocessingConfig::new().with_numeric(vec!["x".to_string()]);
        let score = CrossValidatedObjective::new(&data, &config)
            .with_folds(4)
            .evaluate(|| Box::new(ConstantClassifier::new(0.5)))
            .unwrap();
        assert!((score.performance - 0.5).abs() < 1e-12);
        assert!((score.fairness - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_non_finite_predictions_use_sentinel() {
        let data = dataset(40);
        let config = PreprocessingConfig::new();
        let score = CrossValidatedObjective::new(&data, &config)
            .with_folds(4)
            .evaluate(|| Box::new(NanClassifier))
            .unwrap();
        assert_eq!(score, ObjectiveScore::SENTINEL);
    }

    #[test]
    fn test_undeclared_column_fails_before_folds() {
        let data = dataset(40);
        let config = PreprocessingConfig::new().with_numeric(vec!["z".to_string()]);
        let result = CrossValidatedObjective::new(&data, &config)
            .with_folds(4)
            .evaluate(|| Box::new(BrokenClassifier));
        assert!(matches!(result, Err(KolosalError::FeatureNotFound(name)) if name == "z"));
    }

    #[test]
    fn test_fit_errors_propagate() {
        let data = dataset(40);
        let config = PreprocessingConfig::new();
        let result = CrossValidatedObjective::new(&data, &config)
            .with_folds(4)
            .evaluate(|| Box::new(BrokenClassifier));
        assert!(matches!(result, Err(KolosalError::TrainingError(_))));
    }
}
