//! L1/L2/elastic-net logistic regression

use super::{check_inputs, stack_proba, FairClassifier};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Regularization penalty
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
    ElasticNet,
    None,
}

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    None,
    /// n_samples / (2 * n_class) for each class
    Balanced,
}

/// Logistic regression hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticConfig {
    pub penalty: Penalty,
    /// Inverse regularization strength
    pub c: f64,
    /// Stop once no coefficient moves by more than this
    pub tol: f64,
    pub fit_intercept: bool,
    pub class_weight: ClassWeight,
    pub max_iter: usize,
    /// Share of L1 in the elastic-net penalty
    pub l1_ratio: f64,
    pub learning_rate: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            penalty: Penalty::L2,
            c: 1.0,
            tol: 1e-4,
            fit_intercept: true,
            class_weight: ClassWeight::None,
            max_iter: 100,
            l1_ratio: 0.5,
            learning_rate: 0.1,
        }
    }
}

impl LogisticConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_class_weight(mut self, class_weight: ClassWeight) -> Self {
        self.class_weight = class_weight;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.c.is_nan() || self.c <= 0.0 {
            return Err(KolosalError::InvalidParameter {
                name: "C".to_string(),
                value: self.c.to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.l1_ratio) {
            return Err(KolosalError::InvalidParameter {
                name: "l1_ratio".to_string(),
                value: self.l1_ratio.to_string(),
                reason: "must lie in [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

/// Logistic regression trained by proximal gradient descent.
///
/// Minimizes `mean_i(w_i * logloss_i) + penalty(beta) / (C * n)`, the per-sample
/// form of `C * sum(w_i * logloss_i) + penalty(beta)`. The intercept is never
/// penalized. The protected attribute is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: LogisticConfig,
    coefficients: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
}

impl LogisticRegression {
    /// Create a new logistic regression model
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            coefficients: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }

    /// Sigmoid function
    fn sigmoid(z: &Array1<f64>) -> Array1<f64> {
        z.mapv(|v| 1.0 / (1.0 + (-v).exp()))
    }

    fn sample_weights(&self, y: &Array1<f64>) -> Array1<f64> {
        match self.config.class_weight {
            ClassWeight::None => Array1::ones(y.len()),
            ClassWeight::Balanced => {
                let n = y.len() as f64;
                let n_pos = y.iter().filter(|&&v| v > 0.5).count() as f64;
                let n_neg = n - n_pos;
                let w_pos = if n_pos > 0.0 { n / (2.0 * n_pos) } else { 0.0 };
                let w_neg = if n_neg > 0.0 { n / (2.0 * n_neg) } else { 0.0 };
                y.mapv(|v| if v > 0.5 { w_pos } else { w_neg })
            }
        }
    }

    /// Soft-thresholding operator
    fn soft_threshold(v: f64, t: f64) -> f64 {
        if v > t {
            v - t
        } else if v < -t {
            v + t
        } else {
            0.0
        }
    }

    pub fn coefficients(&self) -> Option<&Array1<f64>> {
        self.coefficients.as_ref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Iterations used by the last fit
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        if x.ncols() != coefficients.len() {
            return Err(KolosalError::ShapeError {
                expected: format!("{} features", coefficients.len()),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok(x.dot(coefficients) + self.intercept)
    }
}

impl FairClassifier for LogisticRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, protected: &Array1<f64>) -> Result<()> {
        check_inputs(x, y, protected)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        let n_features = x.ncols();
        let weights = self.sample_weights(y);

        let lr = self.config.learning_rate;
        let alpha = 1.0 / (self.config.c * n_samples as f64);
        let (l1, l2) = match self.config.penalty {
            Penalty::L1 => (alpha, 0.0),
            Penalty::L2 => (0.0, alpha),
            Penalty::ElasticNet => (
                alpha * self.config.l1_ratio,
                alpha * (1.0 - self.config.l1_ratio),
            ),
            Penalty::None => (0.0, 0.0),
        };

        let mut beta: Array1<f64> = Array1::zeros(n_features);
        let mut bias = 0.0;
        self.n_iter = 0;

        for _ in 0..self.config.max_iter {
            self.n_iter += 1;

            let linear = x.dot(&beta) + bias;
            let predictions = Self::sigmoid(&linear);
            let errors = (&predictions - y) * &weights;

            let grad = x.t().dot(&errors) / n_samples as f64 + l2 * &beta;
            let step: Array1<f64> = &beta - &(lr * &grad);
            let updated = step.mapv(|v| Self::soft_threshold(v, lr * l1));

            let mut max_change = (&updated - &beta)
                .iter()
                .fold(0.0f64, |acc, d| acc.max(d.abs()));
            beta = updated;

            if self.config.fit_intercept {
                let db = errors.sum() / n_samples as f64;
                bias -= lr * db;
                max_change = max_change.max((lr * db).abs());
            }

            if max_change < self.config.tol {
                break;
            }
        }

        self.coefficients = Some(beta);
        self.intercept = bias;
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let positive = Self::sigmoid(&self.decision_function(x)?);
        stack_proba(&positive)
    }

    fn name(&self) -> &'static str {
        "logistic_regression"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn separable() -> (Array2<f64>, Array1<f64>, Array1<f64>) {
        let x = array![[-2.0], [-1.5], [-1.0], [-0.5], [0.5], [1.0], [1.5], [2.0]];
        let y = array![0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let s = Array1::zeros(8);
        (x, y, s)
    }

    #[test]
    fn test_fit_separable() {
        let (x, y, s) = separable();
        let mut model = LogisticRegression::new(LogisticConfig::new().with_max_iter(500));
        model.fit(&x, &y, &s).unwrap();

        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.ncols(), 2);
        assert!(proba[[0, 1]] < 0.5);
        assert!(proba[[7, 1]] > 0.5);
        for row in proba.rows() {
            assert!((row[0] + row[1] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_strong_l1_zeroes_coefficients() {
        let (x, y, s) = separable();
        let mut model = LogisticRegression::new(
            LogisticConfig::new()
                .with_penalty(Penalty::L1)
                .with_c(1e-4)
                .with_max_iter(200),
        );
        model.fit(&x, &y, &s).unwrap();
        assert_eq!(model.coefficients().unwrap()[0], 0.0);
    }

    #[test]
    fn test_balanced_weights() {
        let model = LogisticRegression::new(
            LogisticConfig::new().with_class_weight(ClassWeight::Balanced),
        );
        let w = model.sample_weights(&array![1.0, 0.0, 0.0, 0.0]);
        assert_eq!(w.to_vec(), vec![2.0, 2.0 / 3.0, 2.0 / 3.0, 2.0 / 3.0]);
    }

    #[test]
    fn test_predict_before_fit() {
        let model = LogisticRegression::new(LogisticConfig::default());
        assert!(matches!(
            model.predict_proba(&array![[1.0]]),
            Err(KolosalError::ModelNotFitted)
        ));
    }
}
