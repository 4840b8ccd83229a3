//! Classifier trait and shared helpers

use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Binary classifier that may use a protected attribute while fitting.
///
/// Families that are not fairness-aware ignore `protected`. `predict_proba` returns an
/// `n x 2` matrix whose second column is the positive-class probability.
pub trait FairClassifier: Send {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, protected: &Array1<f64>) -> Result<()>;

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>>;

    fn name(&self) -> &'static str;

    /// Positive-class column of [`FairClassifier::predict_proba`]
    fn predict_positive(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let proba = self.predict_proba(x)?;
        if proba.ncols() != 2 {
            return Err(KolosalError::ShapeError {
                expected: "2 probability columns".to_string(),
                actual: format!("{} columns", proba.ncols()),
            });
        }
        Ok(proba.index_axis(Axis(1), 1).to_owned())
    }
}

/// Validate the shapes of a training call
pub(crate) fn check_inputs(x: &Array2<f64>, y: &Array1<f64>, protected: &Array1<f64>) -> Result<()> {
    if x.nrows() == 0 {
        return Err(KolosalError::TrainingError("empty training set".to_string()));
    }
    if y.len() != x.nrows() {
        return Err(KolosalError::length_mismatch("labels", x.nrows(), y.len()));
    }
    if protected.len() != x.nrows() {
        return Err(KolosalError::length_mismatch("protected attribute", x.nrows(), protected.len()));
    }
    Ok(())
}

/// Stack positive-class probabilities into `[1 - p, p]` rows
pub(crate) fn stack_proba(positive: &Array1<f64>) -> Result<Array2<f64>> {
    let negative = positive.mapv(|p| 1.0 - p);
    Ok(ndarray::stack(Axis(1), &[negative.view(), positive.view()])?)
}

/// Predicts the same probability for every row.
///
/// With `probability = None` the training positive rate is used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConstantClassifier {
    probability: Option<f64>,
    fitted: Option<f64>,
}

impl ConstantClassifier {
    /// Always predict `probability`
    pub fn new(probability: f64) -> Self {
        Self {
            probability: Some(probability),
            fitted: None,
        }
    }

    /// Predict the training prevalence
    pub fn prior() -> Self {
        Self::default()
    }
}

impl FairClassifier for ConstantClassifier {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, protected: &Array1<f64>) -> Result<()> {
        check_inputs(x, y, protected)?;
        self.fitted = Some(self.probability.unwrap_or_else(|| y.mean().unwrap_or(0.5)));
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let p = self.fitted.ok_or(KolosalError::ModelNotFitted)?;
        stack_proba(&Array1::from_elem(x.nrows(), p))
    }

    fn name(&self) -> &'static str {
        "constant"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_stack_proba_rows_sum_to_one() {
        let proba = stack_proba(&array![0.2, 0.9]).unwrap();
        assert_eq!(proba.dim(), (2, 2));
        assert!((proba[[0, 0]] - 0.8).abs() < 1e-12);
        assert!((proba[[1, 1]] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_check_inputs_lengths() {
        let x = Array2::zeros((3, 1));
        assert!(check_inputs(&x, &array![0.0, 1.0, 0.0], &array![0.0, 0.0, 1.0]).is_ok());
        assert!(check_inputs(&x, &array![0.0, 1.0], &array![0.0, 0.0, 1.0]).is_err());
        assert!(check_inputs(&x, &array![0.0, 1.0, 0.0], &array![0.0]).is_err());
        assert!(check_inputs(&Array2::zeros((0, 1)), &array![], &array![]).is_err());
    }

    #[test]
    fn test_constant_classifier() {
        let x = Array2::zeros((4, 1));
        let y = array![1.0, 0.0, 1.0, 1.0];
        let s = array![0.0, 1.0, 0.0, 1.0];

        let mut fixed = ConstantClassifier::new(0.5);
        fixed.fit(&x, &y, &s).unwrap();
        assert!(fixed.predict_positive(&x).unwrap().iter().all(|&p| p == 0.5));

        let mut prior = ConstantClassifier::prior();
        assert!(prior.predict_proba(&x).is_err());
        prior.fit(&x, &y, &s).unwrap();
        assert_eq!(prior.predict_positive(&x).unwrap()[0], 0.75);
    }
}
