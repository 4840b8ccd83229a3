//! Adversarial debiasing
//!
//! A one-hidden-layer classifier is trained jointly with a logistic adversary that
//! tries to recover the protected attribute from the classifier's logit. The
//! classifier's update removes the component of its task gradient that would help
//! the adversary and then moves against the adversary's gradient:
//!
//! `g = grad(task) - proj_{grad(adv)} grad(task) - alpha * grad(adv)`

use super::{check_inputs, stack_proba, FairClassifier};
use crate::error::{KolosalError, Result};
use ndarray::{Array, Array1, Array2, Axis, Dimension};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Adversarial debiasing hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdversarialConfig {
    /// Weight `alpha` of the adversary term in the classifier update
    pub adversary_loss_weight: f64,
    pub num_epochs: usize,
    pub batch_size: usize,
    pub classifier_num_hidden_units: usize,
    /// Train against the adversary; plain classifier when false
    pub debias: bool,
    pub learning_rate: f64,
    pub momentum: f64,
    pub random_state: u64,
}

impl Default for AdversarialConfig {
    fn default() -> Self {
        Self {
            adversary_loss_weight: 0.1,
            num_epochs: 50,
            batch_size: 128,
            classifier_num_hidden_units: 200,
            debias: true,
            learning_rate: 0.01,
            momentum: 0.9,
            random_state: 42,
        }
    }
}

impl AdversarialConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_adversary_loss_weight(mut self, weight: f64) -> Self {
        self.adversary_loss_weight = weight;
        self
    }

    pub fn with_num_epochs(mut self, epochs: usize) -> Self {
        self.num_epochs = epochs;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_hidden_units(mut self, units: usize) -> Self {
        self.classifier_num_hidden_units = units;
        self
    }

    pub fn with_debias(mut self, debias: bool) -> Self {
        self.debias = debias;
        self
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("batch_size", self.batch_size),
            ("classifier_num_hidden_units", self.classifier_num_hidden_units),
        ] {
            if value == 0 {
                return Err(KolosalError::InvalidParameter {
                    name: name.to_string(),
                    value: "0".to_string(),
                    reason: "must be positive".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Classifier parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Classifier {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array1<f64>,
    b2: f64,
}

/// Gradients of one loss with respect to the classifier parameters
struct ClassifierGrad {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array1<f64>,
    b2: f64,
}

/// Hidden activations, pre-activations and output logits of a batch
struct Forward {
    pre: Array2<f64>,
    hidden: Array2<f64>,
    logits: Array1<f64>,
}

impl Classifier {
    fn new(n_features: usize, n_hidden: usize, rng: &mut Xoshiro256PlusPlus) -> Self {
        // Xavier/Glorot initialization
        let scale1 = (2.0 / (n_features + n_hidden) as f64).sqrt();
        let scale2 = (2.0 / (n_hidden + 1) as f64).sqrt();
        Self {
            w1: Array2::from_shape_fn((n_features, n_hidden), |_| rng.gen::<f64>() * 2.0 * scale1 - scale1),
            b1: Array1::zeros(n_hidden),
            w2: Array1::from_shape_fn(n_hidden, |_| rng.gen::<f64>() * 2.0 * scale2 - scale2),
            b2: 0.0,
        }
    }

    fn forward(&self, x: &Array2<f64>) -> Forward {
        let pre = x.dot(&self.w1) + &self.b1;
        let hidden = pre.mapv(|v| v.max(0.0));
        let logits = hidden.dot(&self.w2) + self.b2;
        Forward { pre, hidden, logits }
    }

    /// Backpropagate a gradient with respect to the logits
    fn backward(&self, x: &Array2<f64>, fwd: &Forward, d_logits: &Array1<f64>) -> ClassifierGrad {
        let w2 = fwd.hidden.t().dot(d_logits);
        let b2 = d_logits.sum();

        let d_hidden = d_logits
            .view()
            .insert_axis(Axis(1))
            .dot(&self.w2.view().insert_axis(Axis(0)));
        let d_pre = d_hidden * fwd.pre.mapv(|v| if v > 0.0 { 1.0 } else { 0.0 });

        ClassifierGrad {
            w1: x.t().dot(&d_pre),
            b1: d_pre.sum_axis(Axis(0)),
            w2,
            b2,
        }
    }
}

/// Remove the projection of `task` onto `adv`, then step against `adv`
fn debias_gradient<D: Dimension>(task: &Array<f64, D>, adv: &Array<f64, D>, alpha: f64) -> Array<f64, D> {
    let norm = adv.iter().map(|v| v * v).sum::<f64>().sqrt();
    if norm <= 1e-12 {
        return task - &(adv * alpha);
    }
    let unit = adv / norm;
    let proj = task.iter().zip(unit.iter()).map(|(t, u)| t * u).sum::<f64>();
    task - &(&unit * proj) - &(adv * alpha)
}

fn debias_scalar(task: f64, adv: f64, alpha: f64) -> f64 {
    // One-dimensional projection removes the whole adversary-aligned part
    if adv.abs() <= 1e-12 {
        task - alpha * adv
    } else {
        -alpha * adv
    }
}

/// Logistic adversary over `sigmoid((1 + |c|) * logit)`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Adversary {
    c: f64,
    v: f64,
    d: f64,
}

/// Classifier trained against an adversary predicting the protected attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdversarialDebiasing {
    config: AdversarialConfig,
    classifier: Option<Classifier>,
    n_features: usize,
}

impl AdversarialDebiasing {
    /// Create a new, unfitted model
    pub fn new(config: AdversarialConfig) -> Self {
        Self {
            config,
            classifier: None,
            n_features: 0,
        }
    }

    fn gather_rows(x: &Array2<f64>, indices: &[usize]) -> Array2<f64> {
        x.select(Axis(0), indices)
    }
}

impl FairClassifier for AdversarialDebiasing {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, protected: &Array1<f64>) -> Result<()> {
        check_inputs(x, y, protected)?;
        self.config.validate()?;

        let n_samples = x.nrows();
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(self.config.random_state);
        let mut clf = Classifier::new(x.ncols(), self.config.classifier_num_hidden_units, &mut rng);
        let mut adv = Adversary { c: 1.0, v: 0.0, d: 0.0 };

        let lr = self.config.learning_rate;
        let mu = self.config.momentum;
        let alpha = self.config.adversary_loss_weight;

        let mut vel_w1 = Array2::<f64>::zeros(clf.w1.raw_dim());
        let mut vel_b1 = Array1::<f64>::zeros(clf.b1.len());
        let mut vel_w2 = Array1::<f64>::zeros(clf.w2.len());
        let mut vel_b2 = 0.0;

        let mut indices: Vec<usize> = (0..n_samples).collect();
        for _epoch in 0..self.config.num_epochs {
            indices.shuffle(&mut rng);

            for batch in indices.chunks(self.config.batch_size) {
                let xb = Self::gather_rows(x, batch);
                let yb: Array1<f64> = batch.iter().map(|&i| y[i]).collect();
                let sb: Array1<f64> = batch.iter().map(|&i| protected[i]).collect();
                let nb = batch.len() as f64;

                let fwd = clf.forward(&xb);
                let d_task: Array1<f64> = fwd
                    .logits
                    .iter()
                    .zip(yb.iter())
                    .map(|(&z, &t)| (sigmoid(z) - t) / nb)
                    .collect();
                let task = clf.backward(&xb, &fwd, &d_task);

                let (g_w1, g_b1, g_w2, g_b2) = if self.config.debias {
                    let gain = 1.0 + adv.c.abs();
                    let a: Array1<f64> = fwd.logits.mapv(|z| sigmoid(gain * z));
                    let d_u: Array1<f64> = a
                        .iter()
                        .zip(sb.iter())
                        .map(|(&ai, &si)| (sigmoid(adv.v * ai + adv.d) - si) / nb)
                        .collect();

                    // Adversary gradients
                    let g_v: f64 = d_u.iter().zip(a.iter()).map(|(du, ai)| du * ai).sum();
                    let g_d: f64 = d_u.sum();
                    let g_c: f64 = d_u
                        .iter()
                        .zip(a.iter())
                        .zip(fwd.logits.iter())
                        .map(|((du, ai), z)| du * adv.v * ai * (1.0 - ai) * z * adv.c.signum())
                        .sum();

                    // Adversary loss with respect to the classifier logits
                    let d_logits_adv: Array1<f64> = d_u
                        .iter()
                        .zip(a.iter())
                        .map(|(du, ai)| du * adv.v * ai * (1.0 - ai) * gain)
                        .collect();
                    let adv_grad = clf.backward(&xb, &fwd, &d_logits_adv);

                    adv.v -= lr * g_v;
                    adv.d -= lr * g_d;
                    adv.c -= lr * g_c;

                    (
                        debias_gradient(&task.w1, &adv_grad.w1, alpha),
                        debias_gradient(&task.b1, &adv_grad.b1, alpha),
                        debias_gradient(&task.w2, &adv_grad.w2, alpha),
                        debias_scalar(task.b2, adv_grad.b2, alpha),
                    )
                } else {
                    (task.w1, task.b1, task.w2, task.b2)
                };

                vel_w1 = &vel_w1 * mu - &(g_w1 * lr);
                vel_b1 = &vel_b1 * mu - &(g_b1 * lr);
                vel_w2 = &vel_w2 * mu - &(g_w2 * lr);
                vel_b2 = vel_b2 * mu - g_b2 * lr;

                clf.w1 += &vel_w1;
                clf.b1 += &vel_b1;
                clf.w2 += &vel_w2;
                clf.b2 += vel_b2;
            }
        }

        debug!(
            epochs = self.config.num_epochs,
            hidden = self.config.classifier_num_hidden_units,
            debias = self.config.debias,
            adversary_weight = adv.v,
            "Fitted adversarial debiasing model"
        );

        self.classifier = Some(clf);
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let clf = self.classifier.as_ref().ok_or(KolosalError::ModelNotFitted)?;
        if x.ncols() != self.n_features {
            return Err(KolosalError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        let positive = clf.forward(x).logits.mapv(sigmoid);
        stack_proba(&positive)
    }

    fn name(&self) -> &'static str {
        "adversarial_debiasing"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn data() -> (Array2<f64>, Array1<f64>, Array1<f64>) {
        let n = 40;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            let label = if i < n / 2 { -1.0 } else { 1.0 };
            if j == 0 { label } else { (i % 5) as f64 / 5.0 }
        });
        let y = Array1::from_shape_fn(n, |i| if i < n / 2 { 0.0 } else { 1.0 });
        let s = Array1::from_shape_fn(n, |i| (i % 2) as f64);
        (x, y, s)
    }

    #[test]
    fn test_projection_removes_aligned_component() {
        let task = array![1.0, 1.0];
        let adv = array![1.0, 0.0];
        let g = debias_gradient(&task, &adv, 0.0);
        assert!((g[0]).abs() < 1e-12);
        assert!((g[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_without_debias_learns_label() {
        let (x, y, s) = data();
        let mut model = AdversarialDebiasing::new(
            AdversarialConfig::new()
                .with_debias(false)
                .with_num_epochs(200)
                .with_batch_size(8)
                .with_hidden_units(8),
        );
        model.fit(&x, &y, &s).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert!(proba[[0, 1]] < 0.5);
        assert!(proba[[39, 1]] > 0.5);
    }

    #[test]
    fn test_debiased_predictions_are_probabilities() {
        let (x, y, s) = data();
        let mut model = AdversarialDebiasing::new(
            AdversarialConfig::new()
                .with_num_epochs(20)
                .with_batch_size(16)
                .with_hidden_units(8)
                .with_adversary_loss_weight(0.5),
        );
        model.fit(&x, &y, &s).unwrap();
        let proba = model.predict_proba(&x).unwrap();
        assert_eq!(proba.dim(), (40, 2));
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let (x, y, s) = data();
        let mut model = AdversarialDebiasing::new(AdversarialConfig::new().with_batch_size(0));
        assert!(model.fit(&x, &y, &s).is_err());
    }
}
