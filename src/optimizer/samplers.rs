//! Sampling strategies for hyperparameter optimization

use super::search_space::{Distribution, Parameter, ParameterValue, SearchSpace, TrialParams};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// Type of sampler to use
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SamplerType {
    /// Random sampling
    Random,
    /// Tree-structured Parzen Estimator
    TPE,
}

/// Trait for hyperparameter samplers
pub trait Sampler: Send {
    /// Propose the next configuration
    fn propose(&mut self, search_space: &SearchSpace) -> TrialParams;

    /// Record the loss of a completed configuration
    fn observe(&mut self, params: &TrialParams, loss: f64);
}

fn seeded_rng(seed: Option<u64>) -> Xoshiro256PlusPlus {
    match seed {
        Some(s) => Xoshiro256PlusPlus::seed_from_u64(s),
        None => Xoshiro256PlusPlus::from_entropy(),
    }
}

/// Random sampler
#[derive(Debug)]
pub struct RandomSampler {
    rng: Xoshiro256PlusPlus,
}

impl RandomSampler {
    /// Create a new random sampler
    pub fn new(seed: Option<u64>) -> Self {
        Self { rng: seeded_rng(seed) }
    }
}

impl Sampler for RandomSampler {
    fn propose(&mut self, search_space: &SearchSpace) -> TrialParams {
        search_space.sample(&mut self.rng)
    }

    fn observe(&mut self, _params: &TrialParams, _loss: f64) {}
}

fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

/// Error function approximation (Abramowitz and Stegun)
fn erf(x: f64) -> f64 {
    let a1 = 0.254829592;
    let a2 = -0.284496736;
    let a3 = 1.421413741;
    let a4 = -1.453152027;
    let a5 = 1.061405429;
    let p = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();

    let t = 1.0 / (1.0 + p * x);
    let y = 1.0 - (((((a5 * t + a4) * t) + a3) * t + a2) * t + a1) * t * (-x * x).exp();

    sign * y
}

/// Box-Muller standard normal draw
fn standard_normal(rng: &mut impl Rng) -> f64 {
    let u1: f64 = rng.gen::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.gen();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Mixture of truncated Gaussians over `[low, high]`, one per observation plus a prior
/// component centred on the interval.
#[derive(Debug)]
struct ParzenEstimator {
    mus: Vec<f64>,
    sigmas: Vec<f64>,
    low: f64,
    high: f64,
}

impl ParzenEstimator {
    fn new(observations: &[f64], low: f64, high: f64) -> Self {
        let width = (high - low).max(f64::EPSILON);
        let mut mus: Vec<f64> = observations.to_vec();
        mus.push(0.5 * (low + high));
        mus.sort_by(|a, b| a.total_cmp(b));

        // Bandwidth: distance to the farther neighbour, clipped
        let min_sigma = width / (100.0f64).min(mus.len() as f64 + 1.0);
        let sigmas = (0..mus.len())
            .map(|i| {
                let left = if i > 0 { mus[i] - mus[i - 1] } else { mus[i] - low };
                let right = if i + 1 < mus.len() { mus[i + 1] - mus[i] } else { high - mus[i] };
                left.max(right).clamp(min_sigma, width)
            })
            .collect();

        Self { mus, sigmas, low, high }
    }

    fn sample(&self, rng: &mut impl Rng) -> f64 {
        let k = rng.gen_range(0..self.mus.len());
        for _ in 0..100 {
            let x = self.mus[k] + self.sigmas[k] * standard_normal(rng);
            if (self.low..=self.high).contains(&x) {
                return x;
            }
        }
        self.mus[k].clamp(self.low, self.high)
    }

    fn log_pdf(&self, x: f64) -> f64 {
        let n = self.mus.len() as f64;
        let density: f64 = self
            .mus
            .iter()
            .zip(self.sigmas.iter())
            .map(|(&mu, &sigma)| {
                let z = (x - mu) / sigma;
                let pdf = (-0.5 * z * z).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt());
                let mass = normal_cdf((self.high - mu) / sigma) - normal_cdf((self.low - mu) / sigma);
                pdf / mass.max(1e-12)
            })
            .sum::<f64>()
            / n;
        density.max(1e-300).ln()
    }
}

/// Categorical estimator: observed counts plus one prior count per choice
#[derive(Debug)]
struct CategoricalEstimator {
    weights: Vec<f64>,
}

impl CategoricalEstimator {
    fn new(observations: &[usize], n_choices: usize) -> Self {
        let mut weights = vec![1.0; n_choices];
        for &idx in observations {
            if idx < n_choices {
                weights[idx] += 1.0;
            }
        }
        let total: f64 = weights.iter().sum();
        weights.iter_mut().for_each(|w| *w /= total);
        Self { weights }
    }

    fn sample(&self, rng: &mut impl Rng) -> usize {
        let mut u: f64 = rng.gen();
        for (idx, w) in self.weights.iter().enumerate() {
            if u < *w {
                return idx;
            }
            u -= w;
        }
        self.weights.len().saturating_sub(1)
    }

    fn log_pmf(&self, idx: usize) -> f64 {
        self.weights.get(idx).copied().unwrap_or(0.0).max(1e-300).ln()
    }
}

/// Tree-structured Parzen Estimator sampler.
///
/// After `n_startup_trials` random proposals, observed trials are split at the
/// `gamma` quantile of loss into a good set `l(x)` and a bad set `g(x)`. Each
/// parameter independently draws `n_candidates` values from `l` and keeps the one
/// maximizing `l(x) / g(x)`.
#[derive(Debug)]
pub struct TPESampler {
    rng: Xoshiro256PlusPlus,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
    history: Vec<(TrialParams, f64)>,
}

impl TPESampler {
    /// Create a new TPE sampler
    pub fn new(seed: Option<u64>) -> Self {
        Self {
            rng: seeded_rng(seed),
            n_startup_trials: 10,
            gamma: 0.25,
            n_candidates: 24,
            history: Vec::new(),
        }
    }

    /// Set number of startup trials
    pub fn with_n_startup(mut self, n: usize) -> Self {
        self.n_startup_trials = n;
        self
    }

    /// Set gamma (quantile for splitting good/bad)
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma.clamp(f64::EPSILON, 1.0);
        self
    }

    pub fn with_n_candidates(mut self, n: usize) -> Self {
        self.n_candidates = n.max(1);
        self
    }

    fn split_history(&self) -> (Vec<&TrialParams>, Vec<&TrialParams>) {
        let mut sorted: Vec<&(TrialParams, f64)> = self.history.iter().collect();
        // Stable sort keeps first-seen order among equal losses
        sorted.sort_by(|a, b| a.1.total_cmp(&b.1));

        let n_good = ((sorted.len() as f64 * self.gamma).ceil() as usize).clamp(1, sorted.len());
        let good = sorted[..n_good].iter().map(|(p, _)| p).collect();
        let bad = sorted[n_good..].iter().map(|(p, _)| p).collect();
        (good, bad)
    }

    fn propose_continuous(
        &mut self,
        param: &Parameter,
        low: f64,
        high: f64,
        good: &[&TrialParams],
        bad: &[&TrialParams],
    ) -> ParameterValue {
        let values = |set: &[&TrialParams]| -> Vec<f64> {
            set.iter()
                .filter_map(|p| p.get(&param.name).and_then(ParameterValue::as_float))
                .collect()
        };
        let below = ParzenEstimator::new(&values(good), low, high);
        let above = ParzenEstimator::new(&values(bad), low, high);

        let mut best = below.sample(&mut self.rng);
        let mut best_score = f64::NEG_INFINITY;
        for _ in 0..self.n_candidates {
            let x = below.sample(&mut self.rng);
            let score = below.log_pdf(x) - above.log_pdf(x);
            if score > best_score {
                best_score = score;
                best = x;
            }
        }
        param.distribution.quantize(best)
    }

    fn propose_choice(
        &mut self,
        param: &Parameter,
        choices: &[ParameterValue],
        good: &[&TrialParams],
        bad: &[&TrialParams],
    ) -> ParameterValue {
        let indices = |set: &[&TrialParams]| -> Vec<usize> {
            set.iter()
                .filter_map(|p| p.get(&param.name))
                .filter_map(|v| choices.iter().position(|c| c == v))
                .collect()
        };
        let below = CategoricalEstimator::new(&indices(good), choices.len());
        let above = CategoricalEstimator::new(&indices(bad), choices.len());

        let mut best = below.sample(&mut self.rng);
        let mut best_score = f64::NEG_INFINITY;
        for _ in 0..self.n_candidates {
            let idx = below.sample(&mut self.rng);
            let score = below.log_pmf(idx) - above.log_pmf(idx);
            if score > best_score {
                best_score = score;
                best = idx;
            }
        }
        choices
            .get(best)
            .cloned()
            .unwrap_or_else(|| param.sample(&mut self.rng))
    }
}

impl Sampler for TPESampler {
    fn propose(&mut self, search_space: &SearchSpace) -> TrialParams {
        // Use random sampling for startup trials
        if self.history.len() < self.n_startup_trials.max(1) {
            return search_space.sample(&mut self.rng);
        }

        let (good, bad) = self.split_history();
        let good: Vec<TrialParams> = good.into_iter().cloned().collect();
        let bad: Vec<TrialParams> = bad.into_iter().cloned().collect();
        let good_refs: Vec<&TrialParams> = good.iter().collect();
        let bad_refs: Vec<&TrialParams> = bad.iter().collect();

        search_space
            .parameters()
            .iter()
            .map(|param| {
                let value = match &param.distribution {
                    Distribution::Choice { choices } => {
                        self.propose_choice(param, choices, &good_refs, &bad_refs)
                    }
                    Distribution::Uniform { low, high }
                    | Distribution::QUniformInt { low, high, .. } => {
                        self.propose_continuous(param, *low, *high, &good_refs, &bad_refs)
                    }
                };
                (param.name.clone(), value)
            })
            .collect()
    }

    fn observe(&mut self, params: &TrialParams, loss: f64) {
        if loss.is_finite() {
            self.history.push((params.clone(), loss));
        }
    }
}

/// Create a sampler from type
pub fn create_sampler(
    sampler_type: SamplerType,
    seed: Option<u64>,
    n_startup_trials: usize,
    gamma: f64,
    n_candidates: usize,
) -> Box<dyn Sampler> {
    match sampler_type {
        SamplerType::Random => Box::new(RandomSampler::new(seed)),
        SamplerType::TPE => Box::new(
            TPESampler::new(seed)
                .with_n_startup(n_startup_trials)
                .with_gamma(gamma)
                .with_n_candidates(n_candidates),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .uniform("x", -5.0, 5.0)
            .quniform("n", 1.0, 20.0, 1.0)
            .choice("kind", vec!["a", "b", "c"])
    }

    #[test]
    fn test_random_sampler() {
        let mut sampler = RandomSampler::new(Some(42));
        let params = sampler.propose(&space());
        assert_eq!(params.len(), 3);
        assert!(params["n"].as_int().is_some());
    }

    #[test]
    fn test_tpe_reproducible() {
        let run = || {
            let mut sampler = TPESampler::new(Some(7)).with_n_startup(3);
            let mut out = Vec::new();
            for _ in 0..8 {
                let p = sampler.propose(&space());
                let loss = p["x"].as_float().unwrap().powi(2);
                sampler.observe(&p, loss);
                out.push(p["x"].as_float().unwrap());
            }
            out
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_tpe_stays_in_bounds() {
        let mut sampler = TPESampler::new(Some(1)).with_n_startup(5);
        for _ in 0..40 {
            let p = sampler.propose(&space());
            let x = p["x"].as_float().unwrap();
            let n = p["n"].as_int().unwrap();
            assert!((-5.0..=5.0).contains(&x));
            assert!((1..=20).contains(&n));
            assert!(["a", "b", "c"].contains(&p["kind"].as_string().unwrap()));
            sampler.observe(&p, x.abs());
        }
    }

    #[test]
    fn test_tpe_concentrates_near_optimum() {
        let space = SearchSpace::new().uniform("x", -10.0, 10.0);
        let mut sampler = TPESampler::new(Some(42));
        let mut late = Vec::new();
        for i in 0..80 {
            let p = sampler.propose(&space);
            let x = p["x"].as_float().unwrap();
            sampler.observe(&p, (x - 3.0).powi(2));
            if i >= 60 {
                late.push((x - 3.0).abs());
            }
        }
        let mean_dist = late.iter().sum::<f64>() / late.len() as f64;
        // Uniform draws would average 5.45 away from 3.0
        assert!(mean_dist < 3.0, "mean distance {}", mean_dist);
    }

    #[test]
    fn test_non_finite_losses_ignored() {
        let mut sampler = TPESampler::new(Some(0));
        let p = sampler.propose(&space());
        sampler.observe(&p, f64::NAN);
        assert!(sampler.history.is_empty());
    }

    #[test]
    fn test_parzen_log_pdf_prefers_observations() {
        let est = ParzenEstimator::new(&[1.0, 1.1, 0.9], -10.0, 10.0);
        assert!(est.log_pdf(1.0) > est.log_pdf(8.0));
    }
}
