//! Fairness-aware random forest

use super::{check_inputs, stack_proba, FairClassifier};
use crate::error::{KolosalError, Result};
use ndarray::{Array1, Array2};
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Fair random forest hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairForestConfig {
    /// Weight of the protected-attribute impurity in the split score
    pub theta: f64,
    /// Maximum number of candidate thresholds per feature and node
    pub n_bins: usize,
    pub bootstrap: bool,
    pub max_depth: usize,
    /// Fraction of features considered at each node
    pub max_features: f64,
    pub n_estimators: usize,
    pub min_samples_leaf: usize,
    pub min_samples_split: usize,
    pub random_state: u64,
}

impl Default for FairForestConfig {
    fn default() -> Self {
        Self {
            theta: 0.0,
            n_bins: 256,
            bootstrap: true,
            max_depth: 10,
            max_features: 0.5,
            n_estimators: 100,
            min_samples_leaf: 1,
            min_samples_split: 2,
            random_state: 42,
        }
    }
}

impl FairForestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_theta(mut self, theta: f64) -> Self {
        self.theta = theta;
        self
    }

    pub fn with_n_estimators(mut self, n: usize) -> Self {
        self.n_estimators = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_max_features(mut self, fraction: f64) -> Self {
        self.max_features = fraction;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.theta) {
            return Err(KolosalError::InvalidParameter {
                name: "theta".to_string(),
                value: self.theta.to_string(),
                reason: "must lie in [0, 1]".to_string(),
            });
        }
        if self.n_estimators == 0 {
            return Err(KolosalError::InvalidParameter {
                name: "n_estimators".to_string(),
                value: "0".to_string(),
                reason: "at least one tree is required".to_string(),
            });
        }
        if self.n_bins < 2 {
            return Err(KolosalError::InvalidParameter {
                name: "n_bins".to_string(),
                value: self.n_bins.to_string(),
                reason: "must be at least 2".to_string(),
            });
        }
        Ok(())
    }
}

/// Tree node
#[derive(Debug, Clone, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn predict(&self, row: ndarray::ArrayView1<f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature_idx] <= *threshold { left } else { right };
                }
            }
        }
    }
}

/// Gini impurity of a binary variable with `k` positives among `n`
fn gini(n: f64, k: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    let p = k / n;
    2.0 * p * (1.0 - p)
}

/// Running label and protected counts on one side of a split
#[derive(Debug, Clone, Copy, Default)]
struct SideCounts {
    n: f64,
    y: f64,
    s: f64,
}

/// Builds one tree whose splits trade label purity against protected purity.
///
/// score = (1 - theta) * gain(y) - theta * gain(s)
///
/// where gain is the Gini decrease. Splits that make the children more
/// homogeneous in the protected attribute are penalized.
struct TreeBuilder<'a> {
    config: &'a FairForestConfig,
    x: &'a Array2<f64>,
    y: &'a Array1<f64>,
    s: &'a Array1<f64>,
    n_candidate_features: usize,
}

impl TreeBuilder<'_> {
    fn build(&self, indices: &[usize], depth: usize, rng: &mut ChaCha8Rng) -> TreeNode {
        let n = indices.len();
        let positives: f64 = indices.iter().map(|&i| self.y[i]).sum();
        let value = if n > 0 { positives / n as f64 } else { 0.5 };

        let pure = positives == 0.0 || positives == n as f64;
        if pure
            || depth >= self.config.max_depth
            || n < self.config.min_samples_split
            || n < 2 * self.config.min_samples_leaf
        {
            return TreeNode::Leaf { value };
        }

        let features = sample(rng, self.x.ncols(), self.n_candidate_features);
        let best = features
            .iter()
            .filter_map(|f| self.best_split_for_feature(f, indices))
            .max_by(|a, b| a.2.total_cmp(&b.2));

        match best {
            Some((feature_idx, threshold, score)) if score > 1e-12 => {
                let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
                    .iter()
                    .partition(|&&i| self.x[[i, feature_idx]] <= threshold);
                let left = Box::new(self.build(&left_idx, depth + 1, rng));
                let right = Box::new(self.build(&right_idx, depth + 1, rng));
                TreeNode::Split {
                    feature_idx,
                    threshold,
                    left,
                    right,
                }
            }
            _ => TreeNode::Leaf { value },
        }
    }

    fn best_split_for_feature(&self, feature_idx: usize, indices: &[usize]) -> Option<(usize, f64, f64)> {
        let mut rows: Vec<(f64, f64, f64)> = indices
            .iter()
            .map(|&i| (self.x[[i, feature_idx]], self.y[i], self.s[i]))
            .collect();
        rows.sort_by(|a, b| a.0.total_cmp(&b.0));

        // Positions after which the value changes
        let boundaries: Vec<usize> = (0..rows.len().saturating_sub(1))
            .filter(|&i| rows[i].0 < rows[i + 1].0)
            .collect();
        if boundaries.is_empty() {
            return None;
        }
        let max_candidates = self.config.n_bins - 1;
        let candidates: Vec<usize> = if boundaries.len() > max_candidates {
            (0..max_candidates)
                .map(|j| boundaries[j * boundaries.len() / max_candidates])
                .collect()
        } else {
            boundaries
        };

        let total = rows.iter().fold(SideCounts::default(), |acc, r| SideCounts {
            n: acc.n + 1.0,
            y: acc.y + r.1,
            s: acc.s + r.2,
        });
        let parent_y = gini(total.n, total.y);
        let parent_s = gini(total.n, total.s);
        let theta = self.config.theta;
        let min_leaf = self.config.min_samples_leaf;

        let mut left = SideCounts::default();
        let mut cursor = 0usize;
        let mut best: Option<(f64, f64)> = None;

        for &pos in &candidates {
            while cursor <= pos {
                left.n += 1.0;
                left.y += rows[cursor].1;
                left.s += rows[cursor].2;
                cursor += 1;
            }
            let n_left = pos + 1;
            let n_right = rows.len() - n_left;
            if n_left < min_leaf || n_right < min_leaf {
                continue;
            }

            let right = SideCounts {
                n: total.n - left.n,
                y: total.y - left.y,
                s: total.s - left.s,
            };
            let child_y = (left.n * gini(left.n, left.y) + right.n * gini(right.n, right.y)) / total.n;
            let child_s = (left.n * gini(left.n, left.s) + right.n * gini(right.n, right.s)) / total.n;
            let score = (1.0 - theta) * (parent_y - child_y) - theta * (parent_s - child_s);

            if best.map_or(true, |(_, b)| score > b) {
                let threshold = (rows[pos].0 + rows[pos + 1].0) / 2.0;
                best = Some((threshold, score));
            }
        }

        best.map(|(threshold, score)| (feature_idx, threshold, score))
    }
}

/// Random forest of fairness-aware trees; predicts averaged leaf positive rates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FairRandomForest {
    config: FairForestConfig,
    trees: Vec<TreeNode>,
    n_features: usize,
}

impl FairRandomForest {
    /// Create a new, unfitted forest
    pub fn new(config: FairForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn n_candidate_features(&self, n_features: usize) -> usize {
        ((self.config.max_features * n_features as f64).round() as usize).clamp(1, n_features.max(1))
    }
}

impl FairClassifier for FairRandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>, protected: &Array1<f64>) -> Result<()> {
        check_inputs(x, y, protected)?;
        self.config.validate()?;
        if x.ncols() == 0 {
            return Err(KolosalError::TrainingError("no features to split on".to_string()));
        }

        let n_samples = x.nrows();
        let builder = TreeBuilder {
            config: &self.config,
            x,
            y,
            s: protected,
            n_candidate_features: self.n_candidate_features(x.ncols()),
        };
        let base_seed = self.config.random_state;
        let bootstrap = self.config.bootstrap;

        let trees: Vec<TreeNode> = (0..self.config.n_estimators)
            .into_par_iter()
            .map(|tree_idx| {
                let mut rng = ChaCha8Rng::seed_from_u64(base_seed.wrapping_add(tree_idx as u64));
                let sample_indices: Vec<usize> = if bootstrap {
                    (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect()
                } else {
                    (0..n_samples).collect()
                };
                builder.build(&sample_indices, 0, &mut rng)
            })
            .collect();

        debug!(
            trees = trees.len(),
            theta = self.config.theta,
            "Fitted fair random forest"
        );

        self.trees = trees;
        self.n_features = x.ncols();
        Ok(())
    }

    fn predict_proba(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        if self.trees.is_empty() {
            return Err(KolosalError::ModelNotFitted);
        }
        if x.ncols() != self.n_features {
            return Err(KolosalError::ShapeError {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }

        let n_trees = self.trees.len() as f64;
        let positive: Array1<f64> = x
            .rows()
            .into_iter()
            .map(|row| self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / n_trees)
            .collect();
        stack_proba(&positive)
    }

    fn name(&self) -> &'static str {
        "fair_random_forest"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    /// Feature 0 predicts y and equals s; feature 1 predicts y and is independent of s
    fn data() -> (Array2<f64>, Array1<f64>, Array1<f64>) {
        let mut x = Array2::zeros((16, 2));
        let mut y = Array1::zeros(16);
        let mut s = Array1::zeros(16);
        for i in 0..16 {
            let yi = if i < 8 { 0.0 } else { 1.0 };
            let si = if i % 2 == 0 { 0.0 } else { 1.0 };
            x[[i, 0]] = si + 0.1 * yi;
            x[[i, 1]] = yi;
            y[i] = yi;
            s[i] = si;
        }
        (x, y, s)
    }

    #[test]
    fn test_gini() {
        assert_eq!(gini(4.0, 2.0), 0.5);
        assert_eq!(gini(4.0, 0.0), 0.0);
        assert_eq!(gini(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_forest_learns_label() {
        let (x, y, s) = data();
        let mut forest = FairRandomForest::new(
            FairForestConfig::new()
                .with_n_estimators(10)
                .with_max_features(1.0),
        );
        forest.fit(&x, &y, &s).unwrap();
        assert_eq!(forest.n_trees(), 10);

        let proba = forest.predict_proba(&x).unwrap();
        assert!(proba[[0, 1]] < 0.5);
        assert!(proba[[15, 1]] > 0.5);
    }

    #[test]
    fn test_full_theta_never_splits_on_label_alone() {
        let (x, y, s) = data();
        let mut forest = FairRandomForest::new(
            FairForestConfig::new()
                .with_theta(1.0)
                .with_n_estimators(3)
                .with_max_features(1.0),
        );
        forest.fit(&x, &y, &s).unwrap();
        // Splits can only lower the score when theta is 1, so every tree is a single leaf
        for tree in &forest.trees {
            assert!(matches!(tree, TreeNode::Leaf { .. }));
        }
    }

    #[test]
    fn test_invalid_theta() {
        let (x, y, s) = data();
        let mut forest = FairRandomForest::new(FairForestConfig::new().with_theta(1.5));
        assert!(forest.fit(&x, &y, &s).is_err());
    }

    #[test]
    fn test_predict_before_fit() {
        let forest = FairRandomForest::new(FairForestConfig::default());
        assert!(matches!(
            forest.predict_proba(&array![[0.0, 1.0]]),
            Err(KolosalError::ModelNotFitted)
        ));
    }
}
