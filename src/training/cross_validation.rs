//! Stratified cross-validation

use crate::error::{KolosalError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// A single train/test split
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CVSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub fold_idx: usize,
}

/// Stratified K-fold splitter keyed on arbitrary string strata.
///
/// Rows of each stratum are shuffled (when enabled) and dealt round-robin to the
/// folds; the dealing position carries over from one stratum to the next so fold
/// sizes differ by at most one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StratifiedKFold {
    n_splits: usize,
    shuffle: bool,
    random_state: Option<u64>,
}

impl StratifiedKFold {
    /// Create a new splitter with shuffling enabled
    pub fn new(n_splits: usize) -> Self {
        Self {
            n_splits,
            shuffle: true,
            random_state: None,
        }
    }

    /// Enable or disable shuffling within strata
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }

    /// Set random state for reproducibility
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Generate train/test splits for the given per-row strata
    pub fn split(&self, keys: &[String]) -> Result<Vec<CVSplit>> {
        let n_samples = keys.len();
        let n_splits = self.n_splits;

        if n_splits < 2 {
            return Err(KolosalError::ValidationError(
                "n_splits must be at least 2".to_string(),
            ));
        }
        if n_samples < n_splits {
            return Err(KolosalError::ValidationError(format!(
                "n_samples ({}) must be >= n_splits ({})",
                n_samples, n_splits
            )));
        }

        // BTreeMap keeps the stratum order independent of hashing
        let mut strata: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, key) in keys.iter().enumerate() {
            strata.entry(key.as_str()).or_default().push(idx);
        }

        let smallest = strata.values().map(Vec::len).min().unwrap_or(0);
        if smallest < n_splits {
            warn!(
                smallest,
                n_splits, "Smallest stratum has fewer members than folds"
            );
        }

        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };

        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); n_splits];
        let mut position = 0usize;
        for indices in strata.values_mut() {
            if self.shuffle {
                indices.shuffle(&mut rng);
            }
            for &idx in indices.iter() {
                folds[position % n_splits].push(idx);
                position += 1;
            }
        }

        let splits = (0..n_splits)
            .map(|fold_idx| {
                let mut test_indices = folds[fold_idx].clone();
                test_indices.sort_unstable();
                let mut train_indices: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold_idx)
                    .flat_map(|(_, f)| f.iter().copied())
                    .collect();
                train_indices.sort_unstable();

                CVSplit {
                    train_indices,
                    test_indices,
                    fold_idx,
                }
            })
            .collect();

        Ok(splits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashMap, HashSet};

    fn keys(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{}|{}", i % 2, (i / 2) % 3)).collect()
    }

    #[test]
    fn test_splits_are_disjoint_and_exhaustive() {
        let keys = keys(103);
        let splits = StratifiedKFold::new(10)
            .with_random_state(42)
            .split(&keys)
            .unwrap();
        assert_eq!(splits.len(), 10);

        let mut seen = HashSet::new();
        for split in &splits {
            let train: HashSet<_> = split.train_indices.iter().collect();
            assert!(split.test_indices.iter().all(|i| !train.contains(i)));
            assert_eq!(split.train_indices.len() + split.test_indices.len(), 103);
            for &i in &split.test_indices {
                assert!(seen.insert(i), "row {} appears in two test folds", i);
            }
        }
        assert_eq!(seen.len(), 103);
    }

    #[test]
    fn test_fold_sizes_balanced() {
        let splits = StratifiedKFold::new(10).with_random_state(1).split(&keys(103)).unwrap();
        let sizes: Vec<usize> = splits.iter().map(|s| s.test_indices.len()).collect();
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn test_strata_are_spread() {
        let keys = keys(120);
        let splits = StratifiedKFold::new(5).with_random_state(7).split(&keys).unwrap();
        for split in &splits {
            let mut counts: HashMap<&str, usize> = HashMap::new();
            for &i in &split.test_indices {
                *counts.entry(keys[i].as_str()).or_default() += 1;
            }
            // 6 strata of 20 rows each over 5 folds
            assert!(counts.values().all(|&c| c == 4));
        }
    }

    #[test]
    fn test_reproducible_with_seed() {
        let a = StratifiedKFold::new(4).with_random_state(42).split(&keys(40)).unwrap();
        let b = StratifiedKFold::new(4).with_random_state(42).split(&keys(40)).unwrap();
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.test_indices, y.test_indices);
        }
    }

    #[test]
    fn test_invalid_split_counts() {
        assert!(StratifiedKFold::new(1).split(&keys(10)).is_err());
        assert!(StratifiedKFold::new(5).split(&keys(3)).is_err());
    }
}
