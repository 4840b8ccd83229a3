//! Integration test: fairness metrics and fold assignment

use kolosal_fairlab::data::{Dataset, DatasetSchema};
use kolosal_fairlab::metrics::{
    fairness_proxy_auc, roc_auc_score, strong_demographic_parity_score, ParityScore,
};
use kolosal_fairlab::training::StratifiedKFold;
use ndarray::{array, Array1};
use polars::prelude::*;
use std::collections::HashSet;

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_sdp_zero_when_uninformative() {
    let protected = vec![strings(&["a", "b", "a", "b"])];
    let probs = array![0.2, 0.2, 0.8, 0.8];
    let score = strong_demographic_parity_score(&protected, &probs).unwrap();
    assert!(score.worst().abs() < 1e-12);
}

#[test]
fn test_sdp_one_when_separable() {
    let protected = vec![strings(&["a", "a", "b", "b"])];
    let probs = array![0.1, 0.2, 0.7, 0.9];
    let score = strong_demographic_parity_score(&protected, &probs).unwrap();
    assert!((score.worst() - 1.0).abs() < 1e-12);
}

#[test]
fn test_sdp_single_group_is_one() {
    let protected = vec![strings(&["a", "a", "a"])];
    let score = strong_demographic_parity_score(&protected, &array![0.1, 0.5, 0.9]).unwrap();
    assert_eq!(score, ParityScore::Single(1.0));
}

#[test]
fn test_sdp_bounds_and_per_column() {
    let protected = vec![
        strings(&["a", "b", "c", "a", "b", "c", "a", "b"]),
        strings(&["x", "x", "y", "y", "x", "y", "x", "y"]),
    ];
    let probs = array![0.9, 0.1, 0.4, 0.6, 0.3, 0.8, 0.55, 0.2];
    let score = strong_demographic_parity_score(&protected, &probs).unwrap();
    let values = score.values();
    assert_eq!(values.len(), 2);
    assert!(values.iter().all(|v| (0.0..=1.0).contains(v)));
    assert_eq!(score.worst(), values[0].max(values[1]));
}

#[test]
fn test_proxy_and_sdp_are_distinct() {
    let s: Array1<f64> = array![0.0, 0.0, 1.0, 1.0];
    let probs = array![0.1, 0.6, 0.4, 0.9];
    // AUC(s, p) = 0.75
    assert_eq!(roc_auc_score(&s, &probs).unwrap(), Some(0.75));
    assert!((fairness_proxy_auc(&s, &probs).unwrap() - 0.75).abs() < 1e-12);

    let sdp = strong_demographic_parity_score(&[strings(&["0", "0", "1", "1"])], &probs).unwrap();
    assert!((sdp.worst() - 0.5).abs() < 1e-12);
}

#[test]
fn test_outer_folds_partition_dataset() {
    let n = 97;
    let y: Vec<i32> = (0..n).map(|i| (i % 3 == 0) as i32).collect();
    let flag: Vec<&str> = (0..n).map(|i| if i % 5 < 2 { "KNA" } else { "NLD" }).collect();
    let x: Vec<f64> = (0..n).map(|i| i as f64).collect();
    let df = df!("beached" => y, "flag" => flag, "x" => x).unwrap();
    let dataset = Dataset::from_frame(
        &df,
        DatasetSchema::new("beached").with_protected(vec!["flag".to_string()]),
    )
    .unwrap();

    let splits = StratifiedKFold::new(10)
        .with_random_state(42)
        .split(&dataset.stratification_keys())
        .unwrap();

    let mut seen = HashSet::new();
    for split in &splits {
        let train: HashSet<usize> = split.train_indices.iter().copied().collect();
        let test: HashSet<usize> = split.test_indices.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), n);
        for i in test {
            assert!(seen.insert(i));
        }
    }
    assert_eq!(seen.len(), n);
}
