//! ROC AUC

use crate::error::{KolosalError, Result};
use ndarray::Array1;

/// AUC reported when the curve is undefined
pub const CHANCE_AUC: f64 = 0.5;

/// Compute the area under the ROC curve
///
/// AUC = (R+ - n+(n+ + 1)/2) / (n+ * n-)
///
/// where R+ is the rank sum of the positive samples, with tied scores sharing
/// their average rank. Labels above 0.5 count as positive. Returns `None` when
/// only one class is present.
pub fn roc_auc_score(labels: &Array1<f64>, scores: &Array1<f64>) -> Result<Option<f64>> {
    if labels.len() != scores.len() {
        return Err(KolosalError::length_mismatch("scores", labels.len(), scores.len()));
    }

    let n_pos = labels.iter().filter(|&&y| y > 0.5).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Ok(None);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum_pos = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        // 1-based ranks start+1 ..= end share their mean
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        let positives = order[start..end]
            .iter()
            .filter(|&&i| labels[i] > 0.5)
            .count();
        rank_sum_pos += avg_rank * positives as f64;
        start = end;
    }

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    Ok(Some((rank_sum_pos - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg)))
}

/// ROC AUC, or [`CHANCE_AUC`] when only one class is present
pub fn roc_auc_or_chance(labels: &Array1<f64>, scores: &Array1<f64>) -> Result<f64> {
    Ok(roc_auc_score(labels, scores)?.unwrap_or(CHANCE_AUC))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_perfect_separation() {
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p = array![0.1, 0.2, 0.8, 0.9];
        assert_eq!(roc_auc_score(&y, &p).unwrap(), Some(1.0));
    }

    #[test]
    fn test_inverted_separation() {
        let y = array![1.0, 1.0, 0.0, 0.0];
        let p = array![0.1, 0.2, 0.8, 0.9];
        assert_eq!(roc_auc_score(&y, &p).unwrap(), Some(0.0));
    }

    #[test]
    fn test_constant_scores() {
        let y = array![0.0, 1.0, 0.0, 1.0, 1.0];
        let p = Array1::from_elem(5, 0.5);
        assert_eq!(roc_auc_score(&y, &p).unwrap(), Some(0.5));
    }

    #[test]
    fn test_partial_ties() {
        // pairs (pos, neg): (0.4 vs 0.1) win, (0.4 vs 0.4) tie, (0.35 vs 0.1) win, (0.35 vs 0.4) loss
        let y = array![0.0, 0.0, 1.0, 1.0];
        let p = array![0.1, 0.4, 0.35, 0.4];
        let auc = roc_auc_score(&y, &p).unwrap().unwrap();
        assert!((auc - 0.625).abs() < 1e-12);
    }

    #[test]
    fn test_single_class_is_undefined() {
        let y = array![1.0, 1.0];
        let p = array![0.3, 0.7];
        assert_eq!(roc_auc_score(&y, &p).unwrap(), None);
        assert_eq!(roc_auc_or_chance(&y, &p).unwrap(), CHANCE_AUC);
    }

    #[test]
    fn test_length_mismatch() {
        let y = array![1.0, 0.0];
        let p = array![0.3];
        assert!(roc_auc_score(&y, &p).is_err());
    }
}
