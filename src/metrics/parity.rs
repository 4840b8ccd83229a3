//! Strong demographic parity and the AUC fairness proxy

use super::roc::{roc_auc_or_chance, roc_auc_score};
use crate::error::{KolosalError, Result};
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Strong demographic parity over one or several protected columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ParityScore {
    Single(f64),
    PerColumn(Vec<f64>),
}

impl ParityScore {
    /// Largest disparity across columns
    pub fn worst(&self) -> f64 {
        match self {
            ParityScore::Single(v) => *v,
            ParityScore::PerColumn(values) => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        }
    }

    /// Per-column values
    pub fn values(&self) -> Vec<f64> {
        match self {
            ParityScore::Single(v) => vec![*v],
            ParityScore::PerColumn(values) => values.clone(),
        }
    }
}

/// Compute strong demographic parity
///
/// For each protected column and each of its values v:
///   auc_v = max(AUC(1[s == v], p), 1 - AUC(1[s == v], p))
/// column score = max_v auc_v (1 for a column with a single value)
/// SDP = |2 * score - 1|
///
/// 0 means the predictions carry no ranking information about any group;
/// 1 means some group is perfectly separable.
pub fn strong_demographic_parity_score(
    protected: &[Vec<String>],
    probs: &Array1<f64>,
) -> Result<ParityScore> {
    if protected.is_empty() {
        return Err(KolosalError::FairnessError(
            "at least one protected column is required".to_string(),
        ));
    }

    let mut scores = Vec::with_capacity(protected.len());
    for column in protected {
        if column.len() != probs.len() {
            return Err(KolosalError::length_mismatch("protected", probs.len(), column.len()));
        }
        scores.push((2.0 * column_auc(column, probs)? - 1.0).abs());
    }

    Ok(if scores.len() == 1 {
        ParityScore::Single(scores[0])
    } else {
        ParityScore::PerColumn(scores)
    })
}

fn column_auc(column: &[String], probs: &Array1<f64>) -> Result<f64> {
    let distinct: BTreeSet<&str> = column.iter().map(String::as_str).collect();
    if distinct.len() < 2 {
        return Ok(1.0);
    }

    let mut worst: f64 = 0.0;
    for value in distinct {
        let membership: Array1<f64> = column
            .iter()
            .map(|s| if s == value { 1.0 } else { 0.0 })
            .collect();
        // Both classes are present because the column has at least two values
        if let Some(auc) = roc_auc_score(&membership, probs)? {
            worst = worst.max(auc.max(1.0 - auc));
        }
    }
    Ok(worst)
}

/// Search-time fairness proxy: 0.5 + |0.5 - AUC(s, p)|
///
/// Lies in [0.5, 1]; an undefined AUC (single group) counts as 0.5.
pub fn fairness_proxy_auc(protected: &Array1<f64>, probs: &Array1<f64>) -> Result<f64> {
    let auc = roc_auc_or_chance(protected, probs)?;
    Ok(0.5 + (0.5 - auc).abs())
}
