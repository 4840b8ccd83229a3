//! Fold-score reductions

/// Mean of the non-NaN values, infinities included; NaN when there are none
pub fn nan_mean(values: &[f64]) -> f64 {
    let present: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    if present.is_empty() {
        return f64::NAN;
    }
    present.iter().sum::<f64>() / present.len() as f64
}

/// Population standard deviation (ddof = 0) of the non-NaN values
pub fn nan_std(values: &[f64]) -> f64 {
    let mean = nan_mean(values);
    if mean.is_nan() {
        return f64::NAN;
    }
    let (sum_sq, n) = values
        .iter()
        .filter(|v| !v.is_nan())
        .fold((0.0, 0usize), |(acc, n), v| (acc + (v - mean).powi(2), n + 1));
    (sum_sq / n as f64).sqrt()
}
