//! Adjusted Rand Index between two partitions.

use std::collections::HashMap;

use crate::error::{HashError, HashResult};

/// Chance-corrected agreement of two labelings, in `[-1, 1]`.
///
/// Invariant under relabeling of either partition. Computed from the
/// pair-confusion matrix; identical partitions (including the trivial
/// single-cluster case) score exactly 1.
pub fn adjusted_rand_index(truth: &[usize], predicted: &[usize]) -> HashResult<f64> {
    if truth.len() != predicted.len() {
        return Err(HashError::shape_mismatch(
            truth.len(),
            predicted.len(),
            "predicted label count",
        ));
    }
    if truth.is_empty() {
        return Err(HashError::empty_collection("label vectors"));
    }

    let n = truth.len() as f64;
    let mut contingency: HashMap<(usize, usize), f64> = HashMap::new();
    let mut row_sums: HashMap<usize, f64> = HashMap::new();
    let mut col_sums: HashMap<usize, f64> = HashMap::new();
    for (&t, &p) in truth.iter().zip(predicted) {
        *contingency.entry((t, p)).or_insert(0.0) += 1.0;
        *row_sums.entry(t).or_insert(0.0) += 1.0;
        *col_sums.entry(p).or_insert(0.0) += 1.0;
    }

    let sum_squares: f64 = contingency.values().map(|c| c * c).sum();
    let by_cols: f64 = contingency
        .iter()
        .map(|(&(_, p), &c)| c * col_sums[&p])
        .sum();
    let by_rows: f64 = contingency
        .iter()
        .map(|(&(t, _), &c)| c * row_sums[&t])
        .sum();

    let tp = sum_squares - n;
    let fp = by_cols - sum_squares;
    let fn_ = by_rows - sum_squares;
    let tn = n * n - fp - fn_ - sum_squares;

    if fp == 0.0 && fn_ == 0.0 {
        return Ok(1.0);
    }
    Ok(2.0 * (tp * tn - fn_ * fp) / ((tp + fn_) * (fn_ + tn) + (tp + fp) * (fp + tn)))
}
