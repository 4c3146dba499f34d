//! Class-balanced loss weights from the effective number of samples.
//!
//! For a class with `n` samples the effective number is
//! `(1 - beta^n) / (1 - beta)`; the raw weight is its inverse. Weights are
//! normalised to sum to `n_class`, so uniform class sizes give all-ones.

use ndarray::Array1;

use crate::error::{HashError, HashResult};

/// Default `beta` of the effective-number formulation.
pub const DEFAULT_BETA: f64 = 0.9999;

/// Per-class loss weights.
///
/// # Errors
///
/// * `ShapeMismatch` if `samples_in_each_class.len() != n_class`
/// * `InvalidClassCount` if any class has zero samples
/// * `InvalidConfiguration` if `beta` is outside `[0, 1)`
///
/// # Examples
///
/// ```
/// use cellhash_core::hashing::class_balance_weights;
///
/// let weights = class_balance_weights(&[1, 1, 1, 1, 1], 5, 0.9999).unwrap();
/// assert!(weights.iter().all(|w| (w - 1.0).abs() < 1e-6));
/// ```
pub fn class_balance_weights(
    samples_in_each_class: &[usize],
    n_class: usize,
    beta: f64,
) -> HashResult<Array1<f32>> {
    if samples_in_each_class.len() != n_class {
        return Err(HashError::shape_mismatch(
            n_class,
            samples_in_each_class.len(),
            "class frequency table length",
        ));
    }
    if n_class == 0 {
        return Err(HashError::empty_collection("class frequency table"));
    }
    if !beta.is_finite() || !(0.0..1.0).contains(&beta) {
        return Err(HashError::invalid_config(
            "beta",
            beta.to_string(),
            "must lie in [0, 1)",
        ));
    }
    if let Some((class, &count)) = samples_in_each_class
        .iter()
        .enumerate()
        .find(|&(_, &count)| count == 0)
    {
        return Err(HashError::invalid_class_count(class, count));
    }

    let raw: Vec<f64> = samples_in_each_class
        .iter()
        .map(|&count| (1.0 - beta) / (1.0 - beta.powf(count as f64)))
        .collect();
    let total: f64 = raw.iter().sum();
    let scale = n_class as f64 / total;

    Ok(raw.iter().map(|&w| (w * scale) as f32).collect())
}

/// Counts labels per class.
///
/// Fails with `ShapeMismatch` on a label outside `0..n_class`.
pub fn class_counts(labels: &[usize], n_class: usize) -> HashResult<Vec<usize>> {
    let mut counts = vec![0usize; n_class];
    for &label in labels {
        match counts.get_mut(label) {
            Some(count) => *count += 1,
            None => {
                return Err(HashError::shape_mismatch(
                    n_class,
                    label,
                    "label value (exclusive bound)",
                ))
            }
        }
    }
    Ok(counts)
}
