//! Hash center generation.
//!
//! Every class gets one ±1 target code. Rows of a Sylvester Hadamard matrix
//! of order `bit` and their negations are pairwise at least `bit/2` bits
//! apart, so the first `2 * bit` classes are served from that pool. Classes
//! beyond the pool get balanced random codes, resampled a bounded number of
//! times until the table is well separated.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{HashError, HashResult};
use crate::hashing::distance::disagreements;

/// Number of resampling passes for classes that do not fit the Hadamard pool.
pub const FALLBACK_ATTEMPTS: usize = 20;

/// Builds the Sylvester Hadamard matrix of the given order.
///
/// `H[i][j] = (-1)^popcount(i & j)`, identical to the recursive
/// `[[H, H], [H, -H]]` construction.
pub fn hadamard(order: usize) -> HashResult<Array2<f32>> {
    if order == 0 {
        return Err(HashError::invalid_dimension(order, "order must be positive"));
    }
    if !order.is_power_of_two() {
        return Err(HashError::invalid_dimension(
            order,
            "a Sylvester Hadamard matrix requires a power-of-two order",
        ));
    }

    Ok(Array2::from_shape_fn((order, order), |(i, j)| {
        if (i & j).count_ones() % 2 == 0 {
            1.0
        } else {
            -1.0
        }
    }))
}

/// Fixed mapping from class index to its ±1 target code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HashCenterTable {
    centers: Array2<f32>,
}

impl HashCenterTable {
    /// Wraps an existing `[n_class, bit]` matrix of ±1 values.
    pub fn from_array(centers: Array2<f32>) -> HashResult<Self> {
        if centers.nrows() == 0 {
            return Err(HashError::empty_collection("hash center table"));
        }
        if centers.iter().any(|&v| v != 1.0 && v != -1.0) {
            return Err(HashError::invalid_config(
                "hash centers",
                "non-binary entry",
                "every entry must be +1 or -1",
            ));
        }
        Ok(Self { centers })
    }

    pub fn n_class(&self) -> usize {
        self.centers.nrows()
    }

    pub fn bit(&self) -> usize {
        self.centers.ncols()
    }

    pub fn as_array(&self) -> ArrayView2<'_, f32> {
        self.centers.view()
    }

    /// Center code of `class`.
    pub fn center(&self, class: usize) -> HashResult<ArrayView1<'_, f32>> {
        if class >= self.n_class() {
            return Err(HashError::shape_mismatch(
                self.n_class(),
                class,
                "class index (exclusive bound)",
            ));
        }
        Ok(self.centers.row(class))
    }

    /// Gathers one center row per label, in label order.
    pub fn lookup(&self, labels: &[usize]) -> HashResult<Array2<f32>> {
        let mut targets = Array2::zeros((labels.len(), self.bit()));
        for (mut target, &label) in targets.rows_mut().into_iter().zip(labels) {
            target.assign(&self.center(label)?);
        }
        Ok(targets)
    }

    /// Minimum and mean pairwise bit disagreement over distinct rows.
    ///
    /// Returns `None` for a single-class table.
    pub fn separation(&self) -> Option<(usize, f64)> {
        pairwise_separation(self.centers.view())
    }
}

fn pairwise_separation(centers: ArrayView2<f32>) -> Option<(usize, f64)> {
    let n = centers.nrows();
    if n < 2 {
        return None;
    }

    let mut min = usize::MAX;
    let mut total = 0usize;
    let mut pairs = 0usize;
    for i in 0..n {
        for j in (i + 1)..n {
            let d = disagreements(centers.row(i), centers.row(j));
            min = min.min(d);
            total += d;
            pairs += 1;
        }
    }
    Some((min, total as f64 / pairs as f64))
}

fn balanced_code<R: Rng + ?Sized>(bit: usize, rng: &mut R) -> Array1<f32> {
    let mut code = Array1::from_elem(bit, 1.0f32);
    for idx in rand::seq::index::sample(rng, bit, bit / 2).iter() {
        code[idx] = -1.0;
    }
    code
}

/// Generates centers with a caller-supplied random source.
///
/// The random source is only consumed when `n_class > 2 * bit`.
pub fn generate_hash_centers_with_rng<R: Rng + ?Sized>(
    n_class: usize,
    bit: usize,
    rng: &mut R,
) -> HashResult<HashCenterTable> {
    if n_class == 0 {
        return Err(HashError::invalid_config(
            "n_class",
            "0",
            "at least one class is required",
        ));
    }

    let h = hadamard(bit)?;
    let pool = 2 * bit;
    let mut centers = Array2::zeros((n_class, bit));

    for (class, mut row) in centers.rows_mut().into_iter().enumerate().take(pool) {
        if class < bit {
            row.assign(&h.row(class));
        } else {
            row.assign(&h.row(class - bit).mapv(|v| -v));
        }
    }

    if n_class > pool {
        tracing::debug!(
            n_class,
            bit,
            "class count exceeds Hadamard pool, sampling balanced codes"
        );

        let min_target = bit as f64 / 4.0;
        let mean_target = bit as f64 / 2.0;
        let mut accepted = false;

        for attempt in 0..FALLBACK_ATTEMPTS {
            for class in pool..n_class {
                centers.row_mut(class).assign(&balanced_code(bit, rng));
            }

            if let Some((min, mean)) = pairwise_separation(centers.view()) {
                if min as f64 > min_target && mean >= mean_target {
                    tracing::debug!(attempt, min, mean, "accepted sampled hash centers");
                    accepted = true;
                    break;
                }
            }
        }

        if !accepted {
            tracing::warn!(
                n_class,
                bit,
                "hash centers did not reach the separation target after {} attempts; keeping last sample",
                FALLBACK_ATTEMPTS
            );
        }
    }

    Ok(HashCenterTable { centers })
}

/// Generates `n_class` centers of length `bit`.
///
/// Deterministic whenever `n_class <= 2 * bit`; otherwise the sampled rows
/// come from an entropy-seeded generator.
pub fn generate_hash_centers(n_class: usize, bit: usize) -> HashResult<HashCenterTable> {
    let mut rng = StdRng::from_entropy();
    generate_hash_centers_with_rng(n_class, bit, &mut rng)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn row_set(table: &HashCenterTable) -> HashSet<Vec<i8>> {
        table
            .as_array()
            .rows()
            .into_iter()
            .map(|r| r.iter().map(|&v| v as i8).collect())
            .collect()
    }

    #[test]
    fn test_hadamard_rows_are_orthogonal() {
        let h = hadamard(8).unwrap();
        for i in 0..8 {
            for j in 0..8 {
                let dot = h.row(i).dot(&h.row(j));
                if i == j {
                    assert_eq!(dot, 8.0);
                } else {
                    assert_eq!(dot, 0.0);
                }
            }
        }
    }

    #[test]
    fn test_hadamard_matches_recursive_construction() {
        let h2 = hadamard(2).unwrap();
        assert_eq!(h2, ndarray::arr2(&[[1.0, 1.0], [1.0, -1.0]]));
        let h4 = hadamard(4).unwrap();
        assert_eq!(h4.row(3).to_vec(), vec![1.0, -1.0, -1.0, 1.0]);
    }

    #[test]
    fn test_invalid_dimension() {
        assert!(matches!(
            hadamard(12),
            Err(HashError::InvalidDimension { bit: 12, .. })
        ));
        assert!(matches!(
            generate_hash_centers(3, 0),
            Err(HashError::InvalidDimension { bit: 0, .. })
        ));
    }

    #[test]
    fn test_five_classes_eight_bits() {
        let table = generate_hash_centers(5, 8).unwrap();
        assert_eq!(table.n_class(), 5);
        assert_eq!(table.bit(), 8);
        assert!(table.as_array().iter().all(|&v| v == 1.0 || v == -1.0));
        assert_eq!(row_set(&table).len(), 5);

        let h = hadamard(8).unwrap();
        for class in 0..5 {
            assert_eq!(table.center(class).unwrap(), h.row(class));
        }
    }

    #[test]
    fn test_negated_half_of_pool() {
        let table = generate_hash_centers(16, 8).unwrap();
        assert_eq!(row_set(&table).len(), 16);
        let h = hadamard(8).unwrap();
        assert_eq!(table.center(9).unwrap().to_vec(), h.row(1).mapv(|v| -v).to_vec());
        let (min, mean) = table.separation().unwrap();
        assert!(min >= 4);
        assert!(mean >= 4.0);
    }

    #[test]
    fn test_pool_path_is_deterministic() {
        for &(n_class, bit) in &[(1, 4), (3, 4), (8, 4), (10, 16), (64, 32)] {
            let a = generate_hash_centers(n_class, bit).unwrap();
            let b = generate_hash_centers(n_class, bit).unwrap();
            assert_eq!(a, b);
            assert_eq!(row_set(&a).len(), n_class);
        }
    }

    #[test]
    fn test_fallback_rows_are_balanced_and_seeded() {
        let mut rng = StdRng::seed_from_u64(7);
        let a = generate_hash_centers_with_rng(40, 16, &mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let b = generate_hash_centers_with_rng(40, 16, &mut rng).unwrap();
        assert_eq!(a, b);

        for class in 32..40 {
            let negatives = a.center(class).unwrap().iter().filter(|&&v| v < 0.0).count();
            assert_eq!(negatives, 8);
        }
    }

    #[test]
    fn test_lookup_gathers_rows_in_label_order() {
        let table = generate_hash_centers(4, 4).unwrap();
        let targets = table.lookup(&[3, 0, 3]).unwrap();
        assert_eq!(targets.row(0), table.center(3).unwrap());
        assert_eq!(targets.row(1), table.center(0).unwrap());
        assert_eq!(targets.row(2), table.center(3).unwrap());
        assert!(matches!(
            table.lookup(&[4]),
            Err(HashError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_from_array_rejects_non_binary() {
        let bad = ndarray::arr2(&[[1.0, 0.5]]);
        assert!(HashCenterTable::from_array(bad).is_err());
    }
}
