//! Hash loss: class-weighted similarity to the class center plus a
//! quantization penalty pulling squashed codes towards ±1.
//!
//! ```text
//! s          = tanh(raw)
//! similarity = mean_{n,k} w[y_n] · BCE((s_nk + 1) / 2, (c[y_n]_k + 1) / 2)
//! quant      = mean_{n,k} (|s_nk| - 1)²
//! total      = similarity + lambda · quant
//! ```

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{HashError, HashResult};
use crate::hashing::HashCenterTable;

/// Probabilities are clamped to `[EPS, 1 - EPS]` before taking logs.
const EPS: f32 = 1e-6;

/// Saturating squash shared by training and inference.
#[inline]
pub fn squash(raw: f32) -> f32 {
    raw.tanh()
}

/// Loss breakdown for one batch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HashLoss {
    pub total: f32,
    pub similarity: f32,
    pub quantization: f32,
}

fn validate(
    raw_codes: ArrayView2<f32>,
    labels: &[usize],
    centers: &HashCenterTable,
    weights: ArrayView1<f32>,
) -> HashResult<()> {
    if raw_codes.nrows() == 0 {
        return Err(HashError::empty_collection("loss batch"));
    }
    if raw_codes.ncols() != centers.bit() {
        return Err(HashError::shape_mismatch(
            centers.bit(),
            raw_codes.ncols(),
            "raw code width",
        ));
    }
    if labels.len() != raw_codes.nrows() {
        return Err(HashError::shape_mismatch(
            raw_codes.nrows(),
            labels.len(),
            "label count",
        ));
    }
    if weights.len() != centers.n_class() {
        return Err(HashError::shape_mismatch(
            centers.n_class(),
            weights.len(),
            "class weight vector length",
        ));
    }
    if let Some(&label) = labels.iter().find(|&&label| label >= centers.n_class()) {
        return Err(HashError::shape_mismatch(
            centers.n_class(),
            label,
            "label value (exclusive bound)",
        ));
    }
    Ok(())
}

fn bce(p: f32, t: f32) -> f64 {
    let p = p.clamp(EPS, 1.0 - EPS) as f64;
    let t = t as f64;
    -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
}

/// Computes the hash loss of a batch of raw encoder outputs.
///
/// # Errors
///
/// * `ShapeMismatch` if the code width is not `bit`, a label is outside
///   `0..n_class`, or the label/weight lengths disagree
/// * `EmptyCollection` for an empty batch
pub fn hash_loss(
    raw_codes: ArrayView2<f32>,
    labels: &[usize],
    centers: &HashCenterTable,
    weights: ArrayView1<f32>,
    lambda: f32,
) -> HashResult<HashLoss> {
    validate(raw_codes, labels, centers, weights)?;

    let mut similarity = 0.0f64;
    let mut quantization = 0.0f64;

    for (row, &label) in raw_codes.rows().into_iter().zip(labels) {
        let center = centers.center(label)?;
        let w = weights[label] as f64;
        for (&x, &c) in row.iter().zip(center.iter()) {
            let s = squash(x);
            similarity += w * bce(0.5 * (s + 1.0), 0.5 * (c + 1.0));
            let gap = (s.abs() - 1.0) as f64;
            quantization += gap * gap;
        }
    }

    let n = raw_codes.len() as f64;
    let similarity = (similarity / n) as f32;
    let quantization = (quantization / n) as f32;

    Ok(HashLoss {
        total: similarity + lambda * quantization,
        similarity,
        quantization,
    })
}

/// Computes the hash loss and its gradient with respect to `raw_codes`.
///
/// # Returns
///
/// Tuple of (loss breakdown, ∂total/∂raw_codes with the shape of `raw_codes`)
pub fn hash_loss_with_gradients(
    raw_codes: ArrayView2<f32>,
    labels: &[usize],
    centers: &HashCenterTable,
    weights: ArrayView1<f32>,
    lambda: f32,
) -> HashResult<(HashLoss, Array2<f32>)> {
    let loss = hash_loss(raw_codes, labels, centers, weights, lambda)?;

    let scale = 1.0 / raw_codes.len() as f32;
    let mut gradient = Array2::zeros(raw_codes.dim());

    for ((raw_row, mut grad_row), &label) in raw_codes
        .rows()
        .into_iter()
        .zip(gradient.rows_mut())
        .zip(labels)
    {
        let center = centers.center(label)?;
        let w = weights[label];
        for ((&x, g), &c) in raw_row.iter().zip(grad_row.iter_mut()).zip(center.iter()) {
            let s = squash(x);
            let p = 0.5 * (s + 1.0);
            let t = 0.5 * (c + 1.0);
            // d BCE/dp · dp/dx collapses to 2 (p - t)
            let d_similarity = w * 2.0 * (p - t);
            let d_quant = 2.0 * (s.abs() - 1.0) * s.signum() * (1.0 - s * s);
            *g = (d_similarity + lambda * d_quant) * scale;
        }
    }

    Ok((loss, gradient))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::generate_hash_centers;
    use ndarray::{arr1, arr2, Array1};

    fn setup() -> (HashCenterTable, Array1<f32>) {
        let centers = generate_hash_centers(3, 4).unwrap();
        (centers, Array1::ones(3))
    }

    #[test]
    fn test_zero_codes() {
        let (centers, weights) = setup();
        let raw = Array2::zeros((2, 4));
        let loss = hash_loss(raw.view(), &[0, 2], &centers, weights.view(), 0.001).unwrap();
        assert!((loss.similarity - std::f32::consts::LN_2).abs() < 1e-5);
        assert!((loss.quantization - 1.0).abs() < 1e-6);
        assert!((loss.total - (std::f32::consts::LN_2 + 0.001)).abs() < 1e-5);
    }

    #[test]
    fn test_saturated_codes_stay_finite() {
        let (centers, weights) = setup();
        let raw = Array2::from_elem((1, 4), 50.0);
        let matched = hash_loss(raw.view(), &[0], &centers, weights.view(), 0.1).unwrap();
        assert!(matched.total.is_finite());
        assert!(matched.similarity < 1e-4);

        let raw = Array2::from_elem((1, 4), -50.0);
        let opposed = hash_loss(raw.view(), &[0], &centers, weights.view(), 0.1).unwrap();
        assert!(opposed.total.is_finite());
        assert!(opposed.similarity > 10.0);
    }

    #[test]
    fn test_class_weight_scales_similarity() {
        let (centers, _) = setup();
        let raw = arr2(&[[0.3, -0.2, 0.5, 0.1]]);
        let base = hash_loss(raw.view(), &[1], &centers, arr1(&[1.0, 1.0, 1.0]).view(), 0.0)
            .unwrap();
        let doubled = hash_loss(raw.view(), &[1], &centers, arr1(&[1.0, 2.0, 1.0]).view(), 0.0)
            .unwrap();
        assert!((doubled.similarity - 2.0 * base.similarity).abs() < 1e-5);
        assert_eq!(doubled.quantization, base.quantization);
    }

    #[test]
    fn test_gradient_matches_finite_difference() {
        let (centers, _) = setup();
        let weights = arr1(&[0.8f32, 1.5, 0.7]);
        let raw = arr2(&[[0.4f32, -0.7, 1.1, 0.2], [-0.3, 0.9, -1.2, 0.6]]);
        let labels = [1, 2];
        let lambda = 0.5;

        let (_, grad) =
            hash_loss_with_gradients(raw.view(), &labels, &centers, weights.view(), lambda)
                .unwrap();

        let eps = 1e-3f32;
        for i in 0..2 {
            for j in 0..4 {
                let mut plus = raw.clone();
                plus[[i, j]] += eps;
                let mut minus = raw.clone();
                minus[[i, j]] -= eps;
                let lp = hash_loss(plus.view(), &labels, &centers, weights.view(), lambda)
                    .unwrap()
                    .total;
                let lm = hash_loss(minus.view(), &labels, &centers, weights.view(), lambda)
                    .unwrap()
                    .total;
                let numeric = (lp - lm) / (2.0 * eps);
                assert!(
                    (numeric - grad[[i, j]]).abs() < 2e-3,
                    "({}, {}): numeric {} analytic {}",
                    i,
                    j,
                    numeric,
                    grad[[i, j]]
                );
            }
        }
    }

    #[test]
    fn test_shape_errors() {
        let (centers, weights) = setup();
        let raw = Array2::zeros((2, 5));
        assert!(matches!(
            hash_loss(raw.view(), &[0, 1], &centers, weights.view(), 0.0),
            Err(HashError::ShapeMismatch { expected: 4, got: 5, .. })
        ));

        let raw = Array2::zeros((2, 4));
        assert!(matches!(
            hash_loss(raw.view(), &[0, 3], &centers, weights.view(), 0.0),
            Err(HashError::ShapeMismatch { got: 3, .. })
        ));
        assert!(hash_loss(raw.view(), &[0], &centers, weights.view(), 0.0).is_err());
        assert!(hash_loss(raw.view(), &[0, 1], &centers, arr1(&[1.0]).view(), 0.0).is_err());
        assert!(matches!(
            hash_loss(Array2::zeros((0, 4)).view(), &[], &centers, weights.view(), 0.0),
            Err(HashError::EmptyCollection { .. })
        ));
    }
}
