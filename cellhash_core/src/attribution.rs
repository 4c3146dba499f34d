//! Gene attribution for annotated cells.
//!
//! For every correctly annotated cell the deviation `Σ|center − tanh(raw)|`
//! from its class hash center is back-propagated to the input genes. The
//! input gradients are summed per class, so genes with large magnitudes in
//! a class row are the ones that move that class's codes the most.

use ndarray::{Array2, ArrayView1};

use crate::classifier::classify_all;
use crate::data::Batch;
use crate::error::HashResult;
use crate::hashing::class_counts;
use crate::model::HashModel;
use crate::neural::squash;

/// Per-class input gradients, shaped `[n_class, n_features]`.
///
/// Only cells whose predicted class equals their label contribute, each to
/// the row of its label. A class without such cells keeps a zero row.
///
/// # Errors
///
/// `ShapeMismatch` if a batch has the wrong feature width or a label is
/// outside `0..n_class`.
pub fn gene_gradients(model: &HashModel, batches: &[Batch]) -> HashResult<Array2<f32>> {
    let n_class = model.n_class();
    let centers = model.centers();
    let mut totals = Array2::zeros((n_class, model.encoder().n_features()));
    let mut cells = 0usize;
    let mut hits = 0usize;

    for batch in batches.iter().filter(|batch| !batch.is_empty()) {
        class_counts(&batch.labels, n_class)?;
        cells += batch.len();

        let mut hit_rows = Vec::new();
        let grad = model.encoder().input_gradient(batch.features.view(), |raw| {
            let codes = raw.mapv(squash);
            let predicted = classify_all(codes.view(), centers)?;

            let mut grad = Array2::zeros(raw.dim());
            for (row, (&label, &class)) in batch.labels.iter().zip(&predicted).enumerate() {
                if label != class {
                    continue;
                }
                let center = centers.center(label)?;
                for ((g, &code), &target) in grad
                    .row_mut(row)
                    .iter_mut()
                    .zip(codes.row(row))
                    .zip(center.iter())
                {
                    *g = deviation_gradient(target, code);
                }
                hit_rows.push(row);
            }
            Ok(grad)
        })?;

        hits += hit_rows.len();
        for row in hit_rows {
            let mut target = totals.row_mut(batch.labels[row]);
            target += &grad.row(row);
        }
    }

    tracing::debug!(cells, hits, n_class, "computed gene gradients");
    Ok(totals)
}

/// Gene indices ordered by descending gradient magnitude; ties keep index
/// order.
pub fn rank_genes(gradients: ArrayView1<f32>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..gradients.len()).collect();
    order.sort_by(|&a, &b| gradients[b].abs().total_cmp(&gradients[a].abs()));
    order
}

/// ∂|center − tanh(r)|/∂r written in terms of `code = tanh(r)`.
fn deviation_gradient(center: f32, code: f32) -> f32 {
    let diff = center - code;
    if diff == 0.0 {
        return 0.0;
    }
    -diff.signum() * (1.0 - code * code)
}
