//! Dataset encoding: raw encoder output → squashed codes aligned with labels.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::data::Batch;
use crate::error::{HashError, HashResult};
use crate::neural::{squash, HashEncoder};

/// How rows are pushed through the encoder.
///
/// Both variants run the same per-row kernel, so their output is
/// bit-identical for the same encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Execution {
    #[default]
    Sequential,
    /// Rows of each batch are encoded on the rayon thread pool
    Parallel,
}

/// Codes of one pass over a split, row-aligned with their labels.
#[derive(Debug, Clone, PartialEq)]
pub struct CodeBuffer {
    pub codes: Array2<f32>,
    pub labels: Vec<usize>,
}

impl CodeBuffer {
    pub fn new(codes: Array2<f32>, labels: Vec<usize>) -> HashResult<Self> {
        if codes.nrows() != labels.len() {
            return Err(HashError::shape_mismatch(
                codes.nrows(),
                labels.len(),
                "code buffer label count",
            ));
        }
        Ok(Self { codes, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn bit(&self) -> usize {
        self.codes.ncols()
    }
}

/// Encodes every batch and concatenates the squashed codes in batch order.
///
/// # Errors
///
/// `ShapeMismatch` if a batch has the wrong feature width.
pub fn encode_dataset(
    batches: &[Batch],
    encoder: &HashEncoder,
    execution: Execution,
) -> HashResult<CodeBuffer> {
    let bit = encoder.bit();
    let total: usize = batches.iter().map(Batch::len).sum();
    let mut flat = Vec::with_capacity(total * bit);
    let mut labels = Vec::with_capacity(total);

    for batch in batches {
        let n = batch.features.nrows();
        let encode_row = |idx: usize| -> HashResult<Vec<f32>> {
            let raw = encoder.forward(batch.features.row(idx))?;
            Ok(raw.iter().map(|&v| squash(v)).collect())
        };

        let rows: Vec<Vec<f32>> = match execution {
            Execution::Sequential => (0..n).map(encode_row).collect::<HashResult<_>>()?,
            Execution::Parallel => (0..n)
                .into_par_iter()
                .map(encode_row)
                .collect::<HashResult<_>>()?,
        };

        for row in rows {
            flat.extend(row);
        }
        labels.extend_from_slice(&batch.labels);
    }

    let codes = Array2::from_shape_vec((labels.len(), bit), flat)
        .map_err(|_| HashError::shape_mismatch(total * bit, labels.len() * bit, "encoded codes"))?;
    CodeBuffer::new(codes, labels)
}
