//! Nearest-hash-center classification.
//!
//! A query costs one distance per class, independent of database size.

use ndarray::{ArrayView1, ArrayView2};

use crate::error::{HashError, HashResult};
use crate::hashing::{nearest_row, HashCenterTable};

/// Class whose center is closest to `code` in Hamming distance.
///
/// Ties go to the lowest class index.
pub fn classify(code: ArrayView1<f32>, centers: &HashCenterTable) -> HashResult<usize> {
    if code.len() != centers.bit() {
        return Err(HashError::shape_mismatch(centers.bit(), code.len(), "query code width"));
    }
    nearest_row(code, centers.as_array())
        .ok_or_else(|| HashError::empty_collection("hash center table"))
}

/// Classifies every row of a `[n, bit]` code matrix.
pub fn classify_all(codes: ArrayView2<f32>, centers: &HashCenterTable) -> HashResult<Vec<usize>> {
    if codes.ncols() != centers.bit() {
        return Err(HashError::shape_mismatch(centers.bit(), codes.ncols(), "query code width"));
    }
    codes
        .rows()
        .into_iter()
        .map(|code| classify(code, centers))
        .collect()
}
