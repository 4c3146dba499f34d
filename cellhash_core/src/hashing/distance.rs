//! Hamming metric over ±1 (or tanh-squashed) hash codes.
//!
//! The distance is the sum of absolute element differences. For exact ±1
//! codes every disagreeing position contributes 2, so the value is twice the
//! number of differing bits; for squashed codes it degrades smoothly.

use ndarray::{ArrayView1, ArrayView2};

/// Sum of absolute element differences between two equal-length codes.
pub fn hamming_distance(a: ArrayView1<f32>, b: ArrayView1<f32>) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum()
}

/// Distances from one query code to every row of `database`.
pub fn hamming_distances(query: ArrayView1<f32>, database: ArrayView2<f32>) -> Vec<f32> {
    database
        .rows()
        .into_iter()
        .map(|row| hamming_distance(query, row))
        .collect()
}

/// Number of positions where the two codes differ.
pub fn disagreements(a: ArrayView1<f32>, b: ArrayView1<f32>) -> usize {
    a.iter().zip(b.iter()).filter(|(x, y)| x != y).count()
}

/// Index of the first row of `rows` at minimum distance from `code`.
///
/// Returns `None` only when `rows` is empty.
pub fn nearest_row(code: ArrayView1<f32>, rows: ArrayView2<f32>) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, row) in rows.rows().into_iter().enumerate() {
        let dist = hamming_distance(code, row);
        match best {
            Some((_, best_dist)) if dist >= best_dist => {}
            _ => best = Some((idx, dist)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Database indices ordered by ascending distance to `query`.
///
/// Ties keep database order.
pub fn rank_by_distance(query: ArrayView1<f32>, database: ArrayView2<f32>) -> Vec<usize> {
    let distances = hamming_distances(query, database);
    let mut order: Vec<usize> = (0..distances.len()).collect();
    order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, arr2};

    #[test]
    fn test_single_flip_distance() {
        let a = arr1(&[1.0, -1.0, 1.0, -1.0]);
        let b = arr1(&[1.0, 1.0, 1.0, -1.0]);
        assert_eq!(hamming_distance(a.view(), b.view()), 2.0);
        assert_eq!(disagreements(a.view(), b.view()), 1);
    }

    #[test]
    fn test_distances_against_matrix() {
        let query = arr1(&[1.0, 1.0]);
        let db = arr2(&[[1.0, 1.0], [-1.0, 1.0], [-1.0, -1.0]]);
        assert_eq!(hamming_distances(query.view(), db.view()), vec![0.0, 2.0, 4.0]);
    }

    #[test]
    fn test_nearest_row_prefers_first_on_tie() {
        let code = arr1(&[1.0, 1.0]);
        let rows = arr2(&[[-1.0, 1.0], [1.0, -1.0], [-1.0, -1.0]]);
        assert_eq!(nearest_row(code.view(), rows.view()), Some(0));
    }

    #[test]
    fn test_nearest_row_empty() {
        let code = arr1(&[1.0]);
        let rows = ndarray::Array2::<f32>::zeros((0, 1));
        assert_eq!(nearest_row(code.view(), rows.view()), None);
    }

    #[test]
    fn test_rank_is_stable() {
        let query = arr1(&[1.0, 1.0]);
        let db = arr2(&[[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]]);
        assert_eq!(rank_by_distance(query.view(), db.view()), vec![2, 1, 3, 0]);
    }
}
