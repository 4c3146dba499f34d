//! Top-K Mean Average Precision over Hamming ranking.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::{HashError, HashResult};
use crate::hashing::rank_by_distance;

/// MAP result with the bookkeeping of skipped queries.
///
/// `map` is the sum of per-query average precision divided by
/// `total_queries`. Queries with no relevant item in their top-K window
/// add nothing to the sum but still count in the denominator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapScore {
    pub map: f64,
    pub evaluated_queries: usize,
    pub skipped_queries: usize,
    pub total_queries: usize,
}

/// One-hot matrix `[labels.len(), n_class]`.
pub fn one_hot(labels: &[usize], n_class: usize) -> HashResult<Array2<f32>> {
    let mut encoded = Array2::zeros((labels.len(), n_class));
    for (row, &label) in labels.iter().enumerate() {
        if label >= n_class {
            return Err(HashError::shape_mismatch(
                n_class,
                label,
                "label value (exclusive bound)",
            ));
        }
        encoded[[row, label]] = 1.0;
    }
    Ok(encoded)
}

fn check_pair(
    codes: ArrayView2<f32>,
    labels: ArrayView2<f32>,
    side: &str,
) -> HashResult<()> {
    if codes.nrows() != labels.nrows() {
        return Err(HashError::shape_mismatch(
            codes.nrows(),
            labels.nrows(),
            format!("{} label rows", side),
        ));
    }
    Ok(())
}

/// Top-K MAP of `query_codes` against `database_codes`.
///
/// An item is relevant to a query when their one-hot rows share a set
/// dimension. `top_k = None` ranks the whole database.
///
/// # Errors
///
/// * `ShapeMismatch` on inconsistent code widths, one-hot widths or row counts
/// * `EmptyCollection` if there are no queries
/// * `InvalidConfiguration` if `top_k == Some(0)`
pub fn mean_average_precision(
    database_codes: ArrayView2<f32>,
    query_codes: ArrayView2<f32>,
    database_one_hot: ArrayView2<f32>,
    query_one_hot: ArrayView2<f32>,
    top_k: Option<usize>,
) -> HashResult<MapScore> {
    check_pair(database_codes, database_one_hot, "database")?;
    check_pair(query_codes, query_one_hot, "query")?;
    if database_codes.ncols() != query_codes.ncols() {
        return Err(HashError::shape_mismatch(
            database_codes.ncols(),
            query_codes.ncols(),
            "query code width",
        ));
    }
    if database_one_hot.ncols() != query_one_hot.ncols() {
        return Err(HashError::shape_mismatch(
            database_one_hot.ncols(),
            query_one_hot.ncols(),
            "one-hot width",
        ));
    }
    if query_codes.nrows() == 0 {
        return Err(HashError::empty_collection("retrieval queries"));
    }
    if top_k == Some(0) {
        return Err(HashError::invalid_config("top_k", "0", "must be positive"));
    }

    let window = top_k.map_or(database_codes.nrows(), |k| k.min(database_codes.nrows()));
    let total_queries = query_codes.nrows();
    let mut accumulated = 0.0f64;
    let mut skipped = 0usize;

    for (query, query_labels) in query_codes.rows().into_iter().zip(query_one_hot.rows()) {
        let ranking = rank_by_distance(query, database_codes);

        let mut found = 0usize;
        let mut precision_sum = 0.0f64;
        for (position, &idx) in ranking.iter().take(window).enumerate() {
            if query_labels.dot(&database_one_hot.row(idx)) > 0.0 {
                found += 1;
                precision_sum += found as f64 / (position + 1) as f64;
            }
        }

        if found == 0 {
            skipped += 1;
            continue;
        }
        accumulated += precision_sum / found as f64;
    }

    if skipped > 0 {
        tracing::debug!(
            skipped,
            total_queries,
            "queries without a relevant item in the top-K window were left out of the MAP sum"
        );
    }

    Ok(MapScore {
        map: accumulated / total_queries as f64,
        evaluated_queries: total_queries - skipped,
        skipped_queries: skipped,
        total_queries,
    })
}

/// Database labels reordered by distance to each query, truncated to `top_k`.
pub fn ranked_database_labels(
    database_codes: ArrayView2<f32>,
    database_labels: &[usize],
    query_codes: ArrayView2<f32>,
    top_k: Option<usize>,
) -> HashResult<Vec<Vec<usize>>> {
    if database_codes.nrows() != database_labels.len() {
        return Err(HashError::shape_mismatch(
            database_codes.nrows(),
            database_labels.len(),
            "database label count",
        ));
    }
    if database_codes.ncols() != query_codes.ncols() {
        return Err(HashError::shape_mismatch(
            database_codes.ncols(),
            query_codes.ncols(),
            "query code width",
        ));
    }

    let window = top_k.map_or(database_labels.len(), |k| k.min(database_labels.len()));
    Ok(query_codes
        .rows()
        .into_iter()
        .map(|query| {
            rank_by_distance(query, database_codes)
                .into_iter()
                .take(window)
                .map(|idx| database_labels[idx])
                .collect()
        })
        .collect())
}
