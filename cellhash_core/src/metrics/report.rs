//! Aggregated metrics report.

use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};

use crate::error::{HashError, HashResult};
use crate::metrics::classification::{classification_report, median, LabelCounts};
use crate::metrics::clustering::adjusted_rand_index;
use crate::metrics::retrieval::{mean_average_precision, one_hot, MapScore};

/// Everything computed for one evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub accuracy: f64,
    pub f1_weighted: f64,
    /// Median of `f1_per_class`; the model-selection statistic
    pub f1_median: f64,
    pub f1_per_class: Vec<f64>,
    pub f1_macro: f64,
    pub f1_micro: f64,
    pub precision: f64,
    pub recall: f64,
    pub ari: f64,
    pub map: Option<MapScore>,
    pub class_report: String,
}

/// Inputs for the retrieval benchmark.
///
/// The query labels are the true labels handed to [`evaluate`].
#[derive(Debug, Clone, Copy)]
pub struct RetrievalInputs<'a> {
    pub database_codes: ArrayView2<'a, f32>,
    pub database_labels: &'a [usize],
    pub query_codes: ArrayView2<'a, f32>,
    pub n_class: usize,
    pub top_k: Option<usize>,
}

/// Computes every classification metric and, when `retrieval` is given, MAP.
pub fn evaluate(
    predicted: &[usize],
    truth: &[usize],
    class_names: &[String],
    retrieval: Option<RetrievalInputs<'_>>,
) -> HashResult<MetricsReport> {
    let counts = LabelCounts::new(predicted, truth)?;
    let f1_per_class = counts.f1_per_class();
    let f1_median =
        median(&f1_per_class).ok_or_else(|| HashError::empty_collection("per-class F1"))?;

    let map = match retrieval {
        Some(inputs) => {
            if inputs.query_codes.nrows() != truth.len() {
                return Err(HashError::shape_mismatch(
                    truth.len(),
                    inputs.query_codes.nrows(),
                    "query code rows",
                ));
            }
            let database_one_hot = one_hot(inputs.database_labels, inputs.n_class)?;
            let query_one_hot = one_hot(truth, inputs.n_class)?;
            Some(mean_average_precision(
                inputs.database_codes,
                inputs.query_codes,
                database_one_hot.view(),
                query_one_hot.view(),
                inputs.top_k,
            )?)
        }
        None => None,
    };

    Ok(MetricsReport {
        accuracy: counts.accuracy(),
        f1_weighted: counts.f1_weighted(),
        f1_median,
        f1_macro: counts.f1_macro(),
        f1_micro: counts.f1_micro(),
        precision: counts.precision_macro(),
        recall: counts.recall_macro(),
        ari: adjusted_rand_index(truth, predicted)?,
        map,
        class_report: classification_report(predicted, truth, class_names)?,
        f1_per_class,
    })
}
