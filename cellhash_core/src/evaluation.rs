//! Evaluation entry points: encode → classify → metrics.
//!
//! Data and class names are passed in explicitly; nothing here reaches
//! into a trainer or data module.

use std::time::Instant;

use serde::Serialize;

use crate::classifier::classify_all;
use crate::data::Batch;
use crate::error::{HashError, HashResult};
use crate::inference::{encode_dataset, CodeBuffer, Execution};
use crate::metrics::{evaluate, ranked_database_labels, MetricsReport, RetrievalInputs};
use crate::model::HashModel;

/// Query throughput of the encode-and-classify step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct QueryTiming {
    pub queries: usize,
    pub elapsed_secs: f64,
    pub queries_per_sec: f64,
}

/// Result of one evaluation pass.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub report: MetricsReport,
    pub query: CodeBuffer,
    pub predicted: Vec<usize>,
    /// Retrieval database codes, present in retrieval mode
    pub database: Option<CodeBuffer>,
    pub timing: QueryTiming,
}

impl Evaluation {
    /// Database labels ranked per query, when a database was encoded.
    pub fn ranked_database_labels(
        &self,
        top_k: Option<usize>,
    ) -> HashResult<Option<Vec<Vec<usize>>>> {
        match &self.database {
            Some(database) => Ok(Some(ranked_database_labels(
                database.codes.view(),
                &database.labels,
                self.query.codes.view(),
                top_k,
            )?)),
            None => Ok(None),
        }
    }
}

fn annotate(
    model: &HashModel,
    query_batches: &[Batch],
    class_names: &[String],
    execution: Execution,
) -> HashResult<(CodeBuffer, Vec<usize>, QueryTiming)> {
    if class_names.len() != model.n_class() {
        return Err(HashError::shape_mismatch(
            model.n_class(),
            class_names.len(),
            "class name count",
        ));
    }

    let start = Instant::now();
    let query = encode_dataset(query_batches, model.encoder(), execution)?;
    let predicted = classify_all(query.codes.view(), model.centers())?;
    let elapsed_secs = start.elapsed().as_secs_f64();

    let queries = query.len();
    let timing = QueryTiming {
        queries,
        elapsed_secs,
        queries_per_sec: if elapsed_secs > 0.0 {
            queries as f64 / elapsed_secs
        } else {
            0.0
        },
    };
    tracing::info!(
        queries,
        elapsed_secs,
        queries_per_sec = timing.queries_per_sec,
        "annotated query cells by closest hash center"
    );

    Ok((query, predicted, timing))
}

/// Classification metrics for the query split.
pub fn compute_metrics(
    model: &HashModel,
    query_batches: &[Batch],
    class_names: &[String],
    execution: Execution,
) -> HashResult<Evaluation> {
    let (query, predicted, timing) = annotate(model, query_batches, class_names, execution)?;
    let report = evaluate(&predicted, &query.labels, class_names, None)?;

    Ok(Evaluation {
        report,
        query,
        predicted,
        database: None,
        timing,
    })
}

/// Classification metrics plus top-K MAP against a database split.
///
/// `database_batches` are encoded in order; callers pass the training
/// batches followed by the validation batches.
pub fn compute_metrics_with_retrieval(
    model: &HashModel,
    query_batches: &[Batch],
    database_batches: &[Batch],
    class_names: &[String],
    execution: Execution,
    top_k: Option<usize>,
) -> HashResult<Evaluation> {
    let (query, predicted, timing) = annotate(model, query_batches, class_names, execution)?;
    let database = encode_dataset(database_batches, model.encoder(), execution)?;

    let report = evaluate(
        &predicted,
        &query.labels,
        class_names,
        Some(RetrievalInputs {
            database_codes: database.codes.view(),
            database_labels: &database.labels,
            query_codes: query.codes.view(),
            n_class: model.n_class(),
            top_k,
        }),
    )?;

    Ok(Evaluation {
        report,
        query,
        predicted,
        database: Some(database),
        timing,
    })
}
