//! JSON-lines run history.
//!
//! One file per record kind under the configured log directory; every call
//! appends a single line.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::evaluation::Evaluation;
use crate::training::EpochMetrics;

pub const EPOCH_LOG_FILE: &str = "epochs.jsonl";
pub const EVALUATION_LOG_FILE: &str = "evaluations.jsonl";

fn timestamp_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}

fn append_json_line<P: AsRef<Path>, T: Serialize>(path: P, value: &T) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    serde_json::to_writer(&mut file, value).map_err(io::Error::other)?;
    file.write_all(b"\n")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochLogEntry {
    pub epoch: usize,
    pub train_loss: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
    pub val_f1_median: f64,
    pub val_f1_weighted: f64,
    pub train_f1_median: f64,
    pub learning_rate: f32,
    pub timestamp_ms: u128,
}

/// Appends one validated epoch to `<log_dir>/epochs.jsonl`.
pub fn log_epoch(log_dir: &Path, metrics: &EpochMetrics) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;
    let entry = EpochLogEntry {
        epoch: metrics.epoch,
        train_loss: metrics.train_loss,
        val_loss: metrics.val_loss,
        val_accuracy: metrics.val_accuracy,
        val_f1_median: metrics.val_f1_median,
        val_f1_weighted: metrics.val_f1_weighted,
        train_f1_median: metrics.train_f1_median,
        learning_rate: metrics.learning_rate,
        timestamp_ms: timestamp_ms(),
    };
    append_json_line(log_dir.join(EPOCH_LOG_FILE), &entry)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationLogEntry {
    pub split: String,
    pub accuracy: f64,
    pub f1_median: f64,
    pub f1_macro: f64,
    pub f1_micro: f64,
    pub f1_weighted: f64,
    pub precision: f64,
    pub recall: f64,
    pub ari: f64,
    /// Absent when retrieval was not measured
    pub map: Option<f64>,
    pub skipped_queries: usize,
    pub queries: usize,
    pub elapsed_secs: f64,
    pub queries_per_sec: f64,
    pub timestamp_ms: u128,
}

/// Appends one evaluation summary to `<log_dir>/evaluations.jsonl`.
pub fn log_evaluation(log_dir: &Path, split: &str, evaluation: &Evaluation) -> io::Result<()> {
    fs::create_dir_all(log_dir)?;
    let report = &evaluation.report;
    let entry = EvaluationLogEntry {
        split: split.to_string(),
        accuracy: report.accuracy,
        f1_median: report.f1_median,
        f1_macro: report.f1_macro,
        f1_micro: report.f1_micro,
        f1_weighted: report.f1_weighted,
        precision: report.precision,
        recall: report.recall,
        ari: report.ari,
        map: report.map.map(|score| score.map),
        skipped_queries: report.map.map_or(0, |score| score.skipped_queries),
        queries: evaluation.timing.queries,
        elapsed_secs: evaluation.timing.elapsed_secs,
        queries_per_sec: evaluation.timing.queries_per_sec,
        timestamp_ms: timestamp_ms(),
    };
    append_json_line(log_dir.join(EVALUATION_LOG_FILE), &entry)
}
