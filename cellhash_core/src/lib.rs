//! # CellHash Core
//!
//! Deep hashing for single-cell annotation. An encoder maps each expression
//! profile to a `bit`-long code; every cell type owns a fixed ±1 hash center
//! built from a Hadamard matrix, and a cell is annotated with the class of
//! the closest center in Hamming distance. Codes also support retrieval,
//! scored by top-K mean average precision.
//!
//! ## Quick Start
//!
//! ```rust
//! use cellhash_core::{classify, generate_hash_centers};
//! use ndarray::Array1;
//!
//! let centers = generate_hash_centers(5, 16).unwrap();
//! let code: Array1<f32> = centers.center(3).unwrap().mapv(|v| v * 0.8);
//! assert_eq!(classify(code.view(), &centers).unwrap(), 3);
//! ```
//!
//! Training runs are configured through TOML:
//!
//! ```rust
//! use cellhash_core::CellHashConfig;
//!
//! let config = CellHashConfig::from_str("[model]\nbit = 32\nn_layers = 3\n").unwrap();
//! assert_eq!(config.model.bit, 32);
//! ```
//!
//! ## Core Modules
//!
//! - [`hashing`] - hash centers, class-balance weights, Hamming distance
//! - [`neural`] - encoder, hash loss and optimizers
//! - [`inference`] - batch encoding into squashed codes
//! - [`classifier`] - nearest-center annotation
//! - [`metrics`] - accuracy, F1 family, ARI, report text and top-K MAP
//! - [`evaluation`] - encode, classify and score in one call
//! - [`attribution`] - per-class gene gradients of annotated cells
//! - [`export`] - CSV tables of ranked labels and codes
//! - [`training`] - reference fit/test loop over a [`DataModule`]
//! - [`config`] - run configuration via TOML
//! - [`logging`] - JSON line-delimited run logs

pub mod attribution;
pub mod checkpoint;
pub mod classifier;
pub mod config;
pub mod data;
pub mod error;
pub mod evaluation;
pub mod export;
pub mod hashing;
pub mod inference;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod neural;
pub mod training;

pub use attribution::{gene_gradients, rank_genes};
pub use checkpoint::{CheckpointError, Checkpointable};
pub use classifier::{classify, classify_all};
pub use config::{
    CellHashConfig, ConfigError, EvaluationConfig, LossConfig, ModelConfig, OptimizerConfig,
    OptimizerKind, TrainingConfig,
};
pub use data::{
    Batch, DataModule, Dataset, InMemoryDataModule, Split, SyntheticConfig, SyntheticExpression,
};
pub use error::{HashError, HashResult};
pub use evaluation::{compute_metrics, compute_metrics_with_retrieval, Evaluation, QueryTiming};
pub use export::{write_code_tables, write_retrieval_results};
pub use hashing::{
    class_balance_weights, generate_hash_centers, hamming_distance, HashCenterTable,
};
pub use inference::{encode_dataset, CodeBuffer, Execution};
pub use metrics::{
    adjusted_rand_index, classification_report, evaluate, mean_average_precision, MapScore,
    MetricsReport,
};
pub use model::{HashModel, HashModelSnapshot};
pub use neural::{hash_loss, HashEncoder, HashLoss, Topology};
pub use training::{EpochMetrics, Trainer, TrainingResult};
