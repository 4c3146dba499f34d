//! Expression datasets and the data-module interface consumed by training
//! and evaluation.
//!
//! A data module owns three splits and hands out materialised
//! `(features, labels)` batches; the rest of the crate never reaches into
//! it beyond the [`DataModule`] methods.

pub mod dataset;
pub mod synthetic;

pub use dataset::{Batch, Dataset, InMemoryDataModule};
pub use synthetic::{SyntheticConfig, SyntheticExpression};

use serde::{Deserialize, Serialize};

/// Dataset split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Validation,
    Test,
}

/// Capabilities a data owner exposes to the hashing core.
pub trait DataModule {
    /// Total number of classes.
    fn n_class(&self) -> usize;

    /// Length of one expression profile.
    fn n_features(&self) -> usize;

    /// Training-split sample count per class, indexed by class.
    fn samples_in_each_class(&self) -> &[usize];

    /// Human-readable class names, indexed by class.
    fn class_names(&self) -> &[String];

    /// Batches of a split in iteration order.
    ///
    /// `shuffle_seed = Some(seed)` permutes the samples reproducibly first.
    fn batches(&self, split: Split, shuffle_seed: Option<u64>) -> Vec<Batch>;
}
