//! In-memory splits and batching.

use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::data::{DataModule, Split};
use crate::error::{HashError, HashResult};
use crate::hashing::class_counts;

/// One materialised mini-batch: `[batch, n_features]` plus aligned labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub features: Array2<f32>,
    pub labels: Vec<usize>,
}

impl Batch {
    pub fn new(features: Array2<f32>, labels: Vec<usize>) -> HashResult<Self> {
        if features.nrows() != labels.len() {
            return Err(HashError::shape_mismatch(
                features.nrows(),
                labels.len(),
                "batch label count",
            ));
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Feature matrix and labels of one split.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub features: Array2<f32>,
    pub labels: Vec<usize>,
}

impl Dataset {
    pub fn new(features: Array2<f32>, labels: Vec<usize>) -> HashResult<Self> {
        if features.nrows() != labels.len() {
            return Err(HashError::shape_mismatch(
                features.nrows(),
                labels.len(),
                "dataset label count",
            ));
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Number of batches for a given batch size; zero is treated as one.
    pub fn num_batches(&self, batch_size: usize) -> usize {
        self.len().div_ceil(batch_size.max(1))
    }

    /// Splits the dataset into batches of at most `batch_size` rows.
    pub fn batches(&self, batch_size: usize, shuffle_seed: Option<u64>) -> Vec<Batch> {
        let mut order: Vec<usize> = (0..self.len()).collect();
        if let Some(seed) = shuffle_seed {
            let mut rng = StdRng::seed_from_u64(seed);
            order.shuffle(&mut rng);
        }

        order
            .chunks(batch_size.max(1))
            .map(|chunk| Batch {
                features: self.features.select(Axis(0), chunk),
                labels: chunk.iter().map(|&idx| self.labels[idx]).collect(),
            })
            .collect()
    }
}

/// Data module backed by three in-memory splits.
#[derive(Debug, Clone)]
pub struct InMemoryDataModule {
    train: Dataset,
    validation: Dataset,
    test: Dataset,
    class_names: Vec<String>,
    samples_in_each_class: Vec<usize>,
    batch_size: usize,
}

impl InMemoryDataModule {
    /// Builds the module; class counts come from the training split.
    ///
    /// # Errors
    ///
    /// * `ShapeMismatch` if the splits disagree on feature width or a label
    ///   is outside `0..class_names.len()`
    /// * `EmptyCollection` if there are no classes or the training split is empty
    pub fn new(
        train: Dataset,
        validation: Dataset,
        test: Dataset,
        class_names: Vec<String>,
        batch_size: usize,
    ) -> HashResult<Self> {
        if class_names.is_empty() {
            return Err(HashError::empty_collection("class names"));
        }
        if train.is_empty() {
            return Err(HashError::empty_collection("training split"));
        }
        if batch_size == 0 {
            return Err(HashError::invalid_config("batch_size", "0", "must be positive"));
        }

        let n_features = train.n_features();
        for (split, name) in [(&validation, "validation"), (&test, "test")] {
            if split.n_features() != n_features {
                return Err(HashError::shape_mismatch(
                    n_features,
                    split.n_features(),
                    format!("{} feature width", name),
                ));
            }
        }

        let n_class = class_names.len();
        let samples_in_each_class = class_counts(&train.labels, n_class)?;
        class_counts(&validation.labels, n_class)?;
        class_counts(&test.labels, n_class)?;

        Ok(Self {
            train,
            validation,
            test,
            class_names,
            samples_in_each_class,
            batch_size,
        })
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn split(&self, split: Split) -> &Dataset {
        match split {
            Split::Train => &self.train,
            Split::Validation => &self.validation,
            Split::Test => &self.test,
        }
    }
}

impl DataModule for InMemoryDataModule {
    fn n_class(&self) -> usize {
        self.class_names.len()
    }

    fn n_features(&self) -> usize {
        self.train.n_features()
    }

    fn samples_in_each_class(&self) -> &[usize] {
        &self.samples_in_each_class
    }

    fn class_names(&self) -> &[String] {
        &self.class_names
    }

    fn batches(&self, split: Split, shuffle_seed: Option<u64>) -> Vec<Batch> {
        self.split(split).batches(self.batch_size, shuffle_seed)
    }
}
