//! Synthetic single-cell expression data.
//!
//! Every class owns a block of marker genes expressed well above a shared
//! baseline. Counts get uniform noise, are clipped at zero and
//! log-normalised with `ln(1 + x)`, so profiles look like preprocessed
//! expression matrices: non-negative, sparse-ish and class-structured.

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::data::{Dataset, InMemoryDataModule};
use crate::error::{HashError, HashResult};

/// Configuration for synthetic generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticConfig {
    /// Genes per profile
    pub n_features: usize,
    /// Cells per class before splitting; unequal counts give class imbalance
    pub samples_per_class: Vec<usize>,
    /// Marker genes per class
    pub markers_per_class: usize,
    /// Extra raw count on marker genes
    pub marker_strength: f32,
    /// Half-width of the uniform noise added to raw counts
    pub noise_level: f32,
    pub validation_fraction: f32,
    pub test_fraction: f32,
    pub seed: u64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            n_features: 64,
            samples_per_class: vec![60, 45, 45, 30, 20],
            markers_per_class: 6,
            marker_strength: 6.0,
            noise_level: 1.0,
            validation_fraction: 0.15,
            test_fraction: 0.15,
            seed: 42,
        }
    }
}

/// A generated, stratified train/validation/test split.
#[derive(Debug, Clone)]
pub struct SyntheticExpression {
    pub train: Dataset,
    pub validation: Dataset,
    pub test: Dataset,
    pub class_names: Vec<String>,
}

impl SyntheticExpression {
    /// Generates profiles for every class and splits each class separately.
    ///
    /// Every class keeps at least one training cell.
    pub fn generate(config: &SyntheticConfig) -> HashResult<Self> {
        validate(config)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let n_features = config.n_features;
        let baseline: Vec<f32> = (0..n_features).map(|_| rng.gen::<f32>()).collect();

        let mut splits: [Vec<(Vec<f32>, usize)>; 3] = [Vec::new(), Vec::new(), Vec::new()];

        for (class, &count) in config.samples_per_class.iter().enumerate() {
            let markers: Vec<usize> = (0..config.markers_per_class)
                .map(|j| (class * config.markers_per_class + j) % n_features)
                .collect();

            let mut cells: Vec<Vec<f32>> = (0..count)
                .map(|_| {
                    let mut raw = baseline.clone();
                    for &gene in &markers {
                        raw[gene] += config.marker_strength;
                    }
                    raw.into_iter()
                        .map(|value| {
                            let noise = rng.gen::<f32>() * config.noise_level * 2.0
                                - config.noise_level;
                            (value + noise).max(0.0).ln_1p()
                        })
                        .collect()
                })
                .collect();
            cells.shuffle(&mut rng);

            let (n_val, n_test) = split_sizes(
                count,
                config.validation_fraction,
                config.test_fraction,
            );
            for (idx, cell) in cells.into_iter().enumerate() {
                let target = if idx < n_test {
                    2
                } else if idx < n_test + n_val {
                    1
                } else {
                    0
                };
                splits[target].push((cell, class));
            }
        }

        let mut datasets = Vec::with_capacity(3);
        for mut rows in splits {
            rows.shuffle(&mut rng);
            datasets.push(to_dataset(rows, n_features)?);
        }
        let test = datasets.pop().ok_or_else(|| HashError::empty_collection("test split"))?;
        let validation = datasets
            .pop()
            .ok_or_else(|| HashError::empty_collection("validation split"))?;
        let train = datasets
            .pop()
            .ok_or_else(|| HashError::empty_collection("training split"))?;

        let class_names = (0..config.samples_per_class.len())
            .map(|class| format!("cell_type_{}", class))
            .collect();

        Ok(Self {
            train,
            validation,
            test,
            class_names,
        })
    }

    /// Wraps the splits into a data module.
    pub fn into_data_module(self, batch_size: usize) -> HashResult<InMemoryDataModule> {
        InMemoryDataModule::new(
            self.train,
            self.validation,
            self.test,
            self.class_names,
            batch_size,
        )
    }
}

fn validate(config: &SyntheticConfig) -> HashResult<()> {
    if config.samples_per_class.is_empty() {
        return Err(HashError::empty_collection("samples_per_class"));
    }
    if let Some((class, &count)) = config
        .samples_per_class
        .iter()
        .enumerate()
        .find(|&(_, &count)| count == 0)
    {
        return Err(HashError::invalid_class_count(class, count));
    }
    if config.n_features == 0 {
        return Err(HashError::invalid_config("n_features", "0", "must be positive"));
    }
    for (name, value) in [
        ("validation_fraction", config.validation_fraction),
        ("test_fraction", config.test_fraction),
    ] {
        if !(0.0..1.0).contains(&value) {
            return Err(HashError::invalid_config(
                name,
                value.to_string(),
                "must lie in [0, 1)",
            ));
        }
    }
    if config.validation_fraction + config.test_fraction >= 1.0 {
        return Err(HashError::invalid_config(
            "validation_fraction + test_fraction",
            (config.validation_fraction + config.test_fraction).to_string(),
            "must leave room for a training split",
        ));
    }
    Ok(())
}

/// `(validation, test)` sizes for one class, leaving at least one training cell.
fn split_sizes(count: usize, validation_fraction: f32, test_fraction: f32) -> (usize, usize) {
    let mut n_test = (count as f32 * test_fraction).round() as usize;
    let mut n_val = (count as f32 * validation_fraction).round() as usize;
    while n_test + n_val >= count && n_test + n_val > 0 {
        if n_val >= n_test {
            n_val -= 1;
        } else {
            n_test -= 1;
        }
    }
    (n_val, n_test)
}

fn to_dataset(rows: Vec<(Vec<f32>, usize)>, n_features: usize) -> HashResult<Dataset> {
    let n_rows = rows.len();
    let mut flat = Vec::with_capacity(n_rows * n_features);
    let mut labels = Vec::with_capacity(n_rows);
    for (profile, label) in rows {
        flat.extend(profile);
        labels.push(label);
    }
    let features = Array2::from_shape_vec((n_rows, n_features), flat)
        .map_err(|_| HashError::shape_mismatch(n_rows * n_features, labels.len(), "synthetic matrix"))?;
    Dataset::new(features, labels)
}
