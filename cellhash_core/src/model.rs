//! Trainable hashing model: encoder plus the class hash centers.

use ndarray::{Array1, Array2, ArrayView1};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::checkpoint::{CheckpointError, Checkpointable};
use crate::classifier::classify;
use crate::config::ModelConfig;
use crate::error::{HashError, HashResult};
use crate::hashing::{generate_hash_centers_with_rng, HashCenterTable};
use crate::neural::{squash, DenseLayer, HashEncoder, Topology};

/// Encoder and hash centers built for one class set.
///
/// The centers are fixed at construction; only the encoder trains.
#[derive(Clone)]
pub struct HashModel {
    config: ModelConfig,
    encoder: HashEncoder,
    centers: HashCenterTable,
}

impl HashModel {
    /// Builds centers and a freshly initialised encoder.
    ///
    /// Everything random is drawn from generators seeded with `config.seed`.
    pub fn new(n_class: usize, n_features: usize, config: &ModelConfig) -> HashResult<Self> {
        let topology = Topology::from_layers(config.n_layers)?;
        let mut rng = StdRng::seed_from_u64(config.seed);
        let centers = generate_hash_centers_with_rng(n_class, config.bit, &mut rng)?;
        let encoder = HashEncoder::new(
            n_features,
            config.bit,
            topology,
            config.width_scale,
            config.seed,
        )?;

        tracing::debug!(
            n_class,
            n_features,
            bit = config.bit,
            parameters = encoder.num_parameters(),
            "built hash model"
        );

        Ok(Self {
            config: config.clone(),
            encoder,
            centers,
        })
    }

    /// Pairs an existing encoder with a center table.
    ///
    /// Fails with `ShapeMismatch` when the encoder's code length differs
    /// from the centers'.
    pub fn from_parts(
        config: ModelConfig,
        mut encoder: HashEncoder,
        centers: HashCenterTable,
    ) -> HashResult<Self> {
        if encoder.bit() != centers.bit() {
            return Err(HashError::shape_mismatch(
                centers.bit(),
                encoder.bit(),
                "encoder code length",
            ));
        }
        encoder.clear_cache();
        Ok(Self {
            config,
            encoder,
            centers,
        })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn encoder(&self) -> &HashEncoder {
        &self.encoder
    }

    pub fn encoder_mut(&mut self) -> &mut HashEncoder {
        &mut self.encoder
    }

    pub fn centers(&self) -> &HashCenterTable {
        &self.centers
    }

    pub fn n_class(&self) -> usize {
        self.centers.n_class()
    }

    pub fn bit(&self) -> usize {
        self.centers.bit()
    }

    /// Squashed code of one expression profile.
    pub fn encode(&self, features: ArrayView1<f32>) -> HashResult<Array1<f32>> {
        Ok(self.encoder.forward(features)?.mapv(squash))
    }

    /// Nearest-center class of one expression profile.
    pub fn predict(&self, features: ArrayView1<f32>) -> HashResult<usize> {
        let code = self.encode(features)?;
        classify(code.view(), &self.centers)
    }
}

/// Stored form of a [`HashModel`].
#[derive(Serialize, Deserialize)]
pub struct HashModelSnapshot {
    config: ModelConfig,
    topology: Topology,
    layers: Vec<DenseLayer>,
    centers: Array2<f32>,
}

impl Checkpointable for HashModel {
    type Snapshot = HashModelSnapshot;
    const FORMAT_VERSION: u32 = 1;

    fn to_snapshot(&self) -> HashModelSnapshot {
        HashModelSnapshot {
            config: self.config.clone(),
            topology: self.encoder.topology(),
            layers: self.encoder.layers().to_vec(),
            centers: self.centers.as_array().to_owned(),
        }
    }

    fn from_snapshot(snapshot: HashModelSnapshot) -> Result<Self, CheckpointError> {
        let HashModelSnapshot {
            config,
            topology,
            layers,
            centers,
        } = snapshot;

        let encoder = HashEncoder::from_layers(layers, topology)?;
        let centers = HashCenterTable::from_array(centers)?;
        if encoder.bit() != config.bit {
            return Err(CheckpointError::InvalidFormat(format!(
                "encoder emits {} bits but config says {}",
                encoder.bit(),
                config.bit
            )));
        }
        Ok(Self::from_parts(config, encoder, centers)?)
    }
}
