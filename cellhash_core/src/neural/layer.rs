//! Fully connected layer with optional ReLU and inverted dropout.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{HashError, HashResult};

/// Non-linearity applied after the affine map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Activation {
    /// Rectified linear unit
    Relu,
    /// No activation (used by the code-producing output layer)
    Identity,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Relu => x.max(0.0),
            Activation::Identity => x,
        }
    }

    fn derivative(self, pre_activation: f32) -> f32 {
        match self {
            Activation::Relu => {
                if pre_activation > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Identity => 1.0,
        }
    }
}

/// Values kept from the last training forward pass.
#[derive(Clone)]
struct LayerCache {
    input: Array2<f32>,
    pre_activation: Array2<f32>,
    mask: Option<Array2<f32>>,
}

/// Gradients of one layer for a mini-batch.
#[derive(Debug, Clone)]
pub struct LayerGradients {
    pub weights: Array2<f32>,
    pub bias: Array1<f32>,
}

/// A dense layer.
///
/// # Architecture
///
/// ```text
/// input → W·input + b → activation → dropout (training only) → output
/// ```
#[derive(Clone, Serialize, Deserialize)]
pub struct DenseLayer {
    /// Weight matrix `[out_features, in_features]`
    pub weights: Array2<f32>,
    /// Bias vector `[out_features]`
    pub bias: Array1<f32>,
    pub activation: Activation,
    /// Drop probability during training (0.0 disables dropout)
    pub dropout: f32,
    #[serde(skip)]
    cache: Option<LayerCache>,
}

impl DenseLayer {
    /// Creates a layer with weights and bias drawn uniformly from
    /// `±sqrt(1 / in_features)`.
    ///
    /// # Examples
    ///
    /// ```
    /// use cellhash_core::neural::{Activation, DenseLayer};
    ///
    /// let layer = DenseLayer::new(32, 16, Activation::Relu, 0.2, 42);
    /// assert_eq!(layer.shape(), (16, 32));
    /// ```
    pub fn new(
        in_features: usize,
        out_features: usize,
        activation: Activation,
        dropout: f32,
        seed: u64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let bound = (1.0 / in_features.max(1) as f32).sqrt();

        let weights = Array2::from_shape_fn((out_features, in_features), |_| {
            rng.gen_range(-bound..=bound)
        });
        let bias = Array1::from_shape_fn(out_features, |_| rng.gen_range(-bound..=bound));

        Self {
            weights,
            bias,
            activation,
            dropout,
            cache: None,
        }
    }

    /// `(out_features, in_features)`
    pub fn shape(&self) -> (usize, usize) {
        self.weights.dim()
    }

    pub fn in_features(&self) -> usize {
        self.weights.ncols()
    }

    pub fn out_features(&self) -> usize {
        self.weights.nrows()
    }

    pub fn num_parameters(&self) -> usize {
        self.weights.len() + self.bias.len()
    }

    /// Inference pass for a single sample; dropout is inactive.
    pub fn forward_row(&self, input: ArrayView1<f32>) -> Array1<f32> {
        let activation = self.activation;
        let mut z = self.weights.dot(&input);
        z += &self.bias;
        z.mapv_inplace(|v| activation.apply(v));
        z
    }

    /// Inference pass over a `[batch, in_features]` matrix. Nothing is cached.
    ///
    /// Returns `(pre_activation, output)`.
    pub fn forward_batch(&self, input: ArrayView2<f32>) -> (Array2<f32>, Array2<f32>) {
        let mut pre_activation = input.dot(&self.weights.t());
        pre_activation += &self.bias;

        let activation = self.activation;
        let output = pre_activation.mapv(|v| activation.apply(v));
        (pre_activation, output)
    }

    /// Gradient w.r.t. the input of an inference pass, given the
    /// pre-activation [`DenseLayer::forward_batch`] returned for it.
    pub fn input_gradient(
        &self,
        grad_output: &Array2<f32>,
        pre_activation: &Array2<f32>,
    ) -> HashResult<Array2<f32>> {
        if grad_output.dim() != pre_activation.dim() {
            return Err(HashError::shape_mismatch(
                pre_activation.len(),
                grad_output.len(),
                "layer output gradient",
            ));
        }

        let activation = self.activation;
        let mut grad = grad_output.clone();
        grad.zip_mut_with(pre_activation, |g, &z| *g *= activation.derivative(z));
        Ok(grad.dot(&self.weights))
    }

    /// Training pass over a `[batch, in_features]` matrix.
    ///
    /// Caches what [`DenseLayer::backward`] needs and samples a fresh dropout
    /// mask when `dropout > 0`.
    pub fn forward_train(&mut self, input: ArrayView2<f32>, rng: &mut StdRng) -> Array2<f32> {
        let (pre_activation, mut output) = self.forward_batch(input);

        let mask = if self.dropout > 0.0 {
            let keep = 1.0 - self.dropout;
            let mask = Array2::from_shape_fn(output.dim(), |_| {
                if rng.gen::<f32>() < keep {
                    1.0 / keep
                } else {
                    0.0
                }
            });
            output *= &mask;
            Some(mask)
        } else {
            None
        };

        self.cache = Some(LayerCache {
            input: input.to_owned(),
            pre_activation,
            mask,
        });

        output
    }

    /// Backward pass through the last training forward.
    ///
    /// # Returns
    ///
    /// Tuple of (gradient w.r.t. input, parameter gradients)
    pub fn backward(
        &self,
        grad_output: &Array2<f32>,
    ) -> HashResult<(Array2<f32>, LayerGradients)> {
        let cache = self.cache.as_ref().ok_or_else(|| {
            HashError::invalid_config(
                "backward",
                "no cached activations",
                "forward_train must run before backward",
            )
        })?;

        if grad_output.dim() != cache.pre_activation.dim() {
            return Err(HashError::shape_mismatch(
                cache.pre_activation.len(),
                grad_output.len(),
                "layer output gradient",
            ));
        }

        let mut grad = grad_output.clone();
        if let Some(mask) = &cache.mask {
            grad *= mask;
        }

        let activation = self.activation;
        grad.zip_mut_with(&cache.pre_activation, |g, &z| *g *= activation.derivative(z));

        let weights = grad.t().dot(&cache.input);
        let bias = grad.sum_axis(Axis(0));
        let grad_input = grad.dot(&self.weights);

        Ok((grad_input, LayerGradients { weights, bias }))
    }

    /// Drops cached activations.
    pub fn clear_cache(&mut self) {
        self.cache = None;
    }
}
