//! Hash encoder: expression profile → continuous code of `bit` values.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{HashError, HashResult};
use crate::neural::layer::{Activation, DenseLayer, LayerGradients};
use crate::neural::optimizer::Optimizer;

/// The three supported hidden-stage profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Topology {
    Three,
    Four,
    Five,
}

impl Topology {
    /// Maps the `n_layers` configuration value to a profile.
    pub fn from_layers(n_layers: usize) -> HashResult<Self> {
        match n_layers {
            3 => Ok(Topology::Three),
            4 => Ok(Topology::Four),
            5 => Ok(Topology::Five),
            other => Err(HashError::unsupported_topology(other)),
        }
    }

    pub fn n_layers(self) -> usize {
        match self {
            Topology::Three => 3,
            Topology::Four => 4,
            Topology::Five => 5,
        }
    }

    /// `(width, dropout)` of every hidden stage at full size.
    pub fn hidden_stages(self) -> &'static [(usize, f32)] {
        match self {
            Topology::Three => &[(4000, 0.5), (1000, 0.0), (250, 0.0)],
            Topology::Four => &[(5000, 0.2), (2000, 0.2), (800, 0.0), (300, 0.0)],
            Topology::Five => &[
                (9000, 0.2),
                (3150, 0.2),
                (900, 0.2),
                (450, 0.0),
                (200, 0.0),
            ],
        }
    }

    /// Hidden widths multiplied by `scale`, rounded, at least 1.
    pub fn scaled_widths(self, scale: f32) -> Vec<usize> {
        self.hidden_stages()
            .iter()
            .map(|&(width, _)| ((width as f32 * scale).round() as usize).max(1))
            .collect()
    }
}

/// Feed-forward encoder producing raw (unsquashed) hash codes.
#[derive(Clone, Serialize, Deserialize)]
pub struct HashEncoder {
    layers: Vec<DenseLayer>,
    topology: Topology,
    n_features: usize,
    bit: usize,
}

impl HashEncoder {
    /// Builds the encoder for a topology profile.
    ///
    /// # Arguments
    ///
    /// * `n_features` - Length of an input expression profile
    /// * `bit` - Length of the produced code
    /// * `topology` - Hidden-stage profile
    /// * `width_scale` - Multiplier applied to every hidden width
    /// * `seed` - Seed for parameter initialisation
    pub fn new(
        n_features: usize,
        bit: usize,
        topology: Topology,
        width_scale: f32,
        seed: u64,
    ) -> HashResult<Self> {
        if n_features == 0 {
            return Err(HashError::invalid_config(
                "n_features",
                "0",
                "the encoder needs at least one input feature",
            ));
        }
        if bit == 0 {
            return Err(HashError::invalid_dimension(bit, "code length must be positive"));
        }
        if !width_scale.is_finite() || width_scale <= 0.0 {
            return Err(HashError::invalid_config(
                "width_scale",
                width_scale.to_string(),
                "must be positive",
            ));
        }

        let widths = topology.scaled_widths(width_scale);
        let mut layers = Vec::with_capacity(widths.len() + 1);
        let mut fan_in = n_features;

        for (idx, (&width, &(_, dropout))) in
            widths.iter().zip(topology.hidden_stages()).enumerate()
        {
            layers.push(DenseLayer::new(
                fan_in,
                width,
                Activation::Relu,
                dropout,
                seed.wrapping_add(idx as u64),
            ));
            fan_in = width;
        }
        layers.push(DenseLayer::new(
            fan_in,
            bit,
            Activation::Identity,
            0.0,
            seed.wrapping_add(widths.len() as u64),
        ));

        Ok(Self {
            layers,
            topology,
            n_features,
            bit,
        })
    }

    /// Reassembles an encoder from stored layers, checking they chain.
    pub fn from_layers(layers: Vec<DenseLayer>, topology: Topology) -> HashResult<Self> {
        let expected = topology.n_layers() + 1;
        if layers.len() != expected {
            return Err(HashError::shape_mismatch(expected, layers.len(), "encoder layer count"));
        }
        for pair in layers.windows(2) {
            if pair[0].out_features() != pair[1].in_features() {
                return Err(HashError::shape_mismatch(
                    pair[0].out_features(),
                    pair[1].in_features(),
                    "consecutive layer widths",
                ));
            }
        }

        let n_features = layers[0].in_features();
        let bit = layers[layers.len() - 1].out_features();
        Ok(Self {
            layers,
            topology,
            n_features,
            bit,
        })
    }

    pub fn topology(&self) -> Topology {
        self.topology
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn bit(&self) -> usize {
        self.bit
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn num_parameters(&self) -> usize {
        self.layers.iter().map(DenseLayer::num_parameters).sum()
    }

    /// Raw code of one expression profile. Pure; dropout inactive.
    pub fn forward(&self, features: ArrayView1<f32>) -> HashResult<Array1<f32>> {
        if features.len() != self.n_features {
            return Err(HashError::shape_mismatch(
                self.n_features,
                features.len(),
                "feature vector length",
            ));
        }

        let mut activation = self.layers[0].forward_row(features);
        for layer in &self.layers[1..] {
            activation = layer.forward_row(activation.view());
        }
        Ok(activation)
    }

    /// Raw codes of a `[batch, n_features]` matrix. Pure; dropout inactive.
    pub fn forward_batch(&self, features: ArrayView2<f32>) -> HashResult<Array2<f32>> {
        self.check_width(features.ncols())?;

        let mut activation = self.layers[0].forward_batch(features).1;
        for layer in &self.layers[1..] {
            activation = layer.forward_batch(activation.view()).1;
        }
        Ok(activation)
    }

    /// Gradient of a loss on the raw codes w.r.t. the input features.
    ///
    /// `grad_codes` receives the raw codes of `features` and returns
    /// ∂loss/∂raw_codes of the same shape. The pass runs without dropout
    /// and leaves the training cache untouched.
    pub fn input_gradient<F>(
        &self,
        features: ArrayView2<f32>,
        grad_codes: F,
    ) -> HashResult<Array2<f32>>
    where
        F: FnOnce(&Array2<f32>) -> HashResult<Array2<f32>>,
    {
        self.check_width(features.ncols())?;

        let mut pre_activations = Vec::with_capacity(self.layers.len());
        let (pre, mut activation) = self.layers[0].forward_batch(features);
        pre_activations.push(pre);
        for layer in &self.layers[1..] {
            let (pre, output) = layer.forward_batch(activation.view());
            pre_activations.push(pre);
            activation = output;
        }

        let mut grad = grad_codes(&activation)?;
        for (layer, pre) in self.layers.iter().zip(&pre_activations).rev() {
            grad = layer.input_gradient(&grad, pre)?;
        }
        Ok(grad)
    }

    /// Training forward over a `[batch, n_features]` matrix with dropout.
    pub fn forward_train(
        &mut self,
        features: ArrayView2<f32>,
        rng: &mut StdRng,
    ) -> HashResult<Array2<f32>> {
        self.check_width(features.ncols())?;

        let mut activation = self.layers[0].forward_train(features, rng);
        for layer in &mut self.layers[1..] {
            activation = layer.forward_train(activation.view(), rng);
        }
        Ok(activation)
    }

    /// Back-propagates ∂loss/∂raw_codes; gradients are returned in layer order.
    pub fn backward(&self, grad_codes: &Array2<f32>) -> HashResult<Vec<LayerGradients>> {
        let mut gradients = Vec::with_capacity(self.layers.len());
        let mut grad = grad_codes.clone();

        for layer in self.layers.iter().rev() {
            let (grad_input, layer_grads) = layer.backward(&grad)?;
            gradients.push(layer_grads);
            grad = grad_input;
        }

        gradients.reverse();
        Ok(gradients)
    }

    /// Applies one optimizer step to every parameter.
    pub fn apply_gradients(
        &mut self,
        gradients: &[LayerGradients],
        optimizer: &mut Optimizer,
    ) -> HashResult<()> {
        if gradients.len() != self.layers.len() {
            return Err(HashError::shape_mismatch(
                self.layers.len(),
                gradients.len(),
                "layer gradient count",
            ));
        }

        optimizer.begin_step();
        for (idx, (layer, grads)) in self.layers.iter_mut().zip(gradients).enumerate() {
            optimizer.update(&format!("layer{}_weights", idx), &mut layer.weights, &grads.weights);
            optimizer.update(&format!("layer{}_bias", idx), &mut layer.bias, &grads.bias);
        }
        Ok(())
    }

    /// Drops cached training activations from every layer.
    pub fn clear_cache(&mut self) {
        for layer in &mut self.layers {
            layer.clear_cache();
        }
    }

    fn check_width(&self, width: usize) -> HashResult<()> {
        if width != self.n_features {
            return Err(HashError::shape_mismatch(
                self.n_features,
                width,
                "feature matrix width",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::neural::optimizer::SgdOptimizer;
    use rand::SeedableRng;

    fn small_encoder(topology: Topology) -> HashEncoder {
        HashEncoder::new(12, 8, topology, 0.01, 42).unwrap()
    }

    #[test]
    fn test_topology_profiles() {
        assert_eq!(Topology::from_layers(5).unwrap(), Topology::Five);
        assert_eq!(
            Topology::Five.scaled_widths(1.0),
            vec![9000, 3150, 900, 450, 200]
        );
        assert_eq!(Topology::Four.scaled_widths(1.0), vec![5000, 2000, 800, 300]);
        assert_eq!(Topology::Three.scaled_widths(0.1), vec![400, 100, 25]);
        assert_eq!(Topology::Three.scaled_widths(1e-6), vec![1, 1, 1]);
        assert_eq!(
            Topology::from_layers(6),
            Err(HashError::UnsupportedTopology { n_layers: 6 })
        );
    }

    #[test]
    fn test_dropout_schedule() {
        let encoder = small_encoder(Topology::Five);
        let dropouts: Vec<f32> = encoder.layers().iter().map(|l| l.dropout).collect();
        assert_eq!(dropouts, vec![0.2, 0.2, 0.2, 0.0, 0.0, 0.0]);
        let last = encoder.layers().last().unwrap();
        assert_eq!(last.activation, Activation::Identity);
    }

    #[test]
    fn test_forward_shapes() {
        for topology in [Topology::Three, Topology::Four, Topology::Five] {
            let encoder = small_encoder(topology);
            let code = encoder.forward(Array1::from_elem(12, 0.5).view()).unwrap();
            assert_eq!(code.len(), 8);
            assert_eq!(encoder.layers().len(), topology.n_layers() + 1);
        }
    }

    #[test]
    fn test_forward_rejects_wrong_width() {
        let encoder = small_encoder(Topology::Three);
        assert!(matches!(
            encoder.forward(Array1::zeros(11).view()),
            Err(HashError::ShapeMismatch { expected: 12, got: 11, .. })
        ));
    }

    #[test]
    fn test_forward_is_deterministic() {
        let encoder = small_encoder(Topology::Four);
        let x = Array1::from_shape_fn(12, |i| i as f32 / 12.0);
        assert_eq!(
            encoder.forward(x.view()).unwrap(),
            encoder.forward(x.view()).unwrap()
        );
    }

    #[test]
    fn test_train_step_changes_parameters() {
        let mut encoder = HashEncoder::new(6, 4, Topology::Three, 0.005, 1).unwrap();
        let before = encoder.layers()[0].weights.clone();
        let bias_before = encoder.layers()[3].bias.clone();
        let mut rng = StdRng::seed_from_u64(5);
        let batch = Array2::from_shape_fn((3, 6), |(i, j)| (i + j) as f32 * 0.1);

        let out = encoder.forward_train(batch.view(), &mut rng).unwrap();
        let grads = encoder.backward(&Array2::ones(out.dim())).unwrap();
        let mut optimizer = Optimizer::Sgd(SgdOptimizer::new(0.1, 0.0, 0.0));
        encoder.apply_gradients(&grads, &mut optimizer).unwrap();

        assert_eq!(grads.len(), 4);
        assert_eq!(grads[0].weights.dim(), before.dim());
        assert!(encoder.layers()[3].bias.iter().all(|b| b.is_finite()));
        assert_ne!(encoder.layers()[3].bias, bias_before);
    }

    #[test]
    fn test_forward_batch_matches_rows() {
        let encoder = small_encoder(Topology::Five);
        let batch = Array2::from_shape_fn((3, 12), |(i, j)| ((i * 12 + j) % 7) as f32 * 0.2);
        let codes = encoder.forward_batch(batch.view()).unwrap();
        for (row, code) in batch.rows().into_iter().zip(codes.rows()) {
            let single = encoder.forward(row).unwrap();
            for (a, b) in single.iter().zip(code.iter()) {
                assert!((a - b).abs() < 1e-5);
            }
        }
        assert!(encoder.forward_batch(Array2::zeros((1, 11)).view()).is_err());
    }

    #[test]
    fn test_input_gradient_matches_finite_difference() {
        // identity activations make the encoder linear in its input
        let mut layers = small_encoder(Topology::Three).layers().to_vec();
        for layer in &mut layers {
            layer.activation = Activation::Identity;
        }
        let encoder = HashEncoder::from_layers(layers, Topology::Three).unwrap();

        let x = Array2::from_shape_fn((1, 12), |(_, j)| j as f32 * 0.05);
        let grad = encoder
            .input_gradient(x.view(), |codes| Ok(Array2::ones(codes.dim())))
            .unwrap();
        assert_eq!(grad.dim(), (1, 12));

        let base = encoder.forward_batch(x.view()).unwrap().sum();
        let eps = 1e-2;
        for gene in [0, 5, 11] {
            let mut bumped = x.clone();
            bumped[[0, gene]] += eps;
            let numeric = (encoder.forward_batch(bumped.view()).unwrap().sum() - base) / eps;
            assert!((numeric - grad[[0, gene]]).abs() < 1e-2);
        }
    }

    #[test]
    fn test_input_gradient_propagates_callback_error() {
        let encoder = small_encoder(Topology::Four);
        let x = Array2::zeros((2, 12));
        assert!(encoder
            .input_gradient(x.view(), |_| Err(HashError::empty_collection("codes")))
            .is_err());
        assert!(encoder
            .input_gradient(x.view(), |_| Ok(Array2::zeros((2, 3))))
            .is_err());
    }

    #[test]
    fn test_from_layers_validates_chain() {
        let encoder = small_encoder(Topology::Three);
        let mut layers = encoder.layers().to_vec();
        assert!(HashEncoder::from_layers(layers.clone(), Topology::Three).is_ok());
        layers.swap(1, 2);
        assert!(HashEncoder::from_layers(layers, Topology::Three).is_err());
    }
}
