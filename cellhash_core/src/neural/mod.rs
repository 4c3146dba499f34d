//! Encoder network, hash loss and optimizers.
//!
//! The encoder maps an expression profile to a raw code of `bit` values;
//! the loss and inference stages squash it with `tanh`.

pub mod layer;
pub mod loss;
pub mod network;
pub mod optimizer;

pub use layer::{Activation, DenseLayer, LayerGradients};
pub use loss::{hash_loss, hash_loss_with_gradients, squash, HashLoss};
pub use network::{HashEncoder, Topology};
pub use optimizer::{AdamOptimizer, Optimizer, SgdOptimizer, StepLr};
