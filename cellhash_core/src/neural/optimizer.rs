//! Optimizers and learning-rate schedule for training the hash encoder.

use std::collections::HashMap;

use ndarray::{Array, Dimension};
use serde::{Deserialize, Serialize};

/// Stochastic Gradient Descent optimizer with momentum.
///
/// Implements the update rule:
/// ```text
/// velocity = momentum * velocity + learning_rate * (gradient + weight_decay * parameter)
/// parameter = parameter - velocity
/// ```
pub struct SgdOptimizer {
    pub learning_rate: f32,
    /// Momentum coefficient (0.0 = no momentum, 0.9 = strong momentum)
    pub momentum: f32,
    /// L2 penalty added to the gradient
    pub weight_decay: f32,
    velocities: HashMap<String, Vec<f32>>,
}

impl SgdOptimizer {
    /// Creates a new SGD optimizer.
    ///
    /// # Examples
    ///
    /// ```
    /// use cellhash_core::neural::SgdOptimizer;
    ///
    /// let optimizer = SgdOptimizer::new(0.01, 0.9, 0.0001);
    /// assert_eq!(optimizer.momentum, 0.9);
    /// ```
    pub fn new(learning_rate: f32, momentum: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            weight_decay,
            velocities: HashMap::new(),
        }
    }

    /// Updates a parameter in place.
    pub fn step<D: Dimension>(
        &mut self,
        param_name: &str,
        param: &mut Array<f32, D>,
        gradient: &Array<f32, D>,
    ) {
        let velocity = self
            .velocities
            .entry(param_name.to_string())
            .or_insert_with(|| vec![0.0; param.len()]);

        for ((p, &g), v) in param.iter_mut().zip(gradient.iter()).zip(velocity.iter_mut()) {
            let g = g + self.weight_decay * *p;
            *v = self.momentum * *v + self.learning_rate * g;
            *p -= *v;
        }
    }
}

/// Adam optimizer (Adaptive Moment Estimation) with L2 weight decay.
pub struct AdamOptimizer {
    pub learning_rate: f32,
    /// Exponential decay rate for the first moment (typically 0.9)
    pub beta1: f32,
    /// Exponential decay rate for the second moment (typically 0.999)
    pub beta2: f32,
    pub epsilon: f32,
    pub weight_decay: f32,
    first_moments: HashMap<String, Vec<f32>>,
    second_moments: HashMap<String, Vec<f32>>,
    /// Completed optimizer steps
    t: usize,
}

impl AdamOptimizer {
    pub fn new(learning_rate: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            weight_decay,
            first_moments: HashMap::new(),
            second_moments: HashMap::new(),
            t: 0,
        }
    }

    /// Advances the shared time step; call once per mini-batch.
    pub fn begin_step(&mut self) {
        self.t += 1;
    }

    pub fn steps(&self) -> usize {
        self.t
    }

    /// Updates a parameter in place using bias-corrected moments.
    pub fn step<D: Dimension>(
        &mut self,
        param_name: &str,
        param: &mut Array<f32, D>,
        gradient: &Array<f32, D>,
    ) {
        let t = self.t.max(1) as i32;
        let m = self
            .first_moments
            .entry(param_name.to_string())
            .or_insert_with(|| vec![0.0; param.len()]);
        let v = self
            .second_moments
            .entry(param_name.to_string())
            .or_insert_with(|| vec![0.0; param.len()]);

        let bias1 = 1.0 - self.beta1.powi(t);
        let bias2 = 1.0 - self.beta2.powi(t);

        for (((p, &g), m), v) in param
            .iter_mut()
            .zip(gradient.iter())
            .zip(m.iter_mut())
            .zip(v.iter_mut())
        {
            let g = g + self.weight_decay * *p;
            *m = self.beta1 * *m + (1.0 - self.beta1) * g;
            *v = self.beta2 * *v + (1.0 - self.beta2) * g * g;

            let m_hat = *m / bias1;
            let v_hat = *v / bias2;
            *p -= self.learning_rate * m_hat / (v_hat.sqrt() + self.epsilon);
        }
    }
}

/// Optimizer selected by configuration.
pub enum Optimizer {
    Sgd(SgdOptimizer),
    Adam(AdamOptimizer),
}

impl Optimizer {
    /// Marks the start of a mini-batch update.
    pub fn begin_step(&mut self) {
        if let Optimizer::Adam(adam) = self {
            adam.begin_step();
        }
    }

    pub fn update<D: Dimension>(
        &mut self,
        param_name: &str,
        param: &mut Array<f32, D>,
        gradient: &Array<f32, D>,
    ) {
        match self {
            Optimizer::Sgd(sgd) => sgd.step(param_name, param, gradient),
            Optimizer::Adam(adam) => adam.step(param_name, param, gradient),
        }
    }

    pub fn learning_rate(&self) -> f32 {
        match self {
            Optimizer::Sgd(sgd) => sgd.learning_rate,
            Optimizer::Adam(adam) => adam.learning_rate,
        }
    }

    pub fn set_learning_rate(&mut self, learning_rate: f32) {
        match self {
            Optimizer::Sgd(sgd) => sgd.learning_rate = learning_rate,
            Optimizer::Adam(adam) => adam.learning_rate = learning_rate,
        }
    }
}

/// Multiplies the learning rate by `gamma` every `step_size` epochs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StepLr {
    pub base_lr: f32,
    pub step_size: usize,
    pub gamma: f32,
}

impl StepLr {
    pub fn new(base_lr: f32, step_size: usize, gamma: f32) -> Self {
        Self {
            base_lr,
            step_size: step_size.max(1),
            gamma,
        }
    }

    /// Learning rate in effect during `epoch` (0-based).
    pub fn learning_rate(&self, epoch: usize) -> f32 {
        self.base_lr * self.gamma.powi((epoch / self.step_size) as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr1, Array1};

    #[test]
    fn test_sgd_plain_step() {
        let mut optimizer = SgdOptimizer::new(0.1, 0.0, 0.0);
        let mut param = arr1(&[1.0f32, -2.0]);
        optimizer.step("w", &mut param, &arr1(&[1.0, 1.0]));
        assert!((param[0] - 0.9).abs() < 1e-6);
        assert!((param[1] + 2.1).abs() < 1e-6);
    }

    #[test]
    fn test_sgd_momentum_accumulates() {
        let mut optimizer = SgdOptimizer::new(0.1, 0.5, 0.0);
        let mut param = arr1(&[0.0f32]);
        let grad = arr1(&[1.0f32]);
        optimizer.step("w", &mut param, &grad);
        optimizer.step("w", &mut param, &grad);
        // v1 = 0.1, v2 = 0.05 + 0.1
        assert!((param[0] + 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_adam_first_step_moves_by_learning_rate() {
        let mut optimizer = AdamOptimizer::new(0.01, 0.0);
        let mut param = arr1(&[0.5f32, 0.5]);
        optimizer.begin_step();
        optimizer.step("w", &mut param, &arr1(&[3.0, -0.2]));
        assert!((param[0] - 0.49).abs() < 1e-5);
        assert!((param[1] - 0.51).abs() < 1e-5);
        assert_eq!(optimizer.steps(), 1);
    }

    #[test]
    fn test_adam_weight_decay_shrinks_parameters() {
        let mut optimizer = AdamOptimizer::new(0.01, 0.1);
        let mut param = Array1::from_elem(3, 2.0f32);
        for _ in 0..10 {
            optimizer.begin_step();
            optimizer.step("w", &mut param, &Array1::zeros(3));
        }
        assert!(param.iter().all(|&p| p < 2.0));
    }

    #[test]
    fn test_step_lr_schedule() {
        let schedule = StepLr::new(1.0, 100, 0.5);
        assert_eq!(schedule.learning_rate(0), 1.0);
        assert_eq!(schedule.learning_rate(99), 1.0);
        assert_eq!(schedule.learning_rate(100), 0.5);
        assert_eq!(schedule.learning_rate(250), 0.25);
    }

    #[test]
    fn test_optimizer_dispatch() {
        let mut optimizer = Optimizer::Adam(AdamOptimizer::new(0.1, 0.0));
        optimizer.set_learning_rate(0.05);
        assert_eq!(optimizer.learning_rate(), 0.05);
    }
}
