//! Optimizers
//!
//! Update rules applied to a weight set once per training step, given the
//! accumulated gradient of every matrix.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::weights::WeightMatrix;

/// Update rule for a whole weight set.
pub trait Optimizer: fmt::Debug {
    /// Apply one update; `grads[i]` has the shape of `weights[i]`.
    fn step(&mut self, weights: &mut [WeightMatrix], grads: &[WeightMatrix]);

    /// Set the learning rate
    fn set_learning_rate(&mut self, learning_rate: f64);

    /// Get the current learning rate
    fn learning_rate(&self) -> f64;
}

/// Optimizer selection for configs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizerKind {
    Sgd,
    #[default]
    Adam,
}

impl OptimizerKind {
    /// Build a fresh optimizer of this kind
    pub fn build(self, learning_rate: f64) -> Box<dyn Optimizer + Send> {
        match self {
            OptimizerKind::Sgd => Box::new(Sgd::new(learning_rate)),
            OptimizerKind::Adam => Box::new(Adam::new(learning_rate)),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptimizerKind::Sgd => write!(f, "sgd"),
            OptimizerKind::Adam => write!(f, "adam"),
        }
    }
}

/// Plain gradient descent
#[derive(Debug, Clone)]
pub struct Sgd {
    pub learning_rate: f64,
}

impl Sgd {
    pub fn new(learning_rate: f64) -> Self {
        Self { learning_rate }
    }
}

impl Optimizer for Sgd {
    fn step(&mut self, weights: &mut [WeightMatrix], grads: &[WeightMatrix]) {
        for (w, g) in weights.iter_mut().zip(grads) {
            for (value, grad) in w.as_mut_slice().iter_mut().zip(g.as_slice()) {
                *value -= self.learning_rate * grad;
            }
        }
    }

    fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}

/// Adam with bias-corrected step size.
///
/// Moment buffers are allocated on the first step and reset whenever the
/// weight shapes change, so one optimizer can keep training a network
/// after it has been grown.
#[derive(Debug, Clone)]
pub struct Adam {
    pub learning_rate: f64,
    /// Decay of the first moment
    pub beta1: f64,
    /// Decay of the second moment
    pub beta2: f64,
    pub epsilon: f64,

    t: usize,
    shapes: Vec<(usize, usize)>,
    m: Vec<Vec<f64>>,
    v: Vec<Vec<f64>>,
}

impl Adam {
    pub fn new(learning_rate: f64) -> Self {
        Self {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            t: 0,
            shapes: Vec::new(),
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    pub fn with_beta1(mut self, beta1: f64) -> Self {
        self.beta1 = beta1;
        self
    }

    pub fn with_beta2(mut self, beta2: f64) -> Self {
        self.beta2 = beta2;
        self
    }

    /// Steps taken since the moments were last reset
    pub fn steps(&self) -> usize {
        self.t
    }

    fn reset_if_reshaped(&mut self, weights: &[WeightMatrix]) {
        let shapes: Vec<(usize, usize)> = weights.iter().map(WeightMatrix::shape).collect();
        if shapes == self.shapes {
            return;
        }

        self.m = weights.iter().map(|w| vec![0.0; w.as_slice().len()]).collect();
        self.v = self.m.clone();
        self.shapes = shapes;
        self.t = 0;
    }
}

impl Optimizer for Adam {
    fn step(&mut self, weights: &mut [WeightMatrix], grads: &[WeightMatrix]) {
        self.reset_if_reshaped(weights);
        self.t += 1;

        let t = self.t as i32;
        let lr_t = self.learning_rate * (1.0 - self.beta2.powi(t)).sqrt()
            / (1.0 - self.beta1.powi(t));

        for (((w, g), m), v) in weights
            .iter_mut()
            .zip(grads)
            .zip(&mut self.m)
            .zip(&mut self.v)
        {
            let params = w.as_mut_slice().iter_mut();
            for (((param, &grad), m), v) in params.zip(g.as_slice()).zip(m).zip(v) {
                *m = self.beta1 * *m + (1.0 - self.beta1) * grad;
                *v = self.beta2 * *v + (1.0 - self.beta2) * grad * grad;
                *param -= lr_t * *m / (v.sqrt() + self.epsilon);
            }
        }
    }

    fn set_learning_rate(&mut self, learning_rate: f64) {
        self.learning_rate = learning_rate;
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
