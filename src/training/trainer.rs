//! Full-batch training on softmax cross-entropy.

use log::info;
use rand::Rng;

use crate::config::GrowthConfig;
use crate::error::{GrowthError, Result};
use crate::graph::GraphInfo;
use crate::growth::forward::{argmax, forward_trace, softmax};
use crate::training::optimizer::{Optimizer, OptimizerKind};
use crate::training::{Dataset, TrainingLoop};
use crate::weights::WeightMatrix;

/// Loss and accuracy after one epoch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    pub epoch: usize,
    /// Mean cross-entropy over the training set
    pub loss: f64,
    /// Fraction of training examples whose arg-max matches the target
    pub accuracy: f64,
    /// Mean cross-entropy over the held-out set, when one was given
    pub test_loss: Option<f64>,
    pub test_accuracy: Option<f64>,
}

/// Random starting weights for a fresh network, uniform in `[-scale, scale]`.
pub fn initial_weights<R: Rng>(graph: &GraphInfo, scale: f64, rng: &mut R) -> Vec<WeightMatrix> {
    graph
        .expected_shapes()
        .into_iter()
        .map(|(rows, cols)| {
            let mut matrix = WeightMatrix::zeros(rows, cols);
            for w in matrix.as_mut_slice() {
                *w = (rng.random::<f64>() * 2.0 - 1.0) * scale;
            }
            matrix
        })
        .collect()
}

/// Reference `TrainingLoop`: rectifier hidden layers, softmax output.
#[derive(Debug)]
pub struct Trainer {
    optimizer: Box<dyn Optimizer + Send>,
    epochs: usize,
    history: Vec<EpochStats>,
}

impl Trainer {
    pub fn new(kind: OptimizerKind, learning_rate: f64, epochs: usize) -> Result<Self> {
        if !(learning_rate > 0.0 && learning_rate.is_finite()) {
            return Err(GrowthError::invalid(format!(
                "learning rate must be positive, got {}",
                learning_rate
            )));
        }
        Ok(Self::with_optimizer(kind.build(learning_rate), epochs))
    }

    /// Trainer driven by a caller-built optimizer
    pub fn with_optimizer(optimizer: Box<dyn Optimizer + Send>, epochs: usize) -> Self {
        Self {
            optimizer,
            epochs,
            history: Vec::new(),
        }
    }

    /// Trainer using the optimizer, rate and epoch count of `config`
    pub fn from_config(config: &GrowthConfig) -> Result<Self> {
        config.validate()?;
        Self::new(config.optimizer, config.learning_rate, config.epochs)
    }

    pub fn optimizer(&self) -> &dyn Optimizer {
        self.optimizer.as_ref()
    }

    /// Stats of every epoch run by this trainer, across `fit` calls
    pub fn history(&self) -> &[EpochStats] {
        &self.history
    }

    /// Loss and accuracy of `weights` on `data` without updating anything.
    pub fn evaluate(weights: &[WeightMatrix], data: &Dataset) -> Result<(f64, f64)> {
        let mut loss = 0.0;
        let mut correct = 0;

        for (x, y) in data.iter() {
            let trace = forward_trace(weights, x)?;
            let probs = softmax(trace.logits());
            loss += cross_entropy(&probs, y);
            if argmax(&probs) == argmax(y) {
                correct += 1;
            }
        }

        let n = data.len().max(1) as f64;
        Ok((loss / n, correct as f64 / n))
    }

    /// Mean gradient of the loss over `data` for every matrix.
    fn gradients(weights: &[WeightMatrix], data: &Dataset) -> Result<Vec<WeightMatrix>> {
        let mut grads: Vec<WeightMatrix> = weights
            .iter()
            .map(|w| WeightMatrix::zeros(w.rows(), w.cols()))
            .collect();

        for (x, y) in data.iter() {
            let trace = forward_trace(weights, x)?;
            let probs = softmax(trace.logits());
            let mut delta: Vec<f64> = probs.iter().zip(y).map(|(p, t)| p - t).collect();

            for layer in (0..weights.len()).rev() {
                let input = &trace.layer_inputs[layer];
                let grad = grads[layer].as_mut_slice();
                let cols = delta.len();
                for (r, &a) in input.iter().enumerate() {
                    if a == 0.0 {
                        continue;
                    }
                    for (c, &d) in delta.iter().enumerate() {
                        grad[r * cols + c] += a * d;
                    }
                }

                if layer == 0 {
                    break;
                }

                // back through W^T, then the rectifier of the layer below
                let below = &trace.pre_activations[layer - 1];
                delta = (0..weights[layer].rows())
                    .map(|r| {
                        if below[r] <= 0.0 {
                            return 0.0;
                        }
                        weights[layer]
                            .row(r)
                            .iter()
                            .zip(&delta)
                            .map(|(w, d)| w * d)
                            .sum()
                    })
                    .collect();
            }
        }

        let scale = 1.0 / data.len() as f64;
        for grad in &mut grads {
            for value in grad.as_mut_slice() {
                *value *= scale;
            }
        }
        Ok(grads)
    }
}

impl TrainingLoop for Trainer {
    fn fit(
        &mut self,
        graph: &GraphInfo,
        mut weights: Vec<WeightMatrix>,
        train: &Dataset,
        test: Option<&Dataset>,
    ) -> Result<Vec<WeightMatrix>> {
        graph.check_weights(&weights)?;
        train.check_against(graph)?;
        if let Some(test) = test {
            test.check_against(graph)?;
        }

        for epoch in 0..self.epochs {
            let grads = Self::gradients(&weights, train)?;
            self.optimizer.step(&mut weights, &grads);

            let (loss, accuracy) = Self::evaluate(&weights, train)?;
            let held_out = test.map(|t| Self::evaluate(&weights, t)).transpose()?;

            match held_out {
                Some((_, test_accuracy)) => info!(
                    "Epoch: {}\tcost: {:.6}\ttrain_acc: {:.3}\ttest_acc: {:.3}\t{}",
                    epoch,
                    loss,
                    accuracy,
                    test_accuracy,
                    graph.describe()
                ),
                None => info!(
                    "Epoch: {}\tcost: {:.6}\ttrain_acc: {:.3}\t{}",
                    epoch,
                    loss,
                    accuracy,
                    graph.describe()
                ),
            }

            self.history.push(EpochStats {
                epoch,
                loss,
                accuracy,
                test_loss: held_out.map(|(l, _)| l),
                test_accuracy: held_out.map(|(_, a)| a),
            });
        }

        Ok(weights)
    }
}

fn cross_entropy(probs: &[f64], target: &[f64]) -> f64 {
    probs
        .iter()
        .zip(target)
        .filter(|&(_, &t)| t > 0.0)
        .map(|(&p, &t)| -t * p.max(1e-12).ln())
        .sum()
}
