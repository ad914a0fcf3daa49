//! Forward pass of a bias-free dense network.
//!
//! Every hidden layer applies a rectifier; the last matrix produces raw
//! logits, which `softmax` turns into class probabilities.

use crate::error::Result;
use crate::weights::WeightMatrix;

/// Rectified linear unit
#[inline]
pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

/// Activations recorded during one forward pass.
#[derive(Debug, Clone)]
pub struct ForwardTrace {
    /// Input to each weight matrix: `layer_inputs[0]` is the network input,
    /// `layer_inputs[i]` the rectified output of hidden layer `i`.
    pub layer_inputs: Vec<Vec<f64>>,
    /// Pre-activation values of every layer after the input
    pub pre_activations: Vec<Vec<f64>>,
}

impl ForwardTrace {
    /// Output-layer logits
    pub fn logits(&self) -> &[f64] {
        self.pre_activations
            .last()
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Run `input` through the network and keep every intermediate value.
///
/// Fails with `InvalidArgument` when `input` or any matrix does not fit the
/// width of the layer feeding it.
pub fn forward_trace(weights: &[WeightMatrix], input: &[f64]) -> Result<ForwardTrace> {
    let mut layer_inputs = Vec::with_capacity(weights.len());
    let mut pre_activations = Vec::with_capacity(weights.len());
    let mut current = input.to_vec();

    for (index, matrix) in weights.iter().enumerate() {
        let z = matrix.left_multiply(&current)?;
        layer_inputs.push(current);
        current = if index + 1 < weights.len() {
            z.iter().copied().map(relu).collect()
        } else {
            Vec::new()
        };
        pre_activations.push(z);
    }

    Ok(ForwardTrace {
        layer_inputs,
        pre_activations,
    })
}

/// Output logits for `input`
pub fn forward(weights: &[WeightMatrix], input: &[f64]) -> Result<Vec<f64>> {
    Ok(forward_trace(weights, input)?.logits().to_vec())
}

/// Numerically stable softmax
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|&x| (x - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Index of the largest logit
pub fn predict(weights: &[WeightMatrix], input: &[f64]) -> Result<usize> {
    Ok(argmax(&forward(weights, input)?))
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    values
        .iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |best, (i, &v)| {
            if v > best.1 {
                (i, v)
            } else {
                best
            }
        })
        .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_hidden_layer_is_rectified() {
        // second hidden unit goes negative and must be clipped
        let w0 = WeightMatrix::from_rows(vec![vec![1.0, -1.0]]).unwrap();
        let w1 = WeightMatrix::from_rows(vec![vec![2.0], vec![5.0]]).unwrap();

        let trace = forward_trace(&[w0, w1], &[3.0]).unwrap();
        assert_eq!(trace.pre_activations[0], vec![3.0, -3.0]);
        assert_eq!(trace.layer_inputs[1], vec![3.0, 0.0]);
        assert_eq!(trace.logits(), &[6.0]);
    }

    #[test]
    fn test_output_logits_are_not_rectified() {
        let w0 = WeightMatrix::from_rows(vec![vec![-2.0]]).unwrap();
        assert_eq!(forward(&[w0], &[1.0]).unwrap(), vec![-2.0]);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        assert_relative_eq!(probs.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);

        let large = softmax(&[1000.0, 1000.0]);
        assert_relative_eq!(large[0], 0.5);
    }

    #[test]
    fn test_predict() {
        let w0 = WeightMatrix::identity(3);
        assert_eq!(predict(&[w0], &[0.1, 0.7, 0.2]).unwrap(), 1);
    }

    #[test]
    fn test_input_width_mismatch_is_an_error() {
        let w0 = WeightMatrix::identity(3);
        let w1 = WeightMatrix::zeros(3, 2);
        assert!(forward(&[w0.clone(), w1], &[1.0, 2.0]).is_err());
        assert!(predict(&[w0], &[1.0, 2.0, 3.0, 4.0]).is_err());

        // matrices that do not chain are caught at the second layer
        let broken = [WeightMatrix::identity(2), WeightMatrix::zeros(3, 1)];
        assert!(forward_trace(&broken, &[1.0, 1.0]).is_err());
    }
}
