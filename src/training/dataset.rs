//! In-memory labelled examples.

use crate::error::{GrowthError, Result};
use crate::graph::GraphInfo;

/// Inputs paired with one-hot targets.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    inputs: Vec<Vec<f64>>,
    targets: Vec<Vec<f64>>,
}

impl Dataset {
    /// Create a dataset; every input and every target must share a length.
    pub fn new(inputs: Vec<Vec<f64>>, targets: Vec<Vec<f64>>) -> Result<Self> {
        if inputs.len() != targets.len() {
            return Err(GrowthError::invalid(format!(
                "{} inputs but {} targets",
                inputs.len(),
                targets.len()
            )));
        }

        for (name, rows) in [("input", &inputs), ("target", &targets)] {
            if let Some(first) = rows.first() {
                if rows.iter().any(|row| row.len() != first.len()) {
                    return Err(GrowthError::invalid(format!(
                        "{} rows have differing lengths",
                        name
                    )));
                }
            }
        }

        Ok(Self { inputs, targets })
    }

    /// Build one-hot targets from class labels.
    pub fn from_labels(inputs: Vec<Vec<f64>>, labels: &[usize], classes: usize) -> Result<Self> {
        if let Some(&bad) = labels.iter().find(|&&label| label >= classes) {
            return Err(GrowthError::invalid(format!(
                "label {} is not below {} classes",
                bad, classes
            )));
        }

        let targets = labels
            .iter()
            .map(|&label| {
                let mut row = vec![0.0; classes];
                row[label] = 1.0;
                row
            })
            .collect();
        Self::new(inputs, targets)
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }

    pub fn inputs(&self) -> &[Vec<f64>] {
        &self.inputs
    }

    pub fn targets(&self) -> &[Vec<f64>] {
        &self.targets
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[f64], &[f64])> {
        self.inputs
            .iter()
            .zip(&self.targets)
            .map(|(x, y)| (x.as_slice(), y.as_slice()))
    }

    /// Check input and target widths against the first and last layer.
    pub fn check_against(&self, graph: &GraphInfo) -> Result<()> {
        if self.is_empty() {
            return Err(GrowthError::invalid("dataset is empty"));
        }

        let units = graph.units();
        let (input_width, output_width) = (units[0], units[units.len() - 1]);

        if self.inputs[0].len() != input_width || self.targets[0].len() != output_width {
            return Err(GrowthError::invalid(format!(
                "dataset is {}->{} but network is {}->{}",
                self.inputs[0].len(),
                self.targets[0].len(),
                input_width,
                output_width
            )));
        }
        Ok(())
    }
}
