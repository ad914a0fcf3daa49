//! Graph Info - Architecture Descriptor
//!
//! A `GraphInfo` records how many layers a network has (input and output
//! included) and how many units each layer holds. Every structural edit
//! comes in two flavours: a copy-on-write method returning a new descriptor
//! and an `_in_place` method mutating the receiver.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{GrowthError, Result};
use crate::weights::{Namespace, WeightMatrix};

/// Architecture descriptor of a fully-connected, bias-free network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawGraphInfo")]
pub struct GraphInfo {
    /// Experiment identifier, selects the storage namespace
    id: u64,
    /// Number of layers including input and output
    layers: usize,
    /// Width of each layer
    units: Vec<usize>,
}

/// Unchecked wire form, validated through `GraphInfo::new`.
#[derive(Deserialize)]
struct RawGraphInfo {
    id: u64,
    layers: usize,
    units: Vec<usize>,
}

impl TryFrom<RawGraphInfo> for GraphInfo {
    type Error = GrowthError;

    fn try_from(raw: RawGraphInfo) -> Result<Self> {
        GraphInfo::new(raw.id, raw.layers, raw.units)
    }
}

impl GraphInfo {
    /// Create a new descriptor.
    ///
    /// # Errors
    /// Returns `InvalidArgument` if:
    /// - `layers` is below 2
    /// - `units` does not hold exactly `layers` entries
    /// - any width is zero
    pub fn new(id: u64, layers: usize, units: Vec<usize>) -> Result<Self> {
        if layers < 2 {
            return Err(GrowthError::invalid(format!(
                "a network needs at least an input and an output layer, got {} layers",
                layers
            )));
        }

        if units.len() != layers {
            return Err(GrowthError::invalid(format!(
                "no. of layers inconsistent with units list ({} layers, {} widths); \
                 include input and output layers",
                layers,
                units.len()
            )));
        }

        if let Some(position) = units.iter().position(|&width| width == 0) {
            return Err(GrowthError::invalid(format!(
                "layer {} has zero units",
                position
            )));
        }

        Ok(Self { id, layers, units })
    }

    /// Rebuild the descriptor of a stored weight set from its matrix shapes.
    ///
    /// Fails with `InvalidArgument` when there are no matrices or when the
    /// rows of one matrix differ from the columns of the one before it.
    pub fn from_shapes(id: u64, shapes: &[(usize, usize)]) -> Result<Self> {
        let &(input_width, _) = shapes
            .first()
            .ok_or_else(|| GrowthError::invalid("no weight matrices to derive layers from"))?;

        let mut units = vec![input_width];
        for (index, &(rows, cols)) in shapes.iter().enumerate() {
            if rows != units[index] {
                return Err(GrowthError::invalid(format!(
                    "matrix {} has {} rows but layer {} has {} units",
                    index, rows, index, units[index]
                )));
            }
            units.push(cols);
        }

        Self::new(id, units.len(), units)
    }

    /// Get the experiment identifier
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Get the number of layers, input and output included
    pub fn layers(&self) -> usize {
        self.layers
    }

    /// Get the width of every layer
    pub fn units(&self) -> &[usize] {
        &self.units
    }

    /// Indices of the layers that can be widened (neither input nor output)
    pub fn hidden_layers(&self) -> std::ops::Range<usize> {
        1..self.layers - 1
    }

    /// Storage namespace holding this network's weights
    pub fn namespace(&self) -> Namespace {
        Namespace::new(self.id)
    }

    /// Shape of every weight matrix, `[units[i], units[i + 1]]`
    pub fn expected_shapes(&self) -> Vec<(usize, usize)> {
        self.units.windows(2).map(|pair| (pair[0], pair[1])).collect()
    }

    /// Insert a layer after `after_layer` and return the grown descriptor.
    ///
    /// The new layer copies the width of `units[after_layer]` so it can be
    /// initialised as an identity map. `self` is left untouched.
    pub fn insert_layer(&self, after_layer: usize) -> Result<Self> {
        let mut grown = self.clone();
        grown.insert_layer_in_place(after_layer)?;
        Ok(grown)
    }

    /// Insert a layer after `after_layer`, modifying `self`.
    pub fn insert_layer_in_place(&mut self, after_layer: usize) -> Result<()> {
        if after_layer >= self.layers - 1 {
            return Err(GrowthError::IndexOutOfRange {
                operation: "insert_layer",
                index: after_layer,
                limit: self.layers - 1,
            });
        }

        let width = self.units[after_layer];
        self.units.insert(after_layer + 1, width);
        self.layers += 1;
        Ok(())
    }

    /// Add `amount` units to layer `layer_index` and return the grown descriptor.
    pub fn add_units(&self, layer_index: usize, amount: usize) -> Result<Self> {
        let mut grown = self.clone();
        grown.add_units_in_place(layer_index, amount)?;
        Ok(grown)
    }

    /// Add `amount` units to layer `layer_index`, modifying `self`.
    ///
    /// # Errors
    /// - `InvalidArgument` when `amount` is zero (the network never shrinks)
    /// - `IndexOutOfRange` when `layer_index` is not a layer of this network
    pub fn add_units_in_place(&mut self, layer_index: usize, amount: usize) -> Result<()> {
        if amount == 0 {
            return Err(GrowthError::invalid(
                "cannot shrink the network, enter a positive number of units",
            ));
        }

        if layer_index >= self.layers {
            return Err(GrowthError::IndexOutOfRange {
                operation: "add_units",
                index: layer_index,
                limit: self.layers,
            });
        }

        self.units[layer_index] += amount;
        Ok(())
    }

    /// Check that `weights` is a complete, shape-consistent set for this descriptor.
    pub fn check_weights(&self, weights: &[WeightMatrix]) -> Result<()> {
        let expected = self.expected_shapes();

        if weights.len() != expected.len() {
            return Err(GrowthError::inconsistent(
                self.namespace(),
                format!(
                    "expected {} weight matrices for {} layers, found {}",
                    expected.len(),
                    self.layers,
                    weights.len()
                ),
            ));
        }

        for (index, (matrix, shape)) in weights.iter().zip(&expected).enumerate() {
            if matrix.shape() != *shape {
                return Err(GrowthError::inconsistent(
                    self.namespace(),
                    format!(
                        "matrix {} has shape {:?}, descriptor expects {:?}",
                        index,
                        matrix.shape(),
                        shape
                    ),
                ));
            }
        }

        Ok(())
    }

    /// Human-readable summary for logs
    pub fn describe(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GraphInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ID: {}\tlayers: {}\tunits: {:?}",
            self.id, self.layers, self.units
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn mnist_graph() -> GraphInfo {
        GraphInfo::new(1, 3, vec![784, 30, 10]).unwrap()
    }

    #[test]
    fn test_new_rejects_mismatched_units() {
        let err = GraphInfo::new(1, 3, vec![784, 10]).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
    }

    #[test_case(1, vec![784] ; "single layer")]
    #[test_case(0, vec![] ; "empty")]
    fn test_new_rejects_too_few_layers(layers: usize, units: Vec<usize>) {
        assert!(matches!(
            GraphInfo::new(1, layers, units),
            Err(GrowthError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_new_rejects_zero_width() {
        assert!(matches!(
            GraphInfo::new(1, 3, vec![784, 0, 10]),
            Err(GrowthError::InvalidArgument { .. })
        ));
    }

    #[test_case(0 ; "after input")]
    #[test_case(1 ; "last valid index")]
    fn test_insert_layer_duplicates_width(after: usize) {
        let graph = mnist_graph();
        let grown = graph.insert_layer(after).unwrap();

        assert_eq!(grown.layers(), graph.layers() + 1);
        assert_eq!(grown.units()[after + 1], graph.units()[after]);
        assert_eq!(grown.units().len(), grown.layers());
        // copy mode leaves the original alone
        assert_eq!(graph, mnist_graph());
    }

    #[test]
    fn test_insert_layer_out_of_range() {
        let graph = mnist_graph();
        let err = graph.insert_layer(2).unwrap_err();
        assert!(matches!(
            err,
            GrowthError::IndexOutOfRange {
                index: 2,
                limit: 2,
                ..
            }
        ));
    }

    #[test]
    fn test_insert_layer_in_place() {
        let mut graph = mnist_graph();
        graph.insert_layer_in_place(1).unwrap();
        assert_eq!(graph.units(), &[784, 30, 30, 10]);
        assert_eq!(graph.layers(), 4);
    }

    #[test]
    fn test_add_units_touches_one_layer() {
        let graph = mnist_graph();
        let grown = graph.add_units(1, 5).unwrap();

        assert_eq!(grown.units(), &[784, 35, 10]);
        assert_eq!(grown.layers(), graph.layers());
        assert_eq!(graph.units(), &[784, 30, 10]);
    }

    #[test]
    fn test_add_units_zero_fails_without_change() {
        let mut graph = mnist_graph();
        assert!(matches!(
            graph.add_units(1, 0),
            Err(GrowthError::InvalidArgument { .. })
        ));
        assert!(graph.add_units_in_place(1, 0).is_err());
        assert_eq!(graph, mnist_graph());
    }

    #[test]
    fn test_add_units_bad_index() {
        let graph = mnist_graph();
        assert!(matches!(
            graph.add_units(3, 1),
            Err(GrowthError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_expected_shapes() {
        let graph = GraphInfo::new(7, 4, vec![4, 3, 3, 2]).unwrap();
        assert_eq!(graph.expected_shapes(), vec![(4, 3), (3, 3), (3, 2)]);
        assert_eq!(graph.hidden_layers(), 1..3);
    }

    #[test]
    fn test_from_shapes() {
        let graph = GraphInfo::from_shapes(3, &[(4, 3), (3, 3), (3, 2)]).unwrap();
        assert_eq!(graph, GraphInfo::new(3, 4, vec![4, 3, 3, 2]).unwrap());
        assert_eq!(
            GraphInfo::from_shapes(3, &graph.expected_shapes()).unwrap(),
            graph
        );
    }

    #[test_case(&[] ; "no matrices")]
    #[test_case(&[(4, 3), (2, 2)] ; "broken chain")]
    #[test_case(&[(4, 0)] ; "zero width")]
    fn test_from_shapes_rejects(shapes: &[(usize, usize)]) {
        assert!(matches!(
            GraphInfo::from_shapes(1, shapes),
            Err(GrowthError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_check_weights() {
        let graph = GraphInfo::new(2, 3, vec![4, 3, 2]).unwrap();
        let good = vec![WeightMatrix::zeros(4, 3), WeightMatrix::zeros(3, 2)];
        assert!(graph.check_weights(&good).is_ok());

        let short = vec![WeightMatrix::zeros(4, 3)];
        assert!(matches!(
            graph.check_weights(&short),
            Err(GrowthError::StorageInconsistency { .. })
        ));

        let wrong_shape = vec![WeightMatrix::zeros(4, 3), WeightMatrix::zeros(2, 2)];
        assert!(matches!(
            graph.check_weights(&wrong_shape),
            Err(GrowthError::StorageInconsistency { .. })
        ));
    }

    #[test]
    fn test_describe() {
        assert_eq!(
            mnist_graph().describe(),
            "ID: 1\tlayers: 3\tunits: [784, 30, 10]"
        );
    }

    #[test]
    fn test_deserialize_validates() {
        let ok: GraphInfo =
            serde_json::from_str(r#"{"id": 4, "layers": 3, "units": [4, 3, 2]}"#).unwrap();
        assert_eq!(ok.units(), &[4, 3, 2]);

        let bad = serde_json::from_str::<GraphInfo>(r#"{"id": 4, "layers": 3, "units": [4, 2]}"#);
        assert!(bad.is_err());
    }
}
