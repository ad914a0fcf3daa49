//! Training Module
//!
//! The training side of the grow-and-train cycle. The growth engine never
//! trains; it only exchanges weight sets with a `TrainingLoop` through the
//! weight store.

mod dataset;
pub mod optimizer;
mod trainer;

pub use dataset::Dataset;
pub use optimizer::{Adam, Optimizer, OptimizerKind, Sgd};
pub use trainer::{initial_weights, EpochStats, Trainer};

use crate::error::Result;
use crate::graph::GraphInfo;
use crate::weights::WeightMatrix;

/// Fits a weight set for a given architecture.
pub trait TrainingLoop {
    /// Train starting from `weights` and return a set of identical shapes.
    ///
    /// When `test` is given it is scored after every epoch but never
    /// trained on.
    fn fit(
        &mut self,
        graph: &GraphInfo,
        weights: Vec<WeightMatrix>,
        train: &Dataset,
        test: Option<&Dataset>,
    ) -> Result<Vec<WeightMatrix>>;
}
