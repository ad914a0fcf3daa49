//! Netgrow - Function-Preserving Network Growth
//!
//! Grows a trained dense feed-forward network without changing what it
//! computes, using the Net2Net transformations:
//! 1. Widen - add units to a hidden layer by duplicating existing ones
//! 2. Deepen - insert a hidden layer initialised as the identity map
//!
//! # Architecture
//!
//! - `graph`: the architecture descriptor (`GraphInfo`)
//! - `weights`: weight matrices and the stores that persist them
//! - `growth`: the transformation engine and a rectifier forward pass
//! - `training`: the training loop that consumes grown weight sets

pub mod cli;
pub mod config;
pub mod error;
pub mod graph;
pub mod growth;
pub mod training;
pub mod weights;

pub use config::GrowthConfig;
pub use error::{GrowthError, Result};
pub use graph::GraphInfo;
pub use growth::Net2Net;
pub use weights::{FileWeightStore, MemoryWeightStore, Namespace, WeightMatrix, WeightStore};
