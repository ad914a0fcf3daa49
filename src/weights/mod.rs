//! Weight Storage Module
//!
//! Weight matrices and the stores that persist them:
//! - `WeightMatrix`: dense layer-to-layer weights
//! - `WeightStore`: whole-set load/save contract, keyed by namespace
//! - `MemoryWeightStore` and `FileWeightStore` implementations

pub mod file_store;
pub mod matrix;
pub mod memory;
pub mod store;

pub use file_store::{FileWeightStore, GenerationManifest, StagedGeneration, StorageUsage};
pub use matrix::WeightMatrix;
pub use memory::MemoryWeightStore;
pub use store::{Namespace, NamespaceLock, WeightStore};
