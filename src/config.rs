//! Configuration for growth experiments.
//!
//! Stored as JSON; every field has a default so partial files are valid.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GrowthError, Result};
use crate::training::OptimizerKind;

/// Default directory holding one sub-directory per namespace.
pub const DEFAULT_STORE_ROOT: &str = "history";

/// Experiment settings shared by the CLI and library callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrowthConfig {
    /// Root directory of the file weight store
    pub store_root: PathBuf,

    /// Seed for unit sampling and initial weights; `None` uses OS entropy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Update rule used by the trainer
    pub optimizer: OptimizerKind,

    /// Optimizer step size
    pub learning_rate: f64,

    /// Epochs per training round
    pub epochs: usize,

    /// Initial weights are drawn uniformly from `[-init_scale, init_scale]`
    pub init_scale: f64,
}

impl Default for GrowthConfig {
    fn default() -> Self {
        Self {
            store_root: PathBuf::from(DEFAULT_STORE_ROOT),
            seed: None,
            optimizer: OptimizerKind::Adam,
            learning_rate: 0.01,
            epochs: 20,
            init_scale: 0.1,
        }
    }
}

impl GrowthConfig {
    /// Load and validate a JSON config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| GrowthError::io(path, e))?;
        let config: GrowthConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the config as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content).map_err(|e| GrowthError::io(path, e))
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(GrowthError::invalid(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }

        if !(self.init_scale > 0.0 && self.init_scale.is_finite()) {
            return Err(GrowthError::invalid(format!(
                "init_scale must be positive, got {}",
                self.init_scale
            )));
        }

        Ok(())
    }
}
