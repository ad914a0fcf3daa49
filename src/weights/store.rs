//! Weight Store Contract
//!
//! A weight store keeps one ordered set of weight matrices per namespace.
//! Sets are only ever read and written whole.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{GrowthError, Result};
use crate::weights::WeightMatrix;

/// Storage partition holding one architecture's weights, keyed by its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Namespace(u64);

impl Namespace {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn id(&self) -> u64 {
        self.0
    }

    /// Directory name used by file-backed stores
    pub fn dir_name(&self) -> String {
        format!("model{}", self.0)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "model{}", self.0)
    }
}

/// Keyed store of weight-matrix sets.
pub trait WeightStore {
    /// Load the full ordered set for `namespace`.
    ///
    /// Fails with `NotFound` if nothing is stored there.
    fn load_all(&self, namespace: Namespace) -> Result<Vec<WeightMatrix>>;

    /// Replace the full set for `namespace` in one step.
    ///
    /// A reader must observe either the previous set or `weights`, never a mix.
    fn save_all(&mut self, namespace: Namespace, weights: &[WeightMatrix]) -> Result<()>;

    /// Remove every matrix stored for `namespace`. Absent namespaces are a no-op.
    fn clear(&mut self, namespace: Namespace) -> Result<()>;

    /// Whether a committed set exists for `namespace`
    fn contains(&self, namespace: Namespace) -> Result<bool>;

    /// Take exclusive access to `namespace` until the guard is dropped.
    fn lock(&self, namespace: Namespace) -> Result<NamespaceLock>;
}

/// Contents of a namespace lock file.
#[derive(Debug, Serialize, Deserialize)]
struct LockFileContent {
    pid: u32,
    started_at: String,
}

/// RAII guard for exclusive access to a namespace.
///
/// File-backed locks remove their lock file on drop; in-process stores hand
/// out a guard without a file since `&mut` access already serialises edits.
#[derive(Debug)]
pub struct NamespaceLock {
    namespace: Namespace,
    path: Option<PathBuf>,
}

impl NamespaceLock {
    /// Guard that holds no file
    pub fn in_process(namespace: Namespace) -> Self {
        Self {
            namespace,
            path: None,
        }
    }

    /// Create `path` exclusively, failing with `NamespaceBusy` if it exists.
    pub fn acquire_file(namespace: Namespace, path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| GrowthError::io(parent, e))?;
        }

        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(GrowthError::NamespaceBusy {
                    namespace,
                    path: path.to_path_buf(),
                });
            }
            Err(e) => return Err(GrowthError::io(path, e)),
        };

        let content = LockFileContent {
            pid: std::process::id(),
            started_at: Utc::now().to_rfc3339(),
        };
        let guard = Self {
            namespace,
            path: Some(path.to_path_buf()),
        };
        // guard already owns the file, so a failed write still releases it
        file.write_all(serde_json::to_string(&content)?.as_bytes())
            .map_err(|e| GrowthError::io(path, e))?;

        Ok(guard)
    }

    pub fn namespace(&self) -> Namespace {
        self.namespace
    }

    /// Lock file backing this guard, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

impl Drop for NamespaceLock {
    fn drop(&mut self) {
        if let Some(path) = &self.path {
            if let Err(e) = fs::remove_file(path) {
                warn!("Failed to release lock {}: {}", path.display(), e);
            }
        }
    }
}
