//! File-backed weight store.
//!
//! Layout of one namespace:
//!
//! ```text
//! <root>/model<id>/
//!     CURRENT                 name of the committed generation
//!     PREVIOUS                name of the generation CURRENT replaced
//!     .lock                   present while a transformation runs
//!     gen-<uuid>/
//!         manifest.json       shapes and SHA-256 of every matrix file
//!         w0.csv, w1.csv, ... one comma-separated row per line
//! ```
//!
//! `save_all` writes a complete new generation next to the committed one and
//! then swaps `CURRENT` with a rename. Readers follow `CURRENT`, so an
//! interrupted save leaves the previous generation fully visible. The
//! generation a save replaces is kept until the next save, so a reader that
//! resolved `CURRENT` just before the swap can still finish.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::error::{GrowthError, Result};
use crate::weights::{Namespace, NamespaceLock, WeightMatrix, WeightStore};

/// Pointer file naming the committed generation.
pub const CURRENT_FILE: &str = "CURRENT";
/// Pointer file naming the generation replaced by the last commit.
pub const PREVIOUS_FILE: &str = "PREVIOUS";
/// Generation manifest file name.
pub const MANIFEST_FILE: &str = "manifest.json";
/// Namespace lock file name.
pub const LOCK_FILE: &str = ".lock";
/// Prefix of generation directory names.
const GENERATION_PREFIX: &str = "gen-";

/// One matrix file recorded in a manifest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixEntry {
    /// File name inside the generation directory
    pub file: String,
    pub rows: usize,
    pub cols: usize,
    /// SHA-256 of the file contents
    pub sha256: String,
}

/// Manifest describing one complete generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationManifest {
    pub generation: String,
    pub created_at: DateTime<Utc>,
    pub matrices: Vec<MatrixEntry>,
}

impl GenerationManifest {
    /// `(rows, cols)` of every matrix, in order
    pub fn shapes(&self) -> Vec<(usize, usize)> {
        self.matrices.iter().map(|m| (m.rows, m.cols)).collect()
    }
}

/// Disk usage of one namespace.
#[derive(Debug, Clone)]
pub struct StorageUsage {
    /// Generation directories on disk, committed or not
    pub generation_count: usize,
    /// Total size in bytes
    pub total_size_bytes: u64,
}

/// Weight store rooted at a directory, one sub-directory per namespace.
#[derive(Debug, Clone)]
pub struct FileWeightStore {
    root: PathBuf,
}

/// A fully written generation that is not visible to readers yet.
///
/// Dropping it without `commit` leaves the directory behind for `prune`,
/// which is exactly what an interrupted save looks like on disk.
#[derive(Debug)]
#[must_use = "a staged generation is invisible until committed"]
pub struct StagedGeneration {
    namespace_dir: PathBuf,
    generation: String,
}

impl FileWeightStore {
    /// Create a store rooted at `root`. Nothing is touched on disk until the
    /// first save.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Get the root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding `namespace`
    pub fn namespace_dir(&self, namespace: Namespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    /// Name of the committed generation, if any
    pub fn current_generation(&self, namespace: Namespace) -> Result<Option<String>> {
        read_pointer(&self.namespace_dir(namespace).join(CURRENT_FILE))
    }

    /// Name of the generation the last commit replaced, if any
    pub fn previous_generation(&self, namespace: Namespace) -> Result<Option<String>> {
        read_pointer(&self.namespace_dir(namespace).join(PREVIOUS_FILE))
    }

    /// Write a complete generation for `weights` without committing it.
    pub fn stage(&self, namespace: Namespace, weights: &[WeightMatrix]) -> Result<StagedGeneration> {
        let namespace_dir = self.namespace_dir(namespace);
        let generation = format!("{}{}", GENERATION_PREFIX, Uuid::new_v4());

        write_generation(&namespace_dir.join(&generation), &generation, weights)?;

        debug!(
            "Staged {} with {} matrices for {}",
            generation,
            weights.len(),
            namespace
        );

        Ok(StagedGeneration {
            namespace_dir,
            generation,
        })
    }

    /// Read the manifest of the committed generation.
    pub fn load_manifest(&self, namespace: Namespace) -> Result<GenerationManifest> {
        let generation = self
            .current_generation(namespace)?
            .ok_or(GrowthError::NotFound { namespace })?;
        read_manifest(namespace, &self.namespace_dir(namespace).join(generation))
    }

    /// Load and verify one named generation, committed or not.
    pub fn load_generation(&self, namespace: Namespace, generation: &str) -> Result<Vec<WeightMatrix>> {
        self.read_generation_dir(namespace, &self.namespace_dir(namespace).join(generation))
    }

    /// Remove generation directories referenced by neither `CURRENT` nor
    /// `PREVIOUS`.
    ///
    /// Returns the number of directories removed.
    pub fn prune(&self, namespace: Namespace) -> Result<usize> {
        let namespace_dir = self.namespace_dir(namespace);
        if !namespace_dir.exists() {
            return Ok(0);
        }

        let keep = [
            self.current_generation(namespace)?,
            self.previous_generation(namespace)?,
        ];
        let mut removed = 0;

        for dir in generation_dirs(&namespace_dir)? {
            let name = dir.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            if keep.iter().any(|kept| kept.as_deref() == Some(name)) {
                continue;
            }
            fs::remove_dir_all(&dir).map_err(|e| GrowthError::io(&dir, e))?;
            removed += 1;
        }

        if removed > 0 {
            debug!("Pruned {} stale generations of {}", removed, namespace);
        }
        Ok(removed)
    }

    /// Calculate disk usage for `namespace`.
    pub fn storage_usage(&self, namespace: Namespace) -> Result<StorageUsage> {
        let namespace_dir = self.namespace_dir(namespace);
        if !namespace_dir.exists() {
            return Ok(StorageUsage {
                generation_count: 0,
                total_size_bytes: 0,
            });
        }

        let generation_count = generation_dirs(&namespace_dir)?.len();
        let mut total_size_bytes = 0;
        for entry in WalkDir::new(&namespace_dir) {
            let entry = entry.map_err(|e| walk_error(&namespace_dir, e))?;
            if entry.file_type().is_file() {
                let metadata = entry.metadata().map_err(|e| walk_error(entry.path(), e))?;
                total_size_bytes += metadata.len();
            }
        }

        Ok(StorageUsage {
            generation_count,
            total_size_bytes,
        })
    }

    /// Copy the committed set of `namespace` into `dest`.
    ///
    /// The snapshot is a self-contained directory of matrix files plus a
    /// manifest, outside the namespace, so later edits and `clear` never
    /// touch it. Fails with `InvalidArgument` if `dest` already holds one.
    pub fn snapshot(&self, namespace: Namespace, dest: &Path) -> Result<GenerationManifest> {
        if dest.join(MANIFEST_FILE).exists() {
            return Err(GrowthError::invalid(format!(
                "{} already holds a snapshot",
                dest.display()
            )));
        }

        let weights = self.load_all(namespace)?;
        let label = format!("{}-{}", namespace, Utc::now().format("%Y%m%dT%H%M%S"));
        let manifest = write_generation(dest, &label, &weights)?;

        debug!("Snapshot of {} written to {}", namespace, dest.display());
        Ok(manifest)
    }

    /// Replace the committed set of `namespace` with the snapshot in `src`.
    ///
    /// The snapshot is verified in full before anything is written. Callers
    /// racing other editors should hold the namespace lock.
    pub fn restore(&mut self, namespace: Namespace, src: &Path) -> Result<()> {
        if !src.is_dir() {
            return Err(GrowthError::invalid(format!(
                "no snapshot directory at {}",
                src.display()
            )));
        }

        let weights = self.read_generation_dir(namespace, src)?;
        self.save_all(namespace, &weights)?;

        debug!("Restored {} from {}", namespace, src.display());
        Ok(())
    }

    /// Remove the namespace directory if nothing is left in it.
    ///
    /// Returns whether the directory was removed.
    pub fn remove_empty_namespace(&self, namespace: Namespace) -> Result<bool> {
        let namespace_dir = self.namespace_dir(namespace);
        let mut entries = match fs::read_dir(&namespace_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(GrowthError::io(namespace_dir, e)),
        };

        if entries.next().is_some() {
            return Ok(false);
        }
        fs::remove_dir(&namespace_dir).map_err(|e| GrowthError::io(&namespace_dir, e))?;
        Ok(true)
    }

    fn read_generation_dir(&self, namespace: Namespace, dir: &Path) -> Result<Vec<WeightMatrix>> {
        let manifest = read_manifest(namespace, dir)?;
        manifest
            .matrices
            .iter()
            .map(|entry| self.read_matrix(namespace, dir, entry))
            .collect()
    }

    fn read_matrix(
        &self,
        namespace: Namespace,
        generation_dir: &Path,
        entry: &MatrixEntry,
    ) -> Result<WeightMatrix> {
        let path = generation_dir.join(&entry.file);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(GrowthError::inconsistent(
                    namespace,
                    format!("{} is listed in the manifest but missing", entry.file),
                ));
            }
            Err(e) => return Err(GrowthError::io(path, e)),
        };

        let checksum = format!("{:x}", Sha256::digest(content.as_bytes()));
        if checksum != entry.sha256 {
            return Err(GrowthError::inconsistent(
                namespace,
                format!("checksum mismatch for {}", entry.file),
            ));
        }

        let matrix = decode_csv(&path, &content)?;
        if matrix.shape() != (entry.rows, entry.cols) {
            return Err(GrowthError::inconsistent(
                namespace,
                format!(
                    "{} holds a {:?} matrix, manifest says {:?}",
                    entry.file,
                    matrix.shape(),
                    (entry.rows, entry.cols)
                ),
            ));
        }
        Ok(matrix)
    }
}

impl StagedGeneration {
    /// Name of the staged generation directory
    pub fn generation(&self) -> &str {
        &self.generation
    }

    /// Make this generation the visible one.
    ///
    /// The replaced generation is recorded in `PREVIOUS` first, then the
    /// pointer is written to a temp file and renamed over `CURRENT`, so
    /// readers see either the old or the new generation.
    pub fn commit(self) -> Result<()> {
        let current = read_pointer(&self.namespace_dir.join(CURRENT_FILE))?;
        if let Some(previous) = current.filter(|name| *name != self.generation) {
            swap_pointer(&self.namespace_dir, PREVIOUS_FILE, &previous)?;
        }
        swap_pointer(&self.namespace_dir, CURRENT_FILE, &self.generation)?;
        sync_dir(&self.namespace_dir);

        debug!("Committed {}", self.generation);
        Ok(())
    }
}

impl WeightStore for FileWeightStore {
    fn load_all(&self, namespace: Namespace) -> Result<Vec<WeightMatrix>> {
        let generation = self
            .current_generation(namespace)?
            .ok_or(GrowthError::NotFound { namespace })?;

        let loaded = self.load_generation(namespace, &generation);
        if !matches!(loaded, Err(GrowthError::StorageInconsistency { .. })) {
            return loaded;
        }

        // saves that landed mid-read may have pruned the generation
        match self.current_generation(namespace)? {
            Some(latest) if latest != generation => {
                debug!(
                    "{} moved from {} to {} while loading, reading again",
                    namespace, generation, latest
                );
                self.load_generation(namespace, &latest)
            }
            _ => loaded,
        }
    }

    fn save_all(&mut self, namespace: Namespace, weights: &[WeightMatrix]) -> Result<()> {
        self.stage(namespace, weights)?.commit()?;

        // the new set is already committed; leftovers are only wasted space
        if let Err(e) = self.prune(namespace) {
            warn!("Could not prune old generations of {}: {}", namespace, e);
        }
        Ok(())
    }

    fn clear(&mut self, namespace: Namespace) -> Result<()> {
        let namespace_dir = self.namespace_dir(namespace);

        for pointer in [CURRENT_FILE, PREVIOUS_FILE] {
            remove_if_exists(&namespace_dir.join(pointer))?;
            remove_if_exists(&namespace_dir.join(format!("{}.tmp", pointer)))?;
        }

        // with both pointers gone every generation is stale
        self.prune(namespace)?;

        if namespace_dir.exists() && !namespace_dir.join(LOCK_FILE).exists() {
            fs::remove_dir_all(&namespace_dir).map_err(|e| GrowthError::io(&namespace_dir, e))?;
        }
        Ok(())
    }

    fn contains(&self, namespace: Namespace) -> Result<bool> {
        Ok(self.current_generation(namespace)?.is_some())
    }

    fn lock(&self, namespace: Namespace) -> Result<NamespaceLock> {
        NamespaceLock::acquire_file(namespace, &self.namespace_dir(namespace).join(LOCK_FILE))
    }
}

/// Write `weights` and their manifest into `dir`, manifest last.
///
/// A directory without a manifest is torn and is never loaded.
fn write_generation(
    dir: &Path,
    generation: &str,
    weights: &[WeightMatrix],
) -> Result<GenerationManifest> {
    fs::create_dir_all(dir).map_err(|e| GrowthError::io(dir, e))?;

    let mut matrices = Vec::with_capacity(weights.len());
    for (index, matrix) in weights.iter().enumerate() {
        let file = format!("w{}.csv", index);
        let content = encode_csv(matrix);
        write_synced(&dir.join(&file), content.as_bytes())?;

        matrices.push(MatrixEntry {
            file,
            rows: matrix.rows(),
            cols: matrix.cols(),
            sha256: format!("{:x}", Sha256::digest(content.as_bytes())),
        });
    }

    let manifest = GenerationManifest {
        generation: generation.to_string(),
        created_at: Utc::now(),
        matrices,
    };
    let manifest_json = serde_json::to_string_pretty(&manifest)?;
    write_synced(&dir.join(MANIFEST_FILE), manifest_json.as_bytes())?;
    Ok(manifest)
}

fn read_manifest(namespace: Namespace, dir: &Path) -> Result<GenerationManifest> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let content = match fs::read_to_string(&manifest_path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(GrowthError::inconsistent(
                namespace,
                format!("{} has no manifest", dir.display()),
            ));
        }
        Err(e) => return Err(GrowthError::io(manifest_path, e)),
    };

    Ok(serde_json::from_str(&content)?)
}

fn read_pointer(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content.trim().to_string())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(GrowthError::io(path, e)),
    }
}

/// Point `name` at `generation` via temp file and rename.
fn swap_pointer(namespace_dir: &Path, name: &str, generation: &str) -> Result<()> {
    let pointer = namespace_dir.join(name);
    let temp_pointer = namespace_dir.join(format!("{}.tmp", name));

    write_synced(&temp_pointer, generation.as_bytes())?;
    fs::rename(&temp_pointer, &pointer).map_err(|e| GrowthError::io(&pointer, e))
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(GrowthError::io(path, e)),
    }
}

/// Generation directories directly below `namespace_dir`
fn generation_dirs(namespace_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(namespace_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| walk_error(namespace_dir, e))?;
        let is_generation = entry
            .file_name()
            .to_str()
            .is_some_and(|name| name.starts_with(GENERATION_PREFIX));
        if entry.file_type().is_dir() && is_generation {
            dirs.push(entry.into_path());
        }
    }
    Ok(dirs)
}

fn walk_error(path: &Path, e: walkdir::Error) -> GrowthError {
    let source = e
        .into_io_error()
        .unwrap_or_else(|| std::io::Error::new(std::io::ErrorKind::Other, "filesystem loop"));
    GrowthError::io(path, source)
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path).map_err(|e| GrowthError::io(path, e))?;
    file.write_all(bytes).map_err(|e| GrowthError::io(path, e))?;
    file.sync_all().map_err(|e| GrowthError::io(path, e))?;
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Err(e) = fs::File::open(dir).and_then(|d| d.sync_all()) {
        warn!("Could not sync directory {}: {}", dir.display(), e);
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

/// One row per line, values separated by commas.
///
/// `Display` for `f64` prints the shortest text that parses back to the
/// same value, so files round-trip exactly.
fn encode_csv(matrix: &WeightMatrix) -> String {
    let mut out = String::new();
    for row in matrix.iter_rows() {
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            out.push_str(&value.to_string());
        }
        out.push('\n');
    }
    out
}

fn decode_csv(path: &Path, content: &str) -> Result<WeightMatrix> {
    let mut rows = Vec::new();
    for (line_no, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let row = line
            .split(',')
            .map(|field| field.trim().parse::<f64>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| GrowthError::MalformedMatrix {
                path: path.to_path_buf(),
                reason: format!("line {}: {}", line_no + 1, e),
            })?;
        rows.push(row);
    }

    WeightMatrix::from_rows(rows).map_err(|e| GrowthError::MalformedMatrix {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
