//! CLI Command Implementations
//!
//! Each command works on one namespace of a `FileWeightStore`. The
//! descriptor of a network is derived from the shapes in its committed
//! manifest, so it always moves together with the weights.

use std::path::{Path, PathBuf};

use chrono::Utc;
use log::info;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::GrowthConfig;
use crate::error::{GrowthError, Result};
use crate::graph::GraphInfo;
use crate::growth::Net2Net;
use crate::training::initial_weights;
use crate::weights::{FileWeightStore, Namespace, WeightStore};

/// Directory under the store root receiving default snapshots.
pub const SNAPSHOT_DIR: &str = "snapshots";

fn open_store(config: &GrowthConfig) -> FileWeightStore {
    FileWeightStore::new(&config.store_root)
}

/// Descriptor of the weights committed for network `id`.
pub fn load_graph(store: &FileWeightStore, id: u64) -> Result<GraphInfo> {
    let namespace = Namespace::new(id);
    let manifest = store.load_manifest(namespace)?;

    GraphInfo::from_shapes(id, &manifest.shapes()).map_err(|e| {
        GrowthError::inconsistent(
            namespace,
            format!("{} does not describe a network: {}", manifest.generation, e),
        )
    })
}

fn engine(config: &GrowthConfig) -> Net2Net {
    match config.seed {
        Some(seed) => Net2Net::with_seed(seed),
        None => Net2Net::new(),
    }
}

/// Create a network with random initial weights.
pub fn init(config: &GrowthConfig, id: u64, units: Vec<usize>) -> Result<GraphInfo> {
    let graph = GraphInfo::new(id, units.len(), units)?;
    let mut store = open_store(config);
    info!("Initialising {}", graph.describe());

    let mut rng = match config.seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_os_rng(),
    };
    let weights = initial_weights(&graph, config.init_scale, &mut rng);

    let _lock = store.lock(graph.namespace())?;
    store.save_all(graph.namespace(), &weights)?;

    println!("Created {}", graph.describe());
    Ok(graph)
}

/// Add units to a hidden layer.
pub fn widen(config: &GrowthConfig, id: u64, layer: usize, units: usize) -> Result<GraphInfo> {
    let mut store = open_store(config);
    let graph = load_graph(&store, id)?;

    let grown = engine(config).widen(&mut store, &graph, layer, units)?;

    println!("Widened: {}", grown.describe());
    Ok(grown)
}

/// Insert an identity layer after `layer`.
pub fn deepen(config: &GrowthConfig, id: u64, layer: usize) -> Result<GraphInfo> {
    let mut store = open_store(config);
    let graph = load_graph(&store, id)?;

    let grown = engine(config).deepen(&mut store, &graph, layer)?;

    println!("Deepened: {}", grown.describe());
    Ok(grown)
}

/// Print the descriptor and the stored weight shapes.
pub fn show(config: &GrowthConfig, id: u64) -> Result<()> {
    let store = open_store(config);
    let graph = load_graph(&store, id)?;
    let manifest = store.load_manifest(graph.namespace())?;

    println!("{}", graph.describe());
    println!("Generation: {} ({})", manifest.generation, manifest.created_at);
    for entry in &manifest.matrices {
        println!("  {}: {}x{}", entry.file, entry.rows, entry.cols);
    }

    let usage = store.storage_usage(graph.namespace())?;
    println!(
        "Storage: {} generation(s), {} bytes",
        usage.generation_count, usage.total_size_bytes
    );
    Ok(())
}

/// Copy the committed weights of network `id` out of the namespace.
///
/// Without `out` the snapshot goes to `<store_root>/snapshots/model<id>-<time>`.
pub fn snapshot(config: &GrowthConfig, id: u64, out: Option<PathBuf>) -> Result<PathBuf> {
    let store = open_store(config);
    let namespace = Namespace::new(id);
    let dest = out.unwrap_or_else(|| default_snapshot_dir(store.root(), namespace));

    let manifest = store.snapshot(namespace, &dest)?;
    println!(
        "Snapshot of {} ({} matrices) written to {}",
        namespace,
        manifest.matrices.len(),
        dest.display()
    );
    Ok(dest)
}

/// Replace the weights of network `id` with a snapshot.
pub fn restore(config: &GrowthConfig, id: u64, from: &Path) -> Result<GraphInfo> {
    let mut store = open_store(config);
    let namespace = Namespace::new(id);

    {
        let _lock = store.lock(namespace)?;
        store.restore(namespace, from)?;
    }

    let graph = load_graph(&store, id)?;
    println!("Restored {} from {}", graph.describe(), from.display());
    Ok(graph)
}

/// Delete every stored weight of network `id`.
pub fn clear(config: &GrowthConfig, id: u64) -> Result<()> {
    let mut store = open_store(config);
    let namespace = Namespace::new(id);

    {
        let _lock = store.lock(namespace)?;
        store.clear(namespace)?;
    }
    store.remove_empty_namespace(namespace)?;

    println!("Cleared {}", namespace);
    Ok(())
}

/// Remove generations left behind by interrupted saves.
pub fn prune(config: &GrowthConfig, id: u64) -> Result<usize> {
    let store = open_store(config);
    let namespace = Namespace::new(id);

    let _lock = store.lock(namespace)?;
    let removed = store.prune(namespace)?;
    println!("Removed {} stale generation(s) of {}", removed, namespace);
    Ok(removed)
}

fn default_snapshot_dir(root: &Path, namespace: Namespace) -> PathBuf {
    root.join(SNAPSHOT_DIR).join(format!(
        "{}-{}",
        namespace,
        Utc::now().format("%Y%m%dT%H%M%S%3f")
    ))
}
