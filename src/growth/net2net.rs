//! Net2Net function-preserving transformations.
//!
//! - `widen`: add units to a hidden layer by duplicating randomly chosen
//!   units and splitting their outgoing weights between the copies.
//! - `deepen`: insert a layer initialised as the identity map.
//!
//! Both read the whole weight set from a `WeightStore`, build the new set in
//! memory and write it back in one `save_all`. Any failure before the save
//! leaves the stored weights untouched.

use log::{debug, info, warn};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::error::{GrowthError, Result};
use crate::graph::GraphInfo;
use crate::weights::{WeightMatrix, WeightStore};

/// Transformation engine.
///
/// Holds only the random source used to pick which units to duplicate.
#[derive(Debug, Clone)]
pub struct Net2Net<R = Xoshiro256PlusPlus> {
    rng: R,
}

impl Net2Net<Xoshiro256PlusPlus> {
    /// Engine seeded from OS entropy
    pub fn new() -> Self {
        Self {
            rng: Xoshiro256PlusPlus::from_os_rng(),
        }
    }

    /// Engine with a reproducible sampling sequence
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        }
    }
}

impl Default for Net2Net<Xoshiro256PlusPlus> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> Net2Net<R> {
    /// Engine drawing from a caller-supplied generator
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    /// Draw `count` unit indices uniformly from `0..width`, with replacement.
    pub fn sample_columns(&mut self, width: usize, count: usize) -> Vec<usize> {
        (0..count).map(|_| self.rng.random_range(0..width)).collect()
    }

    /// Add `units_to_add` units to hidden layer `layer_index`.
    ///
    /// Returns the grown descriptor; the stored weights are replaced by the
    /// widened set and the previous set is gone.
    ///
    /// # Errors
    /// - `InvalidArgument` if `units_to_add` is zero
    /// - `IndexOutOfRange` if `layer_index` is the input or output layer
    /// - `NotFound`, `StorageInconsistency`, `StorageUnavailable` from the store
    pub fn widen<S>(
        &mut self,
        store: &mut S,
        graph: &GraphInfo,
        layer_index: usize,
        units_to_add: usize,
    ) -> Result<GraphInfo>
    where
        S: WeightStore + ?Sized,
    {
        widen_locked(store, graph, layer_index, units_to_add, |width| {
            let columns = self.sample_columns(width, units_to_add);
            debug!(
                "Sampled columns {:?} of layer {} in {}",
                columns,
                layer_index,
                graph.namespace()
            );
            columns
        })
    }

    /// Insert a layer after `layer_index`. See [`deepen`].
    pub fn deepen<S>(&self, store: &mut S, graph: &GraphInfo, layer_index: usize) -> Result<GraphInfo>
    where
        S: WeightStore + ?Sized,
    {
        deepen(store, graph, layer_index)
    }
}

fn check_widen_args(graph: &GraphInfo, layer_index: usize, units_to_add: usize) -> Result<()> {
    if units_to_add == 0 {
        return Err(GrowthError::invalid(
            "cannot shrink, enter a positive number for units",
        ));
    }

    if !graph.hidden_layers().contains(&layer_index) {
        return Err(GrowthError::IndexOutOfRange {
            operation: "widen",
            index: layer_index,
            limit: graph.layers() - 1,
        });
    }

    Ok(())
}

/// Widen hidden layer `layer_index` by duplicating exactly `columns`.
///
/// `columns` lists, in order, the existing units each new unit copies.
/// Repeats are allowed.
pub fn widen_with_columns<S>(
    store: &mut S,
    graph: &GraphInfo,
    layer_index: usize,
    columns: &[usize],
) -> Result<GraphInfo>
where
    S: WeightStore + ?Sized,
{
    widen_locked(store, graph, layer_index, columns.len(), |_| columns.to_vec())
}

/// Lock, load and verify, then widen with the columns `pick` returns for the
/// current width of the layer.
///
/// `pick` runs only after the stored set has been loaded and checked, so a
/// busy or inconsistent namespace never advances a caller's generator.
fn widen_locked<S, F>(
    store: &mut S,
    graph: &GraphInfo,
    layer_index: usize,
    units_to_add: usize,
    pick: F,
) -> Result<GraphInfo>
where
    S: WeightStore + ?Sized,
    F: FnOnce(usize) -> Vec<usize>,
{
    check_widen_args(graph, layer_index, units_to_add)?;
    let grown = graph.add_units(layer_index, units_to_add)?;

    let namespace = graph.namespace();
    let _lock = store.lock(namespace)?;

    let weights = store.load_all(namespace)?;
    graph.check_weights(&weights)?;

    let columns = pick(graph.units()[layer_index]);
    let widened = widen_weights(&weights, layer_index, &columns)?;
    grown.check_weights(&widened)?;
    store.save_all(namespace, &widened)?;

    info!(
        "Widened layer {} by {} units: {}",
        layer_index,
        units_to_add,
        grown.describe()
    );
    Ok(grown)
}

/// Pure widening transform on a weight set.
///
/// Matrix `layer_index - 1` gains the listed columns at its right edge.
/// In matrix `layer_index` every row copied `k` times is divided by `k + 1`,
/// then one copy of the divided row is appended per entry of `columns`.
/// All other matrices are returned unchanged.
pub fn widen_weights(
    weights: &[WeightMatrix],
    layer_index: usize,
    columns: &[usize],
) -> Result<Vec<WeightMatrix>> {
    if columns.is_empty() {
        return Err(GrowthError::invalid("no units to add"));
    }

    if layer_index == 0 || layer_index >= weights.len() {
        return Err(GrowthError::IndexOutOfRange {
            operation: "widen",
            index: layer_index,
            limit: weights.len(),
        });
    }

    let incoming = &weights[layer_index - 1];
    let outgoing = &weights[layer_index];
    let width = incoming.cols();

    if outgoing.rows() != width {
        return Err(GrowthError::invalid(format!(
            "layer {} is {} wide going in but {} wide going out",
            layer_index,
            width,
            outgoing.rows()
        )));
    }

    let mut copies = vec![0usize; width];
    for &column in columns {
        if column >= width {
            return Err(GrowthError::IndexOutOfRange {
                operation: "widen",
                index: column,
                limit: width,
            });
        }
        copies[column] += 1;
    }

    let new_incoming = incoming.with_appended_columns(columns);

    let mut new_outgoing = outgoing.clone();
    for (row, &count) in copies.iter().enumerate() {
        if count > 0 {
            new_outgoing.scale_row(row, (count + 1) as f64);
        }
    }
    for &column in columns {
        new_outgoing.push_row_copy(column);
    }

    let mut widened = weights.to_vec();
    widened[layer_index - 1] = new_incoming;
    widened[layer_index] = new_outgoing;
    Ok(widened)
}

/// Insert a new layer after `layer_index`, initialised as the identity map.
///
/// The new layer has the width of layer `layer_index`. Preservation is exact
/// only if activations entering it are non-negative, which holds downstream
/// of any rectified hidden layer (`layer_index >= 1`). At `layer_index == 0`
/// the raw input passes through a rectifier it never saw before; that is the
/// caller's responsibility and is only warned about.
///
/// # Errors
/// - `IndexOutOfRange` if `layer_index >= layers - 1`
/// - `NotFound`, `StorageInconsistency`, `StorageUnavailable` from the store
pub fn deepen<S>(store: &mut S, graph: &GraphInfo, layer_index: usize) -> Result<GraphInfo>
where
    S: WeightStore + ?Sized,
{
    let grown = graph.insert_layer(layer_index)?;

    if layer_index == 0 {
        warn!(
            "Deepening {} directly after the input layer; outputs change unless inputs are non-negative",
            graph.namespace()
        );
    }

    let namespace = graph.namespace();
    let _lock = store.lock(namespace)?;

    let weights = store.load_all(namespace)?;
    graph.check_weights(&weights)?;

    let deepened = deepen_weights(&weights, layer_index)?;
    grown.check_weights(&deepened)?;
    store.save_all(namespace, &deepened)?;

    info!(
        "Inserted identity layer after layer {}: {}",
        layer_index,
        grown.describe()
    );
    Ok(grown)
}

/// Pure deepening transform: insert `I(rows of matrix layer_index)` at
/// position `layer_index`, shifting later matrices by one.
pub fn deepen_weights(weights: &[WeightMatrix], layer_index: usize) -> Result<Vec<WeightMatrix>> {
    if layer_index >= weights.len() {
        return Err(GrowthError::IndexOutOfRange {
            operation: "deepen",
            index: layer_index,
            limit: weights.len(),
        });
    }

    let mut deepened = weights.to_vec();
    let width = weights[layer_index].rows();
    deepened.insert(layer_index, WeightMatrix::identity(width));
    Ok(deepened)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::growth::forward::forward;
    use crate::weights::MemoryWeightStore;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn small_graph() -> GraphInfo {
        GraphInfo::new(1, 3, vec![4, 3, 2]).unwrap()
    }

    fn small_weights() -> Vec<WeightMatrix> {
        vec![
            WeightMatrix::from_rows(vec![
                vec![0.5, -0.2, 0.1],
                vec![0.3, 0.8, -0.4],
                vec![-0.6, 0.2, 0.9],
                vec![0.1, 0.4, 0.3],
            ])
            .unwrap(),
            WeightMatrix::from_rows(vec![vec![0.7, -0.3], vec![-0.5, 0.6], vec![0.2, 0.4]])
                .unwrap(),
        ]
    }

    fn store_with(weights: &[WeightMatrix]) -> MemoryWeightStore {
        let mut store = MemoryWeightStore::new();
        store.save_all(small_graph().namespace(), weights).unwrap();
        store
    }

    #[test]
    fn test_widen_weights_repeated_column() {
        let widened = widen_weights(&small_weights(), 1, &[2, 2]).unwrap();

        assert_eq!(widened[0].shape(), (4, 5));
        assert_eq!(widened[0].column(3), small_weights()[0].column(2));
        assert_eq!(widened[0].column(4), small_weights()[0].column(2));

        assert_eq!(widened[1].shape(), (5, 2));
        assert_relative_eq!(widened[1].get(2, 0), 0.2 / 3.0);
        assert_eq!(widened[1].row(3), widened[1].row(2));
        assert_eq!(widened[1].row(4), widened[1].row(2));
        assert_eq!(widened[1].row(0), small_weights()[1].row(0));
    }

    #[test]
    fn test_widen_weights_rejects_edges() {
        assert!(matches!(
            widen_weights(&small_weights(), 0, &[0]),
            Err(GrowthError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            widen_weights(&small_weights(), 2, &[0]),
            Err(GrowthError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            widen_weights(&small_weights(), 1, &[3]),
            Err(GrowthError::IndexOutOfRange { .. })
        ));
    }

    #[test]
    fn test_widen_preserves_output() {
        let mut store = store_with(&small_weights());
        let x = [1.0, -0.5, 0.25, 2.0];
        let before = forward(&small_weights(), &x).unwrap();

        let mut engine = Net2Net::with_seed(7);
        let grown = engine.widen(&mut store, &small_graph(), 1, 2).unwrap();
        assert_eq!(grown.units(), &[4, 5, 2]);

        let after = forward(&store.load_all(grown.namespace()).unwrap(), &x).unwrap();
        for (a, b) in before.iter().zip(&after) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_widen_zero_units_touches_nothing() {
        let mut store = store_with(&small_weights());
        let mut engine = Net2Net::with_seed(1);

        let err = engine.widen(&mut store, &small_graph(), 1, 0).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_ARGUMENT");
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_widen_output_layer_rejected() {
        let mut store = store_with(&small_weights());
        let mut engine = Net2Net::with_seed(1);

        assert!(matches!(
            engine.widen(&mut store, &small_graph(), 2, 1),
            Err(GrowthError::IndexOutOfRange { .. })
        ));
        assert!(matches!(
            engine.widen(&mut store, &small_graph(), 0, 1),
            Err(GrowthError::IndexOutOfRange { .. })
        ));
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_seeded_sampling_is_reproducible() {
        let mut a = Net2Net::with_seed(42);
        let mut b = Net2Net::with_seed(42);
        let first = a.sample_columns(10, 8);
        assert_eq!(first, b.sample_columns(10, 8));
        assert!(first.iter().all(|&c| c < 10));
    }

    #[test]
    fn test_failed_widen_leaves_generator_untouched() {
        let mut broken = store_with(&[WeightMatrix::zeros(4, 3)]);
        let mut engine = Net2Net::with_seed(21);
        assert!(engine.widen(&mut broken, &small_graph(), 1, 2).is_err());

        let mut fresh = Net2Net::with_seed(21);
        assert_eq!(engine.sample_columns(3, 5), fresh.sample_columns(3, 5));
    }

    #[test]
    fn test_deepen_weights_inserts_identity() {
        let deepened = deepen_weights(&small_weights(), 1).unwrap();
        assert_eq!(deepened.len(), 3);
        assert_eq!(deepened[1], WeightMatrix::identity(3));
        assert_eq!(deepened[0], small_weights()[0]);
        assert_eq!(deepened[2], small_weights()[1]);

        assert!(deepen_weights(&small_weights(), 2).is_err());
    }

    #[test]
    fn test_deepen_inconsistent_store_aborts() {
        let mut store = store_with(&[WeightMatrix::zeros(4, 3)]);
        let engine = Net2Net::with_seed(0);

        let err = engine.deepen(&mut store, &small_graph(), 1).unwrap_err();
        assert!(matches!(err, GrowthError::StorageInconsistency { .. }));
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load_all(small_graph().namespace()).unwrap().len(), 1);
    }
}
