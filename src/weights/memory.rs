//! In-memory weight store.

use std::collections::HashMap;

use crate::error::{GrowthError, Result};
use crate::weights::{Namespace, NamespaceLock, WeightMatrix, WeightStore};

/// Weight store backed by a `HashMap`, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryWeightStore {
    sets: HashMap<Namespace, Vec<WeightMatrix>>,
    saves: usize,
}

impl MemoryWeightStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful `save_all` calls so far
    pub fn save_count(&self) -> usize {
        self.saves
    }

    /// Namespaces currently holding a set
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut namespaces: Vec<_> = self.sets.keys().copied().collect();
        namespaces.sort();
        namespaces
    }
}

impl WeightStore for MemoryWeightStore {
    fn load_all(&self, namespace: Namespace) -> Result<Vec<WeightMatrix>> {
        self.sets
            .get(&namespace)
            .cloned()
            .ok_or(GrowthError::NotFound { namespace })
    }

    fn save_all(&mut self, namespace: Namespace, weights: &[WeightMatrix]) -> Result<()> {
        self.sets.insert(namespace, weights.to_vec());
        self.saves += 1;
        Ok(())
    }

    fn clear(&mut self, namespace: Namespace) -> Result<()> {
        self.sets.remove(&namespace);
        Ok(())
    }

    fn contains(&self, namespace: Namespace) -> Result<bool> {
        Ok(self.sets.contains_key(&namespace))
    }

    fn lock(&self, namespace: Namespace) -> Result<NamespaceLock> {
        Ok(NamespaceLock::in_process(namespace))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_namespace() {
        let store = MemoryWeightStore::new();
        assert!(matches!(
            store.load_all(Namespace::new(1)),
            Err(GrowthError::NotFound { .. })
        ));
    }

    #[test]
    fn test_save_replaces_whole_set() {
        let mut store = MemoryWeightStore::new();
        let ns = Namespace::new(1);

        store
            .save_all(ns, &[WeightMatrix::zeros(2, 2), WeightMatrix::zeros(2, 1)])
            .unwrap();
        store.save_all(ns, &[WeightMatrix::identity(3)]).unwrap();

        let loaded = store.load_all(ns).unwrap();
        assert_eq!(loaded, vec![WeightMatrix::identity(3)]);
        assert_eq!(store.save_count(), 2);
    }

    #[test]
    fn test_clear() {
        let mut store = MemoryWeightStore::new();
        let ns = Namespace::new(5);
        store.save_all(ns, &[WeightMatrix::identity(2)]).unwrap();
        assert!(store.contains(ns).unwrap());

        store.clear(ns).unwrap();
        assert!(!store.contains(ns).unwrap());
        store.clear(ns).unwrap();
        assert!(store.namespaces().is_empty());
    }
}
