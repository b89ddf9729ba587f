// src/scoring/params.rs

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Difficulty and discrimination for one item.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemParams {
    pub difficulty: f64,
    pub discrimination: f64,
}

impl ItemParams {
    /// Used for items with no calibrated parameters yet. A neutral item
    /// degrades the estimate's precision instead of aborting it.
    pub const NEUTRAL: ItemParams = ItemParams {
        difficulty: 0.0,
        discrimination: 1.0,
    };
}

impl Default for ItemParams {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

/// Immutable snapshot of the active parameter table, keyed by
/// (subtest, question). Estimators hold one snapshot for a whole
/// computation, so a concurrent recalibration can never expose a
/// half-updated table to them.
#[derive(Debug, Default)]
pub struct ParameterTable {
    version: u64,
    items: HashMap<(i64, i64), ItemParams>,
}

impl ParameterTable {
    pub fn new(version: u64, items: HashMap<(i64, i64), ItemParams>) -> Self {
        Self { version, items }
    }

    /// Version 0 is the uncalibrated state: every lookup falls back to
    /// neutral parameters.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, subtest_id: i64, question_id: i64) -> ItemParams {
        self.items
            .get(&(subtest_id, question_id))
            .copied()
            .unwrap_or(ItemParams::NEUTRAL)
    }
}

/// Shared handle to the current parameter table. Calibration swaps the
/// whole table behind the lock; readers clone out an `Arc` and keep using
/// their snapshot even across a swap.
#[derive(Clone)]
pub struct ParameterStore {
    inner: Arc<RwLock<Arc<ParameterTable>>>,
}

impl ParameterStore {
    /// Empty store at version 0.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(ParameterTable::default()))),
        }
    }

    /// The active snapshot.
    pub fn current(&self) -> Arc<ParameterTable> {
        let guard = self.inner.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Replaces the table wholesale and bumps the version. Returns the new
    /// version.
    pub fn replace(&self, items: HashMap<(i64, i64), ItemParams>) -> u64 {
        let mut guard = self.inner.write().unwrap_or_else(|e| e.into_inner());
        let version = guard.version() + 1;
        *guard = Arc::new(ParameterTable::new(version, items));
        version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(difficulty: f64, discrimination: f64) -> ItemParams {
        ItemParams {
            difficulty,
            discrimination,
        }
    }

    #[test]
    fn missing_items_fall_back_to_neutral() {
        let table = ParameterTable::default();
        assert_eq!(table.get(1, 99), ItemParams::NEUTRAL);
        assert_eq!(table.version(), 0);
        assert!(table.is_empty());
    }

    #[test]
    fn replace_bumps_version_and_swaps_contents() {
        let store = ParameterStore::empty();
        assert_eq!(store.current().version(), 0);

        let mut items = HashMap::new();
        items.insert((1, 5), params(-1.2, 1.4));
        let version = store.replace(items);

        assert_eq!(version, 1);
        let table = store.current();
        assert_eq!(table.version(), 1);
        assert_eq!(table.get(1, 5), params(-1.2, 1.4));
        assert_eq!(table.get(1, 6), ItemParams::NEUTRAL);
    }

    #[test]
    fn held_snapshots_survive_a_swap() {
        let store = ParameterStore::empty();
        let mut items = HashMap::new();
        items.insert((1, 1), params(0.5, 1.0));
        store.replace(items);

        let snapshot = store.current();
        store.replace(HashMap::new());

        // The old snapshot still answers from its own table.
        assert_eq!(snapshot.get(1, 1), params(0.5, 1.0));
        assert_eq!(snapshot.version(), 1);
        // The store has moved on.
        assert_eq!(store.current().version(), 2);
        assert_eq!(store.current().get(1, 1), ItemParams::NEUTRAL);
    }

    #[test]
    fn clones_share_the_same_table() {
        let store = ParameterStore::empty();
        let clone = store.clone();

        let mut items = HashMap::new();
        items.insert((2, 3), params(0.7, 0.9));
        store.replace(items);

        assert_eq!(clone.current().get(2, 3), params(0.7, 0.9));
    }
}
