//! Per-node derived-property cache.
//!
//! The cache is the only part of a node that changes after construction,
//! and only by filling previously-empty slots: a monotonic, idempotent
//! fill. Entries are plain JSON values keyed by property identifier so
//! they can be carried through the persisted node form; whether a given
//! key survives serialization is decided per operator kind
//! (`OpKind::persists_cache_key`).

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;

use crate::error::Result;

/// Well-known derived-property keys.
pub mod keys {
    /// Output column list, as derived by the plan layer.
    pub const OUTPUT_COLUMNS: &str = "output_columns";
    /// Output partition count, as derived by the plan layer.
    pub const PARTITION_COUNT: &str = "partition_count";
    /// Resolved source statistics; never persisted (process-local).
    pub const SOURCE_STATS: &str = "source_stats";
}

#[derive(Debug, Default)]
pub struct DerivedCache {
    slots: Mutex<BTreeMap<String, Value>>,
}

impl DerivedCache {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Fetch the cached value for `key`, computing and storing it when
    /// absent. The computation runs outside the lock; under a race the
    /// first stored value wins and every caller observes it.
    pub fn get_or_compute(
        &self,
        key: &str,
        compute: impl FnOnce() -> Result<Value>,
    ) -> Result<Value> {
        if let Some(v) = self.get(key) {
            return Ok(v);
        }
        let computed = compute()?;
        let mut slots = self.lock();
        Ok(slots.entry(key.to_string()).or_insert(computed).clone())
    }

    /// Fill a slot only if it is still empty.
    pub fn insert_if_absent(&self, key: &str, value: Value) {
        let mut slots = self.lock();
        slots.entry(key.to_string()).or_insert(value);
    }

    /// Snapshot of all entries, in key order.
    pub fn entries(&self) -> BTreeMap<String, Value> {
        self.lock().clone()
    }

    /// Seed entries restored from a persisted node. Existing slots win.
    pub fn seed(&self, entries: BTreeMap<String, Value>) {
        let mut slots = self.lock();
        for (k, v) in entries {
            slots.entry(k).or_insert(v);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Value>> {
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fill_is_monotonic_and_idempotent() {
        let cache = DerivedCache::default();
        let v1 = cache.get_or_compute("k", || Ok(json!(1))).unwrap();
        // A later compute for the same key must not overwrite the slot.
        let v2 = cache.get_or_compute("k", || Ok(json!(2))).unwrap();
        assert_eq!(v1, json!(1));
        assert_eq!(v2, json!(1));
    }

    #[test]
    fn test_seed_does_not_clobber() {
        let cache = DerivedCache::default();
        cache.insert_if_absent("a", json!("live"));
        let mut restored = BTreeMap::new();
        restored.insert("a".to_string(), json!("persisted"));
        restored.insert("b".to_string(), json!("persisted"));
        cache.seed(restored);
        assert_eq!(cache.get("a"), Some(json!("live")));
        assert_eq!(cache.get("b"), Some(json!("persisted")));
    }
}
