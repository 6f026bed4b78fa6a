// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory design store fake for testing without filesystem I/O.

use kiln_core::{DesignStore, StoreError};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory implementation of [`DesignStore`] for testing.
///
/// Clones share state, so a test can hand one clone to a
/// [`kiln_core::DesignArchive`] and inspect calls through another.
///
/// # Example
///
/// ```
/// use kiln_dry_tests::{stock_flow_design, InMemoryDesignStore};
/// use kiln_core::DesignArchive;
///
/// let store = InMemoryDesignStore::new();
/// let archive = DesignArchive::new(store.clone());
///
/// archive.save("empty", &stock_flow_design()).unwrap();
/// assert_eq!(store.load_count(), 0);
/// assert_eq!(store.save_count(), 1);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryDesignStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Default)]
struct Inner {
    data: BTreeMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    remove_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryDesignStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Stores `data` under `name` without touching the counters.
    pub fn insert_raw(&self, name: &str, data: impl Into<Vec<u8>>) {
        self.lock().data.insert(name.to_owned(), data.into());
    }

    /// Raw blob stored under `name`, without touching the counters.
    pub fn raw(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().data.get(name).cloned()
    }

    /// Configure the store to fail on load operations.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Configure the store to fail on save operations.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// Number of `load_raw` attempts, failed ones included.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// Number of `save_raw` attempts, failed ones included.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Number of `remove` attempts.
    pub fn remove_count(&self) -> usize {
        self.lock().remove_count
    }

    /// Names currently stored, sorted.
    pub fn names(&self) -> Vec<String> {
        self.lock().data.keys().cloned().collect()
    }

    /// Check if a design is stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.lock().data.contains_key(name)
    }
}

impl DesignStore for InMemoryDesignStore {
    fn load_raw(&self, name: &str) -> Result<Vec<u8>, StoreError> {
        let mut inner = self.lock();
        inner.load_count += 1;
        if inner.fail_on_load {
            return Err(StoreError::Other("simulated load failure".into()));
        }
        inner.data.get(name).cloned().ok_or(StoreError::NotFound)
    }

    fn save_raw(&self, name: &str, data: &[u8]) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.save_count += 1;
        if inner.fail_on_save {
            return Err(StoreError::Other("simulated save failure".into()));
        }
        inner.data.insert(name.to_owned(), data.to_vec());
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.remove_count += 1;
        inner.data.remove(name).map(drop).ok_or(StoreError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_save_load() {
        let store = InMemoryDesignStore::new();
        store.save_raw("d", b"hello").unwrap();
        assert_eq!(store.load_raw("d").unwrap(), b"hello");
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn missing_names_are_not_found() {
        let store = InMemoryDesignStore::new();
        assert!(matches!(store.load_raw("nope"), Err(StoreError::NotFound)));
        assert!(matches!(store.remove("nope"), Err(StoreError::NotFound)));
        assert_eq!(store.remove_count(), 1);
    }

    #[test]
    fn failed_saves_count_but_store_nothing() {
        let store = InMemoryDesignStore::new();
        store.set_fail_on_save(true);
        assert!(matches!(store.save_raw("d", b"x"), Err(StoreError::Other(_))));
        assert_eq!(store.save_count(), 1);
        assert!(!store.contains("d"));
    }

    #[test]
    fn clones_share_state() {
        let one = InMemoryDesignStore::new();
        let two = one.clone();
        one.save_raw("shared", b"v").unwrap();
        two.set_fail_on_load(true);
        assert!(one.load_raw("shared").is_err());
        assert_eq!(two.names(), vec!["shared".to_owned()]);
        assert_eq!(one.load_count(), 1);
    }
}
