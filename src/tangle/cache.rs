/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Reference-counted sharing of records loaded from the tangle.
//!
//! Every lookup through an [`ObjectCache`] hands out a [`CachedObject`]. While at least one handle
//! to a record is alive, every other lookup of the same key shares the already-loaded record
//! instead of deserializing it again. Handles are released when they are dropped, so a handle is
//! released exactly once on every control flow path, including early returns and `?`.
//!
//! The cache never owns the underlying record: the key-value store does. Deleting a record from
//! the store [evicts](ObjectCache::evict) its entry, after which outstanding handles keep their own
//! copy alive until they drop.

use std::{
    collections::HashMap,
    fmt::{self, Debug, Formatter},
    hash::Hash,
    ops::Deref,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

struct CacheEntry<V> {
    value: Arc<V>,
    handles: usize,
}

type Entries<K, V> = Arc<Mutex<HashMap<K, CacheEntry<V>>>>;

/// A table of shared, reference-counted records.
pub struct ObjectCache<K: Eq + Hash + Clone, V> {
    entries: Entries<K, V>,
}

impl<K: Eq + Hash + Clone, V> ObjectCache<K, V> {
    pub fn new() -> Self {
        ObjectCache {
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get a handle to the record stored at `key`, calling `load` to read it from storage if no
    /// handle to it is currently alive.
    ///
    /// Returns `Ok(None)` if `load` finds no record.
    pub fn get_or_load<E>(
        &self,
        key: &K,
        load: impl FnOnce() -> Result<Option<V>, E>,
    ) -> Result<Option<CachedObject<K, V>>, E> {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get_mut(key) {
            entry.handles += 1;
            return Ok(Some(CachedObject {
                key: key.clone(),
                value: Arc::clone(&entry.value),
                entries: Arc::clone(&self.entries),
            }));
        }

        let Some(value) = load()? else {
            return Ok(None);
        };
        let value = Arc::new(value);
        entries.insert(
            key.clone(),
            CacheEntry {
                value: Arc::clone(&value),
                handles: 1,
            },
        );
        Ok(Some(CachedObject {
            key: key.clone(),
            value,
            entries: Arc::clone(&self.entries),
        }))
    }

    /// Forget the record at `key`. Handles that are still alive stay valid, and releasing them is
    /// a no-op.
    pub fn evict(&self, key: &K) {
        lock(&self.entries).remove(key);
    }

    /// The number of handles that are currently alive.
    pub fn outstanding_handles(&self) -> usize {
        lock(&self.entries).values().map(|entry| entry.handles).sum()
    }
}

impl<K: Eq + Hash + Clone, V> Default for ObjectCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared handle to a record in an [`ObjectCache`].
///
/// Cloning a handle retains the record once more. Dropping a handle releases it; the entry is
/// destroyed when its last handle is released.
pub struct CachedObject<K: Eq + Hash + Clone, V> {
    key: K,
    value: Arc<V>,
    entries: Entries<K, V>,
}

impl<K: Eq + Hash + Clone, V> Deref for CachedObject<K, V> {
    type Target = V;

    fn deref(&self) -> &Self::Target {
        &self.value
    }
}

impl<K: Eq + Hash + Clone, V> Clone for CachedObject<K, V> {
    fn clone(&self) -> Self {
        let mut entries = lock(&self.entries);
        if let Some(entry) = entries.get_mut(&self.key) {
            if Arc::ptr_eq(&entry.value, &self.value) {
                entry.handles += 1;
            }
        }
        CachedObject {
            key: self.key.clone(),
            value: Arc::clone(&self.value),
            entries: Arc::clone(&self.entries),
        }
    }
}

impl<K: Eq + Hash + Clone, V> Drop for CachedObject<K, V> {
    fn drop(&mut self) {
        let mut entries = lock(&self.entries);
        let Some(entry) = entries.get_mut(&self.key) else {
            return;
        };
        // The entry may have been evicted and reloaded since this handle was created.
        if !Arc::ptr_eq(&entry.value, &self.value) {
            return;
        }
        entry.handles -= 1;
        if entry.handles == 0 {
            entries.remove(&self.key);
        }
    }
}

impl<K: Eq + Hash + Clone, V: Debug> Debug for CachedObject<K, V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(&*self.value, f)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
