//! A simple, volatile, in-memory implementation of [`KVStore`].

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use dag_pruning::tangle::pluggables::{KVGet, KVStore, WriteBatch};

type WriteHook = Box<dyn FnMut(&MemWriteBatch) + Send>;

/// An in-memory implementation of [`KVStore`].
///
/// Besides storing values, a `MemDB` counts how often garbage collection was requested, and can
/// run a hook on every write batch after it has been applied.
#[derive(Clone)]
pub(crate) struct MemDB {
    map: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    garbage_collections: Arc<AtomicUsize>,
    write_hook: Arc<Mutex<Option<WriteHook>>>,
}

impl MemDB {
    /// Create a new, empty `MemDB`.
    pub(crate) fn new() -> MemDB {
        MemDB {
            map: Arc::new(Mutex::new(HashMap::new())),
            garbage_collections: Arc::new(AtomicUsize::new(0)),
            write_hook: Arc::new(Mutex::new(None)),
        }
    }

    /// Run `hook` after every subsequent write.
    pub(crate) fn set_write_hook(&self, hook: impl FnMut(&MemWriteBatch) + Send + 'static) {
        *self.write_hook.lock().unwrap() = Some(Box::new(hook));
    }

    pub(crate) fn garbage_collections(&self) -> usize {
        self.garbage_collections.load(Ordering::SeqCst)
    }

    /// A copy of every key-value pair currently stored.
    pub(crate) fn dump(&self) -> HashMap<Vec<u8>, Vec<u8>> {
        self.map.lock().unwrap().clone()
    }

    /// The number of stored keys that start with `prefix`.
    pub(crate) fn count_prefixed(&self, prefix: &[u8]) -> usize {
        self.map
            .lock()
            .unwrap()
            .keys()
            .filter(|key| key.starts_with(prefix))
            .count()
    }
}

impl KVStore for MemDB {
    type WriteBatch = MemWriteBatch;

    fn write(&mut self, wb: Self::WriteBatch) {
        {
            let mut map = self.map.lock().unwrap();
            for (key, value) in &wb.insertions {
                map.insert(key.clone(), value.clone());
            }
            for key in &wb.deletions {
                map.remove(key);
            }
        }

        if let Some(hook) = self.write_hook.lock().unwrap().as_mut() {
            hook(&wb)
        }
    }

    fn run_garbage_collection(&mut self) {
        self.garbage_collections.fetch_add(1, Ordering::SeqCst);
    }
}

impl KVGet for MemDB {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.lock().unwrap().get(key).cloned()
    }
}

// A simple implementation of [`WriteBatch`].
pub(crate) struct MemWriteBatch {
    insertions: HashMap<Vec<u8>, Vec<u8>>,
    deletions: HashSet<Vec<u8>>,
}

impl MemWriteBatch {
    /// The value this batch sets at `key`, if any.
    pub(crate) fn insertion(&self, key: &[u8]) -> Option<&[u8]> {
        self.insertions.get(key).map(Vec::as_slice)
    }
}

impl WriteBatch for MemWriteBatch {
    fn new() -> Self {
        MemWriteBatch {
            insertions: HashMap::new(),
            deletions: HashSet::new(),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) {
        let _ = self.deletions.remove(key);
        self.insertions.insert(key.to_vec(), value.to_vec());
    }

    fn delete(&mut self, key: &[u8]) {
        let _ = self.insertions.remove(key);
        self.deletions.insert(key.to_vec());
    }
}
