//! In-memory backend using BTreeMap
//!
//! Provides fast O(log n) operations; commits lock both stores together.

use crate::backend::Backend;
use crate::error::TabxResult;
use crate::storage::{KeyRange, KvPair, ReadonlyStore, Store, WriteOp};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// One ordered in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of every pair, in key order.
    pub fn dump(&self) -> Vec<KvPair> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn apply_locked(map: &mut BTreeMap<Vec<u8>, Vec<u8>>, ops: &[WriteOp]) {
    for op in ops {
        match op {
            WriteOp::Set { key, value } => {
                map.insert(key.clone(), value.clone());
            }
            WriteOp::Delete { key } => {
                map.remove(key);
            }
        }
    }
}

impl ReadonlyStore for MemoryStore {
    fn get(&self, key: &[u8]) -> TabxResult<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn scan(&self, range: &KeyRange, limit: Option<usize>) -> TabxResult<Vec<KvPair>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        let data = self.data.read();
        let iter = data
            .range::<[u8], _>(range.as_bounds())
            .map(|(k, v)| (k.clone(), v.clone()));
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }
}

impl Store for MemoryStore {
    fn set(&self, key: &[u8], value: &[u8]) -> TabxResult<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> TabxResult<()> {
        self.data.write().remove(key);
        Ok(())
    }
}

/// Commitment + index stores held in memory.
///
/// Tracks how many batch writers are currently open so callers (and tests)
/// can verify that every writer was released.
#[derive(Default)]
pub struct MemoryBackend {
    commitment: MemoryStore,
    index: MemoryStore,
    open_writers: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commitment(&self) -> &MemoryStore {
        &self.commitment
    }

    pub fn index(&self) -> &MemoryStore {
        &self.index
    }

    /// Batch writers acquired and not yet released.
    pub fn open_writers(&self) -> usize {
        self.open_writers.load(Ordering::SeqCst)
    }
}

impl Backend for MemoryBackend {
    fn commitment_store(&self) -> &dyn Store {
        &self.commitment
    }

    fn index_store(&self) -> &dyn Store {
        &self.index
    }

    fn commitment_store_reader(&self) -> &dyn ReadonlyStore {
        &self.commitment
    }

    fn index_store_reader(&self) -> &dyn ReadonlyStore {
        &self.index
    }

    fn apply(&self, commitment: &[WriteOp], index: &[WriteOp]) -> TabxResult<()> {
        // Lock order: commitment, then index.
        let mut c = self.commitment.data.write();
        let mut i = self.index.data.write();
        apply_locked(&mut c, commitment);
        apply_locked(&mut i, index);
        Ok(())
    }

    fn acquire_writer(&self) -> TabxResult<()> {
        self.open_writers.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release_writer(&self) {
        self.open_writers.fetch_sub(1, Ordering::SeqCst);
    }
}
