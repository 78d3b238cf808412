//! Batch Writer: buffered, commit-once writes over a backend.
//!
//! Writes to the commitment and index stores are buffered in insertion order
//! and only reach the backend on [`BatchWriter::write`], both lists in one
//! [`Backend::apply`] call. Reads through the writer's stores see the
//! buffered writes layered over the backend's committed state.
//!
//! A writer is single-owner and single-use: `write()` succeeds at most once,
//! and `close()` (also run on drop) discards whatever was not written and
//! releases the backend.

use crate::backend::Backend;
use crate::error::{TabxError, TabxResult};
use crate::storage::{KeyRange, KvPair, ReadonlyStore, Store, WriteOp};
use std::cell::RefCell;
use std::collections::BTreeMap;
use tracing::{debug, instrument, trace};

/// A store view that buffers writes atop a read-only base.
pub struct BufferedStore<'a> {
    base: &'a dyn ReadonlyStore,
    ops: RefCell<Vec<WriteOp>>,
    /// Latest buffered state per key; `None` is a tombstone.
    overlay: RefCell<BTreeMap<Vec<u8>, Option<Vec<u8>>>>,
}

impl<'a> BufferedStore<'a> {
    pub fn new(base: &'a dyn ReadonlyStore) -> Self {
        Self {
            base,
            ops: RefCell::new(Vec::new()),
            overlay: RefCell::new(BTreeMap::new()),
        }
    }

    /// Number of buffered operations.
    pub fn pending(&self) -> usize {
        self.ops.borrow().len()
    }

    fn take_ops(&self) -> Vec<WriteOp> {
        self.overlay.borrow_mut().clear();
        std::mem::take(&mut *self.ops.borrow_mut())
    }

    fn discard(&self) {
        self.ops.borrow_mut().clear();
        self.overlay.borrow_mut().clear();
    }
}

impl ReadonlyStore for BufferedStore<'_> {
    fn get(&self, key: &[u8]) -> TabxResult<Option<Vec<u8>>> {
        if let Some(buffered) = self.overlay.borrow().get(key) {
            return Ok(buffered.clone());
        }
        self.base.get(key)
    }

    fn scan(&self, range: &KeyRange, limit: Option<usize>) -> TabxResult<Vec<KvPair>> {
        let overlay = self.overlay.borrow();
        let in_range: Vec<(&Vec<u8>, &Option<Vec<u8>>)> = if range.is_empty() {
            Vec::new()
        } else {
            overlay.range::<[u8], _>(range.as_bounds()).collect()
        };
        // Each tombstone may hide one base row.
        let tombstones = in_range.iter().filter(|(_, v)| v.is_none()).count();
        let base_limit = limit.map(|n| n.saturating_add(tombstones));

        let mut merged: BTreeMap<Vec<u8>, Vec<u8>> =
            self.base.scan(range, base_limit)?.into_iter().collect();
        for (key, value) in in_range {
            match value {
                Some(v) => {
                    merged.insert(key.clone(), v.clone());
                }
                None => {
                    merged.remove(key);
                }
            }
        }

        let iter = merged.into_iter();
        Ok(match limit {
            Some(n) => iter.take(n).collect(),
            None => iter.collect(),
        })
    }
}

impl Store for BufferedStore<'_> {
    fn set(&self, key: &[u8], value: &[u8]) -> TabxResult<()> {
        self.ops.borrow_mut().push(WriteOp::Set {
            key: key.to_vec(),
            value: value.to_vec(),
        });
        self.overlay
            .borrow_mut()
            .insert(key.to_vec(), Some(value.to_vec()));
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> TabxResult<()> {
        self.ops.borrow_mut().push(WriteOp::Delete { key: key.to_vec() });
        self.overlay.borrow_mut().insert(key.to_vec(), None);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Open,
    Written,
    Closed,
}

/// Buffered writer over one backend.
pub struct BatchWriter<'a> {
    backend: &'a dyn Backend,
    commitment: BufferedStore<'a>,
    index: BufferedStore<'a>,
    state: WriterState,
}

impl<'a> BatchWriter<'a> {
    /// Open a writer; the backend is released again by `close()` or drop.
    pub fn new(backend: &'a dyn Backend) -> TabxResult<Self> {
        backend.acquire_writer()?;
        trace!("batch writer opened");
        Ok(Self {
            backend,
            commitment: BufferedStore::new(backend.commitment_store_reader()),
            index: BufferedStore::new(backend.index_store_reader()),
            state: WriterState::Open,
        })
    }

    /// Commitment store view with read-your-own-writes.
    pub fn commitment_store(&self) -> &BufferedStore<'a> {
        &self.commitment
    }

    /// Index store view with read-your-own-writes.
    pub fn index_store(&self) -> &BufferedStore<'a> {
        &self.index
    }

    /// Operations buffered and not yet written.
    pub fn pending(&self) -> usize {
        self.commitment.pending() + self.index.pending()
    }

    pub fn is_open(&self) -> bool {
        self.state == WriterState::Open
    }

    /// Flush every buffered operation to the backend.
    ///
    /// Callable once; later calls, or calls after `close()`, fail with
    /// `WriterClosed`. A failed flush also consumes the writer.
    #[instrument(skip(self), fields(ops = self.pending()))]
    pub fn write(&mut self) -> TabxResult<()> {
        if self.state != WriterState::Open {
            return Err(TabxError::WriterClosed);
        }
        let commitment = self.commitment.take_ops();
        let index = self.index.take_ops();
        self.state = WriterState::Written;
        self.backend.apply(&commitment, &index)?;
        debug!(
            commitment = commitment.len(),
            index = index.len(),
            "batch committed"
        );
        Ok(())
    }

    /// Discard unwritten operations and release the backend. Idempotent.
    pub fn close(&mut self) {
        if self.state == WriterState::Closed {
            return;
        }
        if self.state == WriterState::Open && self.pending() > 0 {
            debug!(ops = self.pending(), "discarding uncommitted batch");
        }
        self.commitment.discard();
        self.index.discard();
        self.state = WriterState::Closed;
        self.backend.release_writer();
    }
}

impl Drop for BatchWriter<'_> {
    fn drop(&mut self) {
        self.close();
    }
}
