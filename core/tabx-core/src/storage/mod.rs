//! Ordered Store Interface: the raw key-value layer beneath tables.
//!
//! Tables never see a concrete store: they read and write through
//! [`ReadonlyStore`] / [`Store`], and a [`Backend`](crate::backend::Backend)
//! pairs two of them (commitment + index) for one unit of work.
//!
//! # Contract
//!
//! - `get`: `None` for absent keys.
//! - `set`: upsert, overwrites an existing key.
//! - `delete`: deleting an absent key is not an error.
//! - `scan`: key-ordered pairs inside the range, at most `limit` of them.

pub mod memory;
pub mod sled_store;

use crate::error::TabxResult;
use std::ops::Bound;

/// A raw key/value pair.
pub type KvPair = (Vec<u8>, Vec<u8>);

/// Half-open or closed byte-key range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    pub start: Bound<Vec<u8>>,
    pub end: Bound<Vec<u8>>,
}

impl KeyRange {
    /// Every key.
    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Every key starting with `prefix`.
    pub fn prefix(prefix: &[u8]) -> Self {
        Self {
            start: Bound::Included(prefix.to_vec()),
            end: match prefix_end(prefix) {
                Some(end) => Bound::Excluded(end),
                None => Bound::Unbounded,
            },
        }
    }

    /// Same range, restarted strictly after `key` (scan pagination).
    pub fn after(&self, key: &[u8]) -> Self {
        Self {
            start: Bound::Excluded(key.to_vec()),
            end: self.end.clone(),
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        let after_start = match &self.start {
            Bound::Included(s) => key >= s.as_slice(),
            Bound::Excluded(s) => key > s.as_slice(),
            Bound::Unbounded => true,
        };
        let before_end = match &self.end {
            Bound::Included(e) => key <= e.as_slice(),
            Bound::Excluded(e) => key < e.as_slice(),
            Bound::Unbounded => true,
        };
        after_start && before_end
    }

    /// Whether no key can fall inside the range.
    pub fn is_empty(&self) -> bool {
        match (&self.start, &self.end) {
            (Bound::Included(s), Bound::Included(e)) => s > e,
            (Bound::Included(s), Bound::Excluded(e))
            | (Bound::Excluded(s), Bound::Included(e))
            | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
            _ => false,
        }
    }

    pub(crate) fn as_bounds(&self) -> (Bound<&[u8]>, Bound<&[u8]>) {
        (as_slice_bound(&self.start), as_slice_bound(&self.end))
    }
}

fn as_slice_bound(bound: &Bound<Vec<u8>>) -> Bound<&[u8]> {
    match bound {
        Bound::Included(v) => Bound::Included(v.as_slice()),
        Bound::Excluded(v) => Bound::Excluded(v.as_slice()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

/// Smallest key greater than every key with `prefix`, `None` if unbounded.
pub fn prefix_end(prefix: &[u8]) -> Option<Vec<u8>> {
    let mut end = prefix.to_vec();
    while let Some(last) = end.pop() {
        if last < u8::MAX {
            end.push(last + 1);
            return Some(end);
        }
    }
    None
}

/// Read side of an ordered key-value store.
pub trait ReadonlyStore {
    fn get(&self, key: &[u8]) -> TabxResult<Option<Vec<u8>>>;

    fn has(&self, key: &[u8]) -> TabxResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Key-ordered pairs in `range`, at most `limit` when given.
    fn scan(&self, range: &KeyRange, limit: Option<usize>) -> TabxResult<Vec<KvPair>>;
}

/// Read/write ordered key-value store.
pub trait Store: ReadonlyStore {
    fn set(&self, key: &[u8], value: &[u8]) -> TabxResult<()>;

    fn delete(&self, key: &[u8]) -> TabxResult<()>;
}

/// One buffered mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOp {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl WriteOp {
    pub fn key(&self) -> &[u8] {
        match self {
            WriteOp::Set { key, .. } | WriteOp::Delete { key } => key,
        }
    }

    /// Apply to any store, in isolation.
    pub fn apply_to<S: Store + ?Sized>(&self, store: &S) -> TabxResult<()> {
        match self {
            WriteOp::Set { key, value } => store.set(key, value),
            WriteOp::Delete { key } => store.delete(key),
        }
    }
}
