//! sled-backed durable backend.
//!
//! The commitment and index stores are two sled `Tree`s of one database; a
//! writer commit runs as a single multi-tree transaction, so both stores move
//! together or not at all.

use crate::backend::Backend;
use crate::error::{TabxError, TabxResult};
use crate::storage::{KeyRange, KvPair, ReadonlyStore, Store, WriteOp};
use sled::Transactional;
use sled::transaction::{TransactionError, TransactionalTree, UnabortableTransactionError};
use std::ops::Bound;
use std::path::Path;
use tracing::{debug, instrument};

const COMMITMENT_TREE: &str = "commitment";
const INDEX_TREE: &str = "index";

/// One sled tree viewed as an ordered store.
#[derive(Clone)]
pub struct SledStore {
    tree: sled::Tree,
}

impl SledStore {
    pub fn new(tree: sled::Tree) -> Self {
        Self { tree }
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}

impl ReadonlyStore for SledStore {
    fn get(&self, key: &[u8]) -> TabxResult<Option<Vec<u8>>> {
        Ok(self.tree.get(key)?.map(|ivec| ivec.to_vec()))
    }

    fn scan(&self, range: &KeyRange, limit: Option<usize>) -> TabxResult<Vec<KvPair>> {
        if range.is_empty() {
            return Ok(Vec::new());
        }
        // sled has no excluded start bound; skip the start key manually.
        let (start, end) = range.as_bounds();
        let skip = match start {
            Bound::Excluded(s) => Some(s),
            _ => None,
        };
        let start = match start {
            Bound::Excluded(s) => Bound::Included(s),
            other => other,
        };

        let mut result = Vec::new();
        for item in self.tree.range::<&[u8], _>((start, end)) {
            let (k, v) = item?;
            if skip.is_some_and(|s| k.as_ref() == s) {
                continue;
            }
            result.push((k.to_vec(), v.to_vec()));
            if limit.is_some_and(|n| result.len() >= n) {
                break;
            }
        }
        Ok(result)
    }
}

impl Store for SledStore {
    fn set(&self, key: &[u8], value: &[u8]) -> TabxResult<()> {
        self.tree.insert(key, value)?;
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> TabxResult<()> {
        self.tree.remove(key)?;
        Ok(())
    }
}

/// Durable backend: commitment + index trees in one sled database.
pub struct SledBackend {
    db: sled::Db,
    commitment: SledStore,
    index: SledStore,
}

impl SledBackend {
    /// Open (or create) a backend at the given directory path.
    pub fn open(path: &Path) -> TabxResult<Self> {
        Self::from_db(sled::open(path)?)
    }

    /// Open a temporary backend (for testing). Data is deleted on drop.
    pub fn open_temporary() -> TabxResult<Self> {
        Self::from_db(sled::Config::new().temporary(true).open()?)
    }

    fn from_db(db: sled::Db) -> TabxResult<Self> {
        let commitment = SledStore::new(db.open_tree(COMMITMENT_TREE)?);
        let index = SledStore::new(db.open_tree(INDEX_TREE)?);
        Ok(Self {
            db,
            commitment,
            index,
        })
    }

    pub fn commitment(&self) -> &SledStore {
        &self.commitment
    }

    pub fn index(&self) -> &SledStore {
        &self.index
    }

    /// Persist buffered sled state to disk.
    pub fn flush(&self) -> TabxResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn apply_tx(tree: &TransactionalTree, op: &WriteOp) -> Result<(), UnabortableTransactionError> {
    match op {
        WriteOp::Set { key, value } => {
            tree.insert(key.as_slice(), value.as_slice())?;
        }
        WriteOp::Delete { key } => {
            tree.remove(key.as_slice())?;
        }
    }
    Ok(())
}

impl Backend for SledBackend {
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

    #[instrument(skip_all, fields(commitment = commitment.len(), index = index.len()))]
    fn apply(&self, commitment: &[WriteOp], index: &[WriteOp]) -> TabxResult<()> {
        let result: Result<(), TransactionError<()>> = (&self.commitment.tree, &self.index.tree)
            .transaction(|(c, i)| {
                for op in commitment {
                    apply_tx(c, op)?;
                }
                for op in index {
                    apply_tx(i, op)?;
                }
                Ok(())
            });
        match result {
            Ok(()) => {
                debug!("sled transaction committed");
                Ok(())
            }
            Err(TransactionError::Storage(source)) => Err(TabxError::Sled { source }),
            Err(TransactionError::Abort(())) => {
                Err(TabxError::Storage("sled transaction aborted".to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_backend() -> SledBackend {
        SledBackend::open_temporary().unwrap()
    }

    #[test]
    fn set_and_get() {
        let backend = temp_backend();
        backend.commitment_store().set(b"key1", b"value1").unwrap();
        let result = backend.commitment_store_reader().get(b"key1").unwrap();
        assert_eq!(result, Some(b"value1".to_vec()));
    }

    #[test]
    fn get_nonexistent() {
        let backend = temp_backend();
        assert_eq!(backend.index_store_reader().get(b"missing").unwrap(), None);
    }

    #[test]
    fn stores_are_isolated() {
        let backend = temp_backend();
        backend.commitment_store().set(b"k", b"v1").unwrap();
        backend.index_store().set(b"k", b"v2").unwrap();
        assert_eq!(backend.commitment().get(b"k").unwrap(), Some(b"v1".to_vec()));
        assert_eq!(backend.index().get(b"k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn scan_excluded_start_and_limit() {
        let backend = temp_backend();
        let store = backend.commitment_store();
        for k in [b"a", b"b", b"c", b"d"] {
            store.set(k, b"x").unwrap();
        }
        let all = store.scan(&KeyRange::all(), None).unwrap();
        assert_eq!(all.len(), 4);

        let after_b = store.scan(&KeyRange::all().after(b"b"), Some(1)).unwrap();
        assert_eq!(after_b.len(), 1);
        assert_eq!(after_b[0].0, b"c");
    }

    #[test]
    fn apply_is_transactional_across_trees() {
        let backend = temp_backend();
        backend
            .apply(
                &[WriteOp::Set {
                    key: b"row".to_vec(),
                    value: b"1".to_vec(),
                }],
                &[WriteOp::Set {
                    key: b"idx".to_vec(),
                    value: b"row".to_vec(),
                }],
            )
            .unwrap();
        assert!(backend.commitment().has(b"row").unwrap());
        assert!(backend.index().has(b"idx").unwrap());
    }

    #[test]
    fn reopen_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let backend = SledBackend::open(dir.path()).unwrap();
            backend.index_store().set(b"seq", b"7").unwrap();
            backend.flush().unwrap();
        }
        let backend = SledBackend::open(dir.path()).unwrap();
        assert_eq!(backend.index().get(b"seq").unwrap(), Some(b"7".to_vec()));
    }
}
