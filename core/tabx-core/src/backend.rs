//! Backend and context: the per-request handle tables work through.
//!
//! A [`Backend`] pairs the commitment store (canonical rows) with the index
//! store (secondary indexes and sequence counters). Callers hand tables a
//! [`Context`], from which each operation obtains the current backend.

use crate::error::{TabxError, TabxResult};
use crate::storage::{ReadonlyStore, Store, WriteOp};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Live store handles for one logical unit of work.
pub trait Backend: Send + Sync {
    fn commitment_store(&self) -> &dyn Store;

    fn index_store(&self) -> &dyn Store;

    fn commitment_store_reader(&self) -> &dyn ReadonlyStore;

    fn index_store_reader(&self) -> &dyn ReadonlyStore;

    /// Apply one writer's buffered operations.
    ///
    /// The default applies them one by one; backends that can make both lists
    /// visible atomically (a single lock, a multi-tree transaction) override it.
    fn apply(&self, commitment: &[WriteOp], index: &[WriteOp]) -> TabxResult<()> {
        for op in commitment {
            op.apply_to(self.commitment_store())?;
        }
        for op in index {
            op.apply_to(self.index_store())?;
        }
        Ok(())
    }

    /// Called when a batch writer is opened over this backend.
    fn acquire_writer(&self) -> TabxResult<()> {
        Ok(())
    }

    /// Called exactly once per successful [`Backend::acquire_writer`].
    fn release_writer(&self) {}
}

/// Source of the current backend for an operation.
pub trait Context {
    fn backend(&self) -> TabxResult<&dyn Backend>;
}

impl<B: Backend> Context for B {
    fn backend(&self) -> TabxResult<&dyn Backend> {
        Ok(self)
    }
}

/// Request-scoped context: an optional shared backend plus a cancel flag.
///
/// Cancellation only prevents new backends from being handed out; a writer
/// already in progress runs to completion or is dropped uncommitted.
#[derive(Default)]
pub struct RequestContext {
    backend: Option<Arc<dyn Backend>>,
    cancelled: AtomicBool,
}

impl RequestContext {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend: Some(backend),
            cancelled: AtomicBool::new(false),
        }
    }

    /// A context without a backend; every operation fails with `NoBackend`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Context for RequestContext {
    fn backend(&self) -> TabxResult<&dyn Backend> {
        if self.is_cancelled() {
            return Err(TabxError::Cancelled);
        }
        self.backend.as_deref().ok_or(TabxError::NoBackend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::MemoryBackend;

    #[test]
    fn backend_is_its_own_context() {
        let backend = MemoryBackend::new();
        backend.backend().unwrap().index_store().set(b"k", b"v").unwrap();
        assert_eq!(backend.index().len(), 1);
    }

    #[test]
    fn empty_context_has_no_backend() {
        let ctx = RequestContext::empty();
        assert!(matches!(ctx.backend(), Err(TabxError::NoBackend)));
    }

    #[test]
    fn cancelled_context_refuses_backend() {
        let ctx = RequestContext::new(Arc::new(MemoryBackend::new()));
        assert!(ctx.backend().is_ok());
        ctx.cancel();
        assert!(matches!(ctx.backend(), Err(TabxError::Cancelled)));
    }
}
