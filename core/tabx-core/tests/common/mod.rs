//! Shared records and backends for integration tests.
#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tabx_core::storage::memory::MemoryBackend;
use tabx_core::storage::{ReadonlyStore, Store, WriteOp};
use tabx_core::{Backend, Record, TabxError, TabxResult};

/// Minimal auto-increment record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[tabx(type_name = "test.Item", table_id = 1)]
#[tabx(primary_key(fields = "id", auto_increment))]
#[tabx(index(id = 1, fields = "name"))]
pub struct Item {
    pub id: u64,
    pub name: String,
}

impl Item {
    pub fn new(name: &str) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
        }
    }
}

/// Auto-increment record with a unique index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[tabx(type_name = "test.Person", table_id = 2)]
#[tabx(primary_key(fields = "id", auto_increment))]
#[tabx(index(id = 1, fields = "name"))]
#[tabx(index(id = 2, fields = "email", unique))]
pub struct Person {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub age: u32,
}

impl Person {
    pub fn new(name: &str, email: &str, age: u32) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            email: email.to_string(),
            age,
        }
    }
}

/// Composite natural key, no auto-increment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[tabx(type_name = "test.Balance", table_id = 3)]
#[tabx(primary_key(fields = "owner,denom"))]
#[tabx(index(id = 1, fields = "denom"))]
pub struct Balance {
    pub owner: String,
    pub denom: String,
    pub amount: u64,
}

impl Balance {
    pub fn new(owner: &str, denom: &str, amount: u64) -> Self {
        Self {
            owner: owner.to_string(),
            denom: denom.to_string(),
            amount,
        }
    }
}

/// Byte-keyed record whose JSON form carries base64.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
#[tabx(type_name = "test.Blob", table_id = 4)]
#[tabx(primary_key(fields = "hash"))]
pub struct Blob {
    #[serde(with = "tabx_core::json::base64_bytes")]
    pub hash: Vec<u8>,
    pub size: u64,
}

/// Memory backend whose commits can be made to fail.
#[derive(Default)]
pub struct FlakyBackend {
    pub inner: MemoryBackend,
    fail_apply: AtomicBool,
}

impl FlakyBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_apply.store(fail, Ordering::SeqCst);
    }
}

impl Backend for FlakyBackend {
    fn commitment_store(&self) -> &dyn Store {
        self.inner.commitment_store()
    }

    fn index_store(&self) -> &dyn Store {
        self.inner.index_store()
    }

    fn commitment_store_reader(&self) -> &dyn ReadonlyStore {
        self.inner.commitment_store_reader()
    }

    fn index_store_reader(&self) -> &dyn ReadonlyStore {
        self.inner.index_store_reader()
    }

    fn apply(&self, commitment: &[WriteOp], index: &[WriteOp]) -> TabxResult<()> {
        if self.fail_apply.load(Ordering::SeqCst) {
            return Err(TabxError::Storage("injected commit failure".to_string()));
        }
        self.inner.apply(commitment, index)
    }

    fn acquire_writer(&self) -> TabxResult<()> {
        self.inner.acquire_writer()
    }

    fn release_writer(&self) {
        self.inner.release_writer()
    }
}

/// Every (key, value) pair of both stores, for before/after comparisons.
pub fn snapshot(backend: &MemoryBackend) -> (Vec<(Vec<u8>, Vec<u8>)>, Vec<(Vec<u8>, Vec<u8>)>) {
    (backend.commitment().dump(), backend.index().dump())
}

/// Fresh in-memory backend with test logging installed.
pub fn memory_backend() -> MemoryBackend {
    tabx_core::logging::init_test();
    MemoryBackend::new()
}
