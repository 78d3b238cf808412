//! # TABX: typed record tables over an ordered key-value store
//!
//! TABX maps serde records onto two raw ordered stores: a *commitment store*
//! holding the records themselves and an *index store* holding secondary
//! indexes and auto-increment sequence counters. Tables provide primary keys,
//! `u64` auto-increment surrogate keys, unique and non-unique secondary
//! indexes, atomic multi-write commits, and a streaming JSON bulk format.
//!
//! ## Quick start
//!
//! ```rust
//! use serde::{Deserialize, Serialize};
//! use tabx_core::{AutoIncrementTable, MemoryBackend, Record};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Record)]
//! #[tabx(type_name = "demo.Person", table_id = 1)]
//! #[tabx(primary_key(fields = "id", auto_increment))]
//! #[tabx(index(id = 1, fields = "name"))]
//! struct Person {
//!     id: u64,
//!     name: String,
//! }
//!
//! # fn main() -> tabx_core::TabxResult<()> {
//! let backend = MemoryBackend::new();
//! let people = AutoIncrementTable::<Person>::new()?;
//!
//! let mut alice = Person { id: 0, name: "alice".into() };
//! let id = people.insert_returning_id(&backend, &mut alice)?;
//! assert_eq!(id, 1);
//! assert_eq!(people.get(&backend, 1)?.map(|p| p.name), Some("alice".into()));
//!
//! let mut json = Vec::new();
//! people.export_json(&backend, &mut json)?;
//! assert_eq!(json, b"[1,\n{\"id\":1,\"name\":\"alice\"}]");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Table / AutoIncrementTable ──► BatchWriter ──► Backend ──► Store (commitment, index)
//!            │                        ▲
//!            └── codec (keys) ────────┘
//! ```
//!
//! ## Modules
//!
//! - [`record`]: the [`Record`] trait and key metadata
//! - [`codec`]: order-preserving key encoding, entry codecs
//! - [`storage`]: store traits, [`MemoryBackend`], [`SledBackend`]
//! - [`backend`]: [`Backend`] and [`Context`]
//! - [`writer`]: [`BatchWriter`]
//! - [`table`]: [`Table`], [`AutoIncrementTable`], [`ModuleTables`]
//! - [`json`]: streaming JSON array codec

extern crate self as tabx_core;

pub mod backend;
pub mod codec;
pub mod config;
pub mod error;
pub mod json;
pub mod record;
pub mod storage;
pub mod table;
pub mod writer;

// Logging utilities
pub mod logging;

// Re-export commonly used types
pub use backend::{Backend, Context, RequestContext};
pub use codec::{Entry, EntryCodec, IndexKeyEntry, PrimaryKeyEntry, SeqEntry};
pub use config::TableOptions;
pub use error::{ErrorClass, TabxError, TabxResult};
pub use record::{
    AutoIncrement, FieldSpec, IndexDescriptor, KeyField, KeyKind, KeyPart, Record, TableDescriptor,
};
pub use storage::memory::MemoryBackend;
pub use storage::sled_store::SledBackend;
pub use storage::{KeyRange, ReadonlyStore, Store};
pub use table::{AnyTable, AutoIncrementTable, JsonValidator, ModuleTables, SaveMode, Table};
pub use writer::BatchWriter;

// Re-export derive macro
pub use tabx_derive::Record;
