//! Key Codec: entries to and from raw store bytes.
//!
//! Every key a table owns starts with `[table id][key-space id]`:
//!
//! ```text
//! commitment store:  [table][0]      [pk parts]            -> bincode(record)
//! index store:       [table][index]  [index parts][pk parts] -> [pk parts]   (non-unique)
//!                    [table][index]  [index parts]           -> [pk parts]   (unique)
//!                    [table][u32::MAX]                       -> u64 BE       (sequence)
//! ```

pub mod index;
pub mod key;
pub mod primary;
pub mod seq;

pub use index::IndexKeyCodec;
pub use primary::PrimaryKeyCodec;
pub use seq::SeqCodec;

use crate::error::TabxResult;
use crate::record::KeyPart;

/// A record keyed by its primary key, stored in the commitment store.
#[derive(Debug, Clone, PartialEq)]
pub struct PrimaryKeyEntry<T> {
    pub type_name: &'static str,
    pub key: Vec<KeyPart>,
    pub value: T,
}

/// A secondary index entry pointing at a primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexKeyEntry {
    pub type_name: &'static str,
    pub index_id: u32,
    pub unique: bool,
    pub index_values: Vec<KeyPart>,
    pub primary_key: Vec<KeyPart>,
}

/// The persisted sequence counter of an auto-increment table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeqEntry {
    pub type_name: &'static str,
    pub value: u64,
}

/// One logical key/value unit.
#[derive(Debug, Clone, PartialEq)]
pub enum Entry<T> {
    Primary(PrimaryKeyEntry<T>),
    Index(IndexKeyEntry),
    Seq(SeqEntry),
}

/// Encoding contract shared by plain and auto-increment tables.
pub trait EntryCodec<T> {
    fn encode_entry(&self, entry: &Entry<T>) -> TabxResult<(Vec<u8>, Vec<u8>)>;

    fn decode_entry(&self, key: &[u8], value: &[u8]) -> TabxResult<Entry<T>>;
}
