//! Secondary-index entries.
//!
//! Non-unique indexes append the primary key to the index key so several
//! records may share an index value; unique indexes key on the index value
//! alone. The value is always the encoded primary key.

use crate::codec::IndexKeyEntry;
use crate::codec::key;
use crate::error::{TabxError, TabxResult};
use crate::record::{FieldSpec, IndexDescriptor, KeyPart};

#[derive(Debug, Clone)]
pub struct IndexKeyCodec {
    type_name: &'static str,
    prefix: Vec<u8>,
    index: &'static IndexDescriptor,
    pk_fields: &'static [FieldSpec],
}

impl IndexKeyCodec {
    pub fn new(
        type_name: &'static str,
        table_id: u32,
        index: &'static IndexDescriptor,
        pk_fields: &'static [FieldSpec],
    ) -> Self {
        Self {
            type_name,
            prefix: key::table_prefix(table_id, index.id),
            index,
            pk_fields,
        }
    }

    pub fn descriptor(&self) -> &'static IndexDescriptor {
        self.index
    }

    pub fn id(&self) -> u32 {
        self.index.id
    }

    pub fn is_unique(&self) -> bool {
        self.index.unique
    }

    pub fn name(&self) -> String {
        self.index.name()
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.index.fields
    }

    /// Index key for `index_values` (and `primary_key` when non-unique).
    pub fn encode_key(&self, index_values: &[KeyPart], primary_key: &[KeyPart]) -> TabxResult<Vec<u8>> {
        if index_values.len() != self.index.fields.len() {
            return Err(TabxError::Encoding(format!(
                "index '{}' needs {} values, got {}",
                self.name(),
                self.index.fields.len(),
                index_values.len()
            )));
        }
        let mut buf = self.prefix.clone();
        key::encode_parts(&mut buf, self.index.fields, index_values)?;
        if !self.index.unique {
            key::encode_parts(&mut buf, self.pk_fields, primary_key)?;
        }
        Ok(buf)
    }

    pub fn encode_value(&self, primary_key: &[KeyPart]) -> TabxResult<Vec<u8>> {
        if primary_key.len() != self.pk_fields.len() {
            return Err(TabxError::Encoding(format!(
                "primary key needs {} values, got {}",
                self.pk_fields.len(),
                primary_key.len()
            )));
        }
        let mut buf = Vec::new();
        key::encode_parts(&mut buf, self.pk_fields, primary_key)?;
        Ok(buf)
    }

    /// Scan prefix matching the leading `index_values`.
    pub fn encode_prefix(&self, index_values: &[KeyPart]) -> TabxResult<Vec<u8>> {
        let mut buf = self.prefix.clone();
        key::encode_parts(&mut buf, self.index.fields, index_values)?;
        Ok(buf)
    }

    pub fn encode_entry(&self, entry: &IndexKeyEntry) -> TabxResult<(Vec<u8>, Vec<u8>)> {
        let key = self.encode_key(&entry.index_values, &entry.primary_key)?;
        let value = self.encode_value(&entry.primary_key)?;
        Ok((key, value))
    }

    pub fn decode_entry(&self, key_bytes: &[u8], value: &[u8]) -> TabxResult<IndexKeyEntry> {
        let rest = key_bytes.strip_prefix(self.prefix.as_slice()).ok_or_else(|| {
            TabxError::Decoding(format!("key does not belong to index '{}'", self.name()))
        })?;
        let (index_values, used) = key::decode_parts(rest, self.index.fields)?;
        let primary_key = self.decode_value(value)?;
        if !self.index.unique {
            let from_key = key::decode_parts_exact(&rest[used..], self.pk_fields)?;
            if from_key != primary_key {
                return Err(TabxError::Decoding(format!(
                    "index '{}' entry key and value disagree on the primary key",
                    self.name()
                )));
            }
        } else if used != rest.len() {
            return Err(TabxError::Decoding(format!(
                "{} trailing bytes after unique index key",
                rest.len() - used
            )));
        }
        Ok(IndexKeyEntry {
            type_name: self.type_name,
            index_id: self.index.id,
            unique: self.index.unique,
            index_values,
            primary_key,
        })
    }

    /// Primary key referenced by an index entry value.
    pub fn decode_value(&self, value: &[u8]) -> TabxResult<Vec<KeyPart>> {
        key::decode_parts_exact(value, self.pk_fields)
    }
}
