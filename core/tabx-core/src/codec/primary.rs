//! Primary-key entries: `[table][0][pk parts] -> bincode(record)`.

use crate::codec::key::{self, PRIMARY_KEY_ID};
use crate::error::{TabxError, TabxResult};
use crate::record::{FieldSpec, KeyPart};
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, Clone)]
pub struct PrimaryKeyCodec {
    prefix: Vec<u8>,
    fields: &'static [FieldSpec],
}

impl PrimaryKeyCodec {
    pub fn new(table_id: u32, fields: &'static [FieldSpec]) -> Self {
        Self {
            prefix: key::table_prefix(table_id, PRIMARY_KEY_ID),
            fields,
        }
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    /// Full primary key; `parts` must cover every key field.
    pub fn encode_key(&self, parts: &[KeyPart]) -> TabxResult<Vec<u8>> {
        if parts.len() != self.fields.len() {
            return Err(TabxError::Encoding(format!(
                "primary key needs {} values, got {}",
                self.fields.len(),
                parts.len()
            )));
        }
        self.encode_prefix(parts)
    }

    /// Key prefix covering the leading `parts` of the primary key.
    pub fn encode_prefix(&self, parts: &[KeyPart]) -> TabxResult<Vec<u8>> {
        let mut buf = self.prefix.clone();
        key::encode_parts(&mut buf, self.fields, parts)?;
        Ok(buf)
    }

    pub fn decode_key(&self, bytes: &[u8]) -> TabxResult<Vec<KeyPart>> {
        let rest = bytes.strip_prefix(self.prefix.as_slice()).ok_or_else(|| {
            TabxError::Decoding("key does not belong to this table's primary key".to_string())
        })?;
        key::decode_parts_exact(rest, self.fields)
    }

    pub fn encode_value<T: Serialize>(&self, record: &T) -> TabxResult<Vec<u8>> {
        bincode::serialize(record).map_err(|e| TabxError::Encoding(e.to_string()))
    }

    pub fn decode_value<T: DeserializeOwned>(&self, bytes: &[u8]) -> TabxResult<T> {
        bincode::deserialize(bytes).map_err(|e| TabxError::Decoding(e.to_string()))
    }
}
