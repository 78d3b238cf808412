//! Sequence counter entry: `[table][u32::MAX] -> u64 BE`.

use crate::codec::SeqEntry;
use crate::codec::key::{self, SEQUENCE_ID};
use crate::error::{TabxError, TabxResult};

#[derive(Debug, Clone)]
pub struct SeqCodec {
    type_name: &'static str,
    prefix: Vec<u8>,
}

impl SeqCodec {
    pub fn new(type_name: &'static str, table_id: u32) -> Self {
        Self {
            type_name,
            prefix: key::table_prefix(table_id, SEQUENCE_ID),
        }
    }

    /// The fixed key the counter lives under.
    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn encode_value(&self, seq: u64) -> Vec<u8> {
        seq.to_be_bytes().to_vec()
    }

    /// Missing or empty value decodes as `0`.
    pub fn decode_value(&self, bytes: Option<&[u8]>) -> TabxResult<u64> {
        match bytes {
            None | Some([]) => Ok(0),
            Some(raw) => {
                let raw: [u8; 8] = raw.try_into().map_err(|_| {
                    TabxError::Decoding(format!(
                        "sequence value for {} must be 8 bytes, got {}",
                        self.type_name,
                        raw.len()
                    ))
                })?;
                Ok(u64::from_be_bytes(raw))
            }
        }
    }

    pub fn encode_entry(&self, entry: &SeqEntry) -> (Vec<u8>, Vec<u8>) {
        (self.prefix.clone(), self.encode_value(entry.value))
    }

    pub fn decode_entry(&self, key: &[u8], value: &[u8]) -> TabxResult<SeqEntry> {
        if key != self.prefix.as_slice() {
            return Err(TabxError::Decoding(format!(
                "key is not the sequence key of {}",
                self.type_name
            )));
        }
        Ok(SeqEntry {
            type_name: self.type_name,
            value: self.decode_value(Some(value))?,
        })
    }
}
