//! JSON Bulk Protocol: streaming array codec shared by every table.
//!
//! A table exports as one JSON array:
//!
//! ```text
//! [<sequence>,
//! {record},
//! {record}]
//! ```
//!
//! The leading bare number appears only for auto-increment tables whose
//! counter is non-zero. Decoding walks the array element by element through a
//! serde visitor and hands each one to a callback; a callback error stops the
//! walk and is returned as-is.

use crate::error::{TabxError, TabxResult};
use serde::Serialize;
use serde::de::{self, DeserializeOwned, SeqAccess, Visitor};
use std::fmt;
use std::io::{Read, Write};
use std::marker::PhantomData;

/// One decoded array element.
#[derive(Debug, Clone, PartialEq)]
pub enum Element<T> {
    /// Leading sequence counter.
    Sequence(u64),
    Record(T),
}

/// Walk a JSON array from `reader`, calling `handle` for every element.
///
/// Only the first element may be a bare unsigned number; anywhere else a
/// number fails as a record decode error.
pub fn decode_array<T, R, F>(reader: R, mut handle: F) -> TabxResult<()>
where
    T: DeserializeOwned,
    R: Read,
    F: FnMut(Element<T>) -> TabxResult<()>,
{
    let mut de = serde_json::Deserializer::from_reader(reader);
    let mut failure = None;
    let result = de::Deserializer::deserialize_seq(
        &mut de,
        ArrayVisitor {
            handle: &mut handle,
            failure: &mut failure,
            _record: PhantomData,
        },
    );
    if let Some(err) = failure {
        return Err(err);
    }
    result.map_err(|e| TabxError::JsonImport(e.to_string()))?;
    de.end().map_err(|e| TabxError::JsonImport(e.to_string()))
}

struct ArrayVisitor<'a, T, F> {
    handle: &'a mut F,
    failure: &'a mut Option<TabxError>,
    _record: PhantomData<fn() -> T>,
}

impl<'de, T, F> Visitor<'de> for ArrayVisitor<'_, T, F>
where
    T: DeserializeOwned,
    F: FnMut(Element<T>) -> TabxResult<()>,
{
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON array of records, optionally led by a sequence number")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<(), A::Error> {
        let mut position = 0usize;
        while let Some(value) = seq.next_element::<serde_json::Value>()? {
            let outcome = classify(value, position).and_then(|element| (self.handle)(element));
            if let Err(err) = outcome {
                *self.failure = Some(err);
                return Err(de::Error::custom("JSON import aborted"));
            }
            position += 1;
        }
        Ok(())
    }
}

fn classify<T: DeserializeOwned>(value: serde_json::Value, position: usize) -> TabxResult<Element<T>> {
    if position == 0 && value.is_number() {
        return value.as_u64().map(Element::Sequence).ok_or_else(|| {
            TabxError::JsonImport(format!("sequence number must be an unsigned integer, got {value}"))
        });
    }
    serde_json::from_value(value)
        .map(Element::Record)
        .map_err(|e| TabxError::JsonImport(format!("element {position}: {e}")))
}

/// Incremental writer for the exported array.
pub struct ArrayWriter<W: Write> {
    out: W,
    pretty: bool,
    first: bool,
}

impl<W: Write> ArrayWriter<W> {
    pub fn begin(mut out: W, pretty: bool) -> TabxResult<Self> {
        out.write_all(b"[")?;
        Ok(Self {
            out,
            pretty,
            first: true,
        })
    }

    fn separate(&mut self) -> TabxResult<()> {
        if !self.first {
            self.out.write_all(b",\n")?;
        }
        self.first = false;
        Ok(())
    }

    pub fn sequence(&mut self, seq: u64) -> TabxResult<()> {
        self.separate()?;
        write!(self.out, "{seq}")?;
        Ok(())
    }

    pub fn record<S: Serialize>(&mut self, record: &S) -> TabxResult<()> {
        self.separate()?;
        if self.pretty {
            serde_json::to_writer_pretty(&mut self.out, record)?;
        } else {
            serde_json::to_writer(&mut self.out, record)?;
        }
        Ok(())
    }

    pub fn finish(mut self) -> TabxResult<W> {
        self.out.write_all(b"]")?;
        self.out.flush()?;
        Ok(self.out)
    }
}

/// Serde helper for byte fields: base64 in JSON, raw bytes elsewhere.
///
/// ```ignore
/// #[serde(with = "tabx_core::json::base64_bytes")]
/// payload: Vec<u8>,
/// ```
pub mod base64_bytes {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&STANDARD.encode(bytes))
        } else {
            serializer.serialize_bytes(bytes)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        if deserializer.is_human_readable() {
            let encoded = String::deserialize(deserializer)?;
            STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
        } else {
            Vec::<u8>::deserialize(deserializer)
        }
    }
}
