//! Record model: typed rows and their key metadata.
//!
//! A table stores one [`Record`] type. The record describes which of its
//! fields form the primary key and each secondary index through a static
//! [`TableDescriptor`], and exposes those fields as [`KeyPart`]s. Both are
//! normally generated by `#[derive(Record)]`; no runtime reflection is used.

use crate::error::{TabxError, TabxResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// Primitive types that may appear in a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyKind {
    Bool,
    U32,
    U64,
    I32,
    I64,
    String,
    Bytes,
}

/// One field value inside an encoded key.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum KeyPart {
    Bool(bool),
    U32(u32),
    U64(u64),
    I32(i32),
    I64(i64),
    String(String),
    Bytes(Vec<u8>),
}

impl KeyPart {
    pub fn kind(&self) -> KeyKind {
        match self {
            KeyPart::Bool(_) => KeyKind::Bool,
            KeyPart::U32(_) => KeyKind::U32,
            KeyPart::U64(_) => KeyKind::U64,
            KeyPart::I32(_) => KeyKind::I32,
            KeyPart::I64(_) => KeyKind::I64,
            KeyPart::String(_) => KeyKind::String,
            KeyPart::Bytes(_) => KeyKind::Bytes,
        }
    }

    /// Whether this is the zero value of its kind.
    pub fn is_zero(&self) -> bool {
        match self {
            KeyPart::Bool(v) => !*v,
            KeyPart::U32(v) => *v == 0,
            KeyPart::U64(v) => *v == 0,
            KeyPart::I32(v) => *v == 0,
            KeyPart::I64(v) => *v == 0,
            KeyPart::String(v) => v.is_empty(),
            KeyPart::Bytes(v) => v.is_empty(),
        }
    }
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Bool(v) => write!(f, "{v}"),
            KeyPart::U32(v) => write!(f, "{v}"),
            KeyPart::U64(v) => write!(f, "{v}"),
            KeyPart::I32(v) => write!(f, "{v}"),
            KeyPart::I64(v) => write!(f, "{v}"),
            KeyPart::String(v) => write!(f, "{v:?}"),
            KeyPart::Bytes(v) => {
                f.write_str("0x")?;
                for b in v {
                    write!(f, "{b:02x}")?;
                }
                Ok(())
            }
        }
    }
}

/// Render a composite key for error messages, e.g. `[1, "alice"]`.
pub fn display_key(parts: &[KeyPart]) -> String {
    let inner: Vec<String> = parts.iter().map(ToString::to_string).collect();
    format!("[{}]", inner.join(", "))
}

/// Whether every part of a composite key is the zero value.
pub fn is_zero_key(parts: &[KeyPart]) -> bool {
    parts.iter().all(KeyPart::is_zero)
}

macro_rules! key_part_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for KeyPart {
                fn from(v: $ty) -> Self {
                    KeyPart::$variant(v)
                }
            }
        )*
    };
}

key_part_from! {
    bool => Bool,
    u32 => U32,
    u64 => U64,
    i32 => I32,
    i64 => I64,
    String => String,
    Vec<u8> => Bytes,
}

impl From<&str> for KeyPart {
    fn from(v: &str) -> Self {
        KeyPart::String(v.to_string())
    }
}

impl From<&[u8]> for KeyPart {
    fn from(v: &[u8]) -> Self {
        KeyPart::Bytes(v.to_vec())
    }
}

/// A Rust field type usable as key material.
///
/// `Option<T>` fields report `None` as unset, which makes the record
/// unencodable while the field is missing.
pub trait KeyField {
    const KIND: KeyKind;

    fn key_part(&self) -> Option<KeyPart>;
}

macro_rules! key_field {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            impl KeyField for $ty {
                const KIND: KeyKind = KeyKind::$kind;

                fn key_part(&self) -> Option<KeyPart> {
                    Some(KeyPart::$kind(self.clone()))
                }
            }
        )*
    };
}

key_field! {
    bool => Bool,
    u32 => U32,
    u64 => U64,
    i32 => I32,
    i64 => I64,
    String => String,
    Vec<u8> => Bytes,
}

impl<T: KeyField> KeyField for Option<T> {
    const KIND: KeyKind = T::KIND;

    fn key_part(&self) -> Option<KeyPart> {
        self.as_ref().and_then(KeyField::key_part)
    }
}

/// A named key field and its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: KeyKind,
}

/// A secondary index declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexDescriptor {
    /// Index id, unique within the table; `0` is reserved for the primary key.
    pub id: u32,
    pub fields: &'static [FieldSpec],
    /// At most one record per index value.
    pub unique: bool,
}

impl IndexDescriptor {
    /// Index name: its field names joined with `,`.
    pub fn name(&self) -> String {
        field_names(self.fields)
    }
}

/// Static storage layout of one record type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Numeric table id; prefixes every key the table owns.
    pub table_id: u32,
    pub primary_key: &'static [FieldSpec],
    pub indexes: &'static [IndexDescriptor],
    /// Name of the auto-increment surrogate field, if any.
    pub auto_increment: Option<&'static str>,
}

pub(crate) fn field_names(fields: &[FieldSpec]) -> String {
    fields.iter().map(|f| f.name).collect::<Vec<_>>().join(",")
}

/// A typed record stored in a table.
pub trait Record: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    /// Fully-qualified type name; the table's identity.
    const TYPE_NAME: &'static str;

    fn descriptor() -> &'static TableDescriptor;

    /// Value of a key field, `None` when the field is unknown or unset.
    fn key_part(&self, field: &str) -> Option<KeyPart>;

    /// Values of `fields` in order, failing on an unset or mistyped field.
    fn key_values(&self, fields: &[FieldSpec]) -> TabxResult<Vec<KeyPart>> {
        fields
            .iter()
            .map(|spec| {
                let part = self.key_part(spec.name).ok_or_else(|| {
                    TabxError::Encoding(format!(
                        "{}: required key field '{}' is unset",
                        Self::TYPE_NAME,
                        spec.name
                    ))
                })?;
                if part.kind() != spec.kind {
                    return Err(TabxError::Encoding(format!(
                        "{}: key field '{}' is {:?}, expected {:?}",
                        Self::TYPE_NAME,
                        spec.name,
                        part.kind(),
                        spec.kind
                    )));
                }
                Ok(part)
            })
            .collect()
    }
}

/// Typed accessor for an auto-increment `u64` surrogate key.
pub trait AutoIncrement: Record {
    fn auto_increment_id(&self) -> u64;

    fn set_auto_increment_id(&mut self, id: u64);
}
