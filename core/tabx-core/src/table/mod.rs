//! Table Engine: typed records over the commitment and index stores.
//!
//! [`Table`] turns a [`Record`] into a primary-key entry plus one entry per
//! secondary index, resolves the save mode against what is already stored,
//! and keeps index entries in step with every save and delete.
//! [`AutoIncrementTable`] layers a persisted `u64` sequence on top.
//!
//! Every mutating call opens its own [`BatchWriter`], stages all entries in
//! it, and commits once. Callers that want several saves in one commit use
//! the `*_with` variants against a writer they own.

mod auto_increment;
mod index;
mod json;
mod registry;

pub use auto_increment::AutoIncrementTable;
pub use registry::{AnyTable, ModuleTables};

use crate::backend::{Backend, Context};
use crate::codec::key::{self, PRIMARY_KEY_ID, SEQUENCE_ID};
use crate::codec::{Entry, EntryCodec, IndexKeyCodec, PrimaryKeyCodec, PrimaryKeyEntry};
use crate::config::TableOptions;
use crate::error::{TabxError, TabxResult};
use crate::record::{FieldSpec, KeyKind, KeyPart, Record, TableDescriptor, display_key, is_zero_key};
use crate::storage::{KeyRange, ReadonlyStore, Store};
use crate::writer::BatchWriter;
use ahash::AHashSet;
use std::fmt;
use std::marker::PhantomData;
use tracing::{debug, instrument};

/// How a save treats an existing (or missing) primary key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SaveMode {
    /// Fail if the key is already stored.
    Insert,
    /// Fail if the key is not stored.
    Update,
    /// Zero key inserts, anything else updates.
    #[default]
    Default,
    /// Insert or update, whichever the stored state calls for.
    Upsert,
}

/// Record check run by JSON validate and import.
pub type JsonValidator<T> = Box<dyn Fn(&T) -> TabxResult<()> + Send + Sync>;

/// A table of `T` records.
pub struct Table<T: Record> {
    descriptor: &'static TableDescriptor,
    primary: PrimaryKeyCodec,
    indexes: Vec<IndexKeyCodec>,
    options: TableOptions,
    validator: Option<JsonValidator<T>>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record> fmt::Debug for Table<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("type_name", &T::TYPE_NAME)
            .field("table_id", &self.descriptor.table_id)
            .field("indexes", &self.indexes.len())
            .finish()
    }
}

impl<T: Record> Table<T> {
    // ════════════════════════════════════════════
    // Construction
    // ════════════════════════════════════════════

    pub fn new() -> TabxResult<Self> {
        Self::with_options(TableOptions::default())
    }

    /// Build the table, checking the record's descriptor and the options.
    pub fn with_options(options: TableOptions) -> TabxResult<Self> {
        options.validate()?;
        let descriptor = T::descriptor();
        check_descriptor(T::TYPE_NAME, descriptor)?;

        let primary = PrimaryKeyCodec::new(descriptor.table_id, descriptor.primary_key);
        let indexes = descriptor
            .indexes
            .iter()
            .map(|index| {
                IndexKeyCodec::new(
                    T::TYPE_NAME,
                    descriptor.table_id,
                    index,
                    descriptor.primary_key,
                )
            })
            .collect();

        debug!(
            type_name = T::TYPE_NAME,
            table_id = descriptor.table_id,
            indexes = descriptor.indexes.len(),
            "table opened"
        );
        Ok(Self {
            descriptor,
            primary,
            indexes,
            options,
            validator: None,
            _record: PhantomData,
        })
    }

    /// Replace the default JSON validator.
    pub fn with_json_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&T) -> TabxResult<()> + Send + Sync + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    pub fn table_id(&self) -> u32 {
        self.descriptor.table_id
    }

    pub fn descriptor(&self) -> &'static TableDescriptor {
        self.descriptor
    }

    pub fn options(&self) -> &TableOptions {
        &self.options
    }

    /// `Some(self)` when `type_name` names this table.
    pub fn get_table(&self, type_name: &str) -> Option<&Self> {
        (type_name == T::TYPE_NAME).then_some(self)
    }

    /// Primary key values of `record`.
    pub fn primary_key(&self, record: &T) -> TabxResult<Vec<KeyPart>> {
        record.key_values(self.descriptor.primary_key)
    }

    /// Look up a secondary index by name (its fields joined with `,`).
    pub fn index(&self, name: &str) -> TabxResult<&IndexKeyCodec> {
        self.indexes
            .iter()
            .find(|codec| codec.name() == name)
            .ok_or_else(|| TabxError::IndexNotFound {
                type_name: T::TYPE_NAME.to_string(),
                index: name.to_string(),
            })
    }

    // ════════════════════════════════════════════
    // Save
    // ════════════════════════════════════════════

    pub fn insert<C: Context + ?Sized>(&self, ctx: &C, record: &T) -> TabxResult<()> {
        self.save_in(ctx.backend()?, record, SaveMode::Insert)
    }

    pub fn update<C: Context + ?Sized>(&self, ctx: &C, record: &T) -> TabxResult<()> {
        self.save_in(ctx.backend()?, record, SaveMode::Update)
    }

    /// Save with [`SaveMode::Default`]: a zero primary key inserts.
    pub fn save<C: Context + ?Sized>(&self, ctx: &C, record: &T) -> TabxResult<()> {
        self.save_in(ctx.backend()?, record, SaveMode::Default)
    }

    pub fn upsert<C: Context + ?Sized>(&self, ctx: &C, record: &T) -> TabxResult<()> {
        self.save_in(ctx.backend()?, record, SaveMode::Upsert)
    }

    /// One save in its own writer, committed on success.
    #[instrument(skip(self, backend, record), fields(type_name = T::TYPE_NAME))]
    pub fn save_in(&self, backend: &dyn Backend, record: &T, mode: SaveMode) -> TabxResult<()> {
        let mut writer = BatchWriter::new(backend)?;
        self.save_with(&writer, record, mode)?;
        writer.write()
    }

    /// Stage a save in a caller-owned writer.
    ///
    /// Nothing is staged when the save fails; the writer stays usable.
    pub fn save_with(&self, writer: &BatchWriter<'_>, record: &T, mode: SaveMode) -> TabxResult<()> {
        let primary_key = self.primary_key(record)?;
        let key = self.primary.encode_key(&primary_key)?;
        let existing = writer.commitment_store().get(&key)?;

        let mode = match mode {
            SaveMode::Default if is_zero_key(&primary_key) => SaveMode::Insert,
            SaveMode::Default => SaveMode::Update,
            SaveMode::Upsert if existing.is_some() => SaveMode::Update,
            SaveMode::Upsert => SaveMode::Insert,
            explicit => explicit,
        };
        match (mode, &existing) {
            (SaveMode::Insert, Some(_)) => {
                return Err(TabxError::AlreadyExists {
                    type_name: T::TYPE_NAME.to_string(),
                    key: display_key(&primary_key),
                });
            }
            (SaveMode::Update, None) => {
                return Err(TabxError::NotFound {
                    type_name: T::TYPE_NAME.to_string(),
                    key: display_key(&primary_key),
                });
            }
            _ => {}
        }

        let old: Option<T> = match &existing {
            Some(bytes) => Some(self.primary.decode_value(bytes)?),
            None => None,
        };
        let value = self.primary.encode_value(record)?;
        let index_ops = index::plan_save(
            &self.indexes,
            writer.index_store(),
            old.as_ref(),
            record,
            &primary_key,
        )?;

        writer.commitment_store().set(&key, &value)?;
        for op in &index_ops {
            op.apply_to(writer.index_store())?;
        }
        debug!(
            ?mode,
            key = %display_key(&primary_key),
            index_ops = index_ops.len(),
            "record staged"
        );
        Ok(())
    }

    // ════════════════════════════════════════════
    // Delete
    // ════════════════════════════════════════════

    /// Remove `record` (by its primary key) and its index entries.
    pub fn delete<C: Context + ?Sized>(&self, ctx: &C, record: &T) -> TabxResult<()> {
        let primary_key = self.primary_key(record)?;
        self.delete_by_key(ctx, &primary_key)
    }

    /// Remove the record stored under `primary_key`; absent keys are a no-op.
    #[instrument(skip(self, ctx), fields(type_name = T::TYPE_NAME))]
    pub fn delete_by_key<C: Context + ?Sized>(&self, ctx: &C, primary_key: &[KeyPart]) -> TabxResult<()> {
        let mut writer = BatchWriter::new(ctx.backend()?)?;
        self.delete_with(&writer, primary_key)?;
        writer.write()
    }

    /// Stage a delete in a caller-owned writer. Returns whether a record was found.
    pub fn delete_with(&self, writer: &BatchWriter<'_>, primary_key: &[KeyPart]) -> TabxResult<bool> {
        let key = self.primary.encode_key(primary_key)?;
        let Some(bytes) = writer.commitment_store().get(&key)? else {
            return Ok(false);
        };
        let old: T = self.primary.decode_value(&bytes)?;
        let index_ops = index::plan_delete(&self.indexes, &old, primary_key)?;

        writer.commitment_store().delete(&key)?;
        for op in &index_ops {
            op.apply_to(writer.index_store())?;
        }
        debug!(key = %display_key(primary_key), "record delete staged");
        Ok(true)
    }

    // ════════════════════════════════════════════
    // Read
    // ════════════════════════════════════════════

    pub fn get<C: Context + ?Sized>(&self, ctx: &C, primary_key: &[KeyPart]) -> TabxResult<Option<T>> {
        self.get_from(ctx.backend()?.commitment_store_reader(), primary_key)
    }

    pub fn has<C: Context + ?Sized>(&self, ctx: &C, primary_key: &[KeyPart]) -> TabxResult<bool> {
        let key = self.primary.encode_key(primary_key)?;
        ctx.backend()?.commitment_store_reader().has(&key)
    }

    /// Records whose primary key starts with `prefix`, in key order.
    pub fn list<C: Context + ?Sized>(&self, ctx: &C, prefix: &[KeyPart]) -> TabxResult<Vec<T>> {
        let start = self.primary.encode_prefix(prefix)?;
        ctx.backend()?
            .commitment_store_reader()
            .scan(&KeyRange::prefix(&start), None)?
            .into_iter()
            .map(|(_, value)| self.primary.decode_value(&value))
            .collect()
    }

    /// Point lookup through a unique index.
    pub fn get_by_unique<C: Context + ?Sized>(
        &self,
        ctx: &C,
        index: &str,
        values: &[KeyPart],
    ) -> TabxResult<Option<T>> {
        let codec = self.index(index)?;
        if !codec.is_unique() {
            return Err(TabxError::Schema(format!(
                "{}: index '{}' is not unique",
                T::TYPE_NAME,
                index
            )));
        }
        let backend = ctx.backend()?;
        let key = codec.encode_key(values, &[])?;
        match backend.index_store_reader().get(&key)? {
            Some(value) => {
                let primary_key = codec.decode_value(&value)?;
                self.resolve(backend.commitment_store_reader(), &primary_key)
                    .map(Some)
            }
            None => Ok(None),
        }
    }

    /// Records whose `index` values start with `prefix`, in index order.
    pub fn list_by_index<C: Context + ?Sized>(
        &self,
        ctx: &C,
        index: &str,
        prefix: &[KeyPart],
    ) -> TabxResult<Vec<T>> {
        let codec = self.index(index)?;
        let backend = ctx.backend()?;
        let start = codec.encode_prefix(prefix)?;
        backend
            .index_store_reader()
            .scan(&KeyRange::prefix(&start), None)?
            .into_iter()
            .map(|(_, value)| {
                let primary_key = codec.decode_value(&value)?;
                self.resolve(backend.commitment_store_reader(), &primary_key)
            })
            .collect()
    }

    fn get_from(&self, store: &dyn ReadonlyStore, primary_key: &[KeyPart]) -> TabxResult<Option<T>> {
        let key = self.primary.encode_key(primary_key)?;
        match store.get(&key)? {
            Some(bytes) => self.primary.decode_value(&bytes).map(Some),
            None => Ok(None),
        }
    }

    /// Fetch the record an index entry points at; a missing one is corruption.
    fn resolve(&self, store: &dyn ReadonlyStore, primary_key: &[KeyPart]) -> TabxResult<T> {
        self.get_from(store, primary_key)?.ok_or_else(|| {
            TabxError::Decoding(format!(
                "{}: index entry points at missing record {}",
                T::TYPE_NAME,
                display_key(primary_key)
            ))
        })
    }

    pub(crate) fn primary_codec(&self) -> &PrimaryKeyCodec {
        &self.primary
    }
}

impl<T: Record> EntryCodec<T> for Table<T> {
    fn encode_entry(&self, entry: &Entry<T>) -> TabxResult<(Vec<u8>, Vec<u8>)> {
        match entry {
            Entry::Primary(entry) => {
                let key = self.primary.encode_key(&entry.key)?;
                let value = self.primary.encode_value(&entry.value)?;
                Ok((key, value))
            }
            Entry::Index(entry) => {
                let codec = self
                    .indexes
                    .iter()
                    .find(|codec| codec.id() == entry.index_id)
                    .ok_or_else(|| TabxError::IndexNotFound {
                        type_name: T::TYPE_NAME.to_string(),
                        index: entry.index_id.to_string(),
                    })?;
                codec.encode_entry(entry)
            }
            Entry::Seq(_) => Err(TabxError::UnsupportedEntry(format!(
                "{} has no sequence",
                T::TYPE_NAME
            ))),
        }
    }

    fn decode_entry(&self, key_bytes: &[u8], value: &[u8]) -> TabxResult<Entry<T>> {
        let (table_id, space_id, _) = key::split_prefix(key_bytes)?;
        if table_id != self.descriptor.table_id {
            return Err(TabxError::Decoding(format!(
                "key belongs to table {table_id}, not {} ({})",
                T::TYPE_NAME,
                self.descriptor.table_id
            )));
        }
        match space_id {
            PRIMARY_KEY_ID => Ok(Entry::Primary(PrimaryKeyEntry {
                type_name: T::TYPE_NAME,
                key: self.primary.decode_key(key_bytes)?,
                value: self.primary.decode_value(value)?,
            })),
            SEQUENCE_ID => Err(TabxError::UnsupportedEntry(format!(
                "{} has no sequence",
                T::TYPE_NAME
            ))),
            id => {
                let codec = self
                    .indexes
                    .iter()
                    .find(|codec| codec.id() == id)
                    .ok_or_else(|| {
                        TabxError::Decoding(format!("{}: unknown index id {id}", T::TYPE_NAME))
                    })?;
                codec.decode_entry(key_bytes, value).map(Entry::Index)
            }
        }
    }
}

fn check_descriptor(type_name: &str, descriptor: &TableDescriptor) -> TabxResult<()> {
    let schema = |msg: String| Err(TabxError::Schema(format!("{type_name}: {msg}")));

    if descriptor.primary_key.is_empty() {
        return schema("primary key has no fields".to_string());
    }
    let mut ids = AHashSet::new();
    for index in descriptor.indexes {
        if index.fields.is_empty() {
            return schema(format!("index {} has no fields", index.id));
        }
        if index.id == PRIMARY_KEY_ID || index.id == SEQUENCE_ID {
            return schema(format!("index id {} is reserved", index.id));
        }
        if !ids.insert(index.id) {
            return schema(format!("duplicate index id {}", index.id));
        }
    }
    if let Some(field) = descriptor.auto_increment {
        match descriptor.primary_key {
            [FieldSpec {
                name,
                kind: KeyKind::U64,
            }] if *name == field => {}
            _ => {
                return schema(format!(
                    "auto-increment field '{field}' must be the sole u64 primary key field"
                ));
            }
        }
    }
    Ok(())
}
