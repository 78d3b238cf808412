//! Auto-increment tables: a `u64` surrogate key drawn from a persisted sequence.
//!
//! The counter lives in the index store under `[table][u32::MAX]` and is read
//! from the store on every save, never cached. A save with id `0` draws
//! `counter + 1`, writes it into the record, and stages the new counter in the
//! same batch as the record itself.

use super::{SaveMode, Table};
use crate::backend::{Backend, Context};
use crate::codec::{Entry, EntryCodec, SeqCodec};
use crate::config::TableOptions;
use crate::error::{TabxError, TabxResult};
use crate::json::{ArrayWriter, Element, decode_array};
use crate::record::{AutoIncrement, KeyPart};
use crate::storage::{ReadonlyStore, Store};
use crate::writer::BatchWriter;
use std::fmt;
use std::io::{Read, Write};
use tracing::{debug, instrument};

pub struct AutoIncrementTable<T: AutoIncrement> {
    table: Table<T>,
    seq: SeqCodec,
}

impl<T: AutoIncrement> fmt::Debug for AutoIncrementTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoIncrementTable")
            .field("table", &self.table)
            .finish()
    }
}

impl<T: AutoIncrement> AutoIncrementTable<T> {
    pub fn new() -> TabxResult<Self> {
        Self::with_options(TableOptions::default())
    }

    pub fn with_options(options: TableOptions) -> TabxResult<Self> {
        let table = Table::with_options(options)?;
        if table.descriptor().auto_increment.is_none() {
            return Err(TabxError::Schema(format!(
                "{} does not declare an auto-increment primary key",
                T::TYPE_NAME
            )));
        }
        Ok(Self {
            seq: SeqCodec::new(T::TYPE_NAME, table.table_id()),
            table,
        })
    }

    pub fn with_json_validator<F>(self, validator: F) -> Self
    where
        F: Fn(&T) -> TabxResult<()> + Send + Sync + 'static,
    {
        Self {
            table: self.table.with_json_validator(validator),
            seq: self.seq,
        }
    }

    /// The underlying plain table.
    pub fn table(&self) -> &Table<T> {
        &self.table
    }

    pub fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    pub fn table_id(&self) -> u32 {
        self.table.table_id()
    }

    pub fn get_table(&self, type_name: &str) -> Option<&Self> {
        (type_name == T::TYPE_NAME).then_some(self)
    }

    // ════════════════════════════════════════════
    // Save
    // ════════════════════════════════════════════

    /// Insert `record` (id must be `0`) and return the id it was given.
    pub fn insert_returning_id<C: Context + ?Sized>(&self, ctx: &C, record: &mut T) -> TabxResult<u64> {
        self.save_in(ctx.backend()?, record, SaveMode::Insert)
    }

    pub fn insert<C: Context + ?Sized>(&self, ctx: &C, record: &mut T) -> TabxResult<()> {
        self.save_in(ctx.backend()?, record, SaveMode::Insert)?;
        Ok(())
    }

    pub fn update<C: Context + ?Sized>(&self, ctx: &C, record: &T) -> TabxResult<()> {
        if record.auto_increment_id() == 0 {
            return Err(TabxError::PrimaryKeyInvalidOnUpdate);
        }
        self.table.save_in(ctx.backend()?, record, SaveMode::Update)
    }

    /// Insert when the id is `0`, update otherwise.
    pub fn save<C: Context + ?Sized>(&self, ctx: &C, record: &mut T) -> TabxResult<()> {
        self.save_in(ctx.backend()?, record, SaveMode::Default)?;
        Ok(())
    }

    /// One save in its own writer. Returns the new id, or `0` if the record
    /// kept its id. On failure a freshly assigned id is reset to `0`.
    #[instrument(skip(self, backend, record), fields(type_name = T::TYPE_NAME))]
    pub fn save_in(&self, backend: &dyn Backend, record: &mut T, mode: SaveMode) -> TabxResult<u64> {
        let mut writer = BatchWriter::new(backend)?;
        let new_id = self.save_with(&writer, record, mode)?;
        if let Err(err) = writer.write() {
            if new_id != 0 {
                record.set_auto_increment_id(0);
            }
            return Err(err);
        }
        Ok(new_id)
    }

    /// Stage a save in a caller-owned writer; see [`Self::save_in`].
    pub fn save_with(&self, writer: &BatchWriter<'_>, record: &mut T, mode: SaveMode) -> TabxResult<u64> {
        if record.auto_increment_id() != 0 {
            if mode == SaveMode::Insert {
                return Err(TabxError::AutoIncrementKeyAlreadySet);
            }
            self.table.save_with(writer, record, SaveMode::Update)?;
            return Ok(0);
        }
        if mode == SaveMode::Update {
            return Err(TabxError::PrimaryKeyInvalidOnUpdate);
        }

        let next = self.next_seq(writer.index_store())?;
        record.set_auto_increment_id(next);
        if let Err(err) = self.table.save_with(writer, record, SaveMode::Insert) {
            record.set_auto_increment_id(0);
            return Err(err);
        }
        self.set_seq(writer.index_store(), next)?;
        debug!(id = next, "auto-increment id assigned");
        Ok(next)
    }

    // ════════════════════════════════════════════
    // Sequence
    // ════════════════════════════════════════════

    /// Current counter value; `0` before the first insert.
    pub fn last_sequence<C: Context + ?Sized>(&self, ctx: &C) -> TabxResult<u64> {
        self.cur_seq(ctx.backend()?.index_store_reader())
    }

    fn cur_seq(&self, store: &dyn ReadonlyStore) -> TabxResult<u64> {
        let raw = store.get(self.seq.prefix())?;
        self.seq.decode_value(raw.as_deref())
    }

    fn next_seq(&self, store: &dyn ReadonlyStore) -> TabxResult<u64> {
        self.cur_seq(store)?
            .checked_add(1)
            .ok_or_else(|| TabxError::SequenceExhausted(T::TYPE_NAME.to_string()))
    }

    fn set_seq(&self, store: &dyn Store, seq: u64) -> TabxResult<()> {
        store.set(self.seq.prefix(), &self.seq.encode_value(seq))
    }

    // ════════════════════════════════════════════
    // Read / delete
    // ════════════════════════════════════════════

    pub fn get<C: Context + ?Sized>(&self, ctx: &C, id: u64) -> TabxResult<Option<T>> {
        self.table.get(ctx, &[KeyPart::U64(id)])
    }

    pub fn has<C: Context + ?Sized>(&self, ctx: &C, id: u64) -> TabxResult<bool> {
        self.table.has(ctx, &[KeyPart::U64(id)])
    }

    /// Every record, in id order.
    pub fn list<C: Context + ?Sized>(&self, ctx: &C) -> TabxResult<Vec<T>> {
        self.table.list(ctx, &[])
    }

    pub fn get_by_unique<C: Context + ?Sized>(
        &self,
        ctx: &C,
        index: &str,
        values: &[KeyPart],
    ) -> TabxResult<Option<T>> {
        self.table.get_by_unique(ctx, index, values)
    }

    pub fn list_by_index<C: Context + ?Sized>(
        &self,
        ctx: &C,
        index: &str,
        prefix: &[KeyPart],
    ) -> TabxResult<Vec<T>> {
        self.table.list_by_index(ctx, index, prefix)
    }

    /// Delete never touches the counter; ids are not reused.
    pub fn delete<C: Context + ?Sized>(&self, ctx: &C, record: &T) -> TabxResult<()> {
        self.table.delete(ctx, record)
    }

    pub fn delete_by_id<C: Context + ?Sized>(&self, ctx: &C, id: u64) -> TabxResult<()> {
        self.table.delete_by_key(ctx, &[KeyPart::U64(id)])
    }

    // ════════════════════════════════════════════
    // JSON
    // ════════════════════════════════════════════

    pub fn default_json(&self) -> String {
        self.table.default_json()
    }

    /// Check a JSON array against its own leading sequence, without a backend.
    ///
    /// Every record id must be at most the leading number (`0` when absent).
    #[instrument(skip_all, fields(type_name = T::TYPE_NAME))]
    pub fn validate_json<R: Read>(&self, reader: R) -> TabxResult<()> {
        let mut max = 0u64;
        decode_array(reader, |element: Element<T>| match element {
            Element::Sequence(seq) => {
                max = seq;
                Ok(())
            }
            Element::Record(record) => {
                check_id(record.auto_increment_id(), max)?;
                self.table.validate_record(&record)
            }
        })
    }

    /// Import a JSON array, one committed batch per element.
    ///
    /// A leading sequence is stored immediately. Records with id `0` get a
    /// fresh id; others are inserted as-is and must not exceed the sequence.
    #[instrument(skip_all, fields(type_name = T::TYPE_NAME))]
    pub fn import_json<C: Context + ?Sized, R: Read>(&self, ctx: &C, reader: R) -> TabxResult<()> {
        let backend = ctx.backend()?;
        let mut max = 0u64;
        let mut imported = 0usize;
        decode_array(reader, |element: Element<T>| {
            match element {
                Element::Sequence(seq) => {
                    let mut writer = BatchWriter::new(backend)?;
                    self.set_seq(writer.index_store(), seq)?;
                    writer.write()?;
                    max = seq;
                    debug!(seq, "sequence restored");
                }
                Element::Record(mut record) => {
                    let id = record.auto_increment_id();
                    check_id(id, max)?;
                    self.table.validate_record(&record)?;
                    if id == 0 {
                        self.save_in(backend, &mut record, SaveMode::Insert)?;
                    } else {
                        self.table.save_in(backend, &record, SaveMode::Insert)?;
                    }
                    imported += 1;
                }
            }
            Ok(())
        })?;
        debug!(imported, "JSON import finished");
        Ok(())
    }

    /// Stream the table as a JSON array led by the counter when it is non-zero.
    #[instrument(skip_all, fields(type_name = T::TYPE_NAME))]
    pub fn export_json<C: Context + ?Sized, W: Write>(&self, ctx: &C, out: W) -> TabxResult<()> {
        let backend = ctx.backend()?;
        let seq = self.cur_seq(backend.index_store_reader())?;
        let mut array = ArrayWriter::begin(out, self.table.options().json_pretty)?;
        if seq != 0 {
            array.sequence(seq)?;
        }
        let exported = self
            .table
            .export_records(backend.commitment_store_reader(), &mut array)?;
        array.finish()?;
        debug!(seq, exported, "JSON export finished");
        Ok(())
    }
}

fn check_id(id: u64, max: u64) -> TabxResult<()> {
    if id > max {
        return Err(TabxError::SequenceOutOfRange { id, max });
    }
    Ok(())
}

impl<T: AutoIncrement> EntryCodec<T> for AutoIncrementTable<T> {
    fn encode_entry(&self, entry: &Entry<T>) -> TabxResult<(Vec<u8>, Vec<u8>)> {
        match entry {
            Entry::Seq(seq) => Ok(self.seq.encode_entry(seq)),
            other => self.table.encode_entry(other),
        }
    }

    fn decode_entry(&self, key: &[u8], value: &[u8]) -> TabxResult<Entry<T>> {
        if key == self.seq.prefix() {
            return self.seq.decode_entry(key, value).map(Entry::Seq);
        }
        self.table.decode_entry(key, value)
    }
}
