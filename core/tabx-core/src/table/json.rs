//! JSON import/export/validate for plain tables.

use super::{SaveMode, Table};
use crate::backend::Context;
use crate::error::{TabxError, TabxResult};
use crate::json::{ArrayWriter, Element, decode_array};
use crate::record::{FieldSpec, Record};
use crate::storage::{KeyRange, ReadonlyStore};
use std::io::{Read, Write};
use tracing::{debug, instrument};

impl<T: Record> Table<T> {
    /// JSON for an empty table.
    pub fn default_json(&self) -> String {
        "[]".to_string()
    }

    /// Check `record` the way JSON import will.
    ///
    /// Runs the custom validator when one is set; otherwise checks that every
    /// key field is set and encodable.
    pub fn validate_record(&self, record: &T) -> TabxResult<()> {
        if let Some(validator) = &self.validator {
            return validator(record);
        }
        let descriptor = self.descriptor;
        let check = |fields: &[FieldSpec]| {
            record
                .key_values(fields)
                .map_err(|e| TabxError::JsonValidation(format!("{}: {e}", T::TYPE_NAME)))
        };
        check(descriptor.primary_key)?;
        for index in descriptor.indexes {
            check(index.fields)?;
        }
        Ok(())
    }

    /// Decode and validate every record of a JSON array without touching a backend.
    #[instrument(skip_all, fields(type_name = T::TYPE_NAME))]
    pub fn validate_json<R: Read>(&self, reader: R) -> TabxResult<()> {
        decode_array(reader, |element: Element<T>| match element {
            Element::Sequence(_) => Err(unexpected_sequence::<T>()),
            Element::Record(record) => self.validate_record(&record),
        })
    }

    /// Upsert every record of a JSON array, one committed batch per record.
    #[instrument(skip_all, fields(type_name = T::TYPE_NAME))]
    pub fn import_json<C: Context + ?Sized, R: Read>(&self, ctx: &C, reader: R) -> TabxResult<()> {
        let backend = ctx.backend()?;
        let mut imported = 0usize;
        decode_array(reader, |element: Element<T>| match element {
            Element::Sequence(_) => Err(unexpected_sequence::<T>()),
            Element::Record(record) => {
                self.validate_record(&record)?;
                self.save_in(backend, &record, SaveMode::Upsert)?;
                imported += 1;
                Ok(())
            }
        })?;
        debug!(imported, "JSON import finished");
        Ok(())
    }

    /// Stream every record, in primary-key order, as a JSON array.
    #[instrument(skip_all, fields(type_name = T::TYPE_NAME))]
    pub fn export_json<C: Context + ?Sized, W: Write>(&self, ctx: &C, out: W) -> TabxResult<()> {
        let backend = ctx.backend()?;
        let mut array = ArrayWriter::begin(out, self.options.json_pretty)?;
        let exported = self.export_records(backend.commitment_store_reader(), &mut array)?;
        array.finish()?;
        debug!(exported, "JSON export finished");
        Ok(())
    }

    /// Write every stored record to `array`, one scan page at a time.
    pub(crate) fn export_records<W: Write>(
        &self,
        store: &dyn ReadonlyStore,
        array: &mut ArrayWriter<W>,
    ) -> TabxResult<usize> {
        let range = KeyRange::prefix(self.primary_codec().prefix());
        let page_size = self.options.export_page_size;
        let mut page = store.scan(&range, Some(page_size))?;
        let mut exported = 0;
        loop {
            for (_, value) in &page {
                let record: T = self.primary_codec().decode_value(value)?;
                array.record(&record)?;
            }
            exported += page.len();
            if page.len() < page_size {
                break;
            }
            let Some((last, _)) = page.last() else {
                break;
            };
            let next = range.after(last);
            page = store.scan(&next, Some(page_size))?;
        }
        Ok(exported)
    }
}

fn unexpected_sequence<T: Record>() -> TabxError {
    TabxError::JsonImport(format!(
        "{} has no auto-increment sequence; a leading number is not allowed",
        T::TYPE_NAME
    ))
}
