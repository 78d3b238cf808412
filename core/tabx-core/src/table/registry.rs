//! Module-level table registry: route by type name, bulk JSON per module.

use super::{AutoIncrementTable, Table};
use crate::backend::Context;
use crate::error::{TabxError, TabxResult};
use crate::record::{AutoIncrement, Record};
use ahash::{AHashMap, AHashSet};
use std::any::Any;
use std::io::{Read, Write};
use tracing::{debug, instrument};

/// Object-safe view of a table, for registries holding mixed record types.
pub trait AnyTable: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn table_id(&self) -> u32;

    /// `Some(self)` when `type_name` names this table.
    fn get_table(&self, type_name: &str) -> Option<&dyn AnyTable>;

    fn export_json(&self, ctx: &dyn Context, out: &mut dyn Write) -> TabxResult<()>;

    fn import_json(&self, ctx: &dyn Context, input: &mut dyn Read) -> TabxResult<()>;

    fn validate_json(&self, input: &mut dyn Read) -> TabxResult<()>;

    fn default_json(&self) -> String;

    fn as_any(&self) -> &dyn Any;
}

impl<T: Record> AnyTable for Table<T> {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn table_id(&self) -> u32 {
        Table::table_id(self)
    }

    fn get_table(&self, type_name: &str) -> Option<&dyn AnyTable> {
        Table::get_table(self, type_name).map(|t| t as &dyn AnyTable)
    }

    fn export_json(&self, ctx: &dyn Context, out: &mut dyn Write) -> TabxResult<()> {
        Table::export_json(self, ctx, out)
    }

    fn import_json(&self, ctx: &dyn Context, input: &mut dyn Read) -> TabxResult<()> {
        Table::import_json(self, ctx, input)
    }

    fn validate_json(&self, input: &mut dyn Read) -> TabxResult<()> {
        Table::validate_json(self, input)
    }

    fn default_json(&self) -> String {
        Table::default_json(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl<T: AutoIncrement> AnyTable for AutoIncrementTable<T> {
    fn type_name(&self) -> &'static str {
        T::TYPE_NAME
    }

    fn table_id(&self) -> u32 {
        AutoIncrementTable::table_id(self)
    }

    fn get_table(&self, type_name: &str) -> Option<&dyn AnyTable> {
        AutoIncrementTable::get_table(self, type_name).map(|t| t as &dyn AnyTable)
    }

    fn export_json(&self, ctx: &dyn Context, out: &mut dyn Write) -> TabxResult<()> {
        AutoIncrementTable::export_json(self, ctx, out)
    }

    fn import_json(&self, ctx: &dyn Context, input: &mut dyn Read) -> TabxResult<()> {
        AutoIncrementTable::import_json(self, ctx, input)
    }

    fn validate_json(&self, input: &mut dyn Read) -> TabxResult<()> {
        AutoIncrementTable::validate_json(self, input)
    }

    fn default_json(&self) -> String {
        AutoIncrementTable::default_json(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The tables of one module, keyed by record type name.
///
/// Module JSON is an object mapping each type name to that table's array.
#[derive(Default)]
pub struct ModuleTables {
    tables: Vec<Box<dyn AnyTable>>,
    by_name: AHashMap<&'static str, usize>,
    table_ids: AHashSet<u32>,
}

impl ModuleTables {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a table; type names and table ids must be unique in the module.
    pub fn register<A: AnyTable + 'static>(&mut self, table: A) -> TabxResult<()> {
        let name = table.type_name();
        if self.by_name.contains_key(name) {
            return Err(TabxError::Schema(format!("table {name} registered twice")));
        }
        if !self.table_ids.insert(table.table_id()) {
            return Err(TabxError::Schema(format!(
                "table id {} of {name} already in use",
                table.table_id()
            )));
        }
        debug!(type_name = name, table_id = table.table_id(), "table registered");
        self.by_name.insert(name, self.tables.len());
        self.tables.push(Box::new(table));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.by_name.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Route `type_name` to the table that claims it.
    pub fn get_table(&self, type_name: &str) -> Option<&dyn AnyTable> {
        self.tables.iter().find_map(|t| t.get_table(type_name))
    }

    pub fn table<T: Record>(&self) -> Option<&Table<T>> {
        self.get_table(T::TYPE_NAME)?.as_any().downcast_ref()
    }

    pub fn auto_increment_table<T: AutoIncrement>(&self) -> Option<&AutoIncrementTable<T>> {
        self.get_table(T::TYPE_NAME)?.as_any().downcast_ref()
    }

    /// `{"<type name>": [], ...}` for every table.
    pub fn default_json(&self) -> String {
        let body: Vec<String> = self
            .type_names()
            .into_iter()
            .filter_map(|name| {
                let table = self.get_table(name)?;
                Some(format!("{}:{}", json_string(name), table.default_json()))
            })
            .collect();
        format!("{{{}}}", body.join(","))
    }

    /// Export every table, sorted by type name, as one JSON object.
    #[instrument(skip_all)]
    pub fn export_json<W: Write>(&self, ctx: &dyn Context, mut out: W) -> TabxResult<()> {
        out.write_all(b"{")?;
        for (i, name) in self.type_names().into_iter().enumerate() {
            let table = self.route(name)?;
            if i > 0 {
                out.write_all(b",\n")?;
            }
            write!(out, "{}:", json_string(name))?;
            table.export_json(ctx, &mut out)?;
        }
        out.write_all(b"}")?;
        out.flush()?;
        Ok(())
    }

    /// Import a module object; unknown type names are rejected up front.
    #[instrument(skip_all)]
    pub fn import_json<R: Read>(&self, ctx: &dyn Context, input: R) -> TabxResult<()> {
        for (name, body) in self.split_module(input)? {
            self.route(&name)?.import_json(ctx, &mut body.as_slice())?;
        }
        Ok(())
    }

    #[instrument(skip_all)]
    pub fn validate_json<R: Read>(&self, input: R) -> TabxResult<()> {
        for (name, body) in self.split_module(input)? {
            self.route(&name)?.validate_json(&mut body.as_slice())?;
        }
        Ok(())
    }

    fn route(&self, type_name: &str) -> TabxResult<&dyn AnyTable> {
        self.get_table(type_name)
            .ok_or_else(|| TabxError::TableNotFound(type_name.to_string()))
    }

    /// Parse a module object into per-table JSON bodies, checking every name.
    fn split_module<R: Read>(&self, input: R) -> TabxResult<Vec<(String, Vec<u8>)>> {
        let module: serde_json::Map<String, serde_json::Value> = serde_json::from_reader(input)
            .map_err(|e| TabxError::JsonImport(format!("module JSON: {e}")))?;
        module
            .into_iter()
            .map(|(name, body)| {
                self.route(&name)?;
                Ok((name, serde_json::to_vec(&body)?))
            })
            .collect()
    }
}

fn json_string(s: &str) -> String {
    serde_json::Value::from(s).to_string()
}
