//! In-memory host persistence layer
//!
//! A small table store implementing [`Database`] for tests, benches and
//! single-process use. Mutations apply first, then the matching hooks run
//! with no table lock held, so hooks are free to write through
//! [`Database::isolated`].

use crate::column::{JsonMap, Row, SqlValue};
use crate::context::Context;
use crate::error::{ChangeLogError, Result};
use crate::host::{Database, Hook, HookPoint, Session, Statement, Writer};
use crate::model::Model;
use crate::schema::{EntitySchema, TableSchema};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

struct MemoryTable {
    schema: TableSchema,
    rows: BTreeMap<u64, Row>,
    next_id: u64,
}

impl MemoryTable {
    fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Insert a row, filling auto-increment columns left empty
    ///
    /// Explicit auto-increment values must be positive integers.
    fn insert(&mut self, mut row: Row) -> Result<u64> {
        if let Some(unknown) = row.keys().find(|c| self.schema.column(c).is_none()) {
            return Err(ChangeLogError::Persist {
                table: self.schema.name.clone(),
                reason: format!("Unknown column '{}'", unknown),
            });
        }

        let id = self.next_id;
        let mut assigned = 0;
        for column in self.schema.columns.iter().filter(|c| c.auto_increment) {
            let slot = row.entry(column.name.clone()).or_insert(SqlValue::Null);
            match slot {
                SqlValue::Null => {
                    *slot = SqlValue::Integer(id as i64);
                    assigned = id;
                }
                SqlValue::Integer(explicit) if *explicit > 0 => {
                    assigned = *explicit as u64;
                }
                other => {
                    return Err(ChangeLogError::Persist {
                        table: self.schema.name.clone(),
                        reason: format!(
                            "Invalid value {:?} for auto-increment column '{}'",
                            other, column.name
                        ),
                    });
                }
            }
        }

        let key = if assigned > 0 { assigned } else { id };
        if self.rows.contains_key(&key) {
            return Err(ChangeLogError::Persist {
                table: self.schema.name.clone(),
                reason: format!("Duplicate primary key {}", key),
            });
        }
        self.next_id = self.next_id.max(key) + 1;
        self.rows.insert(key, row);
        Ok(assigned)
    }

    fn find_key(&self, filter: &Row) -> Option<u64> {
        self.rows
            .iter()
            .find(|(_, row)| filter.iter().all(|(c, v)| row.get(c) == Some(v)))
            .map(|(k, _)| *k)
    }
}

/// In-memory [`Database`]
#[derive(Default)]
pub struct MemoryDatabase {
    tables: RwLock<HashMap<String, MemoryTable>>,
    hooks: RwLock<HashMap<HookPoint, Vec<(String, Hook)>>>,
    failing: RwLock<HashSet<String>>,
    diagnostics: RwLock<Vec<String>>,
}

impl MemoryDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a model, assign its auto-increment fields and fire `AfterCreate`
    pub fn create(
        &self,
        ctx: &Context,
        schema: &EntitySchema,
        model: &mut dyn Model,
    ) -> Result<u64> {
        let row = model_row(schema, &*model);
        let id = self.write(&schema.table, row)?;

        if id > 0 {
            for field in schema.fields.iter().filter(|f| f.auto_increment) {
                if model.field(&field.name).map_or(true, |v| v.is_null()) {
                    model.set_field(&field.name, Value::from(id));
                }
            }
        }

        let stmt = Statement::for_schema(schema, &*model)
            .with_context(ctx.clone())
            .with_changed(schema.fields.iter().filter(|f| !f.marker).map(|f| f.name.clone()));
        self.fire(HookPoint::AfterCreate, &stmt);
        Ok(id)
    }

    /// Apply `changes` (keyed by field or column name) to a stored model and
    /// fire `AfterUpdate`
    ///
    /// Neither the model nor the stored row is touched unless every change
    /// names a known field and the row exists.
    pub fn update(
        &self,
        ctx: &Context,
        schema: &EntitySchema,
        model: &mut dyn Model,
        changes: JsonMap,
    ) -> Result<()> {
        let filter = key_filter(schema, &*model)?;

        let mut resolved = Vec::with_capacity(changes.len());
        for (name, value) in &changes {
            let field = schema.lookup(name).ok_or_else(|| ChangeLogError::Persist {
                table: schema.table.clone(),
                reason: format!("Unknown field '{}'", name),
            })?;
            resolved.push((field, value));
        }

        {
            let mut tables = self.lock_tables()?;
            let table = table_mut(&mut tables, &schema.table)?;
            let key = table.find_key(&filter).ok_or_else(|| {
                ChangeLogError::NotFound(format!("No row in '{}' matching key", schema.table))
            })?;
            if let Some(row) = table.rows.get_mut(&key) {
                for (field, value) in &resolved {
                    row.insert(field.db_name.clone(), SqlValue::from((*value).clone()));
                }
            }
        }

        for (field, value) in resolved {
            model.set_field(&field.name, value.clone());
        }

        let stmt = Statement::for_schema(schema, &*model)
            .with_context(ctx.clone())
            .with_changed(changes.keys().cloned());
        self.fire(HookPoint::AfterUpdate, &stmt);
        Ok(())
    }

    /// Delete the row of a loaded model and fire `AfterDelete`
    pub fn delete(&self, ctx: &Context, schema: &EntitySchema, model: &dyn Model) -> Result<()> {
        let filter = key_filter(schema, model)?;
        self.remove(&schema.table, &filter)?;

        let stmt = Statement::for_schema(schema, model).with_context(ctx.clone());
        self.fire(HookPoint::AfterDelete, &stmt);
        Ok(())
    }

    /// Delete by primary key value without a loaded entity
    ///
    /// Hooks observe a default `M` and the key as a map-shaped filter.
    pub fn delete_by_key<M: Model + Default>(
        &self,
        ctx: &Context,
        schema: &EntitySchema,
        key: impl Into<Value>,
    ) -> Result<()> {
        let pk = schema.prioritized_primary_field().ok_or_else(|| {
            ChangeLogError::Host(format!("Entity '{}' has no primary key", schema.name))
        })?;
        let key = key.into();

        let mut filter = Row::new();
        filter.insert(pk.db_name.clone(), SqlValue::from(key.clone()));
        self.remove(&schema.table, &filter)?;

        let mut dest = JsonMap::new();
        dest.insert(pk.db_name.clone(), key);
        let blank = M::default();
        let stmt = Statement::for_schema(schema, &blank)
            .with_context(ctx.clone())
            .with_dest(dest);
        self.fire(HookPoint::AfterDelete, &stmt);
        Ok(())
    }

    /// All rows of a table ordered by insertion key
    pub fn rows(&self, table: &str) -> Result<Vec<Row>> {
        let tables = self
            .tables
            .read()
            .map_err(|e| ChangeLogError::Host(format!("Table lock poisoned: {}", e)))?;
        let table = tables
            .get(table)
            .ok_or_else(|| ChangeLogError::NotFound(format!("Table '{}'", table)))?;
        Ok(table.rows.values().cloned().collect())
    }

    /// Whether a table has been migrated
    pub fn has_table(&self, table: &str) -> bool {
        self.tables
            .read()
            .map(|t| t.contains_key(table))
            .unwrap_or(false)
    }

    /// Make every subsequent write into `table` fail
    pub fn fail_writes(&self, table: impl Into<String>) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(table.into());
        }
    }

    /// Messages reported through [`Database::log_error`]
    pub fn diagnostics(&self) -> Vec<String> {
        self.diagnostics
            .read()
            .map(|d| d.clone())
            .unwrap_or_default()
    }

    /// Names of hooks registered at a point, in run order
    pub fn hook_names(&self, point: HookPoint) -> Vec<String> {
        self.hooks
            .read()
            .map(|h| {
                h.get(&point)
                    .map(|list| list.iter().map(|(n, _)| n.clone()).collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    fn lock_tables(&self) -> Result<std::sync::RwLockWriteGuard<'_, HashMap<String, MemoryTable>>> {
        self.tables
            .write()
            .map_err(|e| ChangeLogError::Host(format!("Table lock poisoned: {}", e)))
    }

    fn write(&self, table: &str, row: Row) -> Result<u64> {
        let failing = self
            .failing
            .read()
            .map(|f| f.contains(table))
            .unwrap_or(false);
        if failing {
            return Err(ChangeLogError::Persist {
                table: table.to_string(),
                reason: "writes disabled".to_string(),
            });
        }

        let mut tables = self.lock_tables()?;
        table_mut(&mut tables, table)?.insert(row)
    }

    fn remove(&self, table: &str, filter: &Row) -> Result<()> {
        let mut tables = self.lock_tables()?;
        let table_ref = table_mut(&mut tables, table)?;
        let key = table_ref.find_key(filter).ok_or_else(|| {
            ChangeLogError::NotFound(format!("No row in '{}' matching key", table))
        })?;
        table_ref.rows.remove(&key);
        Ok(())
    }

    fn fire(&self, point: HookPoint, stmt: &Statement<'_>) {
        // Clone the list so hooks may register further hooks
        let hooks: Vec<Hook> = match self.hooks.read() {
            Ok(h) => h
                .get(&point)
                .map(|list| list.iter().map(|(_, hook)| hook.clone()).collect())
                .unwrap_or_default(),
            Err(_) => return,
        };

        let session = Session::new(self, stmt);
        for hook in hooks {
            hook(&session);
        }
    }
}

impl Writer for MemoryDatabase {
    fn insert(&self, table: &str, row: Row) -> Result<u64> {
        let id = self.write(table, row)?;
        let stmt = Statement::new(table);
        self.fire(HookPoint::AfterCreate, &stmt);
        Ok(id)
    }
}

impl Database for MemoryDatabase {
    fn auto_migrate(&self, table: &TableSchema) -> Result<()> {
        if table.name.trim().is_empty() {
            return Err(ChangeLogError::Migration {
                table: table.name.clone(),
                reason: "table name is empty".to_string(),
            });
        }

        let mut tables = self.lock_tables()?;
        match tables.get_mut(&table.name) {
            Some(existing) => {
                // Add columns that appeared since the last migration
                for column in &table.columns {
                    if existing.schema.column(&column.name).is_none() {
                        existing.schema.columns.push(column.clone());
                    }
                }
            }
            None => {
                tables.insert(table.name.clone(), MemoryTable::new(table.clone()));
                tracing::debug!(table = %table.name, "Table created");
            }
        }
        Ok(())
    }

    fn register_hook(&self, point: HookPoint, name: &str, hook: Hook) -> Result<()> {
        let mut hooks = self
            .hooks
            .write()
            .map_err(|e| ChangeLogError::Host(format!("Hook lock poisoned: {}", e)))?;
        let list = hooks.entry(point).or_default();
        match list.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => {
                tracing::warn!(hook = %name, point = %point, "Hook already registered, replacing");
                slot.1 = hook;
            }
            None => list.push((name.to_string(), hook)),
        }
        Ok(())
    }

    fn isolated(&self) -> Box<dyn Writer + '_> {
        Box::new(IsolatedWriter { db: self })
    }

    fn log_error(&self, _ctx: &Context, message: &str) {
        tracing::error!(message = %message, "Host diagnostic");
        if let Ok(mut diagnostics) = self.diagnostics.write() {
            diagnostics.push(message.to_string());
        }
    }
}

/// Writer with hooks disabled
struct IsolatedWriter<'a> {
    db: &'a MemoryDatabase,
}

impl Writer for IsolatedWriter<'_> {
    fn insert(&self, table: &str, row: Row) -> Result<u64> {
        self.db.write(table, row)
    }
}

fn table_mut<'t>(
    tables: &'t mut HashMap<String, MemoryTable>,
    name: &str,
) -> Result<&'t mut MemoryTable> {
    tables
        .get_mut(name)
        .ok_or_else(|| ChangeLogError::NotFound(format!("Table '{}'", name)))
}

fn model_row(schema: &EntitySchema, model: &dyn Model) -> Row {
    schema
        .fields
        .iter()
        .filter(|f| !f.marker)
        .map(|f| {
            let value = model.field(&f.name).map(SqlValue::from).unwrap_or(SqlValue::Null);
            (f.db_name.clone(), value)
        })
        .collect()
}

fn key_filter(schema: &EntitySchema, model: &dyn Model) -> Result<Row> {
    let mut filter = Row::new();
    for field in schema.primary_fields() {
        let value = model
            .field(&field.name)
            .filter(|v| !v.is_null())
            .ok_or_else(|| ChangeLogError::Host(format!(
                "Primary key '{}' of '{}' is not set",
                field.name, schema.name
            )))?;
        filter.insert(field.db_name.clone(), SqlValue::from(value));
    }
    if filter.is_empty() {
        return Err(ChangeLogError::Host(format!(
            "Entity '{}' has no primary key",
            schema.name
        )));
    }
    Ok(filter)
}
