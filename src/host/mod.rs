//! Host persistence contract consumed by the change log
//!
//! The change log never talks to a storage engine directly. It plugs into a
//! host persistence layer that implements [`Database`]: the host creates
//! tables, fires post-operation hooks with a [`Session`], and hands out an
//! isolated [`Writer`] whose writes never fire hooks.

use crate::column::{JsonMap, Row};
use crate::context::Context;
use crate::error::Result;
use crate::model::Model;
use crate::schema::{EntitySchema, TableSchema};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

pub mod memory;

/// Lifecycle points a hook can be registered at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    AfterCreate,
    AfterUpdate,
    AfterDelete,
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPoint::AfterCreate => write!(f, "after_create"),
            HookPoint::AfterUpdate => write!(f, "after_update"),
            HookPoint::AfterDelete => write!(f, "after_delete"),
        }
    }
}

/// A post-operation hook
pub type Hook = Arc<dyn Fn(&Session<'_>) + Send + Sync>;

/// Writes rows into tables
pub trait Writer {
    /// Insert a row, returning the value assigned to the auto-increment
    /// column (or 0 when the table has none)
    fn insert(&self, table: &str, row: Row) -> Result<u64>;
}

/// Host persistence layer
///
/// `insert` through the database itself fires `AfterCreate` hooks; writes
/// through [`Database::isolated`] never do.
pub trait Database: Writer + Send + Sync {
    /// Create the table if it does not exist yet
    fn auto_migrate(&self, table: &TableSchema) -> Result<()>;

    /// Register a hook under a unique name
    fn register_hook(&self, point: HookPoint, name: &str, hook: Hook) -> Result<()>;

    /// Derive a handle whose writes run with all hooks disabled
    fn isolated(&self) -> Box<dyn Writer + '_>;

    /// Diagnostic channel for failures that must not surface to callers
    fn log_error(&self, _ctx: &Context, message: &str) {
        tracing::error!(message = %message, "Host diagnostic");
    }
}

/// The in-flight operation a hook observes
pub struct Statement<'a> {
    /// Target table
    pub table: String,

    /// Schema of the target entity, if the operation had one
    pub schema: Option<&'a EntitySchema>,

    /// Current entity value, if the operation had one
    pub model: Option<&'a dyn Model>,

    /// Fields (by name or column name) the operation assigned
    pub changed: BTreeSet<String>,

    /// Map-shaped filter/where payload
    pub dest: Option<JsonMap>,

    /// Ambient context of the caller
    pub context: Context,

    /// Actor explicitly attributed to this operation
    pub actor: Option<String>,
}

impl<'a> Statement<'a> {
    /// A statement against `table` with no schema or model
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            schema: None,
            model: None,
            changed: BTreeSet::new(),
            dest: None,
            context: Context::background(),
            actor: None,
        }
    }

    /// A statement against the schema's table
    pub fn for_schema(schema: &'a EntitySchema, model: &'a dyn Model) -> Self {
        let mut stmt = Self::new(schema.table.clone());
        stmt.schema = Some(schema);
        stmt.model = Some(model);
        stmt
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    pub fn with_changed<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.changed.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn with_dest(mut self, dest: JsonMap) -> Self {
        self.dest = Some(dest);
        self
    }

    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Whether the operation assigned the given field or column
    pub fn changed(&self, name: &str) -> bool {
        self.changed.contains(name)
    }
}

impl fmt::Debug for Statement<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("table", &self.table)
            .field("schema", &self.schema.map(|s| s.name.as_str()))
            .field("has_model", &self.model.is_some())
            .field("changed", &self.changed)
            .field("dest", &self.dest)
            .field("actor", &self.actor)
            .finish()
    }
}

/// What a hook receives: the database and the statement that just ran
pub struct Session<'a> {
    db: &'a dyn Database,
    statement: &'a Statement<'a>,
}

impl<'a> Session<'a> {
    pub fn new(db: &'a dyn Database, statement: &'a Statement<'a>) -> Self {
        Self { db, statement }
    }

    pub fn statement(&self) -> &'a Statement<'a> {
        self.statement
    }

    /// Writer that cannot re-trigger hooks
    pub fn isolated(&self) -> Box<dyn Writer + 'a> {
        self.db.isolated()
    }

    /// Report through the host diagnostic channel
    pub fn log_error(&self, message: &str) {
        self.db.log_error(&self.statement.context, message);
    }
}

/// Read-only handle to the current operation scope
#[derive(Clone, Copy)]
pub struct Scope<'a> {
    statement: &'a Statement<'a>,
}

impl<'a> Scope<'a> {
    pub fn new(statement: &'a Statement<'a>) -> Self {
        Self { statement }
    }

    pub fn table(&self) -> &'a str {
        &self.statement.table
    }

    pub fn context(&self) -> &'a Context {
        &self.statement.context
    }

    /// Actor explicitly attributed to the operation, if any
    pub fn explicit_actor(&self) -> Option<&'a str> {
        self.statement.actor.as_deref()
    }
}
