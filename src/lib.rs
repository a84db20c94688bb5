//! # a3s-changelog
//!
//! Audit-trail hooks for a host persistence layer.
//!
//! ## Overview
//!
//! `a3s-changelog` observes create, update and delete operations of a host
//! persistence layer and appends one immutable [`ChangeLog`] per monitored
//! mutation: the table, the primary key, the operation, the actor, a
//! snapshot of the entity, optional metadata and an optional diff. It plugs
//! in through post-operation hooks and never alters the operation it observes.
//!
//! ## Quick Start
//!
//! ```rust
//! use a3s_changelog::{register, with_actor, ChangeLog, Context, Options};
//! use a3s_changelog::{EntitySchema, FieldSchema, LoggableModel, Model};
//! use a3s_changelog::host::memory::MemoryDatabase;
//! use a3s_changelog::host::Database;
//! use serde_json::{json, Value};
//!
//! #[derive(Default)]
//! struct User {
//!     id: Option<u64>,
//!     name: String,
//!     loggable: LoggableModel,
//! }
//!
//! impl Model for User {
//!     fn field(&self, name: &str) -> Option<Value> {
//!         match name {
//!             "ID" => self.id.map(Value::from),
//!             "Name" => Some(json!(self.name)),
//!             _ => None,
//!         }
//!     }
//!
//!     fn set_field(&mut self, name: &str, value: Value) -> bool {
//!         match name {
//!             "ID" => self.id = value.as_u64(),
//!             "Name" => self.name = value.as_str().unwrap_or_default().to_string(),
//!             _ => return false,
//!         }
//!         true
//!     }
//!
//!     fn loggable_marker(&self) -> Option<&LoggableModel> {
//!         Some(&self.loggable)
//!     }
//! }
//!
//! # fn example() -> a3s_changelog::Result<()> {
//! let schema = EntitySchema::new("User", "users")
//!     .field(FieldSchema::named("ID").primary_key().auto_increment())
//!     .field(FieldSchema::named("Name").loggable())
//!     .field(FieldSchema::marker("LoggableModel"));
//!
//! let db = MemoryDatabase::new();
//! register(&db, Options::new().with_compute_diff())?;
//! db.auto_migrate(&schema.table_schema())?;
//!
//! let ctx = with_actor(&Context::background(), "demo-user");
//! let mut user = User { name: "John".into(), ..User::default() };
//! db.create(&ctx, &schema, &mut user)?;
//!
//! let logs = db.rows("change_logs")?;
//! let log = ChangeLog::from_row(&logs[0])?;
//! assert_eq!(log.primary_key, "ID=1");
//! assert_eq!(log.actor, "demo-user");
//! # Ok(())
//! # }
//! # example().unwrap();
//! ```
//!
//! ## Architecture
//!
//! - **Database** trait: host contract for migrations, hooks, isolated writes
//! - **ChangeLogPlugin**: registers hooks and persists records
//! - **Model** / **EntitySchema**: entity values and their descriptors
//! - **ChangeLog**: the persisted audit record

pub mod capability;
pub mod column;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod host;
pub mod introspect;
pub mod model;
pub mod plugin;
pub mod record;
pub mod schema;
pub mod types;

// Re-export core types
pub use column::{decode_json_column, encode_json_column, JsonMap, Row, SqlValue};
pub use config::{default_actor, ActorProvider, ChangeLogConfig, Options, TableName};
pub use context::{current_actor, with_actor, Context};
pub use error::{ChangeLogError, Result};
pub use host::{Database, Hook, HookPoint, Scope, Session, Statement, Writer};
pub use model::{meta_of, LoggableModel, MetadataProvider, Model};
pub use plugin::{register, ChangeLogPlugin, PLUGIN_NAME};
pub use schema::{ColumnDef, ColumnKind, EntitySchema, FieldSchema, TableSchema, LOGGABLE_TAG};
pub use types::{ChangeLog, Operation, DEFAULT_TABLE_NAME};

// Re-export the in-memory host for convenience
pub use host::memory::MemoryDatabase;
