//! Change log plugin: hook registration and recursion-guarded persistence
//!
//! Registration creates the audit table and installs three post-operation
//! hooks. Each hook is stateless apart from the plugin configuration and
//! guards against auditing its own writes three ways:
//!
//! 1. capability detection rejects the audit table,
//! 2. the hook exits when the statement targets the *current* audit table name,
//! 3. the record is written through the host's isolated writer, which fires
//!    no hooks.
//!
//! The isolated write runs outside whatever transaction the triggering
//! mutation belongs to: a rolled-back mutation keeps its change log. Write
//! failures are reported through the host diagnostic channel and dropped.

use crate::capability::is_loggable;
use crate::config::{Options, TableName};
use crate::error::{ChangeLogError, Result};
use crate::host::{Database, Hook, HookPoint, Session, Writer};
use crate::record;
use crate::types::{ChangeLog, Operation};
use std::fmt;
use std::sync::Arc;

/// Plugin name, used as the prefix of hook names
pub const PLUGIN_NAME: &str = "loggable";

struct Inner {
    options: Options,
    table_name: TableName,
}

/// Registered change log plugin
#[derive(Clone)]
pub struct ChangeLogPlugin {
    inner: Arc<Inner>,
}

impl fmt::Debug for ChangeLogPlugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeLogPlugin")
            .field("options", &self.inner.options)
            .field("table_name", &self.inner.table_name.get())
            .field("version", &self.inner.table_name.version())
            .finish()
    }
}

impl ChangeLogPlugin {
    /// Create a plugin; nothing is registered until [`initialize`](Self::initialize)
    pub fn new(options: Options) -> Self {
        let table_name = TableName::new(options.table_name());
        Self {
            inner: Arc::new(Inner {
                options,
                table_name,
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        PLUGIN_NAME
    }

    pub fn options(&self) -> &Options {
        &self.inner.options
    }

    /// Audit table name hooks currently write to
    pub fn table_name(&self) -> Arc<str> {
        self.inner.table_name.get()
    }

    /// Rename the audit table after registration
    ///
    /// Hooks pick the new name up on their next invocation. The new table is
    /// not migrated here, and operations in flight may still use the old
    /// name. Call [`Database::auto_migrate`] with
    /// [`ChangeLog::table_schema`] before relying on it.
    pub fn set_table_name(&self, name: &str) -> Result<u64> {
        let version = self.inner.table_name.set(name)?;
        tracing::warn!(
            table = %name,
            version,
            "Change log table renamed after registration"
        );
        Ok(version)
    }

    /// Create the audit table and register the hooks
    pub fn initialize(&self, db: &dyn Database) -> Result<()> {
        self.inner.options.validate()?;

        let table = self.inner.table_name.get();
        db.auto_migrate(&ChangeLog::table_schema(&table))
            .map_err(|e| match e {
                ChangeLogError::Migration { .. } => e,
                other => ChangeLogError::Migration {
                    table: table.to_string(),
                    reason: other.to_string(),
                },
            })?;

        for (point, op) in [
            (HookPoint::AfterCreate, Operation::Create),
            (HookPoint::AfterUpdate, Operation::Update),
            (HookPoint::AfterDelete, Operation::Delete),
        ] {
            let inner = self.inner.clone();
            let hook: Hook = Arc::new(move |session: &Session<'_>| inner.after(op, session));
            db.register_hook(point, &format!("{}:{}", PLUGIN_NAME, point), hook)?;
        }

        tracing::info!(
            table = %table,
            compute_diff = self.inner.options.compute_diff(),
            lazy_update = self.inner.options.lazy_update(),
            "Change log plugin registered"
        );
        Ok(())
    }
}

impl Inner {
    fn after(&self, op: Operation, session: &Session<'_>) {
        let stmt = session.statement();
        let audit_table = self.table_name.get();

        if stmt.table == *audit_table {
            tracing::trace!(table = %stmt.table, "Skipping change log write on audit table");
            return;
        }
        if !is_loggable(stmt, &audit_table) {
            return;
        }

        let Some(log) = record::build(&self.options, stmt, op) else {
            return;
        };

        let writer = session.isolated();
        match persist(writer.as_ref(), &audit_table, &log) {
            Ok(id) => tracing::debug!(
                id,
                table = %log.table,
                primary_key = %log.primary_key,
                operation = %op,
                "Change log persisted"
            ),
            Err(e) => session.log_error(&format!("loggable: persist error: {}", e)),
        }
    }
}

/// Write a record through `writer`, returning its assigned id
pub fn persist(writer: &dyn Writer, table: &str, log: &ChangeLog) -> Result<u64> {
    writer.insert(table, log.to_row()?)
}

/// Create a plugin from `options` and initialize it against `db`
pub fn register(db: &dyn Database, options: Options) -> Result<ChangeLogPlugin> {
    let plugin = ChangeLogPlugin::new(options);
    plugin.initialize(db)?;
    Ok(plugin)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::Row;
    use crate::context::Context;
    use crate::host::memory::MemoryDatabase;
    use crate::schema::TableSchema;

    struct BrokenDatabase;

    impl Writer for BrokenDatabase {
        fn insert(&self, table: &str, _row: Row) -> Result<u64> {
            Err(ChangeLogError::Persist {
                table: table.to_string(),
                reason: "read-only".to_string(),
            })
        }
    }

    impl Database for BrokenDatabase {
        fn auto_migrate(&self, _table: &TableSchema) -> Result<()> {
            Err(ChangeLogError::Host("disk full".to_string()))
        }

        fn register_hook(&self, _point: HookPoint, _name: &str, _hook: Hook) -> Result<()> {
            Ok(())
        }

        fn isolated(&self) -> Box<dyn Writer + '_> {
            Box::new(BrokenDatabase)
        }

        fn log_error(&self, _ctx: &Context, _message: &str) {}
    }

    #[test]
    fn test_register_creates_table_and_hooks() {
        let db = MemoryDatabase::new();
        let plugin = register(&db, Options::new().with_table_name("audit")).unwrap();

        assert_eq!(plugin.name(), "loggable");
        assert_eq!(&*plugin.table_name(), "audit");
        assert!(db.has_table("audit"));
        assert!(!db.has_table("change_logs"));
        assert_eq!(
            db.hook_names(HookPoint::AfterCreate),
            vec!["loggable:after_create"]
        );
        assert_eq!(
            db.hook_names(HookPoint::AfterUpdate),
            vec!["loggable:after_update"]
        );
        assert_eq!(
            db.hook_names(HookPoint::AfterDelete),
            vec!["loggable:after_delete"]
        );
    }

    #[test]
    fn test_migration_failure_is_fatal() {
        let err = register(&BrokenDatabase, Options::new()).unwrap_err();
        match err {
            ChangeLogError::Migration { table, reason } => {
                assert_eq!(table, "change_logs");
                assert!(reason.contains("disk full"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_persist_assigns_ids() {
        let db = MemoryDatabase::new();
        db.auto_migrate(&ChangeLog::table_schema("change_logs")).unwrap();
        let log = ChangeLog::new("users", "ID=1", Operation::Create, "");

        let writer = db.isolated();
        assert_eq!(persist(writer.as_ref(), "change_logs", &log).unwrap(), 1);
        assert_eq!(persist(writer.as_ref(), "change_logs", &log).unwrap(), 2);

        let rows = db.rows("change_logs").unwrap();
        let decoded = ChangeLog::from_row(&rows[1]).unwrap();
        assert_eq!(decoded.id, 2);
        assert_eq!(decoded.primary_key, "ID=1");
    }

    #[test]
    fn test_persist_error_propagates_to_caller() {
        let log = ChangeLog::new("users", "", Operation::Delete, "");
        assert!(persist(&BrokenDatabase, "change_logs", &log).is_err());
    }

    #[test]
    fn test_plugin_debug() {
        let plugin = ChangeLogPlugin::new(Options::new().with_table_name("audit"));
        let debug = format!("{:?}", plugin);
        assert!(debug.contains("ChangeLogPlugin"));
        assert!(debug.contains("\"audit\""));
        assert!(debug.contains("version: 1"));
    }

    #[test]
    fn test_set_table_name_bumps_version() {
        let plugin = ChangeLogPlugin::new(Options::new());
        assert_eq!(plugin.set_table_name("audit_v2").unwrap(), 2);
        assert_eq!(&*plugin.table_name(), "audit_v2");
        assert!(plugin.set_table_name("bad name").is_err());
    }
}
