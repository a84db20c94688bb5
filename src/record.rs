//! Record assembly
//!
//! Composes introspection, diff, lazy gate, actor and metadata into a
//! [`ChangeLog`]. Building never fails; the only way not to get a record is
//! the lazy gate.

use crate::column::JsonMap;
use crate::config::Options;
use crate::diff::{diff_for, is_suppressed};
use crate::host::{Scope, Statement};
use crate::introspect::{primary_key_string, raw_snapshot};
use crate::types::{ChangeLog, Operation};
use serde_json::Value;

/// Metadata exposed by the statement's entity, flattened to a mapping
///
/// Missing capability, `None`, and non-object values all yield `None`.
pub fn capture_metadata(stmt: &Statement<'_>) -> Option<JsonMap> {
    let model = stmt.model.filter(|m| !m.is_nil())?;
    match model.metadata_provider()?.meta()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

/// Build the record for `op`, or `None` when the lazy gate suppresses it
pub fn build(options: &Options, stmt: &Statement<'_>, op: Operation) -> Option<ChangeLog> {
    if is_suppressed(options, stmt, op) {
        tracing::debug!(
            table = %stmt.table,
            changed = ?stmt.changed,
            "Update has no significant changes, skipping change log"
        );
        return None;
    }

    let actor = options.resolve_actor(&Scope::new(stmt));
    let mut log = ChangeLog::new(stmt.table.clone(), primary_key_string(stmt), op, actor);
    log.raw_object = raw_snapshot(stmt);
    log.meta = capture_metadata(stmt);
    log.raw_diff = diff_for(options, stmt, op);
    Some(log)
}
