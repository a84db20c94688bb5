//! Diff payloads and the lazy-update gate
//!
//! The diff of an update is the current value of every diff-tagged field the
//! update assigned. It is not a before/after pair. When no tagged field was
//! touched the diff is absent, never an empty mapping.

use crate::column::JsonMap;
use crate::config::Options;
use crate::host::Statement;
use crate::introspect::{significant_changes, tagged_values};
use crate::types::Operation;

/// Current values of tagged fields the statement touched, or `None`
pub fn compute_diff(stmt: &Statement<'_>) -> Option<JsonMap> {
    let schema = stmt.schema?;
    let diff: JsonMap = tagged_values(stmt)
        .into_iter()
        .filter(|(name, _)| {
            stmt.changed(name)
                || schema
                    .lookup(name)
                    .is_some_and(|f| stmt.changed(&f.db_name))
        })
        .collect();
    if diff.is_empty() {
        None
    } else {
        Some(diff)
    }
}

/// Diff to store for `op`, honoring the `compute_diff` option
pub fn diff_for(options: &Options, stmt: &Statement<'_>, op: Operation) -> Option<JsonMap> {
    if op == Operation::Update && options.compute_diff() {
        compute_diff(stmt)
    } else {
        None
    }
}

/// Whether the lazy gate suppresses the record for this operation
///
/// Only updates are gated, and only when lazy update is enabled: the record is
/// dropped when every changed field is on the ignore list.
pub fn is_suppressed(options: &Options, stmt: &Statement<'_>, op: Operation) -> bool {
    op == Operation::Update
        && options.lazy_update()
        && significant_changes(stmt, options.lazy_ignore_fields()).is_empty()
}
