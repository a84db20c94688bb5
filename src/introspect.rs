//! Field introspection over an in-flight statement
//!
//! Everything here degrades instead of failing: a statement without schema or
//! model yields empty snapshots, empty change sets and an empty primary key.

use crate::column::JsonMap;
use crate::host::Statement;
use crate::model::Model;
use crate::schema::EntitySchema;
use serde_json::Value;
use std::collections::BTreeSet;

fn parts<'a>(stmt: &Statement<'a>) -> Option<(&'a EntitySchema, &'a dyn Model)> {
    let schema = stmt.schema?;
    let model = stmt.model?;
    if model.is_nil() {
        return None;
    }
    Some((schema, model))
}

/// Every exported, non-marker field → current value
///
/// Fields without a resolvable value are recorded as `null`.
pub fn raw_snapshot(stmt: &Statement<'_>) -> JsonMap {
    let Some((schema, model)) = parts(stmt) else {
        return JsonMap::new();
    };
    schema
        .fields
        .iter()
        .filter(|f| f.exported && !f.marker)
        .map(|f| (f.name.clone(), model.field(&f.name).unwrap_or(Value::Null)))
        .collect()
}

/// Fields tagged `loggable = "true"` → current value
pub fn tagged_values(stmt: &Statement<'_>) -> JsonMap {
    let Some((schema, model)) = parts(stmt) else {
        return JsonMap::new();
    };
    schema
        .fields
        .iter()
        .filter(|f| f.is_loggable())
        .map(|f| (f.name.clone(), model.field(&f.name).unwrap_or(Value::Null)))
        .collect()
}

/// Column names of changed fields, minus `ignore`, sorted
///
/// A field counts as changed when the statement names it by field or column
/// name; `ignore` entries match either form too.
pub fn significant_changes(stmt: &Statement<'_>, ignore: &[String]) -> Vec<String> {
    let Some((schema, _)) = parts(stmt) else {
        return Vec::new();
    };
    let ignored = |name: &str| ignore.iter().any(|i| i == name);

    schema
        .fields
        .iter()
        .filter(|f| stmt.changed(&f.name) || stmt.changed(&f.db_name))
        .filter(|f| !ignored(&f.name) && !ignored(&f.db_name))
        .map(|f| f.db_name.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Printable primary key: `field=value` pairs, comma-joined
///
/// Reads key fields off the model first; if none resolve, falls back to the
/// prioritized key column in a map-shaped `dest` payload.
pub fn primary_key_string(stmt: &Statement<'_>) -> String {
    let Some(schema) = stmt.schema else {
        return String::new();
    };

    let mut parts: Vec<String> = Vec::new();
    if let Some(model) = stmt.model.filter(|m| !m.is_nil()) {
        for field in schema.primary_fields() {
            match model.field(&field.name) {
                Some(v) if !v.is_null() => parts.push(format!("{}={}", field.name, display(&v))),
                _ => continue,
            }
        }
    }

    if parts.is_empty() {
        if let (Some(pk), Some(dest)) = (schema.prioritized_primary_field(), stmt.dest.as_ref()) {
            if let Some(v) = dest.get(&pk.db_name).filter(|v| !v.is_null()) {
                parts.push(format!("{}={}", pk.name, display(v)));
            }
        }
    }

    parts.join(",")
}

/// Strings print bare, everything else as JSON text
pub fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
