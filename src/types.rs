//! Core change log types
//!
//! A [`ChangeLog`] is the append-only audit record written after every
//! monitored create, update or delete. JSON serialization uses camelCase
//! like the rest of the A3S wire types; the persisted form goes through
//! [`ChangeLog::to_row`] and [`ChangeLog::from_row`].

use crate::column::{decode_json_column, encode_json_column, JsonMap, Row, SqlValue};
use crate::error::{ChangeLogError, Result};
use crate::schema::{ColumnDef, ColumnKind, TableSchema};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default name of the audit table
pub const DEFAULT_TABLE_NAME: &str = "change_logs";

/// Kind of change recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Column representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = ChangeLogError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(ChangeLogError::Decode {
                column: "operation".to_string(),
                reason: format!("Unknown operation '{}'", other),
            }),
        }
    }
}

/// A single audit record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeLog {
    /// Store-assigned identifier (0 until persisted)
    pub id: u64,

    /// When the record was built (UTC)
    pub created_at: DateTime<Utc>,

    /// Table of the changed entity
    pub table: String,

    /// `field=value` pairs of the primary key, comma-joined
    pub primary_key: String,

    /// Kind of change
    pub operation: Operation,

    /// Who caused the change (empty if unknown)
    pub actor: String,

    /// Exported fields of the entity after the change
    pub raw_object: JsonMap,

    /// Metadata supplied by the entity
    #[serde(default)]
    pub meta: Option<JsonMap>,

    /// Current values of diff-tagged fields touched by an update
    #[serde(default)]
    pub raw_diff: Option<JsonMap>,
}

impl ChangeLog {
    /// Create an unsaved record timestamped now
    pub fn new(
        table: impl Into<String>,
        primary_key: impl Into<String>,
        operation: Operation,
        actor: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            created_at: Utc::now(),
            table: table.into(),
            primary_key: primary_key.into(),
            operation,
            actor: actor.into(),
            raw_object: JsonMap::new(),
            meta: None,
            raw_diff: None,
        }
    }

    /// Columns of the audit table
    pub fn table_schema(name: &str) -> TableSchema {
        TableSchema {
            name: name.to_string(),
            columns: vec![
                ColumnDef::new("id", ColumnKind::Integer)
                    .primary_key()
                    .auto_increment(),
                ColumnDef::new("created_at", ColumnKind::Timestamp).indexed(),
                ColumnDef::new("table", ColumnKind::Text { size: 255 }).indexed(),
                ColumnDef::new("primary_key", ColumnKind::Text { size: 255 }).indexed(),
                ColumnDef::new("operation", ColumnKind::Text { size: 16 }).indexed(),
                ColumnDef::new("actor", ColumnKind::Text { size: 255 }).indexed(),
                ColumnDef::new("raw_object", ColumnKind::Json),
                ColumnDef::new("meta", ColumnKind::Json).nullable(),
                ColumnDef::new("raw_diff", ColumnKind::Json).nullable(),
            ],
        }
    }

    /// Encode for insertion; an unsaved id is left for the store to assign
    pub fn to_row(&self) -> Result<Row> {
        let mut row = Row::new();
        if self.id > 0 {
            row.insert("id".to_string(), SqlValue::Integer(self.id as i64));
        }
        row.insert("created_at".to_string(), SqlValue::Timestamp(self.created_at));
        row.insert("table".to_string(), SqlValue::from(self.table.as_str()));
        row.insert("primary_key".to_string(), SqlValue::from(self.primary_key.as_str()));
        row.insert("operation".to_string(), SqlValue::from(self.operation.as_str()));
        row.insert("actor".to_string(), SqlValue::from(self.actor.as_str()));
        row.insert("raw_object".to_string(), encode_json_column(Some(&self.raw_object))?);
        row.insert("meta".to_string(), encode_json_column(self.meta.as_ref())?);
        row.insert("raw_diff".to_string(), encode_json_column(self.raw_diff.as_ref())?);
        Ok(row)
    }

    /// Decode a persisted row
    pub fn from_row(row: &Row) -> Result<Self> {
        let id = match column(row, "id")? {
            SqlValue::Integer(i) if *i >= 0 => *i as u64,
            other => return Err(unexpected("id", other)),
        };
        let created_at = match column(row, "created_at")? {
            SqlValue::Timestamp(t) => *t,
            SqlValue::Text(s) => DateTime::parse_from_rfc3339(s)
                .map(|t| t.with_timezone(&Utc))
                .map_err(|e| ChangeLogError::Decode {
                    column: "created_at".to_string(),
                    reason: e.to_string(),
                })?,
            other => return Err(unexpected("created_at", other)),
        };

        Ok(Self {
            id,
            created_at,
            table: text(row, "table")?,
            primary_key: text(row, "primary_key")?,
            operation: text(row, "operation")?.parse()?,
            actor: text(row, "actor")?,
            raw_object: decode_json_column("raw_object", column(row, "raw_object")?)?
                .unwrap_or_default(),
            meta: decode_json_column("meta", row.get("meta").unwrap_or(&SqlValue::Null))?,
            raw_diff: decode_json_column("raw_diff", row.get("raw_diff").unwrap_or(&SqlValue::Null))?,
        })
    }
}

fn column<'r>(row: &'r Row, name: &str) -> Result<&'r SqlValue> {
    row.get(name).ok_or_else(|| ChangeLogError::Decode {
        column: name.to_string(),
        reason: "missing column".to_string(),
    })
}

fn text(row: &Row, name: &str) -> Result<String> {
    match column(row, name)? {
        SqlValue::Text(s) => Ok(s.clone()),
        SqlValue::Null => Ok(String::new()),
        other => Err(unexpected(name, other)),
    }
}

fn unexpected(name: &str, value: &SqlValue) -> ChangeLogError {
    ChangeLogError::Decode {
        column: name.to_string(),
        reason: format!("unexpected value {:?}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> ChangeLog {
        let mut log = ChangeLog::new("users", "ID=1", Operation::Update, "tester");
        log.id = 3;
        log.raw_object.insert("Name".into(), json!("Jack"));
        log.raw_diff = Some(log.raw_object.clone());
        log
    }

    #[test]
    fn test_operation_display_and_parse() {
        for op in [Operation::Create, Operation::Update, Operation::Delete] {
            assert_eq!(op.to_string().parse::<Operation>().unwrap(), op);
        }
        assert_eq!(Operation::Create.to_string(), "create");
        assert!("CREATE".parse::<Operation>().is_err());
    }

    #[test]
    fn test_operation_serde_lowercase() {
        assert_eq!(serde_json::to_string(&Operation::Delete).unwrap(), "\"delete\"");
    }

    #[test]
    fn test_table_schema_columns() {
        let schema = ChangeLog::table_schema("audit");
        assert_eq!(schema.name, "audit");
        let names: Vec<_> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "id", "created_at", "table", "primary_key", "operation", "actor",
                "raw_object", "meta", "raw_diff"
            ]
        );
        assert_eq!(
            schema.indexed_columns(),
            vec!["id", "created_at", "table", "primary_key", "operation", "actor"]
        );
        assert!(schema.column("meta").unwrap().nullable);
        assert_eq!(schema.column("operation").unwrap().kind, ColumnKind::Text { size: 16 });
    }

    #[test]
    fn test_row_roundtrip_keeps_absent_vs_empty() {
        let mut log = sample();
        log.meta = Some(JsonMap::new());

        let row = log.to_row().unwrap();
        assert_eq!(row["raw_diff"], SqlValue::Text(r#"{"Name":"Jack"}"#.to_string()));
        assert_eq!(row["meta"], SqlValue::Text("{}".to_string()));

        let decoded = ChangeLog::from_row(&row).unwrap();
        assert_eq!(decoded, log);
        assert_eq!(decoded.meta, Some(JsonMap::new()));

        log.meta = None;
        let decoded = ChangeLog::from_row(&log.to_row().unwrap()).unwrap();
        assert!(decoded.meta.is_none());
    }

    #[test]
    fn test_unsaved_row_has_no_id() {
        let log = ChangeLog::new("users", "", Operation::Create, "");
        assert!(!log.to_row().unwrap().contains_key("id"));
    }

    #[test]
    fn test_from_row_rejects_bad_operation() {
        let mut row = sample().to_row().unwrap();
        row.insert("operation".into(), SqlValue::from("truncate"));
        let err = ChangeLog::from_row(&row).unwrap_err();
        assert!(err.to_string().contains("truncate"));
    }

    #[test]
    fn test_serialization_camel_case() {
        let json = serde_json::to_string(&sample()).unwrap();
        assert!(json.contains("\"primaryKey\":\"ID=1\""));
        assert!(json.contains("\"rawDiff\""));
        let parsed: ChangeLog = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.operation, Operation::Update);
    }
}
