//! Schema descriptors supplied by the host persistence layer
//!
//! The change log core performs no type inspection of its own. Everything it
//! knows about an entity comes from an [`EntitySchema`]: field names, column
//! names, export flags, primary keys and tags. Tables are described by a
//! [`TableSchema`] when the host is asked to create them.

use std::collections::BTreeMap;

/// Tag key marking a field as diff-eligible (`loggable = "true"`)
pub const LOGGABLE_TAG: &str = "loggable";

/// Descriptor of a single entity field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSchema {
    /// Field name as the model exposes it (e.g. `Name`)
    pub name: String,

    /// Storage column name (e.g. `name`)
    pub db_name: String,

    /// Exported fields appear in raw snapshots
    pub exported: bool,

    /// Part of the primary key
    pub primary_key: bool,

    /// Value assigned by the store on insert
    pub auto_increment: bool,

    /// Embedded capability marker, never snapshotted
    pub marker: bool,

    /// Free-form annotations (e.g. `loggable = "true"`)
    pub tags: BTreeMap<String, String>,
}

impl FieldSchema {
    /// Create an exported field with an explicit column name
    pub fn new(name: impl Into<String>, db_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            db_name: db_name.into(),
            exported: true,
            primary_key: false,
            auto_increment: false,
            marker: false,
            tags: BTreeMap::new(),
        }
    }

    /// Create a field whose column name is the snake_case form of its name
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        let db_name = to_snake_case(&name);
        Self::new(name, db_name)
    }

    /// Create the embedded capability marker field
    pub fn marker(name: impl Into<String>) -> Self {
        let mut field = Self::named(name);
        field.marker = true;
        field
    }

    /// Mark as (part of) the primary key
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark as store-assigned on insert
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Hide from raw snapshots
    pub fn unexported(mut self) -> Self {
        self.exported = false;
        self
    }

    /// Attach a tag
    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Tag as diff-eligible
    pub fn loggable(self) -> Self {
        self.tag(LOGGABLE_TAG, "true")
    }

    /// Look up a tag value
    pub fn tag_value(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    /// Whether the field carries `loggable = "true"`
    pub fn is_loggable(&self) -> bool {
        self.tag_value(LOGGABLE_TAG) == Some("true")
    }
}

/// Descriptor of an entity type and the table it lives in
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySchema {
    /// Type name (e.g. `User`)
    pub name: String,

    /// Target table (e.g. `users`)
    pub table: String,

    /// Fields in declaration order
    pub fields: Vec<FieldSchema>,

    /// Explicitly registered for auditing, independent of any marker
    pub loggable: bool,
}

impl EntitySchema {
    /// Create an empty schema
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            fields: Vec::new(),
            loggable: false,
        }
    }

    /// Append a field
    pub fn field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    /// Register the entity type for auditing without a marker field
    pub fn loggable(mut self) -> Self {
        self.loggable = true;
        self
    }

    /// Look up a field by name or column name
    pub fn lookup(&self, name: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .or_else(|| self.fields.iter().find(|f| f.db_name == name))
    }

    /// Primary key fields in declaration order
    pub fn primary_fields(&self) -> impl Iterator<Item = &FieldSchema> {
        self.fields.iter().filter(|f| f.primary_key)
    }

    /// The field used when a single key value must stand for the entity
    ///
    /// The sole primary field when there is one; otherwise the primary field
    /// stored in an `id` column.
    pub fn prioritized_primary_field(&self) -> Option<&FieldSchema> {
        let mut primaries = self.primary_fields();
        let first = primaries.next()?;
        if primaries.next().is_none() {
            return Some(first);
        }
        self.primary_fields().find(|f| f.db_name == "id")
    }

    /// Whether the schema declares an embedded capability marker
    pub fn has_marker(&self) -> bool {
        self.fields.iter().any(|f| f.marker)
    }

    /// Table definition for the host to create
    ///
    /// Marker fields have no storage and are left out.
    pub fn table_schema(&self) -> TableSchema {
        let columns = self
            .fields
            .iter()
            .filter(|f| !f.marker)
            .map(|f| ColumnDef {
                name: f.db_name.clone(),
                kind: ColumnKind::Any,
                primary_key: f.primary_key,
                auto_increment: f.auto_increment,
                indexed: f.primary_key,
                nullable: !f.primary_key,
            })
            .collect();
        TableSchema {
            name: self.table.clone(),
            columns,
        }
    }
}

/// Storage type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Text { size: usize },
    Timestamp,
    Json,
    /// Whatever the model hands over
    Any,
}

/// Column definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: String,
    pub kind: ColumnKind,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub indexed: bool,
    pub nullable: bool,
}

impl ColumnDef {
    /// Create a non-indexed, non-nullable column
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            primary_key: false,
            auto_increment: false,
            indexed: false,
            nullable: false,
        }
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.indexed = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn indexed(mut self) -> Self {
        self.indexed = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }
}

/// Table definition handed to [`Database::auto_migrate`](crate::host::Database::auto_migrate)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Look up a column by name
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Names of indexed columns
    pub fn indexed_columns(&self) -> Vec<&str> {
        self.columns
            .iter()
            .filter(|c| c.indexed)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// `CreatedAt` → `created_at`, `ID` → `id`, `UserID` → `user_id`
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev_lower = i > 0 && (chars[i - 1].is_lowercase() || chars[i - 1].is_ascii_digit());
            let next_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let prev_upper = i > 0 && chars[i - 1].is_uppercase();
            if i > 0 && (prev_lower || (prev_upper && next_lower)) {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}
