//! Capability detection: does an operation qualify for auditing?

use crate::host::Statement;

/// Whether the statement's entity opts into auditing
///
/// The entity must be present and non-nil and must opt in one of three ways:
/// expose the [`LoggableModel`](crate::model::LoggableModel) marker, declare a
/// [`FieldSchema::marker`](crate::schema::FieldSchema::marker) field in its
/// schema, or be registered through
/// [`EntitySchema::loggable`](crate::schema::EntitySchema::loggable). Its
/// table must not be the audit table.
pub fn is_loggable(stmt: &Statement<'_>, audit_table: &str) -> bool {
    if stmt.table == audit_table {
        return false;
    }
    let (Some(schema), Some(model)) = (stmt.schema, stmt.model) else {
        return false;
    };
    if model.is_nil() {
        return false;
    }
    model.loggable_marker().is_some() || schema.loggable || schema.has_marker()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LoggableModel, Model};
    use crate::schema::{EntitySchema, FieldSchema};
    use serde_json::Value;

    struct Marked(LoggableModel);

    impl Model for Marked {
        fn field(&self, _name: &str) -> Option<Value> {
            None
        }

        fn loggable_marker(&self) -> Option<&LoggableModel> {
            Some(&self.0)
        }
    }

    struct Plain;

    impl Model for Plain {
        fn field(&self, _name: &str) -> Option<Value> {
            None
        }
    }

    fn schema(table: &str) -> EntitySchema {
        EntitySchema::new("Thing", table).field(FieldSchema::named("ID").primary_key())
    }

    #[test]
    fn test_marker_opts_in() {
        let schema = schema("things");
        let model = Marked(LoggableModel);
        assert!(is_loggable(&Statement::for_schema(&schema, &model), "change_logs"));
    }

    #[test]
    fn test_plain_model_is_skipped() {
        let schema = schema("things");
        assert!(!is_loggable(&Statement::for_schema(&schema, &Plain), "change_logs"));
    }

    #[test]
    fn test_registered_schema_opts_in() {
        let schema = schema("things").loggable();
        assert!(is_loggable(&Statement::for_schema(&schema, &Plain), "change_logs"));
    }

    #[test]
    fn test_declared_marker_field_opts_in() {
        let schema = schema("things").field(FieldSchema::marker("LoggableModel"));
        assert!(is_loggable(&Statement::for_schema(&schema, &Plain), "change_logs"));

        let nil: Option<Plain> = None;
        assert!(!is_loggable(&Statement::for_schema(&schema, &nil), "change_logs"));
    }

    #[test]
    fn test_nil_indirection_is_skipped() {
        let schema = schema("things").loggable();
        let nil: Option<Marked> = None;
        assert!(!is_loggable(&Statement::for_schema(&schema, &nil), "change_logs"));

        let boxed: Box<Option<Marked>> = Box::new(Some(Marked(LoggableModel)));
        assert!(is_loggable(&Statement::for_schema(&schema, &boxed), "change_logs"));
    }

    #[test]
    fn test_audit_table_is_never_loggable() {
        let schema = schema("change_logs").loggable();
        let model = Marked(LoggableModel);
        assert!(!is_loggable(&Statement::for_schema(&schema, &model), "change_logs"));
    }

    #[test]
    fn test_missing_schema_or_model() {
        let schema = schema("things");
        let model = Marked(LoggableModel);

        let mut no_schema = Statement::new("things");
        no_schema.model = Some(&model);
        assert!(!is_loggable(&no_schema, "change_logs"));

        let mut no_model = Statement::new("things");
        no_model.schema = Some(&schema);
        assert!(!is_loggable(&no_model, "change_logs"));
    }
}
