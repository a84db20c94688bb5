//! Model values and the capabilities an entity can opt into
//!
//! A [`Model`] is the runtime value of an entity as the host layer hands it
//! to hooks: a field accessor plus optional capabilities. Auditing is opt-in
//! by embedding a [`LoggableModel`] marker and exposing it through
//! [`Model::loggable_marker`]. Metadata is opt-in through
//! [`MetadataProvider`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Zero-sized opt-in marker embedded by audited entities
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoggableModel;

/// Optional metadata stored alongside every change of an entity
pub trait MetadataProvider {
    /// Return a structured value (serialized to a JSON object) or `None`
    ///
    /// Values that are not JSON objects are ignored.
    fn meta(&self) -> Option<Value>;
}

/// Runtime view of an entity value
pub trait Model {
    /// Current value of a field by field name
    ///
    /// `None` means the field has no resolvable value.
    fn field(&self, name: &str) -> Option<Value>;

    /// Assign a field, returning `false` if the field is unknown
    fn set_field(&mut self, _name: &str, _value: Value) -> bool {
        false
    }

    /// The embedded capability marker, if any
    fn loggable_marker(&self) -> Option<&LoggableModel> {
        None
    }

    /// The metadata capability, if implemented
    fn metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        None
    }

    /// Whether this is an empty indirection (e.g. `None`)
    fn is_nil(&self) -> bool {
        false
    }
}

impl<T: Model + ?Sized> Model for Box<T> {
    fn field(&self, name: &str) -> Option<Value> {
        (**self).field(name)
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        (**self).set_field(name, value)
    }

    fn loggable_marker(&self) -> Option<&LoggableModel> {
        (**self).loggable_marker()
    }

    fn metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        (**self).metadata_provider()
    }

    fn is_nil(&self) -> bool {
        (**self).is_nil()
    }
}

impl<T: Model> Model for Option<T> {
    fn field(&self, name: &str) -> Option<Value> {
        self.as_ref().and_then(|m| m.field(name))
    }

    fn set_field(&mut self, name: &str, value: Value) -> bool {
        match self {
            Some(m) => m.set_field(name, value),
            None => false,
        }
    }

    fn loggable_marker(&self) -> Option<&LoggableModel> {
        self.as_ref().and_then(|m| m.loggable_marker())
    }

    fn metadata_provider(&self) -> Option<&dyn MetadataProvider> {
        self.as_ref().and_then(|m| m.metadata_provider())
    }

    fn is_nil(&self) -> bool {
        self.as_ref().map_or(true, |m| m.is_nil())
    }
}

/// Serialize any structure into a metadata value
///
/// Serialization failures yield `None`, so a provider never breaks the
/// write it is attached to.
pub fn meta_of<T: Serialize + ?Sized>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Doc {
        id: Option<u64>,
        title: String,
        loggable: LoggableModel,
    }

    #[derive(Serialize)]
    struct DocMeta {
        source: &'static str,
    }

    impl MetadataProvider for Doc {
        fn meta(&self) -> Option<Value> {
            meta_of(&DocMeta { source: "import" })
        }
    }

    impl Model for Doc {
        fn field(&self, name: &str) -> Option<Value> {
            match name {
                "ID" => self.id.map(Value::from),
                "Title" => Some(json!(self.title)),
                _ => None,
            }
        }

        fn set_field(&mut self, name: &str, value: Value) -> bool {
            match name {
                "ID" => {
                    self.id = value.as_u64();
                    true
                }
                "Title" => {
                    self.title = value.as_str().unwrap_or_default().to_string();
                    true
                }
                _ => false,
            }
        }

        fn loggable_marker(&self) -> Option<&LoggableModel> {
            Some(&self.loggable)
        }

        fn metadata_provider(&self) -> Option<&dyn MetadataProvider> {
            Some(self)
        }
    }

    #[test]
    fn test_box_forwards() {
        let mut doc: Box<dyn Model> = Box::new(Doc::default());
        assert!(doc.set_field("Title", json!("Draft")));
        assert_eq!(doc.field("Title"), Some(json!("Draft")));
        assert!(doc.loggable_marker().is_some());
        assert!(!doc.is_nil());
    }

    #[test]
    fn test_none_is_nil() {
        let doc: Option<Doc> = None;
        assert!(doc.is_nil());
        assert!(doc.loggable_marker().is_none());
        assert!(doc.field("Title").is_none());
        assert!(doc.metadata_provider().is_none());
    }

    #[test]
    fn test_some_forwards_capabilities() {
        let doc = Some(Doc::default());
        assert!(!doc.is_nil());
        let meta = doc.metadata_provider().unwrap().meta().unwrap();
        assert_eq!(meta, json!({"source": "import"}));
    }

    #[test]
    fn test_unresolved_field() {
        let doc = Doc::default();
        assert!(doc.field("ID").is_none());
        assert!(doc.field("Missing").is_none());
    }
}
