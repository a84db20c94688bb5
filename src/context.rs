//! Ambient execution context and actor attribution
//!
//! A [`Context`] is an immutable bag of values keyed by Rust types. Deriving a
//! new context never mutates the parent, so a context can be attached to a
//! unit of work and shared freely. The actor is stored under a private key
//! type, so no other crate can read or overwrite it by accident.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Immutable, cheaply clonable execution context
#[derive(Clone, Default)]
pub struct Context {
    values: Arc<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Context {
    /// An empty root context
    pub fn background() -> Self {
        Self::default()
    }

    /// Derive a context holding `value` under the key type `K`
    pub fn with_value<K: 'static, V: Any + Send + Sync>(&self, value: V) -> Self {
        let mut values = (*self.values).clone();
        values.insert(TypeId::of::<K>(), Arc::new(value));
        Self {
            values: Arc::new(values),
        }
    }

    /// Read the value stored under `K`, if it has type `V`
    pub fn value<K: 'static, V: Any>(&self) -> Option<&V> {
        self.values
            .get(&TypeId::of::<K>())
            .and_then(|v| v.downcast_ref::<V>())
    }

    /// Number of values carried
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context carries no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("values", &self.values.len())
            .finish()
    }
}

struct ActorKey;

/// Derive a context attributing subsequent operations to `actor`
pub fn with_actor(ctx: &Context, actor: impl Into<String>) -> Context {
    ctx.with_value::<ActorKey, String>(actor.into())
}

/// Read the actor attached to `ctx`, or an empty string
pub fn current_actor(ctx: &Context) -> String {
    ctx.value::<ActorKey, String>().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_actor_roundtrip() {
        let ctx = with_actor(&Context::background(), "tester");
        assert_eq!(current_actor(&ctx), "tester");
    }

    #[test]
    fn test_missing_actor_is_empty() {
        assert_eq!(current_actor(&Context::background()), "");
    }

    #[test]
    fn test_derivation_does_not_mutate_parent() {
        let root = Context::background();
        let child = with_actor(&root, "alice");
        let grandchild = with_actor(&child, "bob");

        assert_eq!(current_actor(&root), "");
        assert_eq!(current_actor(&child), "alice");
        assert_eq!(current_actor(&grandchild), "bob");
        assert_eq!(grandchild.len(), 1);
    }

    #[test]
    fn test_string_key_cannot_collide_with_actor() {
        // A foreign key type holding a String does not shadow the actor
        struct Foreign;
        let ctx = Context::background().with_value::<Foreign, String>("intruder".to_string());
        assert_eq!(current_actor(&ctx), "");
        assert_eq!(ctx.value::<Foreign, String>().unwrap(), "intruder");
    }

    #[test]
    fn test_wrong_value_type_reads_none() {
        struct Key;
        let ctx = Context::background().with_value::<Key, u32>(7);
        assert!(ctx.value::<Key, String>().is_none());
        assert_eq!(ctx.value::<Key, u32>(), Some(&7));
    }
}
