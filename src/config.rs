//! Change log configuration
//!
//! [`Options`] is fixed once the plugin is registered. Its plain-data part
//! can be loaded from JSON as a [`ChangeLogConfig`]; the actor provider is
//! code and can only be set through the builder.
//!
//! The audit table name lives in a [`TableName`] setting that every hook
//! reads on each invocation. Renaming it after registration is possible but
//! hazardous: the new table is not migrated, and operations already in
//! flight may write to either name.

use crate::context::current_actor;
use crate::error::{ChangeLogError, Result};
use crate::host::Scope;
use crate::types::DEFAULT_TABLE_NAME;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

/// Resolves the actor of the current operation
pub type ActorProvider = Arc<dyn Fn(&Scope<'_>) -> String + Send + Sync>;

/// Explicit statement actor first, then the ambient context
pub fn default_actor(scope: &Scope<'_>) -> String {
    match scope.explicit_actor() {
        Some(actor) => actor.to_string(),
        None => current_actor(scope.context()),
    }
}

/// Serializable configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChangeLogConfig {
    /// Skip updates that touch only ignored fields
    pub lazy_update: bool,

    /// Field or column names ignored by the lazy gate
    pub lazy_ignore_fields: Vec<String>,

    /// Record diff payloads on updates
    pub compute_diff: bool,

    /// Audit table name (blank means the default)
    pub table_name: String,
}

impl Default for ChangeLogConfig {
    fn default() -> Self {
        Self {
            lazy_update: false,
            lazy_ignore_fields: Vec::new(),
            compute_diff: false,
            table_name: DEFAULT_TABLE_NAME.to_string(),
        }
    }
}

impl ChangeLogConfig {
    /// Parse from a JSON document
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Plugin options
#[derive(Clone)]
pub struct Options {
    lazy_update: bool,
    lazy_ignore_fields: Vec<String>,
    compute_diff: bool,
    table_name: String,
    actor_provider: ActorProvider,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            lazy_update: false,
            lazy_ignore_fields: Vec::new(),
            compute_diff: false,
            table_name: DEFAULT_TABLE_NAME.to_string(),
            actor_provider: Arc::new(default_actor),
        }
    }
}

impl Options {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a loaded configuration, keeping the default actor provider
    pub fn from_config(config: ChangeLogConfig) -> Result<Self> {
        let options = Self {
            lazy_update: config.lazy_update,
            lazy_ignore_fields: config.lazy_ignore_fields,
            compute_diff: config.compute_diff,
            ..Self::default()
        };
        if config.table_name.trim().is_empty() {
            return Ok(options);
        }
        validate_table_name(&config.table_name)?;
        Ok(options.with_table_name(config.table_name))
    }

    /// Plain-data view of the options
    pub fn config(&self) -> ChangeLogConfig {
        ChangeLogConfig {
            lazy_update: self.lazy_update,
            lazy_ignore_fields: self.lazy_ignore_fields.clone(),
            compute_diff: self.compute_diff,
            table_name: self.table_name.clone(),
        }
    }

    /// Enable the lazy gate, ignoring the given fields
    pub fn with_lazy_update<I, S>(mut self, ignore_fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lazy_update = true;
        self.lazy_ignore_fields = ignore_fields.into_iter().map(Into::into).collect();
        self
    }

    /// Record diffs on updates
    pub fn with_compute_diff(mut self) -> Self {
        self.compute_diff = true;
        self
    }

    /// Override the audit table name; blank names keep the current one
    pub fn with_table_name(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !name.trim().is_empty() {
            self.table_name = name;
        }
        self
    }

    /// Replace actor resolution
    pub fn with_actor_provider<F>(mut self, provider: F) -> Self
    where
        F: Fn(&Scope<'_>) -> String + Send + Sync + 'static,
    {
        self.actor_provider = Arc::new(provider);
        self
    }

    pub fn lazy_update(&self) -> bool {
        self.lazy_update
    }

    pub fn lazy_ignore_fields(&self) -> &[String] {
        &self.lazy_ignore_fields
    }

    pub fn compute_diff(&self) -> bool {
        self.compute_diff
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Resolve the actor for a scope
    pub fn resolve_actor(&self, scope: &Scope<'_>) -> String {
        (self.actor_provider)(scope)
    }

    /// Check values the builder cannot reject on its own
    pub fn validate(&self) -> Result<()> {
        validate_table_name(&self.table_name)
    }
}

impl fmt::Debug for Options {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Options")
            .field("lazy_update", &self.lazy_update)
            .field("lazy_ignore_fields", &self.lazy_ignore_fields)
            .field("compute_diff", &self.compute_diff)
            .field("table_name", &self.table_name)
            .finish_non_exhaustive()
    }
}

fn validate_table_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(ChangeLogError::Config("Table name cannot be empty".to_string()));
    }
    if name
        .chars()
        .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '`' | ';'))
    {
        return Err(ChangeLogError::Config(format!(
            "Invalid table name '{}'",
            name
        )));
    }
    Ok(())
}

/// Versioned audit table name shared by all hooks of one plugin
#[derive(Debug)]
pub struct TableName {
    name: RwLock<Arc<str>>,
    version: AtomicU64,
}

impl TableName {
    pub fn new(name: &str) -> Self {
        Self {
            name: RwLock::new(Arc::from(name)),
            version: AtomicU64::new(1),
        }
    }

    /// Current name
    pub fn get(&self) -> Arc<str> {
        match self.name.read() {
            Ok(name) => name.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Replace the name, returning the new version
    pub fn set(&self, name: &str) -> Result<u64> {
        validate_table_name(name)?;
        let mut current = self
            .name
            .write()
            .map_err(|e| ChangeLogError::Host(format!("Table name lock poisoned: {}", e)))?;
        *current = Arc::from(name);
        Ok(self.version.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Bumped on every successful `set`
    pub fn version(&self) -> u64 {
        self.version.load(Ordering::SeqCst)
    }
}
