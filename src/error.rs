//! Error types for a3s-changelog

use thiserror::Error;

/// Errors that can occur while registering or persisting change logs
#[derive(Debug, Error)]
pub enum ChangeLogError {
    /// The audit table (or an entity table) could not be created
    #[error("Failed to migrate table '{table}': {reason}")]
    Migration { table: String, reason: String },

    /// A row could not be written
    #[error("Failed to persist row into table '{table}': {reason}")]
    Persist { table: String, reason: String },

    /// Serialization/deserialization failure
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted column could not be decoded back into a record
    #[error("Failed to decode column '{column}': {reason}")]
    Decode { column: String, reason: String },

    /// Table or row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Host persistence layer failure (lock poisoning, unsupported operation)
    #[error("Host error: {0}")]
    Host(String),
}

/// Result type alias for change log operations
pub type Result<T> = std::result::Result<T, ChangeLogError>;
