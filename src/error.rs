//! Error types for the engine.
//!
//! Mirrors the teacher's hierarchical `thiserror` design
//! (`PulseDBError`/`StorageError`/`ValidationError`/`NotFoundError`),
//! regrouped around the five-kind taxonomy spec §7 requires:
//! `validation`, `not_found`, `conflict`, `internal`, `transport`. The
//! Tool Surface maps each kind to its JSON-RPC-style error envelope via
//! [`EngineError::kind`].
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use novaport_engine::{EngineConfig, WorkspaceRegistry, Result};
//!
//! fn example() -> Result<()> {
//!     let registry = WorkspaceRegistry::new(EngineConfig::default());
//!     let workspace = registry.acquire("/home/user/project".into())?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// The five error kinds spec §7 requires the Tool Surface to distinguish.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Conflict,
    Internal,
    Transport,
}

impl ErrorKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Internal => "internal",
            ErrorKind::Transport => "transport",
        }
    }
}

/// Top-level error enum for all engine operations.
///
/// This is the only error type returned by public APIs. Use
/// [`EngineError::kind`] for envelope mapping, or the `is_*` predicate
/// methods when a caller only needs a yes/no answer.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(#[from] NotFoundError),

    #[error("conflict: {0}")]
    Conflict(#[from] ConflictError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("vector index error: {0}")]
    Vector(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::Validation,
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::Conflict(_) => ErrorKind::Conflict,
            EngineError::Transport(_) => ErrorKind::Transport,
            EngineError::Storage(_)
            | EngineError::Embedding(_)
            | EngineError::Vector(_)
            | EngineError::Config(_)
            | EngineError::Io(_) => ErrorKind::Internal,
        }
    }

    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::Validation
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }

    pub fn config(msg: impl Into<String>) -> Self {
        EngineError::Config(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        EngineError::Embedding(msg.into())
    }

    pub fn vector(msg: impl Into<String>) -> Self {
        EngineError::Vector(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        EngineError::Transport(msg.into())
    }
}

/// Errors arising from the redb-backed relational store.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("redb database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("redb commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("redb table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    Redb(#[from] redb::StorageError),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("schema version mismatch: database has version {found}, engine expects {expected}")]
    SchemaVersionMismatch { expected: u32, found: u32 },

    #[error("row counter overflow in table {table}")]
    CounterOverflow { table: &'static str },
}

impl From<redb::DatabaseError> for EngineError {
    fn from(e: redb::DatabaseError) -> Self {
        EngineError::Storage(StorageError::Database(e))
    }
}

impl From<redb::TransactionError> for EngineError {
    fn from(e: redb::TransactionError) -> Self {
        EngineError::Storage(StorageError::Transaction(e))
    }
}

impl From<redb::CommitError> for EngineError {
    fn from(e: redb::CommitError) -> Self {
        EngineError::Storage(StorageError::Commit(e))
    }
}

impl From<redb::TableError> for EngineError {
    fn from(e: redb::TableError) -> Self {
        EngineError::Storage(StorageError::Table(e))
    }
}

impl From<redb::StorageError> for EngineError {
    fn from(e: redb::StorageError) -> Self {
        EngineError::Storage(StorageError::Redb(e))
    }
}

impl From<bincode::Error> for EngineError {
    fn from(e: bincode::Error) -> Self {
        EngineError::Storage(StorageError::Serialization(e))
    }
}

/// Input validation failures — malformed, missing, or out-of-range fields.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("required field missing: {field}")]
    RequiredField { field: &'static str },

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("content too large: {size} bytes exceeds limit of {limit} bytes")]
    ContentTooLarge { size: usize, limit: usize },

    #[error("too many items: {count} exceeds limit of {limit}")]
    TooManyItems { count: usize, limit: usize },

    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("unknown item type: {item_type}")]
    UnknownItemType { item_type: String },
}

impl ValidationError {
    pub fn required_field(field: &'static str) -> Self {
        ValidationError::RequiredField { field }
    }

    pub fn invalid_field(field: &'static str, reason: impl Into<String>) -> Self {
        ValidationError::InvalidField {
            field,
            reason: reason.into(),
        }
    }

    pub fn content_too_large(size: usize, limit: usize) -> Self {
        ValidationError::ContentTooLarge { size, limit }
    }

    pub fn too_many_items(count: usize, limit: usize) -> Self {
        ValidationError::TooManyItems { count, limit }
    }

    pub fn dimension_mismatch(expected: usize, got: usize) -> Self {
        ValidationError::DimensionMismatch { expected, got }
    }
}

/// A lookup failed because the referenced entity does not exist.
#[derive(Debug, Error)]
pub enum NotFoundError {
    #[error("workspace not found: {workspace_id}")]
    Workspace { workspace_id: String },

    #[error("{entity} {id} not found in workspace {workspace_id}")]
    Entity {
        entity: &'static str,
        id: String,
        workspace_id: String,
    },

    #[error("unknown tool: {tool}")]
    Tool { tool: String },
}

impl NotFoundError {
    pub fn workspace(workspace_id: impl Into<String>) -> Self {
        NotFoundError::Workspace {
            workspace_id: workspace_id.into(),
        }
    }

    pub fn entity(entity: &'static str, id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        NotFoundError::Entity {
            entity,
            id: id.into(),
            workspace_id: workspace_id.into(),
        }
    }
}

/// A write was rejected because it would violate a uniqueness or
/// ordering invariant (duplicate `SystemPattern.name`, duplicate
/// `(category, key)` on `CustomData` when the caller asked for strict
/// create semantics, etc).
#[derive(Debug, Error)]
pub enum ConflictError {
    #[error("{entity} with {field} = {value} already exists in workspace {workspace_id}")]
    Duplicate {
        entity: &'static str,
        field: &'static str,
        value: String,
        workspace_id: String,
    },
}

impl ConflictError {
    pub fn duplicate(
        entity: &'static str,
        field: &'static str,
        value: impl Into<String>,
        workspace_id: impl Into<String>,
    ) -> Self {
        ConflictError::Duplicate {
            entity,
            field,
            value: value.into(),
            workspace_id: workspace_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_mapping_validation() {
        let err: EngineError = ValidationError::required_field("summary").into();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(err.is_validation());
    }

    #[test]
    fn kind_mapping_not_found() {
        let err: EngineError = NotFoundError::workspace("/tmp/x").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(err.is_not_found());
    }

    #[test]
    fn kind_mapping_conflict() {
        let err: EngineError =
            ConflictError::duplicate("system_pattern", "name", "dup", "/tmp/x").into();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_conflict());
    }

    #[test]
    fn kind_mapping_internal_for_storage_and_config() {
        assert_eq!(EngineError::config("bad").kind(), ErrorKind::Internal);
        assert_eq!(EngineError::vector("bad").kind(), ErrorKind::Internal);
        assert_eq!(EngineError::embedding("bad").kind(), ErrorKind::Internal);
    }

    #[test]
    fn kind_mapping_transport() {
        assert_eq!(EngineError::transport("bad").kind(), ErrorKind::Transport);
    }

    #[test]
    fn error_kind_as_str() {
        assert_eq!(ErrorKind::Validation.as_str(), "validation");
        assert_eq!(ErrorKind::NotFound.as_str(), "not_found");
        assert_eq!(ErrorKind::Conflict.as_str(), "conflict");
        assert_eq!(ErrorKind::Internal.as_str(), "internal");
        assert_eq!(ErrorKind::Transport.as_str(), "transport");
    }

    #[test]
    fn not_found_entity_message_contains_fields() {
        let err = NotFoundError::entity("decision", "42", "/tmp/x");
        let msg = err.to_string();
        assert!(msg.contains("decision"));
        assert!(msg.contains("42"));
        assert!(msg.contains("/tmp/x"));
    }
}
