//! Error types for the graph engine.

use thiserror::Error;

/// Result type alias for graph operations.
pub type Result<T> = std::result::Result<T, GraphError>;

/// Graph engine error.
#[derive(Debug, Error)]
pub enum GraphError {
    /// Underlying SQLite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A referenced node does not exist.
    #[error("{kind} node {id} not found")]
    NodeNotFound { kind: &'static str, id: String },

    /// An edge kind is not valid between the given node kinds.
    #[error("invalid relationship '{0}' for this operation")]
    InvalidRelationship(String),

    /// Structured attributes could not be serialized or parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (poisoned lock and similar).
    #[error("Internal error: {0}")]
    Internal(String),
}
