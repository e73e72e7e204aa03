//! Error types for the memory store.

use thiserror::Error;

/// Result type alias for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Memory store error.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No memory with the given id.
    #[error("Memory {0} not found")]
    NotFound(String),

    /// An embedding did not match the store's configured dimensionality.
    #[error("invalid embedding: expected {expected} dimensions, got {got}")]
    InvalidEmbedding { expected: usize, got: usize },

    /// The store on disk was created with a different dimensionality.
    ///
    /// This is a fatal startup condition: the index layout is derived from D
    /// and silently mixing dimensionalities would corrupt search results.
    #[error(
        "embedding dimensionality mismatch: store was created with {stored}, configured {configured}"
    )]
    DimensionMismatch { stored: usize, configured: usize },

    /// Metadata could not be serialized or parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (poisoned lock and similar).
    #[error("Internal error: {0}")]
    Internal(String),
}
