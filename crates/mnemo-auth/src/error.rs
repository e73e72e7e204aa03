//! Error types for the auth store.

use thiserror::Error;

/// Result type alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Auth store error.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Underlying SQLite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No token matched.
    #[error("token not found")]
    TokenNotFound,

    /// A prefix matched more than one token.
    #[error("token prefix is ambiguous ({0} matches)")]
    AmbiguousPrefix(usize),

    /// Permissions or client info could not be serialized.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error (poisoned lock and similar).
    #[error("Internal error: {0}")]
    Internal(String),
}
