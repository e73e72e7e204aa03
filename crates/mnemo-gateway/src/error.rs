//! Error types for the gateway.

use thiserror::Error;

/// Result type alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

/// Gateway error.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The Memory Service rejected the request with a client-facing reason.
    #[error("{detail}")]
    Upstream { status: u16, detail: String },

    /// Ownership refusal from the Memory Service.
    #[error("{0}")]
    AccessDenied(String),

    /// Could not reach the Memory Service at all.
    #[error("Memory service unreachable: {0}")]
    Unreachable(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Unreachable(err.to_string())
    }
}
