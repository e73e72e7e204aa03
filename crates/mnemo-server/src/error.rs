//! Error taxonomy for the Memory Service.
//!
//! Every failure travels as a [`ServiceError`]; only the HTTP boundary
//! converts it to a status code and the `{detail, code}` envelope. Nothing
//! sensitive (tokens, embeddings, raw provider output) leaves through here.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, ServiceError>;

/// Service error, one variant per taxonomy entry.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Malformed request.
    #[error("{0}")]
    BadInput(String),

    /// Missing, invalid, expired, or disabled credentials.
    #[error("{0}")]
    Unauthenticated(String),

    /// Valid credentials, but the resource belongs to a different owner.
    #[error("{0}")]
    AccessDenied(String),

    /// Resource genuinely absent for this owner.
    #[error("{0}")]
    NotFound(String),

    /// The LLM or embedding provider failed or timed out.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// The vector or graph store is unreachable.
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Anything else.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable machine code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadInput(_) => "bad_input",
            Self::Unauthenticated(_) => "unauthenticated",
            Self::AccessDenied(_) => "access_denied",
            Self::NotFound(_) => "not_found",
            Self::ProviderUnavailable(_) => "provider_unavailable",
            Self::StoreUnavailable(_) => "store_unavailable",
            Self::Internal(_) => "internal",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadInput(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::AccessDenied(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::ProviderUnavailable(_) | Self::StoreUnavailable(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Human-readable description.
    pub detail: String,
    /// Stable machine code.
    pub code: &'static str,
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();
        let detail = self.to_string();

        match &self {
            ServiceError::ProviderUnavailable(_)
            | ServiceError::StoreUnavailable(_)
            | ServiceError::Internal(_) => {
                tracing::error!(status = %status, code, error = %detail, "Server error");
            }
            _ => {
                tracing::warn!(status = %status, code, error = %detail, "Client error");
            }
        }

        (status, Json(ErrorResponse { detail, code })).into_response()
    }
}

impl From<mnemo_store::StoreError> for ServiceError {
    fn from(err: mnemo_store::StoreError) -> Self {
        use mnemo_store::StoreError;
        match err {
            StoreError::NotFound(id) => ServiceError::NotFound(format!("Memory {id} not found")),
            StoreError::InvalidEmbedding { expected, got } => ServiceError::BadInput(format!(
                "invalid embedding: expected {expected} dimensions, got {got}"
            )),
            other => ServiceError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<mnemo_graph::GraphError> for ServiceError {
    fn from(err: mnemo_graph::GraphError) -> Self {
        use mnemo_graph::GraphError;
        match err {
            GraphError::NodeNotFound { kind, id } => {
                ServiceError::NotFound(format!("{kind} node {id} not found"))
            }
            GraphError::InvalidRelationship(r) => {
                ServiceError::BadInput(format!("invalid relationship '{r}'"))
            }
            other => ServiceError::StoreUnavailable(other.to_string()),
        }
    }
}

impl From<mnemo_llm::LlmError> for ServiceError {
    fn from(err: mnemo_llm::LlmError) -> Self {
        ServiceError::ProviderUnavailable(err.to_string())
    }
}

impl From<mnemo_auth::AuthError> for ServiceError {
    fn from(err: mnemo_auth::AuthError) -> Self {
        ServiceError::StoreUnavailable(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ServiceError::BadInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Unauthenticated("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ServiceError::AccessDenied("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ServiceError::NotFound("x".into()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ServiceError::ProviderUnavailable("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_store_error_conversion() {
        let err: ServiceError = mnemo_store::StoreError::NotFound("mem_1".into()).into();
        assert_eq!(err.code(), "not_found");

        let err: ServiceError = mnemo_store::StoreError::InvalidEmbedding {
            expected: 4,
            got: 2,
        }
        .into();
        assert_eq!(err.code(), "bad_input");
    }
}
