//! Administrative and health endpoints.

use axum::{
    Json,
    extract::State,
    http::{HeaderMap, header::AUTHORIZATION},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, ServiceError};
use crate::routes::memories::MessageResponse;
use crate::state::AppState;

/// Health response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub provider: String,
}

/// GET /health - liveness and provider identity.
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        service: "mnemo-server".to_string(),
        provider: state.settings.provider_name.clone(),
    })
}

/// POST /reset - administrative full wipe of both stores.
///
/// Requires a bearer token whose permission set contains `admin`; the REST
/// surface is otherwise unauthenticated, so this is the one endpoint that
/// must not be reachable with ordinary credentials.
pub async fn reset_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>> {
    let Some(auth) = &state.auth else {
        return Err(ServiceError::Unauthenticated(
            "reset requires admin credentials, but no auth store is configured".to_string(),
        ));
    };

    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or_else(|| {
            ServiceError::Unauthenticated("reset requires a bearer token".to_string())
        })?;

    let record = auth
        .get_token(token)?
        .ok_or_else(|| ServiceError::Unauthenticated("invalid admin token".to_string()))?;

    if !record.enabled || record.is_expired(Utc::now()) || !record.has_permission("admin") {
        return Err(ServiceError::Unauthenticated(
            "admin permission required".to_string(),
        ));
    }

    state.store.reset()?;
    state.graph.reset()?;
    info!(user_id = %record.user_id, "all memories reset");

    Ok(Json(MessageResponse {
        message: "All memories reset".to_string(),
    }))
}
