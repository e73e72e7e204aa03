//! Semantic search endpoint.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mnemo_store::{Filters, Metadata};

use crate::error::{Result, ServiceError};
use crate::state::AppState;

/// Search request body.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub user_id: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub filters: Option<Filters>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
}

fn default_limit() -> usize {
    10
}

/// One ranked search result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    pub id: String,
    pub memory: String,
    /// Cosine similarity to the query.
    pub score: f32,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

/// Search response body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub results: Vec<SearchResult>,
}

/// POST /search - embed the query and run owner-scoped k-NN.
pub async fn search_handler(
    State(state): State<AppState>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<SearchResponse>> {
    let user_id = request
        .user_id
        .filter(|u| !u.is_empty())
        .ok_or_else(|| {
            ServiceError::BadInput("At least one identifier (user_id) is required.".to_string())
        })?;

    if request.query.trim().is_empty() {
        return Err(ServiceError::BadInput("query must not be empty".to_string()));
    }

    let mut filters = request.filters.unwrap_or_default();
    if let Some(agent_id) = request.agent_id {
        filters.insert("agent_id".to_string(), serde_json::json!(agent_id));
    }
    if let Some(run_id) = request.run_id {
        filters.insert("run_id".to_string(), serde_json::json!(run_id));
    }

    let embedding = state.embedder.embed(&request.query).await?;
    let hits = state
        .store
        .search(&user_id, &embedding, request.limit, &filters)?;

    let results = hits
        .into_iter()
        .map(|hit| SearchResult {
            id: hit.memory.id,
            memory: hit.memory.content,
            score: hit.score,
            metadata: hit.memory.metadata,
            created_at: hit.memory.created_at,
        })
        .collect();

    Ok(Json(SearchResponse { results }))
}
