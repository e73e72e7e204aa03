//! Memory CRUD endpoints.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use mnemo_llm::ChatMessage;
use mnemo_store::{HistoryEvent, Memory, Metadata};

use crate::error::{Result, ServiceError};
use crate::pipeline::{self, MemoryResult};
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// One submitted conversation message.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
}

/// Request to create memories from raw messages.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMemoriesRequest {
    pub messages: Vec<ApiMessage>,
    pub user_id: Option<String>,
    #[serde(default)]
    pub agent_id: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// Response for memory creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMemoriesResponse {
    pub results: Vec<MemoryResult>,
    /// Graph relations are projected asynchronously; this stays empty in the
    /// synchronous response.
    pub relations: Vec<serde_json::Value>,
}

/// A memory as returned by read endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryView {
    pub id: String,
    pub memory: String,
    pub user_id: String,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Memory> for MemoryView {
    fn from(memory: Memory) -> Self {
        Self {
            id: memory.id,
            memory: memory.content,
            user_id: memory.owner_id,
            metadata: memory.metadata,
            created_at: memory.created_at,
            updated_at: memory.updated_at,
        }
    }
}

/// Listing response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListMemoriesResponse {
    pub results: Vec<MemoryView>,
}

/// Owner scope carried in the query string.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Option<String>,
}

/// Request to replace a memory's content.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMemoryRequest {
    pub user_id: Option<String>,
    pub content: String,
}

/// Plain confirmation body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// History response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub results: Vec<HistoryEvent>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn require_user(user_id: Option<String>) -> Result<String> {
    user_id.filter(|u| !u.is_empty()).ok_or_else(|| {
        ServiceError::BadInput("At least one identifier (user_id) is required.".to_string())
    })
}

/// Fetch a memory and enforce that it belongs to `user_id`.
///
/// Ownership failures are always `access_denied` — never a not-found that
/// would leak whether the id exists for someone else.
pub(crate) fn fetch_owned(state: &AppState, id: &str, user_id: &str) -> Result<Memory> {
    let memory = state.store.get(id)?;
    if memory.owner_id != user_id {
        return Err(ServiceError::AccessDenied(format!(
            "Access denied: Memory {id} does not belong to user {user_id}"
        )));
    }
    Ok(memory)
}

fn to_chat_messages(messages: &[ApiMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|m| match m.role.as_str() {
            "assistant" => ChatMessage::assistant(&m.content),
            _ => ChatMessage::user(&m.content),
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /memories - extract and store memories from raw messages.
pub async fn create_memories_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateMemoriesRequest>,
) -> Result<Json<CreateMemoriesResponse>> {
    let user_id = require_user(request.user_id)?;
    if request.messages.is_empty() {
        return Err(ServiceError::BadInput(
            "messages must not be empty".to_string(),
        ));
    }

    let mut metadata = request.metadata.unwrap_or_default();
    if let Some(agent_id) = request.agent_id {
        metadata.insert("agent_id".to_string(), serde_json::json!(agent_id));
    }
    if let Some(run_id) = request.run_id {
        metadata.insert("run_id".to_string(), serde_json::json!(run_id));
    }

    let messages = to_chat_messages(&request.messages);
    let results = pipeline::ingest(&state, &user_id, messages, metadata).await?;

    Ok(Json(CreateMemoriesResponse {
        results,
        relations: Vec::new(),
    }))
}

/// GET /memories - list all memories owned by `user_id`.
pub async fn list_memories_handler(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<ListMemoriesResponse>> {
    let user_id = require_user(query.user_id)?;
    let memories = state.store.list_by_owner(&user_id)?;
    Ok(Json(ListMemoriesResponse {
        results: memories.into_iter().map(MemoryView::from).collect(),
    }))
}

/// GET /memories/{id} - fetch one memory, ownership-checked.
pub async fn get_memory_handler(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<MemoryView>> {
    let user_id = require_user(query.user_id)?;
    let memory = fetch_owned(&state, &memory_id, &user_id)?;
    Ok(Json(MemoryView::from(memory)))
}

/// PUT /memories/{id} - replace content, re-embed, record an UPDATE event.
pub async fn update_memory_handler(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
    Json(request): Json<UpdateMemoryRequest>,
) -> Result<Json<MemoryView>> {
    let user_id = require_user(request.user_id)?;
    if request.content.trim().is_empty() {
        return Err(ServiceError::BadInput(
            "content must not be empty".to_string(),
        ));
    }

    fetch_owned(&state, &memory_id, &user_id)?;

    let embedding = state.embedder.embed(&request.content).await?;
    let updated = state
        .store
        .update_content(&memory_id, &request.content, &embedding)?;

    state.projector.enqueue(crate::projection::ProjectionJob {
        memory_id: updated.id.clone(),
        owner_id: updated.owner_id.clone(),
        content: updated.content.clone(),
        created_at: updated.created_at,
        metadata: updated.metadata.clone(),
    });

    Ok(Json(MemoryView::from(updated)))
}

/// DELETE /memories/{id} - delete one memory and its graph node.
pub async fn delete_memory_handler(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<MessageResponse>> {
    let user_id = require_user(query.user_id)?;
    fetch_owned(&state, &memory_id, &user_id)?;

    state.store.delete(&memory_id)?;
    if let Err(e) = state.graph.delete_memory_node(&memory_id) {
        warn!(memory_id = %memory_id, error = %e, "could not remove graph node");
    }

    Ok(Json(MessageResponse {
        message: "Memory deleted successfully".to_string(),
    }))
}

/// DELETE /memories - delete every memory owned by `user_id`.
pub async fn delete_all_memories_handler(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<MessageResponse>> {
    let user_id = require_user(query.user_id)?;

    let nodes = state.graph.list_memory_nodes(&user_id).unwrap_or_default();
    let deleted = state.store.delete_by_owner(&user_id)?;
    for node in nodes {
        if let Err(e) = state.graph.delete_memory_node(&node.id) {
            warn!(memory_id = %node.id, error = %e, "could not remove graph node");
        }
    }

    Ok(Json(MessageResponse {
        message: format!("Deleted {deleted} memories"),
    }))
}

/// GET /memories/{id}/history - ordered change history, ownership-checked.
pub async fn memory_history_handler(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<HistoryResponse>> {
    let user_id = require_user(query.user_id)?;
    fetch_owned(&state, &memory_id, &user_id)?;

    let events = state.store.history(&memory_id)?;
    Ok(Json(HistoryResponse { results: events }))
}
