//! Graph intelligence endpoints, one per engine operation.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mnemo_graph::{
    Communities, Decision, DecisionRationale, Edge, EdgeKind, EvolutionEntry, ImpactAnalysis,
    IntelligenceReport, MemoryNode, MemoryPath, RelatedMemory, SupersededPair, TrustScore,
    TrustWeights,
};

use crate::error::{Result, ServiceError};
use crate::projection::{GraphSink, ProjectionJob};
use crate::routes::memories::fetch_owned;
use crate::state::AppState;

fn require_user(user_id: Option<String>) -> Result<String> {
    user_id.filter(|u| !u.is_empty()).ok_or_else(|| {
        ServiceError::BadInput("At least one identifier (user_id) is required.".to_string())
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Linking
// ─────────────────────────────────────────────────────────────────────────────

/// Request to link two memories.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkMemoriesRequest {
    pub memory_id_1: String,
    pub memory_id_2: String,
    #[serde(default = "default_relationship")]
    pub relationship_type: String,
}

fn default_relationship() -> String {
    "RELATES_TO".to_string()
}

/// Confirmation of a created link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkResponse {
    pub from_memory_id: String,
    pub relationship: String,
    pub to_memory_id: String,
}

impl From<Edge> for LinkResponse {
    fn from(edge: Edge) -> Self {
        Self {
            from_memory_id: edge.from_id,
            relationship: edge.kind.as_str().to_string(),
            to_memory_id: edge.to_id,
        }
    }
}

/// POST /graph/link - create a typed relationship between two memories.
pub async fn link_memories_handler(
    State(state): State<AppState>,
    Json(request): Json<LinkMemoriesRequest>,
) -> Result<Json<LinkResponse>> {
    let kind = EdgeKind::parse(&request.relationship_type).ok_or_else(|| {
        ServiceError::BadInput(format!(
            "unknown relationship type '{}'",
            request.relationship_type
        ))
    })?;

    let edge = state
        .graph
        .link_memories(&request.memory_id_1, &request.memory_id_2, kind)?;
    Ok(Json(LinkResponse::from(edge)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Traversal
// ─────────────────────────────────────────────────────────────────────────────

/// Depth parameter for related-memory traversal.
#[derive(Debug, Clone, Deserialize)]
pub struct RelatedQuery {
    #[serde(default = "default_depth")]
    pub depth: usize,
}

fn default_depth() -> usize {
    mnemo_graph::DEFAULT_DEPTH
}

/// GET /graph/related/{id} - memories within N hops.
pub async fn related_memories_handler(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
    Query(query): Query<RelatedQuery>,
) -> Result<Json<Vec<RelatedMemory>>> {
    let related = state.graph.get_related_memories(&memory_id, query.depth)?;
    Ok(Json(related))
}

/// Endpoints of a path query.
#[derive(Debug, Clone, Deserialize)]
pub struct PathQuery {
    pub from_memory_id: String,
    pub to_memory_id: String,
}

/// GET /graph/path - shortest edge-labelled path between two memories.
pub async fn find_path_handler(
    State(state): State<AppState>,
    Query(query): Query<PathQuery>,
) -> Result<Json<MemoryPath>> {
    let path = state
        .graph
        .find_path(&query.from_memory_id, &query.to_memory_id)?
        .ok_or_else(|| {
            ServiceError::NotFound("No path found between memories".to_string())
        })?;
    Ok(Json(path))
}

// ─────────────────────────────────────────────────────────────────────────────
// Evolution & Supersession
// ─────────────────────────────────────────────────────────────────────────────

/// Time window for evolution queries.
#[derive(Debug, Clone, Deserialize)]
pub struct EvolutionQuery {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

/// GET /graph/evolution/{topic} - how knowledge about a topic evolved.
pub async fn evolution_handler(
    State(state): State<AppState>,
    Path(topic): Path<String>,
    Query(query): Query<EvolutionQuery>,
) -> Result<Json<Vec<EvolutionEntry>>> {
    let entries = state
        .graph
        .get_memory_evolution(&topic, query.since, query.until)?;
    Ok(Json(entries))
}

/// Owner scope carried in the query string.
#[derive(Debug, Clone, Deserialize)]
pub struct OwnerQuery {
    pub user_id: Option<String>,
}

/// GET /graph/superseded - obsolete/current pairs for an owner.
pub async fn superseded_handler(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Vec<SupersededPair>>> {
    let user_id = require_user(query.user_id)?;
    let pairs = state.graph.find_superseded_memories(&user_id)?;
    Ok(Json(pairs))
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation Threads
// ─────────────────────────────────────────────────────────────────────────────

/// Request to chain memories into a thread.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateThreadRequest {
    pub memory_ids: Vec<String>,
}

/// Thread creation confirmation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreadResponse {
    pub thread_length: usize,
    pub memory_ids: Vec<String>,
}

/// POST /graph/thread - link memories into a conversation thread.
pub async fn create_thread_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateThreadRequest>,
) -> Result<Json<ThreadResponse>> {
    let length = state.graph.create_conversation_thread(&request.memory_ids)?;
    Ok(Json(ThreadResponse {
        thread_length: length,
        memory_ids: request.memory_ids,
    }))
}

/// GET /graph/thread/{id} - the full thread containing a memory.
pub async fn get_thread_handler(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
) -> Result<Json<Vec<MemoryNode>>> {
    let thread = state.graph.get_conversation_thread(&memory_id)?;
    Ok(Json(thread))
}

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

/// Request to create a component node.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateComponentRequest {
    pub name: String,
    #[serde(default = "default_component_type")]
    pub component_type: String,
}

fn default_component_type() -> String {
    "Component".to_string()
}

/// POST /graph/component - upsert a component node.
pub async fn create_component_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateComponentRequest>,
) -> Result<Json<mnemo_graph::Component>> {
    let component = state
        .graph
        .create_component(&request.name, &request.component_type)?;
    Ok(Json(component))
}

/// Request to link two components.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentDependencyRequest {
    pub component_from: String,
    pub component_to: String,
    #[serde(default)]
    pub tag: Option<String>,
}

/// POST /graph/component/dependency - DEPENDS_ON between components.
pub async fn component_dependency_handler(
    State(state): State<AppState>,
    Json(request): Json<ComponentDependencyRequest>,
) -> Result<Json<LinkResponse>> {
    let edge = state.graph.link_component_dependency(
        &request.component_from,
        &request.component_to,
        request.tag.as_deref(),
    )?;
    Ok(Json(LinkResponse::from(edge)))
}

/// Request to attach a memory to a component.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkMemoryComponentRequest {
    pub memory_id: String,
    pub component_name: String,
}

/// POST /graph/component/link-memory - DESCRIBES memory → component.
pub async fn link_memory_component_handler(
    State(state): State<AppState>,
    Json(request): Json<LinkMemoryComponentRequest>,
) -> Result<Json<LinkResponse>> {
    let edge = state
        .graph
        .link_memory_to_component(&request.memory_id, &request.component_name)?;
    Ok(Json(LinkResponse::from(edge)))
}

/// GET /graph/impact/{name} - what breaks if this component changes.
pub async fn impact_handler(
    State(state): State<AppState>,
    Path(component): Path<String>,
) -> Result<Json<ImpactAnalysis>> {
    let impact = state.graph.get_impact_analysis(&component)?;
    Ok(Json(impact))
}

// ─────────────────────────────────────────────────────────────────────────────
// Decisions
// ─────────────────────────────────────────────────────────────────────────────

/// Request to record a decision.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateDecisionRequest {
    pub text: String,
    pub user_id: Option<String>,
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

/// POST /graph/decision - create a decision node.
pub async fn create_decision_handler(
    State(state): State<AppState>,
    Json(request): Json<CreateDecisionRequest>,
) -> Result<Json<Decision>> {
    let user_id = require_user(request.user_id)?;
    let decision = state.graph.create_decision(
        &request.text,
        &user_id,
        request.pros,
        request.cons,
        request.alternatives,
    )?;
    Ok(Json(decision))
}

/// Request to link a decision to a justifying memory.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkDecisionRequest {
    pub decision_id: String,
    pub memory_id: String,
}

/// POST /graph/decision/link - JUSTIFIES decision → memory.
pub async fn link_decision_handler(
    State(state): State<AppState>,
    Json(request): Json<LinkDecisionRequest>,
) -> Result<Json<LinkResponse>> {
    let edge = state
        .graph
        .link_decision_to_memory(&request.decision_id, &request.memory_id)?;
    Ok(Json(LinkResponse::from(edge)))
}

/// GET /graph/decision/{id} - full decision rationale.
pub async fn decision_rationale_handler(
    State(state): State<AppState>,
    Path(decision_id): Path<String>,
) -> Result<Json<DecisionRationale>> {
    let rationale = state.graph.get_decision_rationale(&decision_id)?;
    Ok(Json(rationale))
}

// ─────────────────────────────────────────────────────────────────────────────
// Analyses
// ─────────────────────────────────────────────────────────────────────────────

/// GET /graph/communities - clusters of related memories.
pub async fn communities_handler(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<Communities>> {
    let user_id = require_user(query.user_id)?;
    let communities = state.graph.detect_memory_communities(&user_id)?;
    Ok(Json(communities))
}

/// GET /graph/trust-score/{id} - trust score for one memory.
pub async fn trust_score_handler(
    State(state): State<AppState>,
    Path(memory_id): Path<String>,
) -> Result<Json<TrustScore>> {
    let score =
        state
            .graph
            .calculate_trust_score(&memory_id, &TrustWeights::default(), Utc::now())?;
    Ok(Json(score))
}

/// GET /graph/intelligence - the comprehensive report.
pub async fn intelligence_handler(
    State(state): State<AppState>,
    Query(query): Query<OwnerQuery>,
) -> Result<Json<IntelligenceReport>> {
    let user_id = require_user(query.user_id)?;
    let report = state.graph.analyze_memory_intelligence(&user_id)?;
    Ok(Json(report))
}

// ─────────────────────────────────────────────────────────────────────────────
// Manual Re-projection
// ─────────────────────────────────────────────────────────────────────────────

/// Request to re-project one memory into the graph.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphSyncRequest {
    pub memory_id: String,
    pub user_id: Option<String>,
}

/// Confirmation of a manual projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphSyncResponse {
    pub memory_id: String,
    pub synced: bool,
}

/// POST /graph/sync - synchronously project one memory, ownership-checked.
pub async fn graph_sync_handler(
    State(state): State<AppState>,
    Json(request): Json<GraphSyncRequest>,
) -> Result<Json<GraphSyncResponse>> {
    let user_id = require_user(request.user_id)?;
    let memory = fetch_owned(&state, &request.memory_id, &user_id)?;

    let job = ProjectionJob {
        memory_id: memory.id.clone(),
        owner_id: memory.owner_id,
        content: memory.content,
        created_at: memory.created_at,
        metadata: memory.metadata,
    };
    GraphSink::project(state.graph.as_ref(), &job)
        .map_err(ServiceError::StoreUnavailable)?;

    Ok(Json(GraphSyncResponse {
        memory_id: memory.id,
        synced: true,
    }))
}
