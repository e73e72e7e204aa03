//! The memory ingestion pipeline.
//!
//! Raw submitted messages go through three phases: the LLM extracts atomic
//! memory candidates, every candidate is embedded, and only then does
//! anything touch the store. Insertion is the commit point — a provider
//! failure in the first two phases aborts the call with nothing written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use mnemo_llm::{ChatMessage, MemoryAction};
use mnemo_store::{Filters, Memory, Metadata};

use crate::error::{Result, ServiceError};
use crate::projection::ProjectionJob;
use crate::state::AppState;

/// One pipeline outcome, in extractor output order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryResult {
    /// Id of the inserted or updated memory.
    pub id: String,
    /// The stored content.
    pub memory: String,
    /// "ADD" or "UPDATE".
    pub event: String,
    pub created_at: DateTime<Utc>,
}

/// Run extraction over submitted messages and commit the results.
pub async fn ingest(
    state: &AppState,
    owner_id: &str,
    messages: Vec<ChatMessage>,
    metadata: Metadata,
) -> Result<Vec<MemoryResult>> {
    // Phase 1: extract candidates, bounded by the configured deadline.
    let extracted = tokio::time::timeout(
        state.settings.extraction_timeout,
        state.extractor.extract(&messages),
    )
    .await
    .map_err(|_| ServiceError::ProviderUnavailable("memory extraction timed out".to_string()))??;

    if extracted.is_empty() {
        return Ok(Vec::new());
    }

    // Phase 2: embed everything before writing anything.
    let mut embedded = Vec::with_capacity(extracted.len());
    for candidate in extracted {
        let embedding = state.embedder.embed(&candidate.content).await?;
        embedded.push((candidate, embedding));
    }

    // Phase 3: commit, preserving extractor order.
    let mut results = Vec::with_capacity(embedded.len());
    for (candidate, embedding) in embedded {
        let result = match candidate.action {
            MemoryAction::Add => {
                insert_memory(state, owner_id, &candidate.content, embedding, &metadata)?
            }
            MemoryAction::Update => {
                apply_update(state, owner_id, &candidate.content, embedding, &metadata)?
            }
            MemoryAction::None => continue,
        };
        results.push(result);
    }

    Ok(results)
}

fn insert_memory(
    state: &AppState,
    owner_id: &str,
    content: &str,
    embedding: Vec<f32>,
    metadata: &Metadata,
) -> Result<MemoryResult> {
    let memory = Memory::new(owner_id, content, embedding, metadata.clone());
    state.store.insert(&memory)?;

    state.projector.enqueue(ProjectionJob {
        memory_id: memory.id.clone(),
        owner_id: memory.owner_id.clone(),
        content: memory.content.clone(),
        created_at: memory.created_at,
        metadata: memory.metadata.clone(),
    });

    debug!(memory_id = %memory.id, owner = owner_id, "memory added");
    Ok(MemoryResult {
        id: memory.id,
        memory: memory.content,
        event: "ADD".to_string(),
        created_at: memory.created_at,
    })
}

/// Apply an UPDATE candidate: replace the most similar owned memory when one
/// is close enough, otherwise store the candidate as new knowledge.
fn apply_update(
    state: &AppState,
    owner_id: &str,
    content: &str,
    embedding: Vec<f32>,
    metadata: &Metadata,
) -> Result<MemoryResult> {
    let hits = state
        .store
        .search(owner_id, &embedding, 1, &Filters::new())?;

    let target = hits
        .into_iter()
        .next()
        .filter(|hit| hit.score >= state.settings.update_similarity_threshold);

    match target {
        Some(hit) => {
            let updated = state
                .store
                .update_content(&hit.memory.id, content, &embedding)?;

            state.projector.enqueue(ProjectionJob {
                memory_id: updated.id.clone(),
                owner_id: updated.owner_id.clone(),
                content: updated.content.clone(),
                created_at: updated.created_at,
                metadata: updated.metadata.clone(),
            });

            debug!(memory_id = %updated.id, owner = owner_id, "memory updated");
            Ok(MemoryResult {
                id: updated.id,
                memory: updated.content,
                event: "UPDATE".to_string(),
                created_at: updated.created_at,
            })
        }
        None => insert_memory(state, owner_id, content, embedding, metadata),
    }
}
