//! The MCP tool surface.
//!
//! Thirteen tools over the Memory Service: the five core memory operations
//! plus the graph-intelligence suite. Every call is scoped to the effective
//! project id derived at startup; transport-level middleware has already
//! authenticated the request by the time a tool runs.

pub mod params;

use rmcp::handler::server::tool::{Parameters, ToolRouter};
use rmcp::{ServerHandler, tool, tool_handler, tool_router};
use std::future::Future;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use mnemo_config::ChunkerConfig;

use crate::chunker::chunk_text;
use crate::client::MemoryClient;
use crate::error::GatewayError;
use params::*;

/// The gateway's MCP tool handler.
#[derive(Clone)]
pub struct GatewayTools {
    tool_router: ToolRouter<Self>,
    client: Arc<MemoryClient>,
    project_id: String,
    chunker: ChunkerConfig,
}

fn render(value: &Value) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("serialization failed: {e}"))
}

fn split_csv(input: Option<String>) -> Vec<String> {
    input
        .map(|s| {
            s.split(',')
                .map(|item| item.trim().to_string())
                .filter(|item| !item.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

#[tool_router]
impl GatewayTools {
    pub fn new(client: Arc<MemoryClient>, project_id: String, chunker: ChunkerConfig) -> Self {
        Self {
            tool_router: Self::tool_router(),
            client,
            project_id,
            chunker,
        }
    }

    /// Store text as coding preferences, chunking oversized input.
    #[tool(
        description = "Add a new coding preference. Stores code snippets, implementation details, and coding patterns for future semantic retrieval. Include complete code with context, language/version info, and any setup required. Large text is chunked automatically. Memories are scoped to the current project."
    )]
    async fn add_coding_preference(
        &self,
        Parameters(params): Parameters<AddPreferenceParams>,
    ) -> Result<String, String> {
        if params.text.trim().is_empty() {
            return Err("text must not be empty".into());
        }

        let run_id = Uuid::new_v4().to_string();
        let chunks = chunk_text(
            &params.text,
            self.chunker.max_chunk_size,
            self.chunker.overlap_size,
        );
        let total = chunks.len();

        info!(
            project_id = %self.project_id,
            run_id = %run_id,
            chunks = total,
            "storing coding preference"
        );

        let mut chunk_ids: Vec<Vec<String>> = Vec::with_capacity(total);

        // Chunks go out one at a time so downstream extraction sees them in
        // submission order.
        for chunk in &chunks {
            let mut payload = json!({
                "messages": [{"role": "user", "content": chunk.text}],
                "user_id": self.project_id,
                "run_id": run_id,
            });

            if total > 1 {
                payload["metadata"] = json!({
                    "chunk_index": chunk.index,
                    "total_chunks": chunk.total,
                    "chunk_size": chunk.size,
                    "has_overlap": chunk.has_overlap,
                    "run_id": run_id,
                });
            }

            match self.client.post("/memories", &payload).await {
                Ok(response) => {
                    let ids = response["results"]
                        .as_array()
                        .map(|results| {
                            results
                                .iter()
                                .filter_map(|r| r["id"].as_str().map(str::to_string))
                                .collect()
                        })
                        .unwrap_or_default();
                    chunk_ids.push(ids);
                }
                Err(e) => {
                    warn!(
                        run_id = %run_id,
                        failed_chunk = chunk.index,
                        error = %e,
                        "chunk dispatch failed"
                    );
                    // Partial success: report what landed and where it stopped,
                    // so the caller can retry only the failed suffix.
                    let report = json!({
                        "status": "partial_failure",
                        "run_id": run_id,
                        "total_chunks": total,
                        "stored_chunks": chunk.index,
                        "failed_chunk_index": chunk.index,
                        "memory_ids": chunk_ids,
                        "error": e.to_string(),
                    });
                    return render(&report);
                }
            }
        }

        let report = json!({
            "status": "ok",
            "run_id": run_id,
            "chunks": total,
            "memory_ids": chunk_ids,
        });
        render(&report)
    }

    /// Semantic search over the project's stored preferences.
    #[tool(
        description = "Search stored coding preferences with semantic search. Finds code implementations, solutions, best practices, and documentation by meaning rather than keywords. Scoped to the current project."
    )]
    async fn search_coding_preferences(
        &self,
        Parameters(params): Parameters<SearchPreferencesParams>,
    ) -> Result<String, String> {
        let payload = json!({
            "query": params.query,
            "user_id": self.project_id,
            "limit": params.limit.unwrap_or(10),
        });

        let response = self
            .client
            .post("/search", &payload)
            .await
            .map_err(|e| format!("Error searching preferences: {e}"))?;
        render(&response["results"])
    }

    /// Everything stored for the current project.
    #[tool(
        description = "Retrieve all stored coding preferences for the current project, with metadata. Use when you need the complete context of previously stored preferences."
    )]
    async fn get_all_coding_preferences(
        &self,
        Parameters(_params): Parameters<GetAllParams>,
    ) -> Result<String, String> {
        let response = self
            .client
            .get("/memories", &[("user_id", self.project_id.as_str())])
            .await
            .map_err(|e| format!("Error getting preferences: {e}"))?;
        render(&response)
    }

    /// Delete one memory, ownership-checked upstream.
    #[tool(
        description = "Delete a specific memory by its ID. Only memories owned by the current project can be deleted."
    )]
    async fn delete_memory(
        &self,
        Parameters(params): Parameters<DeleteMemoryParams>,
    ) -> Result<String, String> {
        match self
            .client
            .delete(
                &format!("/memories/{}", params.memory_id),
                &[("user_id", self.project_id.as_str())],
            )
            .await
        {
            Ok(_) => Ok(format!("Successfully deleted memory {}", params.memory_id)),
            Err(GatewayError::AccessDenied(_)) => Err(format!(
                "Access denied: Memory {} does not belong to your project",
                params.memory_id
            )),
            Err(e) => Err(format!("Error deleting memory: {e}")),
        }
    }

    /// Ordered change history of one memory.
    #[tool(
        description = "Get the history of a specific memory to see how it evolved over time. Only memories owned by the current project are visible."
    )]
    async fn get_memory_history(
        &self,
        Parameters(params): Parameters<MemoryHistoryParams>,
    ) -> Result<String, String> {
        match self
            .client
            .get(
                &format!("/memories/{}/history", params.memory_id),
                &[("user_id", self.project_id.as_str())],
            )
            .await
        {
            Ok(response) => render(&response),
            Err(GatewayError::AccessDenied(_)) => Err(format!(
                "Access denied: Memory {} does not belong to your project",
                params.memory_id
            )),
            Err(e) => Err(format!("Error getting memory history: {e}")),
        }
    }

    /// Typed relationship between two memories.
    #[tool(
        description = "Link two memories with a typed relationship (RELATES_TO, DEPENDS_ON, SUPERSEDES, RESPONDS_TO, EXTENDS, CONFLICTS_WITH) to build the knowledge graph."
    )]
    async fn link_memories(
        &self,
        Parameters(params): Parameters<LinkMemoriesParams>,
    ) -> Result<String, String> {
        let payload = json!({
            "memory_id_1": params.memory_id_1,
            "memory_id_2": params.memory_id_2,
            "relationship_type": params
                .relationship_type
                .unwrap_or_else(|| "RELATES_TO".to_string()),
        });

        let response = self
            .client
            .post("/graph/link", &payload)
            .await
            .map_err(|e| format!("Error linking memories: {e}"))?;
        render(&response)
    }

    /// Graph traversal from one memory.
    #[tool(
        description = "Get all memories related to a specific memory within N hops of the knowledge graph, with their relationship paths and distances."
    )]
    async fn get_related_memories(
        &self,
        Parameters(params): Parameters<RelatedMemoriesParams>,
    ) -> Result<String, String> {
        let depth = params.depth.unwrap_or(2).to_string();
        let response = self
            .client
            .get(
                &format!("/graph/related/{}", params.memory_id),
                &[("depth", depth.as_str())],
            )
            .await
            .map_err(|e| format!("Error getting related memories: {e}"))?;
        render(&response)
    }

    /// The comprehensive intelligence report.
    #[tool(
        description = "Generate a comprehensive intelligence report about the project's knowledge graph: health score, statistics, clusters, central memories, obsolete and conflicting knowledge, and actionable recommendations."
    )]
    async fn analyze_memory_intelligence(
        &self,
        Parameters(_params): Parameters<AnalyzeIntelligenceParams>,
    ) -> Result<String, String> {
        let response = self
            .client
            .get(
                "/graph/intelligence",
                &[("user_id", self.project_id.as_str())],
            )
            .await
            .map_err(|e| format!("Error analyzing intelligence: {e}"))?;
        render(&response)
    }

    /// Component node in the architecture map.
    #[tool(
        description = "Create a technical component node in the knowledge graph (Feature, Service, Database, API, ...). Components anchor impact analysis."
    )]
    async fn create_component(
        &self,
        Parameters(params): Parameters<CreateComponentParams>,
    ) -> Result<String, String> {
        let payload = json!({
            "name": params.name,
            "component_type": params
                .component_type
                .unwrap_or_else(|| "Component".to_string()),
        });

        let response = self
            .client
            .post("/graph/component", &payload)
            .await
            .map_err(|e| format!("Error creating component: {e}"))?;
        render(&response)
    }

    /// DEPENDS_ON between components.
    #[tool(
        description = "Create a dependency between two components (e.g. 'API depends on Database') to map system architecture and enable impact analysis."
    )]
    async fn link_component_dependency(
        &self,
        Parameters(params): Parameters<ComponentDependencyParams>,
    ) -> Result<String, String> {
        let payload = json!({
            "component_from": params.component_from,
            "component_to": params.component_to,
            "tag": params.tag,
        });

        let response = self
            .client
            .post("/graph/component/dependency", &payload)
            .await
            .map_err(|e| format!("Error linking component dependency: {e}"))?;
        render(&response)
    }

    /// What else is affected if a component changes.
    #[tool(
        description = "Analyze the impact of changing a component: transitive dependents, memories describing each, and an impact score. Use before architectural changes."
    )]
    async fn analyze_component_impact(
        &self,
        Parameters(params): Parameters<ComponentImpactParams>,
    ) -> Result<String, String> {
        let response = self
            .client
            .get(&format!("/graph/impact/{}", params.component_name), &[])
            .await
            .map_err(|e| format!("Error analyzing impact: {e}"))?;
        render(&response)
    }

    /// Structured decision record.
    #[tool(
        description = "Create a decision node with pros, cons, and alternatives considered. Builds a structured record of why technical choices were made."
    )]
    async fn create_decision(
        &self,
        Parameters(params): Parameters<CreateDecisionParams>,
    ) -> Result<String, String> {
        let payload = json!({
            "text": params.text,
            "user_id": self.project_id,
            "pros": split_csv(params.pros),
            "cons": split_csv(params.cons),
            "alternatives": split_csv(params.alternatives),
        });

        let response = self
            .client
            .post("/graph/decision", &payload)
            .await
            .map_err(|e| format!("Error creating decision: {e}"))?;
        render(&response)
    }

    /// Full rationale for a past decision.
    #[tool(
        description = "Retrieve the complete rationale for a past decision: text, pros, cons, alternatives evaluated, and the memories justifying it."
    )]
    async fn get_decision_rationale(
        &self,
        Parameters(params): Parameters<DecisionRationaleParams>,
    ) -> Result<String, String> {
        let response = self
            .client
            .get(&format!("/graph/decision/{}", params.decision_id), &[])
            .await
            .map_err(|e| format!("Error getting decision rationale: {e}"))?;
        render(&response)
    }
}

#[tool_handler]
impl ServerHandler for GatewayTools {
    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            instructions: Some(
                "Mnemo is a project-scoped memory service. Use add_coding_preference to store \
                 knowledge, search_coding_preferences to retrieve it, and the graph tools to \
                 link memories, map components, and analyze your knowledge base."
                    .into(),
            ),
            capabilities: rmcp::model::ServerCapabilities::builder()
                .enable_tools()
                .build(),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_csv() {
        assert_eq!(
            split_csv(Some("a, b ,c".to_string())),
            vec!["a", "b", "c"]
        );
        assert!(split_csv(Some("  ".to_string())).is_empty());
        assert!(split_csv(None).is_empty());
    }
}
