//! MCP tool parameter definitions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Parameters for `add_coding_preference`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AddPreferenceParams {
    /// The content to store, including code, documentation, and context.
    #[schemars(description = "The content to store in memory, including code, documentation, and context")]
    pub text: String,
}

/// Parameters for `search_coding_preferences`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct SearchPreferencesParams {
    /// Natural-language search query.
    #[schemars(description = "Search query describing what you're looking for")]
    pub query: String,

    /// Maximum number of results. Defaults to 10.
    #[schemars(description = "Maximum number of results to return (default: 10)")]
    pub limit: Option<usize>,
}

/// Parameters for `get_all_coding_preferences`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct GetAllParams {}

/// Parameters for `delete_memory`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DeleteMemoryParams {
    /// The id of the memory to delete.
    #[schemars(description = "The ID of the memory to delete")]
    pub memory_id: String,
}

/// Parameters for `get_memory_history`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct MemoryHistoryParams {
    /// The id of the memory to inspect.
    #[schemars(description = "The ID of the memory to get history for")]
    pub memory_id: String,
}

/// Parameters for `link_memories`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct LinkMemoriesParams {
    /// First memory id.
    #[schemars(description = "First memory ID")]
    pub memory_id_1: String,

    /// Second memory id.
    #[schemars(description = "Second memory ID")]
    pub memory_id_2: String,

    /// Relationship type. Defaults to `RELATES_TO`.
    #[schemars(
        description = "Relationship type: RELATES_TO, DEPENDS_ON, SUPERSEDES, RESPONDS_TO, EXTENDS, or CONFLICTS_WITH"
    )]
    pub relationship_type: Option<String>,
}

/// Parameters for `get_related_memories`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct RelatedMemoriesParams {
    /// The memory id to start from.
    #[schemars(description = "The memory ID to start from")]
    pub memory_id: String,

    /// How many hops to traverse. Defaults to 2.
    #[schemars(description = "How many hops to traverse (default: 2)")]
    pub depth: Option<usize>,
}

/// Parameters for `analyze_memory_intelligence`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct AnalyzeIntelligenceParams {}

/// Parameters for `create_component`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateComponentParams {
    /// Component name.
    #[schemars(description = "Component name (e.g. 'Authentication Service', 'PostgreSQL Database')")]
    pub name: String,

    /// Component kind. Defaults to `Component`.
    #[schemars(description = "Type (Infrastructure, Service, API, Feature, Library, ...)")]
    pub component_type: Option<String>,
}

/// Parameters for `link_component_dependency`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ComponentDependencyParams {
    /// Source component name.
    #[schemars(description = "Source component name")]
    pub component_from: String,

    /// Target component name.
    #[schemars(description = "Target component name")]
    pub component_to: String,

    /// Optional dependency flavor recorded on the edge.
    #[schemars(description = "Optional dependency tag (e.g. 'reads', 'deploys-with')")]
    pub tag: Option<String>,
}

/// Parameters for `analyze_component_impact`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct ComponentImpactParams {
    /// Name of the component to analyze.
    #[schemars(description = "Name of the component to analyze")]
    pub component_name: String,
}

/// Parameters for `create_decision`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct CreateDecisionParams {
    /// The decision text.
    #[schemars(description = "The decision text (e.g. 'Use PostgreSQL as primary database')")]
    pub text: String,

    /// Comma-separated pros.
    #[schemars(description = "Comma-separated pros (e.g. 'ACID compliance,Mature ecosystem')")]
    pub pros: Option<String>,

    /// Comma-separated cons.
    #[schemars(description = "Comma-separated cons (e.g. 'Scaling complexity')")]
    pub cons: Option<String>,

    /// Comma-separated alternatives considered.
    #[schemars(description = "Comma-separated alternatives considered (e.g. 'MongoDB,MySQL')")]
    pub alternatives: Option<String>,
}

/// Parameters for `get_decision_rationale`.
#[derive(Debug, Serialize, Deserialize, JsonSchema)]
pub struct DecisionRationaleParams {
    /// The decision id returned from `create_decision`.
    #[schemars(description = "The decision ID (returned from create_decision)")]
    pub decision_id: String,
}
