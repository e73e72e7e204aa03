//! Typed nodes, edges, and analysis results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Edges
// ─────────────────────────────────────────────────────────────────────────────

/// Every relationship kind the graph supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeKind {
    /// General association between memories.
    RelatesTo,
    /// One node depends on another (memory→memory or component→component).
    DependsOn,
    /// New knowledge replaces old; the target is flagged obsolete.
    Supersedes,
    /// Conversation-thread continuation.
    RespondsTo,
    /// Adds detail to a previous memory.
    Extends,
    /// Contradictory information flagged for review.
    ConflictsWith,
    /// Memory describes a component.
    Describes,
    /// Decision is justified by a memory.
    Justifies,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RelatesTo => "RELATES_TO",
            Self::DependsOn => "DEPENDS_ON",
            Self::Supersedes => "SUPERSEDES",
            Self::RespondsTo => "RESPONDS_TO",
            Self::Extends => "EXTENDS",
            Self::ConflictsWith => "CONFLICTS_WITH",
            Self::Describes => "DESCRIBES",
            Self::Justifies => "JUSTIFIES",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "RELATES_TO" => Some(Self::RelatesTo),
            "DEPENDS_ON" => Some(Self::DependsOn),
            "SUPERSEDES" => Some(Self::Supersedes),
            "RESPONDS_TO" => Some(Self::RespondsTo),
            "EXTENDS" => Some(Self::Extends),
            "CONFLICTS_WITH" => Some(Self::ConflictsWith),
            "DESCRIBES" => Some(Self::Describes),
            "JUSTIFIES" => Some(Self::Justifies),
            _ => None,
        }
    }

    /// Kinds allowed between two memory nodes.
    pub fn is_memory_relation(&self) -> bool {
        matches!(
            self,
            Self::RelatesTo
                | Self::DependsOn
                | Self::Supersedes
                | Self::RespondsTo
                | Self::Extends
                | Self::ConflictsWith
        )
    }
}

/// A typed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from_id: String,
    pub to_id: String,
    pub kind: EdgeKind,
    /// Optional free-form tag (component dependency flavor and similar).
    pub tag: Option<String>,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Nodes
// ─────────────────────────────────────────────────────────────────────────────

/// Graph mirror of a stored memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: String,
    pub owner_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Set when another memory supersedes this one.
    pub obsolete: bool,
}

/// A technical component (service, database, feature, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Component {
    pub name: String,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

/// Generate a new decision id.
pub fn new_decision_id() -> String {
    format!("dec_{}", Uuid::new_v4().simple())
}

/// A recorded technical decision with structured rationale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub id: String,
    pub text: String,
    pub owner_id: String,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
    pub alternatives: Vec<String>,
    pub created_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Query Results
// ─────────────────────────────────────────────────────────────────────────────

/// One memory reached by graph traversal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelatedMemory {
    pub memory_id: String,
    pub content: String,
    /// Edge kinds along the path from the origin, in order.
    pub relationship_path: Vec<String>,
    /// Hops from the origin.
    pub distance: usize,
}

/// Shortest path between two memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryPath {
    pub memory_ids: Vec<String>,
    pub relationships: Vec<String>,
    pub path_length: usize,
}

/// One step in a topic's evolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvolutionEntry {
    pub memory_id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// The memory this one superseded, if any.
    pub superseded: Option<SupersededRef>,
}

/// Reference to a superseded memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupersededRef {
    pub id: String,
    pub content: String,
}

/// An obsolete/current pair from supersession tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupersededPair {
    pub obsolete_memory: MemoryNode,
    pub current_memory: MemoryNode,
}

/// A component impacted if another component changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactedComponent {
    pub name: String,
    /// How many memories describe this component.
    pub describing_memories: usize,
}

/// Result of impact analysis for one component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImpactAnalysis {
    pub component: String,
    /// Components that transitively depend on it.
    pub dependents: Vec<ImpactedComponent>,
    /// Memories describing the component itself.
    pub describing_memories: Vec<DescribingMemory>,
    pub impact_score: usize,
}

/// A memory attached to a component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescribingMemory {
    pub id: String,
    pub content: String,
}

/// Full rationale for a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRationale {
    pub decision: Decision,
    /// Memories linked via JUSTIFIES.
    pub justified_by: Vec<DescribingMemory>,
}

/// A member of a detected community.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommunityMember {
    pub memory_id: String,
    pub content: String,
    pub connections: usize,
}

/// Communities keyed by their propagated label.
pub type Communities = BTreeMap<String, Vec<CommunityMember>>;

/// Weights for the trust-score formula.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TrustWeights {
    /// Weight of the inbound-citation term.
    pub citation: f64,
    /// Weight of the recency term.
    pub recency: f64,
    /// Penalty per conflicting edge.
    pub conflict_penalty: f64,
}

impl Default for TrustWeights {
    fn default() -> Self {
        Self {
            citation: 0.45,
            recency: 0.45,
            conflict_penalty: 0.10,
        }
    }
}

/// Trust score for one memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrustScore {
    pub memory_id: String,
    /// In [0, 1].
    pub score: f64,
    pub citations: usize,
    pub conflicts: usize,
    pub age_days: i64,
}

/// Summary block of the intelligence report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceSummary {
    pub total_memories: usize,
    pub avg_connections: f64,
    pub isolated_memories: usize,
    pub obsolete_memories: usize,
    /// In [0, 10].
    pub knowledge_health_score: f64,
}

/// One conflicting edge surfaced in the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictEdge {
    pub from_id: String,
    pub to_id: String,
}

/// A highly connected memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentralMemory {
    pub memory_id: String,
    pub content: String,
    pub connections: usize,
}

/// Insights block of the intelligence report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceInsights {
    pub conflicting_knowledge: Vec<ConflictEdge>,
    /// Cluster label → member count.
    pub clusters: BTreeMap<String, usize>,
    pub central_memories: Vec<CentralMemory>,
}

/// The full intelligence report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntelligenceReport {
    pub summary: IntelligenceSummary,
    pub insights: IntelligenceInsights,
    pub recommendations: Vec<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_kind_round_trip() {
        for kind in [
            EdgeKind::RelatesTo,
            EdgeKind::DependsOn,
            EdgeKind::Supersedes,
            EdgeKind::RespondsTo,
            EdgeKind::Extends,
            EdgeKind::ConflictsWith,
            EdgeKind::Describes,
            EdgeKind::Justifies,
        ] {
            assert_eq!(EdgeKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EdgeKind::parse("CITES"), None);
    }

    #[test]
    fn test_memory_relation_kinds() {
        assert!(EdgeKind::RelatesTo.is_memory_relation());
        assert!(EdgeKind::Supersedes.is_memory_relation());
        assert!(!EdgeKind::Describes.is_memory_relation());
        assert!(!EdgeKind::Justifies.is_memory_relation());
    }

    #[test]
    fn test_decision_id_format() {
        let id = new_decision_id();
        assert!(id.starts_with("dec_"));
    }
}
