//! Relationship graph and intelligence analyses for Mnemo.
//!
//! Memories projected from the vector store become typed graph nodes here,
//! joined by relationship edges to each other, to system components, and to
//! recorded decisions. On top of that structure the engine answers traversal
//! queries (related memories, shortest paths, conversation threads) and runs
//! the analyses behind the intelligence report: supersession tracking, impact
//! analysis, community detection, trust scoring, and health scoring.
//!
//! All operations are synchronous against a single SQLite file; callers that
//! live on an async runtime wrap them in blocking tasks.

pub mod analysis;
pub mod error;
pub mod store;
pub mod traverse;
pub mod types;

pub use error::{GraphError, Result};
pub use store::GraphStore;
pub use traverse::DEFAULT_DEPTH;
pub use types::{
    CentralMemory, Communities, CommunityMember, Component, ConflictEdge, Decision,
    DecisionRationale, DescribingMemory, Edge, EdgeKind, EvolutionEntry, ImpactAnalysis,
    ImpactedComponent, IntelligenceInsights, IntelligenceReport, IntelligenceSummary, MemoryNode,
    MemoryPath, RelatedMemory, SupersededPair, SupersededRef, TrustScore, TrustWeights,
    new_decision_id,
};

/// A graph store shared across request handlers and projection workers.
pub type SharedGraphStore = std::sync::Arc<GraphStore>;
