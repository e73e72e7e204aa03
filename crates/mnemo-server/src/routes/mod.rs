//! HTTP route handlers.

pub mod admin;
pub mod graph;
pub mod memories;
pub mod search;

pub use admin::{health_handler, reset_handler};
pub use graph::{
    communities_handler, component_dependency_handler, create_component_handler,
    create_decision_handler, create_thread_handler, decision_rationale_handler,
    evolution_handler, find_path_handler, get_thread_handler, graph_sync_handler,
    impact_handler, intelligence_handler, link_decision_handler, link_memories_handler,
    link_memory_component_handler, related_memories_handler, superseded_handler,
    trust_score_handler,
};
pub use memories::{
    create_memories_handler, delete_all_memories_handler, delete_memory_handler,
    get_memory_handler, list_memories_handler, memory_history_handler, update_memory_handler,
};
pub use search::search_handler;
