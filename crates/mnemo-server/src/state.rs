//! Application state shared across handlers.
//!
//! An explicit value assembled once at startup and threaded through every
//! handler; providers are wired nowhere else.

use std::sync::Arc;
use std::time::Duration;

use mnemo_auth::SharedAuthStore;
use mnemo_graph::SharedGraphStore;
use mnemo_llm::{Extractor, SharedEmbedder};
use mnemo_store::SharedVectorStore;

use crate::projection::Projector;

/// Tunables resolved from configuration at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Provider name, reported by `/health`.
    pub provider_name: String,
    /// Deadline for one extraction LLM call.
    pub extraction_timeout: Duration,
    /// Cosine similarity at or above which an UPDATE targets an existing
    /// memory.
    pub update_similarity_threshold: f32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            provider_name: "mock".to_string(),
            extraction_timeout: Duration::from_secs(120),
            update_similarity_threshold: 0.85,
        }
    }
}

/// State shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The vector store.
    pub store: SharedVectorStore,
    /// The relationship graph.
    pub graph: SharedGraphStore,
    /// Auth store for administrative endpoints (optional — None disables
    /// `/reset`).
    pub auth: Option<SharedAuthStore>,
    /// The LLM memory extractor.
    pub extractor: Arc<Extractor>,
    /// The embedder; its dimensionality matches the store's.
    pub embedder: SharedEmbedder,
    /// Background projection queue.
    pub projector: Projector,
    /// Resolved tunables.
    pub settings: Arc<Settings>,
}

impl AppState {
    /// Assemble the application state.
    pub fn new(
        store: SharedVectorStore,
        graph: SharedGraphStore,
        extractor: Extractor,
        embedder: SharedEmbedder,
        projector: Projector,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            graph,
            auth: None,
            extractor: Arc::new(extractor),
            embedder,
            projector,
            settings: Arc::new(settings),
        }
    }

    /// Attach an auth store for administrative endpoints.
    pub fn with_auth(mut self, auth: SharedAuthStore) -> Self {
        self.auth = Some(auth);
        self
    }
}
