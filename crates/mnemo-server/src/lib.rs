//! Memory Service REST API for Mnemo.
//!
//! A stateless HTTP layer over the vector store and the relationship graph:
//! memory CRUD with strict per-owner scoping, LLM-driven extraction on
//! ingestion, owner-filtered semantic search, the full graph-intelligence
//! surface, and background projection of every stored memory into the graph.

pub mod error;
pub mod pipeline;
pub mod projection;
pub mod routes;
pub mod state;

pub use error::{Result, ServiceError};
pub use pipeline::MemoryResult;
pub use projection::{GraphSink, MAX_ATTEMPTS, ProjectionJob, Projector, backoff_delay};
pub use state::{AppState, Settings};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use mnemo_auth::AuthStore;
use mnemo_config::MnemoConfig;
use mnemo_graph::GraphStore;
use mnemo_llm::Extractor;
use mnemo_store::SqliteMemoryStore;

/// The Memory Service HTTP server.
pub struct Server {
    state: AppState,
}

impl Server {
    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/health", get(routes::health_handler))
            .route(
                "/memories",
                post(routes::create_memories_handler)
                    .get(routes::list_memories_handler)
                    .delete(routes::delete_all_memories_handler),
            )
            .route(
                "/memories/{id}",
                get(routes::get_memory_handler)
                    .put(routes::update_memory_handler)
                    .delete(routes::delete_memory_handler),
            )
            .route("/memories/{id}/history", get(routes::memory_history_handler))
            .route("/search", post(routes::search_handler))
            .route("/reset", post(routes::reset_handler))
            // Graph intelligence
            .route("/graph/link", post(routes::link_memories_handler))
            .route("/graph/related/{id}", get(routes::related_memories_handler))
            .route("/graph/path", get(routes::find_path_handler))
            .route("/graph/evolution/{topic}", get(routes::evolution_handler))
            .route("/graph/superseded", get(routes::superseded_handler))
            .route(
                "/graph/thread",
                post(routes::create_thread_handler),
            )
            .route("/graph/thread/{id}", get(routes::get_thread_handler))
            .route("/graph/component", post(routes::create_component_handler))
            .route(
                "/graph/component/dependency",
                post(routes::component_dependency_handler),
            )
            .route(
                "/graph/component/link-memory",
                post(routes::link_memory_component_handler),
            )
            .route("/graph/impact/{name}", get(routes::impact_handler))
            .route("/graph/decision", post(routes::create_decision_handler))
            .route("/graph/decision/link", post(routes::link_decision_handler))
            .route(
                "/graph/decision/{id}",
                get(routes::decision_rationale_handler),
            )
            .route("/graph/communities", get(routes::communities_handler))
            .route(
                "/graph/trust-score/{id}",
                get(routes::trust_score_handler),
            )
            .route("/graph/intelligence", get(routes::intelligence_handler))
            .route("/graph/sync", post(routes::graph_sync_handler))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// Run the server on the given address.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let router = self.router();

        info!(%addr, "memory service listening");

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServiceError::Internal(format!("Failed to bind: {e}")))?;

        axum::serve(listener, router)
            .await
            .map_err(|e| ServiceError::Internal(format!("Server error: {e}")))?;

        Ok(())
    }
}

/// Assemble the full application state from configuration.
///
/// This is the single place providers, stores, and the projection pool are
/// wired together. Must run inside a tokio runtime (the projection workers
/// are spawned here).
pub fn build_state(config: &MnemoConfig) -> Result<AppState> {
    for path in [
        &config.storage.memory_db_path,
        &config.storage.graph_db_path,
        &config.storage.auth_db_path,
    ] {
        ensure_parent_dir(path)?;
    }

    let backend = mnemo_llm::build_backend(&config.provider)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;
    let embedder = mnemo_llm::build_embedder(&config.provider)
        .map_err(|e| ServiceError::Internal(e.to_string()))?;

    let dims = config.provider.embedding_dims();
    let store = Arc::new(
        SqliteMemoryStore::open(&config.storage.memory_db_path, dims)
            .map_err(|e| ServiceError::Internal(e.to_string()))?,
    );
    let graph = Arc::new(
        GraphStore::open(&config.storage.graph_db_path)
            .map_err(|e| ServiceError::Internal(e.to_string()))?,
    );
    let auth = Arc::new(
        AuthStore::open(&config.storage.auth_db_path)
            .map_err(|e| ServiceError::Internal(e.to_string()))?,
    );

    let projector = Projector::spawn(graph.clone(), config.server.projection_workers);

    let settings = Settings {
        provider_name: config.provider.provider.as_str().to_string(),
        extraction_timeout: std::time::Duration::from_secs(config.server.extraction_timeout_secs),
        update_similarity_threshold: config.server.update_similarity_threshold,
    };

    Ok(
        AppState::new(store, graph, Extractor::new(backend), embedder, projector, settings)
            .with_auth(auth),
    )
}

fn ensure_parent_dir(path: &str) -> Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ServiceError::Internal(format!("cannot create {parent:?}: {e}")))?;
        }
    }
    Ok(())
}
