//! Authenticated dual-transport MCP gateway for Mnemo.
//!
//! One axum server exposes the tool catalogue over two MCP transports:
//! streamable HTTP at `/mcp` (preferred) and SSE at `/sse` (compatibility).
//! Every request must present `X-MCP-Token` and `X-MCP-UserID` headers,
//! validated against the auth store before it reaches a transport. Tool
//! calls are dispatched to the Memory Service over HTTP, scoped to the
//! project id derived at startup.

pub mod auth;
pub mod chunker;
pub mod client;
pub mod error;
pub mod project;
pub mod tools;

pub use auth::{TOKEN_HEADER, USER_ID_HEADER, auth_middleware};
pub use chunker::{Chunk, chunk_text};
pub use client::MemoryClient;
pub use error::{GatewayError, Result};
pub use project::{derive_project_id, hash_project_path};
pub use tools::GatewayTools;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Json, Router, middleware, routing::get};
use rmcp::transport::sse_server::{SseServer, SseServerConfig};
use rmcp::transport::streamable_http_server::StreamableHttpService;
use rmcp::transport::streamable_http_server::session::local::LocalSessionManager;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

use mnemo_auth::SharedAuthStore;
use mnemo_config::GatewayConfig;

/// The MCP gateway server.
pub struct Gateway {
    config: GatewayConfig,
    auth: SharedAuthStore,
    client: Arc<MemoryClient>,
    project_id: String,
}

impl Gateway {
    /// Wire the gateway from configuration and an auth store.
    pub fn new(config: GatewayConfig, auth: SharedAuthStore) -> Result<Self> {
        let client = Arc::new(MemoryClient::new(&config)?);
        let project_id = derive_project_id(&config);

        info!(
            project_id = %project_id,
            mode = config.project_id_mode.as_str(),
            memory_api = %config.memory_api_url,
            "gateway wired"
        );

        Ok(Self {
            config,
            auth,
            client,
            project_id,
        })
    }

    /// The effective project id tool calls are scoped to.
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    fn tools(&self, chunker: mnemo_config::ChunkerConfig) -> GatewayTools {
        GatewayTools::new(self.client.clone(), self.project_id.clone(), chunker)
    }

    /// Build the router: health at `/`, authenticated MCP transports at
    /// `/mcp` and `/sse`.
    pub fn router(
        &self,
        bind: SocketAddr,
        chunker: mnemo_config::ChunkerConfig,
        ct: CancellationToken,
    ) -> Router {
        // Streamable HTTP transport (preferred).
        let tools = self.tools(chunker);
        let http_stream_service = StreamableHttpService::new(
            move || Ok(tools.clone()),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // SSE transport (compatibility).
        let (sse_server, sse_router) = SseServer::new(SseServerConfig {
            bind,
            sse_path: "/".to_string(),
            post_path: "/message".to_string(),
            ct,
            sse_keep_alive: None,
        });
        let tools = self.tools(chunker);
        sse_server.with_service(move || tools.clone());

        let transports = Router::new()
            .nest_service("/mcp", http_stream_service)
            .nest("/sse", sse_router)
            .layer(middleware::from_fn_with_state(
                self.auth.clone(),
                auth_middleware,
            ));

        let health_body = serde_json::json!({
            "status": "healthy",
            "service": "mnemo-gateway",
            "project_id": self.project_id,
            "project_mode": self.config.project_id_mode.as_str(),
        });
        let health = get(move || {
            let body = health_body.clone();
            async move { Json(body) }
        });

        Router::new().route("/", health).merge(transports)
    }

    /// Run the gateway until ctrl-c.
    pub async fn run(self, chunker: mnemo_config::ChunkerConfig) -> Result<()> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| GatewayError::Internal(format!("invalid bind address: {e}")))?;

        let ct = CancellationToken::new();
        let router = self.router(addr, chunker, ct.clone());

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| GatewayError::Internal(format!("Failed to bind: {e}")))?;

        info!(%addr, "MCP gateway listening (streamable HTTP at /mcp, SSE at /sse)");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = tokio::signal::ctrl_c().await;
                ct.cancel();
                info!("shutting down gateway");
            })
            .await
            .map_err(|e| GatewayError::Internal(format!("Server error: {e}")))?;

        Ok(())
    }
}
