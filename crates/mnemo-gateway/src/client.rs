//! HTTP client for the Memory Service REST API.

use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use mnemo_config::GatewayConfig;

use crate::error::{GatewayError, Result};

/// Client over the Memory Service, with the gateway's dispatch deadlines.
#[derive(Clone)]
pub struct MemoryClient {
    http: Client,
    base_url: String,
}

impl MemoryClient {
    /// Build a client from gateway configuration.
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| GatewayError::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.memory_api_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn handle(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            return Ok(body);
        }

        let detail = body
            .get("detail")
            .and_then(Value::as_str)
            .unwrap_or("upstream error")
            .to_string();

        if status.as_u16() == 403 {
            return Err(GatewayError::AccessDenied(detail));
        }
        Err(GatewayError::Upstream {
            status: status.as_u16(),
            detail,
        })
    }

    /// GET with query parameters.
    pub async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        debug!(path, "gateway GET");
        let response = self.http.get(self.url(path)).query(query).send().await?;
        Self::handle(response).await
    }

    /// POST a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value> {
        debug!(path, "gateway POST");
        let response = self.http.post(self.url(path)).json(body).send().await?;
        Self::handle(response).await
    }

    /// DELETE with query parameters.
    pub async fn delete(&self, path: &str, query: &[(&str, &str)]) -> Result<Value> {
        debug!(path, "gateway DELETE");
        let response = self.http.delete(self.url(path)).query(query).send().await?;
        Self::handle(response).await
    }

    /// Probe the Memory Service.
    pub async fn health(&self) -> Result<Value> {
        self.get("/health", &[]).await
    }
}
