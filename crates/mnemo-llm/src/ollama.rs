//! Ollama backend implementation.
//!
//! Talks to a local (or LAN) Ollama instance over its native chat API. This
//! is the default provider for self-hosted deployments.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::{CompletionRequest, LlmBackend, with_retry};
use crate::error::{LlmError, Result};

/// Default base URL for a local Ollama instance.
const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// Local inference can be slow; give it room.
const DEFAULT_TIMEOUT_SECS: u64 = 600;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Ollama backend.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Model used for completions.
    pub model: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retries for transient errors.
    pub max_retries: u32,
    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl OllamaConfig {
    /// Create a new config for the given model.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Ollama chat backend.
pub struct OllamaBackend {
    client: Client,
    config: OllamaConfig,
}

impl OllamaBackend {
    /// Create a new Ollama backend with the given configuration.
    pub fn new(config: OllamaConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.config.base_url)
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(ref system) = request.system {
            messages.push(WireMessage {
                role: "system",
                content: system.clone(),
            });
        }
        for m in &request.messages {
            messages.push(WireMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            });
        }

        let body = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        };

        let response = self.client.post(self.chat_url()).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimit(text));
            }
            return Err(LlmError::Backend(format!(
                "Ollama returned HTTP {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;

        Ok(parsed.message.content)
    }
}

#[async_trait]
impl LlmBackend for OllamaBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "ollama",
            || self.send(&request),
        )
        .await
    }

    fn name(&self) -> &str {
        "ollama"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/api/tags", self.config.base_url);
        let response = self.client.get(&url).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::Backend(format!(
                "Ollama health check failed: HTTP {}",
                response.status()
            )))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}
