//! Anthropic Messages API backend implementation.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::{CompletionRequest, LlmBackend, with_retry};
use crate::error::{LlmError, Result};

/// Default API base URL.
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Default API version header.
const DEFAULT_API_VERSION: &str = "2023-06-01";

const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the Anthropic backend.
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API.
    pub base_url: String,
    /// API version header.
    pub api_version: String,
    /// Model used for completions.
    pub model: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Maximum retries for transient errors.
    pub max_retries: u32,
    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,
}

impl AnthropicConfig {
    /// Create a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_version: DEFAULT_API_VERSION.to_string(),
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
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Anthropic API backend.
pub struct AnthropicBackend {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicBackend {
    /// Create a new Anthropic backend with the given configuration.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Config(
                "Anthropic provider requires an API key (ANTHROPIC_API_KEY)".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn messages_url(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", &self.config.api_version)
            .header(header::CONTENT_TYPE, "application/json")
    }

    async fn send(&self, request: &CompletionRequest) -> Result<String> {
        let messages: Vec<WireMessage> = request
            .messages
            .iter()
            .map(|m| WireMessage {
                role: m.role.as_str(),
                content: m.content.clone(),
            })
            .collect();

        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: request.system.as_deref(),
            messages,
        };

        let response = self
            .add_headers(self.client.post(self.messages_url()))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(LlmError::RateLimit(text));
            }
            return Err(LlmError::Backend(format!(
                "Anthropic returned HTTP {}: {}",
                status, text
            )));
        }

        let parsed: MessagesResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;

        let text = parsed
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
            })
            .collect::<Vec<_>>()
            .join("");

        Ok(text)
    }
}

#[async_trait]
impl LlmBackend for AnthropicBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "anthropic",
            || self.send(&request),
        )
        .await
    }

    fn name(&self) -> &str {
        "anthropic"
    }

    async fn health_check(&self) -> Result<()> {
        // No cheap unauthenticated probe exists; a present key is the best
        // preflight signal without burning tokens.
        if self.config.api_key.is_empty() {
            return Err(LlmError::Config("ANTHROPIC_API_KEY not set".to_string()));
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Wire Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_rejected() {
        let config = AnthropicConfig::new("", "claude-3-5-sonnet-20241022");
        assert!(AnthropicBackend::new(config).is_err());
    }

    #[test]
    fn test_config_defaults() {
        let config = AnthropicConfig::new("key", "claude-3-5-sonnet-20241022");
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_version, DEFAULT_API_VERSION);
    }
}
