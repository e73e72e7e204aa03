//! OpenAI-compatible API backend implementation.

use async_trait::async_trait;
use reqwest::{Client, header};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::backend::{CompletionRequest, LlmBackend, with_retry};
use crate::error::{LlmError, Result};

/// Default OpenAI API base URL.
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_TIMEOUT_SECS: u64 = 300;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the OpenAI backend.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API.
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

impl OpenAiConfig {
    /// Create a new config with the given API key and model.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
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
}

// ─────────────────────────────────────────────────────────────────────────────
// Backend
// ─────────────────────────────────────────────────────────────────────────────

/// OpenAI chat-completions backend.
pub struct OpenAiBackend {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend with the given configuration.
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Config(
                "OpenAI provider requires an API key (OPENAI_API_KEY)".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.config.base_url)
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
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        };

        let response = self
            .client
            .post(self.completions_url())
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
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
                "OpenAI returned HTTP {}: {}",
                status, text
            )));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Backend("OpenAI returned no choices".to_string()))
    }
}

#[async_trait]
impl LlmBackend for OpenAiBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            "openai",
            || self.send(&request),
        )
        .await
    }

    fn name(&self) -> &str {
        "openai"
    }

    async fn health_check(&self) -> Result<()> {
        let url = format!("{}/models", self.config.base_url);
        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .send()
            .await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(LlmError::Backend(format!(
                "OpenAI health check failed: HTTP {}",
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
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_rejected() {
        let config = OpenAiConfig::new("", "gpt-4o");
        assert!(OpenAiBackend::new(config).is_err());
    }

    #[test]
    fn test_config_builder() {
        let config =
            OpenAiConfig::new("key", "gpt-4o").with_base_url("http://localhost:8000/v1");
        assert_eq!(config.base_url, "http://localhost:8000/v1");
        assert_eq!(config.model, "gpt-4o");
    }
}
