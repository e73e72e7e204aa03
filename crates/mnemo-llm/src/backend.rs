//! LLM backend trait and shared infrastructure.
//!
//! The abstraction layer over chat-completion providers (Ollama, OpenAI,
//! Anthropic) plus a mock implementation for deterministic testing. Memory
//! extraction only needs single-shot completions, so the trait is
//! intentionally smaller than a general agent client: one request in, the
//! response text out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result, is_retryable};

// ─────────────────────────────────────────────────────────────────────────────
// Shared Retry Logic
// ─────────────────────────────────────────────────────────────────────────────

/// Execute an async operation with exponential backoff retry.
///
/// Retries only on transient errors (network failures, rate limits).
/// Non-retryable errors are returned immediately.
pub async fn with_retry<F, Fut, T>(
    max_retries: u32,
    initial_backoff: Duration,
    backend_name: &str,
    mut f: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_error = None;
    let mut backoff = initial_backoff;

    for attempt in 0..=max_retries {
        match f().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if !is_retryable(&e) {
                    return Err(e);
                }

                last_error = Some(e);

                if attempt < max_retries {
                    tracing::warn!(
                        backend = backend_name,
                        attempt = attempt + 1,
                        max_retries = max_retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    Err(last_error.unwrap())
}

// ─────────────────────────────────────────────────────────────────────────────
// Request Types
// ─────────────────────────────────────────────────────────────────────────────

/// Role of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One message in a conversation submitted for extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A single-shot completion request.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// System instruction, if the provider supports one.
    pub system: Option<String>,
    /// Conversation messages.
    pub messages: Vec<ChatMessage>,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Sampling temperature.
    pub temperature: f32,
}

impl CompletionRequest {
    /// Create a request with the default extraction settings.
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            system: None,
            messages,
            max_tokens: 2048,
            temperature: 0.2,
        }
    }

    /// Set the system instruction.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set the maximum generated tokens.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Backend Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for chat-completion providers.
#[async_trait]
pub trait LlmBackend: Send + Sync {
    /// Execute a completion request and return the response text.
    async fn complete(&self, request: CompletionRequest) -> Result<String>;

    /// Get the name of this backend.
    fn name(&self) -> &str;

    /// Check if the backend is available and properly configured.
    async fn health_check(&self) -> Result<()>;
}

/// A backend that can be shared across threads.
pub type SharedBackend = Arc<dyn LlmBackend>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────────────────

/// A mock backend for testing purposes.
///
/// Returns pre-configured responses in order and records every request,
/// so extraction-pipeline tests are fully deterministic.
#[derive(Debug)]
pub struct MockBackend {
    name: String,
    responses: std::sync::Mutex<Vec<String>>,
    request_log: std::sync::Mutex<Vec<CompletionRequest>>,
}

impl MockBackend {
    /// Create a new mock backend with the given responses.
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            name: "mock".to_string(),
            responses: std::sync::Mutex::new(responses),
            request_log: std::sync::Mutex::new(Vec::new()),
        }
    }

    /// Create a mock backend that always returns the same text.
    pub fn with_text(text: impl Into<String>) -> Self {
        Self::new(vec![text.into()])
    }

    /// Get all requests that were made to this backend.
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.request_log.lock().unwrap().clone()
    }

    /// Get the number of requests made.
    pub fn request_count(&self) -> usize {
        self.request_log.lock().unwrap().len()
    }
}

#[async_trait]
impl LlmBackend for MockBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<String> {
        self.request_log.lock().unwrap().push(request);

        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            return Err(LlmError::Backend(
                "MockBackend: no more responses available".to_string(),
            ));
        }
        Ok(responses.remove(0))
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
