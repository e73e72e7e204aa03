//! Embeddings support for semantic memory search.
//!
//! Provides the [`Embedder`] trait and implementations for generating dense
//! vector representations of memory content and search queries.
//!
//! # Implementations
//!
//! - [`MockEmbedder`]: deterministic embeddings for testing
//! - [`OllamaEmbedder`]: local Ollama embedding models
//! - [`OpenAiEmbedder`]: OpenAI's embeddings API
//! - [`TruncatingEmbedder`]: wraps another embedder and truncates to a target
//!   dimensionality (for MRL-style models that tolerate prefix truncation)

use async_trait::async_trait;
use reqwest::{Client, header};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{LlmError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Embedder Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Trait for generating text embeddings.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts.
    ///
    /// Default implementation calls `embed` for each text sequentially.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Dimensionality of embeddings produced by this embedder.
    fn dimensions(&self) -> usize;

    /// Name of this embedder.
    fn name(&self) -> &str;
}

/// A shared embedder that can be used across threads.
pub type SharedEmbedder = Arc<dyn Embedder>;

// ─────────────────────────────────────────────────────────────────────────────
// Mock Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// A mock embedder for testing purposes.
///
/// Generates deterministic unit-length embeddings from a content hash, so
/// the same text always maps to the same vector.
#[derive(Debug, Clone)]
pub struct MockEmbedder {
    dimensions: usize,
}

impl MockEmbedder {
    /// Create a new mock embedder with the specified dimensions.
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let hash = simple_hash(text);
        let mut embedding = vec![0.0f32; self.dimensions];

        let mut state = hash;
        for value in embedding.iter_mut() {
            state = state.wrapping_mul(1103515245).wrapping_add(12345);
            *value = ((state >> 16) as f32 / 32768.0) - 1.0;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut embedding {
                *x /= norm;
            }
        }

        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Simple hash function for deterministic embedding generation.
fn simple_hash(s: &str) -> u64 {
    let mut hash: u64 = 5381;
    for byte in s.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u64);
    }
    hash
}

// ─────────────────────────────────────────────────────────────────────────────
// Ollama Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for Ollama embeddings.
#[derive(Debug, Clone)]
pub struct OllamaEmbedderConfig {
    /// Base URL of the Ollama server.
    pub base_url: String,
    /// Embedding model name.
    pub model: String,
    /// Embedding dimensionality the model produces.
    pub dimensions: usize,
    /// Request timeout.
    pub timeout: Duration,
}

impl OllamaEmbedderConfig {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            base_url: base_url.into(),
            model: model.into(),
            dimensions,
            timeout: Duration::from_secs(120),
        }
    }
}

/// Ollama embeddings client.
pub struct OllamaEmbedder {
    client: Client,
    config: OllamaEmbedderConfig,
}

impl OllamaEmbedder {
    pub fn new(config: OllamaEmbedderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/api/embeddings", self.config.base_url)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let body = serde_json::json!({
            "model": self.config.model,
            "prompt": text,
        });

        let response = self
            .client
            .post(self.embeddings_url())
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!(
                "Ollama embedding request failed: HTTP {} - {}",
                status, text
            )));
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingResponse {
            embedding: Vec<f32>,
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(e.to_string()))?;

        Ok(parsed.embedding)
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// OpenAI Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for OpenAI embeddings.
#[derive(Debug, Clone)]
pub struct OpenAiEmbedderConfig {
    /// API key for authentication.
    pub api_key: String,
    /// Base URL for the API.
    pub base_url: String,
    /// Embedding model name.
    pub model: String,
    /// Embedding dimensionality the model produces.
    pub dimensions: usize,
    /// Request timeout.
    pub timeout: Duration,
}

impl OpenAiEmbedderConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, dimensions: usize) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            dimensions,
            timeout: Duration::from_secs(60),
        }
    }

    /// Set a custom base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

/// OpenAI embeddings API client.
pub struct OpenAiEmbedder {
    client: Client,
    config: OpenAiEmbedderConfig,
}

impl OpenAiEmbedder {
    pub fn new(config: OpenAiEmbedderConfig) -> Result<Self> {
        if config.api_key.is_empty() {
            return Err(LlmError::Config(
                "OpenAI embedder requires an API key (OPENAI_API_KEY)".to_string(),
            ));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Internal(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn embeddings_url(&self) -> String {
        format!("{}/embeddings", self.config.base_url)
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::Internal("No embedding returned".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        #[derive(serde::Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            input: Vec<&'a str>,
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingResponse {
            data: Vec<EmbeddingData>,
        }

        #[derive(serde::Deserialize)]
        struct EmbeddingData {
            index: usize,
            embedding: Vec<f32>,
        }

        let request = EmbeddingRequest {
            model: &self.config.model,
            input: texts.to_vec(),
        };

        let response = self
            .client
            .post(self.embeddings_url())
            .header(
                header::AUTHORIZATION,
                format!("Bearer {}", self.config.api_key),
            )
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Backend(format!(
                "Embedding request failed: HTTP {} - {}",
                status, body
            )));
        }

        let result: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Serialization(format!("Failed to parse response: {}", e)))?;

        // Sort by index to ensure correct order
        let mut embeddings = result.data;
        embeddings.sort_by_key(|e| e.index);

        Ok(embeddings.into_iter().map(|e| e.embedding).collect())
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn name(&self) -> &str {
        "openai"
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Truncating Embedder
// ─────────────────────────────────────────────────────────────────────────────

/// Wraps another embedder and truncates its output to a target dimensionality.
///
/// Matryoshka-style embedding models produce vectors whose prefixes remain
/// meaningful embeddings; truncating and re-normalizing lets an oversized
/// model serve a smaller configured D.
pub struct TruncatingEmbedder {
    inner: SharedEmbedder,
    target_dims: usize,
}

impl TruncatingEmbedder {
    pub fn new(inner: SharedEmbedder, target_dims: usize) -> Self {
        Self { inner, target_dims }
    }
}

#[async_trait]
impl Embedder for TruncatingEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embedding = self.inner.embed(text).await?;
        if embedding.len() > self.target_dims {
            embedding.truncate(self.target_dims);
            let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > 0.0 {
                for x in &mut embedding {
                    *x /= norm;
                }
            }
        }
        Ok(embedding)
    }

    fn dimensions(&self) -> usize {
        self.target_dims
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Utility Functions
// ─────────────────────────────────────────────────────────────────────────────

/// Calculate cosine similarity between two embeddings.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a > 0.0 && norm_b > 0.0 {
        dot / (norm_a * norm_b)
    } else {
        0.0
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
