//! Provider factories.
//!
//! Construction is the only place providers are wired: the server resolves
//! its configuration once at startup and builds a backend and an embedder
//! here. Ollama and Anthropic share the Ollama embedder; only OpenAI brings
//! its own embedding API.

use std::sync::Arc;

use mnemo_config::{LlmProvider, ProviderConfig};
use tracing::info;

use crate::anthropic::{AnthropicBackend, AnthropicConfig};
use crate::backend::{LlmBackend, SharedBackend};
use crate::embeddings::{
    Embedder, OllamaEmbedder, OllamaEmbedderConfig, OpenAiEmbedder, OpenAiEmbedderConfig,
    SharedEmbedder, TruncatingEmbedder,
};
use crate::error::Result;
use crate::ollama::{OllamaBackend, OllamaConfig};
use crate::openai::{OpenAiBackend, OpenAiConfig};

/// Build the extraction LLM backend for the configured provider.
pub fn build_backend(config: &ProviderConfig) -> Result<SharedBackend> {
    let backend: SharedBackend = match config.provider {
        LlmProvider::Ollama => Arc::new(OllamaBackend::new(
            OllamaConfig::new(&config.ollama.llm_model).with_base_url(&config.ollama.base_url),
        )?),
        LlmProvider::OpenAi => Arc::new(OpenAiBackend::new(OpenAiConfig::new(
            &config.openai.api_key,
            &config.openai.llm_model,
        ))?),
        LlmProvider::Anthropic => Arc::new(AnthropicBackend::new(AnthropicConfig::new(
            &config.anthropic.api_key,
            &config.anthropic.model,
        ))?),
    };

    info!(backend = backend.name(), "LLM backend ready");
    Ok(backend)
}

/// Build the embedder for the configured provider.
///
/// If the configured dimensionality is smaller than what the model produces
/// (an explicit `EMBEDDING_DIMS` override), the embedder is wrapped so its
/// output is truncated and re-normalized to the configured D.
pub fn build_embedder(config: &ProviderConfig) -> Result<SharedEmbedder> {
    let target_dims = config.embedding_dims();

    let (embedder, native_dims): (SharedEmbedder, usize) = match config.provider {
        LlmProvider::OpenAi => {
            let native = config.openai.embedding_dims;
            let embedder = OpenAiEmbedder::new(OpenAiEmbedderConfig::new(
                &config.openai.api_key,
                &config.openai.embedding_model,
                native,
            ))?;
            (Arc::new(embedder), native)
        }
        // Anthropic has no embeddings API; both it and Ollama embed locally.
        LlmProvider::Ollama | LlmProvider::Anthropic => {
            let native = config.ollama.embedding_dims;
            let embedder = OllamaEmbedder::new(OllamaEmbedderConfig::new(
                &config.ollama.base_url,
                &config.ollama.embedding_model,
                native,
            ))?;
            (Arc::new(embedder), native)
        }
    };

    let embedder = if target_dims < native_dims {
        info!(
            native_dims,
            target_dims, "truncating embedder output to configured dimensionality"
        );
        Arc::new(TruncatingEmbedder::new(embedder, target_dims)) as SharedEmbedder
    } else {
        embedder
    };

    info!(
        embedder = embedder.name(),
        dims = embedder.dimensions(),
        "embedder ready"
    );
    Ok(embedder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::Embedder;

    #[test]
    fn test_build_backend_ollama_default() {
        let config = ProviderConfig::default();
        let backend = build_backend(&config).unwrap();
        assert_eq!(backend.name(), "ollama");
    }

    #[test]
    fn test_build_embedder_respects_override() {
        let mut config = ProviderConfig::default();
        config.embedding_dims_override = Some(1024);
        let embedder = build_embedder(&config).unwrap();
        assert_eq!(embedder.dimensions(), 1024);
    }

    #[test]
    fn test_openai_backend_requires_key() {
        let mut config = ProviderConfig::default();
        config.provider = LlmProvider::OpenAi;
        assert!(build_backend(&config).is_err());
    }
}
