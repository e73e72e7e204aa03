//! Configuration resolution for Mnemo.
//!
//! All configuration comes from the environment with sensible defaults, the
//! way the service is deployed in containers. The one non-trivial piece of
//! logic lives here on purpose: resolving which LLM provider and embedder are
//! active, and from that the embedding dimensionality that every other
//! subsystem treats as fixed for the process lifetime.

pub mod error;

pub use error::{ConfigError, Result};

use serde::{Deserialize, Serialize};
use tracing::info;

// ─────────────────────────────────────────────────────────────────────────────
// Provider selection
// ─────────────────────────────────────────────────────────────────────────────

/// Which LLM provider drives fact extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Local Ollama instance (default).
    Ollama,
    /// OpenAI API.
    OpenAi,
    /// Anthropic API (embeddings still come from Ollama).
    Anthropic,
}

impl LlmProvider {
    /// Parse from the `LLM_PROVIDER` environment value.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "openai" => Ok(Self::OpenAi),
            "anthropic" => Ok(Self::Anthropic),
            other => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER",
                value: other.to_string(),
                expected: "ollama | openai | anthropic",
            }),
        }
    }

    /// Provider name as reported in health responses and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        }
    }
}

/// Ollama connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub base_url: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub embedding_dims: usize,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".into(),
            llm_model: "qwen3:8b".into(),
            embedding_model: "qwen3-embedding:8b".into(),
            embedding_dims: 4096,
        }
    }
}

/// OpenAI connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub llm_model: String,
    pub embedding_model: String,
    pub embedding_dims: usize,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            llm_model: "gpt-4o".into(),
            embedding_model: "text-embedding-3-small".into(),
            embedding_dims: 1536,
        }
    }
}

/// Anthropic connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
}

impl Default for AnthropicConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: "claude-3-5-sonnet-20241022".into(),
        }
    }
}

/// Resolved provider wiring for the extraction LLM and the embedder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub provider: LlmProvider,
    pub ollama: OllamaConfig,
    pub openai: OpenAiConfig,
    pub anthropic: AnthropicConfig,
    /// Explicit override of the embedding dimensionality (`EMBEDDING_DIMS`).
    pub embedding_dims_override: Option<usize>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Ollama,
            ollama: OllamaConfig::default(),
            openai: OpenAiConfig::default(),
            anthropic: AnthropicConfig::default(),
            embedding_dims_override: None,
        }
    }
}

impl ProviderConfig {
    /// The embedding dimensionality D, fixed for the process lifetime.
    ///
    /// OpenAI embeds with its own models; Ollama and Anthropic both use the
    /// Ollama embedder. An explicit `EMBEDDING_DIMS` wins over either.
    pub fn embedding_dims(&self) -> usize {
        if let Some(dims) = self.embedding_dims_override {
            return dims;
        }
        match self.provider {
            LlmProvider::OpenAi => self.openai.embedding_dims,
            LlmProvider::Ollama | LlmProvider::Anthropic => self.ollama.embedding_dims,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Project scoping
// ─────────────────────────────────────────────────────────────────────────────

/// How the gateway derives the effective project id for tool calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectIdMode {
    /// Derive from a hash of the configured project directory.
    Auto,
    /// Use the configured default user id, set explicitly per project.
    Manual,
    /// Use the configured default user id for every project.
    Global,
}

impl ProjectIdMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "manual" => Ok(Self::Manual),
            "global" => Ok(Self::Global),
            other => Err(ConfigError::InvalidValue {
                key: "PROJECT_ID_MODE",
                value: other.to_string(),
                expected: "auto | manual | global",
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Global => "global",
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Section configs
// ─────────────────────────────────────────────────────────────────────────────

/// Chunker parameters applied by the gateway before dispatch.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum characters of a chunk's own content.
    pub max_chunk_size: usize,
    /// Characters of the previous chunk carried into the next for continuity.
    pub overlap_size: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 1000,
            overlap_size: 150,
        }
    }
}

/// On-disk store locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub memory_db_path: String,
    pub graph_db_path: String,
    pub auth_db_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            memory_db_path: "data/memory.db".into(),
            graph_db_path: "data/graph.db".into(),
            auth_db_path: "data/auth.db".into(),
        }
    }
}

/// Memory Service bind and pipeline settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for a single extraction LLM call, in seconds.
    pub extraction_timeout_secs: u64,
    /// Cosine similarity at or above which an UPDATE item targets an
    /// existing memory instead of creating a new one.
    pub update_similarity_threshold: f32,
    /// Number of background projection workers.
    pub projection_workers: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8000,
            extraction_timeout_secs: 120,
            update_similarity_threshold: 0.85,
            projection_workers: 2,
        }
    }
}

/// MCP gateway settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the Memory Service REST API.
    pub memory_api_url: String,
    /// Per-chunk dispatch deadline, in seconds.
    pub request_timeout_secs: u64,
    /// Connect deadline, in seconds.
    pub connect_timeout_secs: u64,
    pub project_id_mode: ProjectIdMode,
    /// Fallback scope in manual/global modes.
    pub default_user_id: String,
    /// Project directory hashed in auto mode.
    pub project_dir: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
            memory_api_url: "http://localhost:8000".into(),
            request_timeout_secs: 180,
            connect_timeout_secs: 10,
            project_id_mode: ProjectIdMode::Auto,
            default_user_id: "claude_code_mcp".into(),
            project_dir: None,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level config
// ─────────────────────────────────────────────────────────────────────────────

/// Complete Mnemo configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MnemoConfig {
    pub provider: ProviderConfig,
    pub storage: StorageConfig,
    pub server: ServerConfig,
    pub gateway: GatewayConfig,
    pub chunker: ChunkerConfig,
}

impl MnemoConfig {
    /// Resolve configuration from the environment.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;

        info!(
            provider = config.provider.provider.as_str(),
            embedding_dims = config.provider.embedding_dims(),
            project_id_mode = config.gateway.project_id_mode.as_str(),
            "configuration resolved"
        );

        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(val) = env_var("LLM_PROVIDER") {
            self.provider.provider = LlmProvider::parse(&val)?;
        }

        if let Some(val) = env_var("OLLAMA_BASE_URL") {
            self.provider.ollama.base_url = val;
        }
        if let Some(val) = env_var("OLLAMA_LLM_MODEL") {
            self.provider.ollama.llm_model = val;
        }
        if let Some(val) = env_var("OLLAMA_EMBEDDING_MODEL") {
            self.provider.ollama.embedding_model = val;
        }
        if let Some(val) = env_var("OLLAMA_EMBEDDING_DIMS") {
            self.provider.ollama.embedding_dims = parse_usize("OLLAMA_EMBEDDING_DIMS", &val)?;
        }

        if let Some(val) = env_var("OPENAI_API_KEY") {
            self.provider.openai.api_key = val;
        }
        if let Some(val) = env_var("OPENAI_LLM_MODEL") {
            self.provider.openai.llm_model = val;
        }
        if let Some(val) = env_var("OPENAI_EMBEDDING_MODEL") {
            self.provider.openai.embedding_model = val;
        }
        if let Some(val) = env_var("OPENAI_EMBEDDING_DIMS") {
            self.provider.openai.embedding_dims = parse_usize("OPENAI_EMBEDDING_DIMS", &val)?;
        }

        if let Some(val) = env_var("ANTHROPIC_API_KEY") {
            self.provider.anthropic.api_key = val;
        }
        if let Some(val) = env_var("ANTHROPIC_MODEL") {
            self.provider.anthropic.model = val;
        }

        if let Some(val) = env_var("EMBEDDING_DIMS") {
            self.provider.embedding_dims_override = Some(parse_usize("EMBEDDING_DIMS", &val)?);
        }

        if let Some(val) = env_var("MEMORY_DB_PATH") {
            self.storage.memory_db_path = val;
        }
        if let Some(val) = env_var("GRAPH_DB_PATH") {
            self.storage.graph_db_path = val;
        }
        if let Some(val) = env_var("AUTH_DB_PATH") {
            self.storage.auth_db_path = val;
        }

        if let Some(val) = env_var("MEMORY_HOST") {
            self.server.host = val;
        }
        if let Some(val) = env_var("MEMORY_PORT") {
            self.server.port = parse_u16("MEMORY_PORT", &val)?;
        }
        if let Some(val) = env_var("EXTRACTION_TIMEOUT") {
            self.server.extraction_timeout_secs = parse_u64("EXTRACTION_TIMEOUT", &val)?;
        }

        if let Some(val) = env_var("MCP_HOST") {
            self.gateway.host = val;
        }
        if let Some(val) = env_var("MCP_PORT") {
            self.gateway.port = parse_u16("MCP_PORT", &val)?;
        }
        if let Some(val) = env_var("MEMORY_API_URL") {
            self.gateway.memory_api_url = val;
        }
        if let Some(val) = env_var("REQUEST_TIMEOUT") {
            self.gateway.request_timeout_secs = parse_u64("REQUEST_TIMEOUT", &val)?;
        }
        if let Some(val) = env_var("PROJECT_ID_MODE") {
            self.gateway.project_id_mode = ProjectIdMode::parse(&val)?;
        }
        if let Some(val) = env_var("DEFAULT_USER_ID") {
            self.gateway.default_user_id = val;
        }
        if let Some(val) = env_var("PROJECT_DIR") {
            self.gateway.project_dir = Some(val);
        }

        if let Some(val) = env_var("CHUNK_MAX_SIZE") {
            self.chunker.max_chunk_size = parse_usize("CHUNK_MAX_SIZE", &val)?;
        }
        if let Some(val) = env_var("CHUNK_OVERLAP_SIZE") {
            self.chunker.overlap_size = parse_usize("CHUNK_OVERLAP_SIZE", &val)?;
        }

        if self.chunker.overlap_size >= self.chunker.max_chunk_size {
            return Err(ConfigError::InvalidValue {
                key: "CHUNK_OVERLAP_SIZE",
                value: self.chunker.overlap_size.to_string(),
                expected: "smaller than CHUNK_MAX_SIZE",
            });
        }

        Ok(())
    }
}

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn parse_usize(key: &'static str, val: &str) -> Result<usize> {
    val.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: val.to_string(),
        expected: "a positive integer",
    })
}

fn parse_u64(key: &'static str, val: &str) -> Result<u64> {
    val.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: val.to_string(),
        expected: "a positive integer",
    })
}

fn parse_u16(key: &'static str, val: &str) -> Result<u16> {
    val.parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: val.to_string(),
        expected: "a port number",
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MnemoConfig::default();
        assert_eq!(config.provider.provider, LlmProvider::Ollama);
        assert_eq!(config.chunker.max_chunk_size, 1000);
        assert_eq!(config.chunker.overlap_size, 150);
        assert_eq!(config.gateway.request_timeout_secs, 180);
        assert_eq!(config.gateway.connect_timeout_secs, 10);
        assert_eq!(config.server.extraction_timeout_secs, 120);
    }

    #[test]
    fn provider_parse() {
        assert_eq!(LlmProvider::parse("ollama").unwrap(), LlmProvider::Ollama);
        assert_eq!(LlmProvider::parse("OpenAI").unwrap(), LlmProvider::OpenAi);
        assert_eq!(
            LlmProvider::parse("anthropic").unwrap(),
            LlmProvider::Anthropic
        );
        assert!(LlmProvider::parse("cohere").is_err());
    }

    #[test]
    fn project_id_mode_parse() {
        assert_eq!(ProjectIdMode::parse("auto").unwrap(), ProjectIdMode::Auto);
        assert_eq!(
            ProjectIdMode::parse("manual").unwrap(),
            ProjectIdMode::Manual
        );
        assert_eq!(
            ProjectIdMode::parse("GLOBAL").unwrap(),
            ProjectIdMode::Global
        );
        assert!(ProjectIdMode::parse("project").is_err());
    }

    #[test]
    fn embedding_dims_follow_provider() {
        let mut provider = ProviderConfig::default();
        assert_eq!(provider.embedding_dims(), 4096);

        provider.provider = LlmProvider::OpenAi;
        assert_eq!(provider.embedding_dims(), 1536);

        // Anthropic borrows the Ollama embedder
        provider.provider = LlmProvider::Anthropic;
        assert_eq!(provider.embedding_dims(), 4096);

        provider.embedding_dims_override = Some(768);
        assert_eq!(provider.embedding_dims(), 768);
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk() {
        let mut config = MnemoConfig::default();
        config.chunker.max_chunk_size = 100;
        config.chunker.overlap_size = 100;
        assert!(config.apply_env().is_err());
    }
}
