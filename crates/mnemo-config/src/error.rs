//! Error types for configuration resolution.

use thiserror::Error;

/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment value could not be interpreted.
    #[error("invalid value for {key}: '{value}' (expected {expected})")]
    InvalidValue {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    /// A required setting is missing for the selected provider.
    #[error("missing required setting: {0}")]
    Missing(&'static str),
}
