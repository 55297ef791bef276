//! Error types for config loading and validation.

use thiserror::Error;

/// Errors returned while loading or validating config.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config layer could not be read from disk.
    #[error("failed to read config layer: {0}")]
    ReadFailed(#[from] std::io::Error),
    /// A config layer is not valid JSON5.
    #[error("config layer is not valid JSON5: {0}")]
    ParseFailed(#[from] json5::Error),
    /// The merged layers do not decode into the config model.
    #[error("failed to decode config: {0}")]
    DecodeFailed(#[from] serde_json::Error),
    /// A specific field failed validation.
    #[error("invalid config at {path}: {message}")]
    InvalidField { path: String, message: String },
    /// Cross-field validation failure.
    #[error("invalid config: {0}")]
    Invalid(String),
}
