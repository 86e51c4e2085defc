//! Error types for configuration loading, validation and override merging.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("invalid value for '{field}'{}", .hint.as_ref().map(|h| format!(": {h}")).unwrap_or_default())]
    InvalidValue { field: String, hint: Option<String> },

    #[error("URL prefixes '{first}' and '{second}' overlap")]
    OverlappingPrefixes { first: String, second: String },

    #[error("invalid build override in {}: {message}", .path.display())]
    InvalidOverride { path: PathBuf, message: String },

    #[error("failed to extract configuration: {0}")]
    Extract(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        ConfigError::Extract(err.to_string())
    }
}
