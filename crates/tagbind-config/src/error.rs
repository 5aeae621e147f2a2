//! Configuration error types

use thiserror::Error;

use tagbind_common::TagError;

/// Configuration result type
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Source(#[from] config::ConfigError),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Tag database error: {0}")]
    Tags(#[from] TagError),

    #[error("Unsupported asset format: {0}")]
    UnsupportedFormat(String),
}
