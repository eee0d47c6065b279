//! Error types for the study-buddy core

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, ContextError>;

/// Errors surfaced by the core.
///
/// Most failure paths inside structuring, context building and the assistant
/// are absorbed into deterministic substitutes. What reaches a caller is
/// almost always `Configuration`, raised at startup.
#[derive(Error, Debug)]
pub enum ContextError {
    /// Missing or invalid configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Text extraction from a binary format failed
    #[error("Extraction error: {0}")]
    Extraction(#[from] crate::document::extract::ExtractError),

    /// Remote completion failed
    #[error("Completion error: {0}")]
    Completion(crate::assistant::completion::CompletionError),

    /// Document cache failure
    #[error("Cache error: {0}")]
    Cache(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<::config::ConfigError> for ContextError {
    fn from(err: ::config::ConfigError) -> Self {
        ContextError::Configuration(err.to_string())
    }
}
