use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::{EmbeddingError, VectorIndexError};
use crate::llm::LlmError;
use crate::retrieval::SearchError;

/// Main error type for Syllabot
#[derive(Error, Debug)]
pub enum SyllabotError {
    /// Source document missing at the given path
    #[error("Source document not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// First-time index build failed (embedding or persistence)
    #[error("Index build failed: {message}")]
    IndexBuild { message: String },

    /// Persisted index exists but cannot be read back
    #[error("Failed to load persisted index at {}: {message}", path.display())]
    IndexLoad { path: PathBuf, message: String },

    /// Both the primary and the fallback generative model failed
    #[error("Generative service unavailable: {message}")]
    ServiceUnavailable { message: String },

    /// PDF parsing errors
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Embedding errors outside of the index build
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    /// Vector index errors
    #[error(transparent)]
    VectorIndex(#[from] VectorIndexError),

    /// Retrieval errors
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Generative model errors that were not absorbed by the fallback
    #[error(transparent)]
    Llm(#[from] LlmError),

    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {}", path.display())]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SyllabotError {
    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub fn json(source: serde_json::Error, context: impl Into<String>) -> Self {
        Self::Json {
            source,
            context: context.into(),
        }
    }

    /// Whether this error happened while constructing the pipeline
    /// (as opposed to while answering a single question).
    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. }
                | Self::IndexBuild { .. }
                | Self::IndexLoad { .. }
                | Self::Pdf(_)
                | Self::Embedding(_)
                | Self::VectorIndex(_)
                | Self::Config(_)
                | Self::ConfigValidation { .. }
                | Self::ConfigNotFound { .. }
                | Self::InvalidConfigValue { .. }
        )
    }
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for Syllabot operations
pub type Result<T> = std::result::Result<T, SyllabotError>;
