//! Generative model seam
//!
//! - `ChatModel`: one initialized model that turns messages into text
//! - `ChatModelFactory`: initializes a model by identifier
//! - `FallbackModel`: primary model with a single fallback identifier
//! - `GeminiFactory`: the Gemini `generateContent` REST implementation

mod fallback;
mod gemini;

pub use fallback::FallbackModel;
pub use gemini::{GeminiChat, GeminiFactory};

use crate::config::LlmConfig;
use crate::error::SyllabotError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Generative providers `llm.provider` may name
pub const PROVIDERS: &[&str] = &["gemini"];

/// Chat model factory for the configured provider
pub fn factory_for(config: &LlmConfig) -> crate::Result<Arc<dyn ChatModelFactory>> {
    match config.provider.as_str() {
        "gemini" => Ok(Arc::new(GeminiFactory::from_config(config))),
        other => Err(SyllabotError::InvalidConfigValue {
            path: "llm.provider".to_string(),
            message: format!("unsupported provider '{}', expected one of {:?}", other, PROVIDERS),
        }),
    }
}

#[derive(Error, Debug)]
pub enum LlmError {
    #[error("No API key found; set one of: {}", envs.join(", "))]
    MissingCredential { envs: Vec<String> },

    #[error("Model initialization failed for {model}: {message}")]
    Initialization { model: String, message: String },

    #[error("Request failed: {0}")]
    Http(String),

    #[error("Service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Unexpected response: {0}")]
    Decode(String),

    #[error("Prompt blocked: {0}")]
    Blocked(String),

    /// The model answered with no text; callers substitute a fixed reply
    #[error("Model returned an empty response")]
    EmptyResponse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Sampling parameters shared by the primary and fallback models
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub temperature: f32,
    pub max_output_tokens: u32,
}

impl GenerationParams {
    pub fn from_config(config: &LlmConfig) -> Self {
        Self {
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
        }
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 0.0,
            max_output_tokens: 512,
        }
    }
}

/// An initialized generative model
#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Generate a reply to `messages`, returning the raw text
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// Creates chat models by identifier
pub trait ChatModelFactory: Send + Sync {
    fn create(&self, model: &str, params: &GenerationParams) -> Result<Arc<dyn ChatModel>, LlmError>;
}
