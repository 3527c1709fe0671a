//! Configuration management for Syllabot
//!
//! Configuration is read from a TOML file, then environment overrides in the
//! form `SYLLABOT_SECTION__KEY=value` are applied, then the result is validated.
//! The generative-service credential is not part of the file: it is looked up
//! from an ordered list of environment variables when the model is built.

use crate::error::{Result, SyllabotError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub document: DocumentConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
    pub answer: AnswerConfig,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Source document settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentConfig {
    /// Path to the syllabus PDF
    pub path: PathBuf,
}

/// Text splitting settings (sizes are in characters)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model name (e.g., "all-MiniLM-L6-v2")
    pub model: String,
    /// Number of chunks embedded per call
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "all-MiniLM-L6-v2".to_string(),
            batch_size: 32,
        }
    }
}

/// Vector index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Directory holding the persisted index; non-empty means "already built"
    pub persist_dir: PathBuf,
    /// HNSW M parameter (number of connections per layer)
    pub hnsw_m: usize,
    /// HNSW construction parameter (higher = better recall, slower build)
    pub hnsw_ef_construction: usize,
    /// HNSW search parameter (higher = better recall, slower search)
    pub hnsw_ef_search: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            persist_dir: PathBuf::from("vector_db"),
            hnsw_m: 16,
            hnsw_ef_construction: 200,
            hnsw_ef_search: 64,
        }
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks handed to the answer composer
    pub k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: 4 }
    }
}

/// Generative model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    pub provider: String,
    pub primary_model: String,
    pub fallback_model: String,
    /// Environment variables searched, in order, for the API key
    pub api_key_envs: Vec<String>,
    pub base_url: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            primary_model: "gemini-2.0-flash-lite".to_string(),
            fallback_model: "gemini-2.0-flash".to_string(),
            api_key_envs: vec!["GOOGLE_API_KEY".to_string(), "GEMINI_API_KEY".to_string()],
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            temperature: 0.0,
            max_output_tokens: 512,
            request_timeout_secs: 60,
        }
    }
}

impl LlmConfig {
    /// Look up the API key in the process environment
    pub fn api_key(&self) -> Option<ApiKey> {
        self.api_key_with(|name| std::env::var(name).ok())
    }

    /// Look up the API key through `lookup`, honouring the order of `api_key_envs`.
    /// Empty values are skipped.
    pub fn api_key_with<F>(&self, lookup: F) -> Option<ApiKey>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.api_key_envs.iter().find_map(|name| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .map(|value| ApiKey {
                    env_var: name.clone(),
                    value,
                })
        })
    }
}

/// Credential for the generative service. `Debug` never prints the secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey {
    env_var: String,
    value: String,
}

impl ApiKey {
    pub fn new(env_var: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            env_var: env_var.into(),
            value: value.into(),
        }
    }

    /// Name of the environment variable the key was read from
    pub fn env_var(&self) -> &str {
        &self.env_var
    }

    pub fn expose(&self) -> &str {
        &self.value
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiKey")
            .field("env_var", &self.env_var)
            .field("value", &"<redacted>")
            .finish()
    }
}

/// Prompt and answer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnswerConfig {
    /// Language the assistant must answer in, substituted for `{language}`
    pub language: String,
    /// System instruction template
    pub system_prompt: String,
    /// User turn template with `{question}` and `{context}` placeholders
    pub user_prompt: String,
    /// Separator placed between retrieved chunks in the context block
    pub context_separator: String,
    /// Answer returned when the model produces nothing usable or a query fails
    pub fallback_answer: String,
}

impl Default for AnswerConfig {
    fn default() -> Self {
        Self {
            language: "繁體中文".to_string(),
            system_prompt: "你是細心的助教，根據提供的文件內容回答問題。若無法從內容找到答案，請誠實說明。請以{language}作答。".to_string(),
            user_prompt: "問題：{question}\n\n已知內容：\n{context}\n\n請根據已知內容作答。".to_string(),
            context_separator: "\n\n".to_string(),
            fallback_answer: "抱歉，我暫時無法回答這個問題。".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SyllabotError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            SyllabotError::io(e, format!("Failed to read config file: {:?}", path))
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Defaults plus environment overrides, validated
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            SyllabotError::io(e, format!("Failed to write config file: {:?}", path))
        })?;
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: SYLLABOT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(config_key) = key.strip_prefix("SYLLABOT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "DOCUMENT__PATH" => self.document.path = PathBuf::from(value),
            "INDEX__PERSIST_DIR" => self.index.persist_dir = PathBuf::from(value),
            "EMBEDDING__MODEL" => self.embedding.model = value.to_string(),
            "LLM__PRIMARY_MODEL" => self.llm.primary_model = value.to_string(),
            "LLM__FALLBACK_MODEL" => self.llm.fallback_model = value.to_string(),
            "LLM__BASE_URL" => self.llm.base_url = value.to_string(),
            "ANSWER__LANGUAGE" => self.answer.language = value.to_string(),
            "RETRIEVAL__K" => {
                self.retrieval.k = value.parse().map_err(|_| SyllabotError::InvalidConfigValue {
                    path: path.to_string(),
                    message: format!("Cannot parse '{}' as an integer", value),
                })?;
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| SyllabotError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("syllabot").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
            },
            document: DocumentConfig {
                path: PathBuf::from("data/syllabus.pdf"),
            },
            chunking: ChunkingConfig::default(),
            embedding: EmbeddingConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            llm: LlmConfig::default(),
            answer: AnswerConfig::default(),
        }
    }
}
