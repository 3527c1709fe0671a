use crate::config::{Config, SCHEMA_VERSION};
use crate::error::{Result, SyllabotError, ValidationError};
use crate::llm::PROVIDERS;

/// Upper bound on generated answer length
pub const MAX_OUTPUT_TOKENS: u32 = 512;

/// Configuration validator
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate the configuration, collecting every problem before failing
    pub fn validate(config: &Config) -> Result<()> {
        let mut errors = Vec::new();

        Self::validate_schema_version(config, &mut errors);
        Self::validate_document(config, &mut errors);
        Self::validate_chunking(config, &mut errors);
        Self::validate_embedding(config, &mut errors);
        Self::validate_index(config, &mut errors);
        Self::validate_retrieval(config, &mut errors);
        Self::validate_llm(config, &mut errors);
        Self::validate_answer(config, &mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(SyllabotError::ConfigValidation { errors })
        }
    }

    fn validate_schema_version(config: &Config, errors: &mut Vec<ValidationError>) {
        let version = &config.meta.schema_version;
        if version != SCHEMA_VERSION {
            errors.push(ValidationError::new(
                "_meta.schema_version",
                format!("Unsupported schema version: {}", version),
            ));
        }
    }

    fn validate_document(config: &Config, errors: &mut Vec<ValidationError>) {
        // Existence is checked when the pipeline is built so the error can name the path
        if config.document.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "document.path",
                "Document path cannot be empty",
            ));
        }
    }

    fn validate_chunking(config: &Config, errors: &mut Vec<ValidationError>) {
        let chunking = &config.chunking;
        if chunking.chunk_size == 0 {
            errors.push(ValidationError::new(
                "chunking.chunk_size",
                "Chunk size must be greater than 0",
            ));
        }

        if chunking.chunk_overlap >= chunking.chunk_size {
            errors.push(ValidationError::new(
                "chunking.chunk_overlap",
                format!(
                    "Chunk overlap ({}) must be smaller than chunk size ({})",
                    chunking.chunk_overlap, chunking.chunk_size
                ),
            ));
        }
    }

    fn validate_embedding(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.embedding.batch_size == 0 {
            errors.push(ValidationError::new(
                "embedding.batch_size",
                "Batch size must be greater than 0",
            ));
        }

        if config.embedding.model.is_empty() {
            errors.push(ValidationError::new(
                "embedding.model",
                "Model name cannot be empty",
            ));
        }
    }

    fn validate_index(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.index.persist_dir.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "index.persist_dir",
                "Persist directory cannot be empty",
            ));
        }

        if config.index.hnsw_ef_construction == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_construction",
                "HNSW ef_construction must be greater than 0",
            ));
        }

        if config.index.hnsw_m == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_m",
                "HNSW M must be greater than 0",
            ));
        }

        if config.index.hnsw_ef_search == 0 {
            errors.push(ValidationError::new(
                "index.hnsw_ef_search",
                "HNSW ef_search must be greater than 0",
            ));
        }
    }

    fn validate_retrieval(config: &Config, errors: &mut Vec<ValidationError>) {
        if config.retrieval.k == 0 {
            errors.push(ValidationError::new(
                "retrieval.k",
                "k must be greater than 0",
            ));
        }
    }

    fn validate_llm(config: &Config, errors: &mut Vec<ValidationError>) {
        // The API key itself is only required when a question is answered,
        // so its absence is not a validation error.
        let llm = &config.llm;

        if !PROVIDERS.contains(&llm.provider.as_str()) {
            errors.push(ValidationError::new(
                "llm.provider",
                format!("Provider must be one of {:?}, got '{}'", PROVIDERS, llm.provider),
            ));
        }

        if llm.primary_model.trim().is_empty() {
            errors.push(ValidationError::new(
                "llm.primary_model",
                "Primary model cannot be empty",
            ));
        }

        if llm.api_key_envs.is_empty() {
            errors.push(ValidationError::new(
                "llm.api_key_envs",
                "At least one API key environment variable must be listed",
            ));
        }

        if !(0.0..=2.0).contains(&llm.temperature) {
            errors.push(ValidationError::new(
                "llm.temperature",
                format!("Temperature must be between 0.0 and 2.0, got {}", llm.temperature),
            ));
        }

        if llm.max_output_tokens == 0 || llm.max_output_tokens > MAX_OUTPUT_TOKENS {
            errors.push(ValidationError::new(
                "llm.max_output_tokens",
                format!(
                    "Max output tokens must be between 1 and {}, got {}",
                    MAX_OUTPUT_TOKENS, llm.max_output_tokens
                ),
            ));
        }

        if !(llm.base_url.starts_with("http://") || llm.base_url.starts_with("https://")) {
            errors.push(ValidationError::new(
                "llm.base_url",
                format!("Base URL must be http(s), got '{}'", llm.base_url),
            ));
        }
    }

    fn validate_answer(config: &Config, errors: &mut Vec<ValidationError>) {
        let answer = &config.answer;
        for placeholder in ["{question}", "{context}"] {
            if !answer.user_prompt.contains(placeholder) {
                errors.push(ValidationError::new(
                    "answer.user_prompt",
                    format!("User prompt must contain {}", placeholder),
                ));
            }
        }

        if answer.fallback_answer.trim().is_empty() {
            errors.push(ValidationError::new(
                "answer.fallback_answer",
                "Fallback answer cannot be empty",
            ));
        }
    }
}
