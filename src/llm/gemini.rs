//! Gemini `generateContent` over REST

use super::{ChatMessage, ChatModel, ChatModelFactory, GenerationParams, LlmError, Role};
use crate::config::{ApiKey, LlmConfig};
use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tracing::{debug, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

fn model_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._\-]*$").expect("static regex"))
}

/// Creates [`GeminiChat`] models sharing one credential and endpoint
pub struct GeminiFactory {
    base_url: String,
    api_key: Option<ApiKey>,
    api_key_envs: Vec<String>,
    timeout: Duration,
}

impl GeminiFactory {
    /// Factory for `config`, reading the credential from the environment
    ///
    /// A missing credential is only reported here; requests fail with
    /// `MissingCredential` once generation is attempted.
    pub fn from_config(config: &LlmConfig) -> Self {
        let api_key = config.api_key();
        match &api_key {
            Some(key) => debug!("Using API key from {}", key.env_var()),
            None => warn!(
                "No API key set ({}); questions cannot be answered until one is provided, e.g. in .env",
                config.api_key_envs.join(" or ")
            ),
        }
        Self::new(config, api_key)
    }

    pub fn new(config: &LlmConfig, api_key: Option<ApiKey>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            api_key_envs: config.api_key_envs.clone(),
            timeout: Duration::from_secs(config.request_timeout_secs),
        }
    }
}

impl ChatModelFactory for GeminiFactory {
    fn create(&self, model: &str, params: &GenerationParams) -> Result<Arc<dyn ChatModel>, LlmError> {
        if !model_id_pattern().is_match(model) {
            return Err(LlmError::Initialization {
                model: model.to_string(),
                message: "invalid model identifier".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| LlmError::Initialization {
                model: model.to_string(),
                message: e.to_string(),
            })?;

        Ok(Arc::new(GeminiChat {
            client,
            endpoint: format!("{}/models/{}:generateContent", self.base_url, model),
            model: model.to_string(),
            api_key: self.api_key.clone(),
            api_key_envs: self.api_key_envs.clone(),
            params: *params,
        }))
    }
}

/// One Gemini model bound to its generation parameters
pub struct GeminiChat {
    client: Client,
    endpoint: String,
    model: String,
    api_key: Option<ApiKey>,
    api_key_envs: Vec<String>,
    params: GenerationParams,
}

#[async_trait]
impl ChatModel for GeminiChat {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| LlmError::MissingCredential {
                envs: self.api_key_envs.clone(),
            })?;

        let request = GenerateContentRequest::new(messages, &self.params);
        debug!(model = %self.model, "Sending generateContent request");

        let response = self
            .client
            .post(&self.endpoint)
            .header(API_KEY_HEADER, api_key.expose())
            .json(&request)
            .send()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LlmError::Http(e.to_string()))?;

        if !status.is_success() {
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        parse_response(&body)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

impl<'a> GenerateContentRequest<'a> {
    fn new(messages: &'a [ChatMessage], params: &GenerationParams) -> Self {
        let system_parts: Vec<Part<'a>> = messages
            .iter()
            .filter(|m| m.role == Role::System)
            .map(|m| Part { text: &m.content })
            .collect();

        let contents = messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| Content {
                role: Some("user"),
                parts: vec![Part { text: &m.content }],
            })
            .collect();

        Self {
            system_instruction: (!system_parts.is_empty()).then(|| Content {
                role: None,
                parts: system_parts,
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: params.temperature,
                max_output_tokens: params.max_output_tokens,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

/// Extract the first candidate's text from a `generateContent` response body
fn parse_response(body: &str) -> Result<String, LlmError> {
    let response: GenerateContentResponse =
        serde_json::from_str(body).map_err(|e| LlmError::Decode(e.to_string()))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        return match response.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(LlmError::Blocked(reason)),
            None => Err(LlmError::EmptyResponse),
        };
    };

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        if let Some(reason) = candidate.finish_reason {
            debug!("Empty candidate, finish reason {}", reason);
        }
        return Err(LlmError::EmptyResponse);
    }

    Ok(text)
}
