//! Primary model with one fallback identifier

use super::{ChatMessage, ChatModel, ChatModelFactory, GenerationParams, LlmError};
use crate::error::{Result, SyllabotError};
use std::sync::Arc;
use tracing::{info, warn};

/// Generative model with a fallback
///
/// Both identifiers are initialized up front with the same parameters. A
/// primary that fails to initialize is skipped for the life of the process;
/// a primary that fails a single request is retried on the fallback once.
pub struct FallbackModel {
    primary: Option<Arc<dyn ChatModel>>,
    fallback: Option<Arc<dyn ChatModel>>,
}

impl FallbackModel {
    /// Initialize `primary` and `fallback` through `factory`
    ///
    /// Fails with `ServiceUnavailable` only when neither can be initialized.
    pub fn connect(
        factory: &dyn ChatModelFactory,
        primary: &str,
        fallback: &str,
        params: &GenerationParams,
    ) -> Result<Self> {
        let primary_model = match factory.create(primary, params) {
            Ok(model) => Some(model),
            Err(e) => {
                warn!(
                    "Failed to initialize model {} ({}), falling back to {}",
                    primary, e, fallback
                );
                None
            }
        };

        let fallback_model = if fallback == primary && primary_model.is_some() {
            None
        } else {
            match factory.create(fallback, params) {
                Ok(model) => Some(model),
                Err(e) => {
                    warn!("Failed to initialize fallback model {}: {}", fallback, e);
                    None
                }
            }
        };

        if primary_model.is_none() && fallback_model.is_none() {
            return Err(SyllabotError::ServiceUnavailable {
                message: format!("neither {} nor {} could be initialized", primary, fallback),
            });
        }

        let active = primary_model
            .as_ref()
            .or(fallback_model.as_ref())
            .map(|m| m.model_id().to_string())
            .unwrap_or_default();
        info!("Generative model ready: {}", active);

        Ok(Self {
            primary: primary_model,
            fallback: fallback_model,
        })
    }

    /// Identifier of the model tried first
    pub fn active_model(&self) -> &str {
        self.primary
            .as_ref()
            .or(self.fallback.as_ref())
            .map(|m| m.model_id())
            .unwrap_or_default()
    }

    pub fn fallback_model(&self) -> Option<&str> {
        match &self.primary {
            Some(_) => self.fallback.as_ref().map(|m| m.model_id()),
            None => None,
        }
    }

    /// Generate a reply
    ///
    /// `LlmError::EmptyResponse` is passed through untouched so the caller can
    /// substitute its fixed reply; any other failure of the first model is
    /// retried on the fallback, and `ServiceUnavailable` is returned when
    /// that fails too.
    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut models = self.primary.iter().chain(self.fallback.iter());
        let Some(first) = models.next() else {
            return Err(SyllabotError::ServiceUnavailable {
                message: "no generative model available".to_string(),
            });
        };

        let first_error = match first.generate(messages).await {
            Ok(text) => return Ok(text),
            Err(LlmError::EmptyResponse) => return Err(LlmError::EmptyResponse.into()),
            Err(e) => e,
        };

        let Some(second) = models.next() else {
            return Err(SyllabotError::ServiceUnavailable {
                message: format!("{}: {}", first.model_id(), first_error),
            });
        };

        warn!(
            "Model {} failed ({}), retrying with {}",
            first.model_id(),
            first_error,
            second.model_id()
        );

        match second.generate(messages).await {
            Ok(text) => Ok(text),
            Err(LlmError::EmptyResponse) => Err(LlmError::EmptyResponse.into()),
            Err(second_error) => Err(SyllabotError::ServiceUnavailable {
                message: format!(
                    "{}: {}; {}: {}",
                    first.model_id(),
                    first_error,
                    second.model_id(),
                    second_error
                ),
            }),
        }
    }
}
