//! Answer composition: prompt assembly and generation

use crate::config::{AnswerConfig, LlmConfig};
use crate::document::Chunk;
use crate::error::{Result, SyllabotError};
use crate::llm::{ChatMessage, ChatModelFactory, FallbackModel, GenerationParams, LlmError};
use tracing::{debug, warn};

/// Turns a question plus retrieved chunks into an answer
pub struct AnswerComposer {
    model: FallbackModel,
    config: AnswerConfig,
}

impl AnswerComposer {
    /// Initialize the primary model (or its fallback) for answering
    pub fn new(factory: &dyn ChatModelFactory, llm: &LlmConfig, config: &AnswerConfig) -> Result<Self> {
        let params = GenerationParams::from_config(llm);
        let model = FallbackModel::connect(factory, &llm.primary_model, &llm.fallback_model, &params)?;

        Ok(Self {
            model,
            config: config.clone(),
        })
    }

    /// Generate an answer to `question` grounded on `chunks`
    ///
    /// Returns the model's text unchanged. An empty reply becomes the
    /// configured fallback answer.
    pub async fn compose(&self, question: &str, chunks: &[Chunk]) -> Result<String> {
        let messages = self.build_messages(question, chunks);
        debug!(
            "Composing answer from {} chunks with {}",
            chunks.len(),
            self.model.active_model()
        );

        match self.model.generate(&messages).await {
            Ok(text) => Ok(text),
            Err(SyllabotError::Llm(LlmError::EmptyResponse)) => {
                warn!("Model returned no text, answering with the fallback reply");
                Ok(self.config.fallback_answer.clone())
            }
            Err(e) => Err(e),
        }
    }

    /// System instruction and user turn for `question`
    pub fn build_messages(&self, question: &str, chunks: &[Chunk]) -> Vec<ChatMessage> {
        let context = self.format_context(chunks);
        vec![
            ChatMessage::system(render(
                &self.config.system_prompt,
                &[("language", self.config.language.as_str())],
            )),
            ChatMessage::user(render(
                &self.config.user_prompt,
                &[("question", question), ("context", context.as_str())],
            )),
        ]
    }

    /// Chunk texts in retrieval order, separated by the configured separator
    pub fn format_context(&self, chunks: &[Chunk]) -> String {
        chunks
            .iter()
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join(&self.config.context_separator)
    }

    pub fn fallback_answer(&self) -> &str {
        &self.config.fallback_answer
    }

    pub fn model(&self) -> &FallbackModel {
        &self.model
    }
}

/// Substitute `{name}` placeholders in one pass
///
/// Substituted values are never rescanned, so a question containing
/// `{context}` stays literal. Unknown placeholders are left as written.
pub fn render(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];

        let replaced = after.find('}').and_then(|close| {
            let name = &after[..close];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatModel;
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct RecordingModel {
        reply: Option<String>,
        seen: Arc<Mutex<Vec<ChatMessage>>>,
    }

    #[async_trait]
    impl ChatModel for RecordingModel {
        fn model_id(&self) -> &str {
            "recording"
        }

        async fn generate(&self, messages: &[ChatMessage]) -> std::result::Result<String, LlmError> {
            self.seen.lock().unwrap().extend_from_slice(messages);
            self.reply.clone().ok_or(LlmError::EmptyResponse)
        }
    }

    struct RecordingFactory {
        reply: Option<String>,
        seen: Arc<Mutex<Vec<ChatMessage>>>,
    }

    impl ChatModelFactory for RecordingFactory {
        fn create(
            &self,
            _model: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<Arc<dyn ChatModel>, LlmError> {
            Ok(Arc::new(RecordingModel {
                reply: self.reply.clone(),
                seen: self.seen.clone(),
            }))
        }
    }

    fn composer(reply: Option<&str>) -> (AnswerComposer, Arc<Mutex<Vec<ChatMessage>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let factory = RecordingFactory {
            reply: reply.map(str::to_string),
            seen: seen.clone(),
        };
        let composer =
            AnswerComposer::new(&factory, &LlmConfig::default(), &AnswerConfig::default()).unwrap();
        (composer, seen)
    }

    fn chunks() -> Vec<Chunk> {
        vec![
            Chunk::new("期中報告需於第 8 週前繳交", "s.pdf", 5, 0),
            Chunk::new("期末考涵蓋全部章節", "s.pdf", 7, 0),
        ]
    }

    #[test]
    fn test_render_single_pass() {
        let out = render(
            "Q: {question} C: {context} {unknown}",
            &[("question", "{context}?"), ("context", "text")],
        );
        assert_eq!(out, "Q: {context}? C: text {unknown}");
    }

    #[test]
    fn test_render_unbalanced_brace() {
        assert_eq!(render("a { b", &[("b", "x")]), "a { b");
    }

    #[test]
    fn test_prompt_layout() {
        let (composer, _) = composer(Some("ok"));
        let messages = composer.build_messages("期中報告要交的時間？", &chunks());

        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("請以繁體中文作答"));
        assert_eq!(
            messages[1].content,
            "問題：期中報告要交的時間？\n\n已知內容：\n期中報告需於第 8 週前繳交\n\n期末考涵蓋全部章節\n\n請根據已知內容作答。"
        );
    }

    #[tokio::test]
    async fn test_compose_returns_raw_text() {
        let (composer, seen) = composer(Some("  第 8 週前繳交。\n"));
        let answer = composer.compose("期中報告？", &chunks()).await.unwrap();
        assert_eq!(answer, "  第 8 週前繳交。\n");
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_reply_becomes_apology() {
        let (composer, _) = composer(None);
        let answer = composer.compose("期中報告？", &chunks()).await.unwrap();
        assert_eq!(answer, "抱歉，我暫時無法回答這個問題。");
    }

    #[tokio::test]
    async fn test_no_context() {
        let (composer, seen) = composer(Some("文件中沒有相關資訊。"));
        composer.compose("停車位在哪？", &[]).await.unwrap();
        let messages = seen.lock().unwrap();
        assert!(messages[1].content.contains("已知內容：\n\n\n"));
    }
}
