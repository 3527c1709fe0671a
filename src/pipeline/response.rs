//! Values handed back to callers of the pipeline

use crate::document::Chunk;
use crate::retrieval::RetrievalResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The stable caller-facing answer: the text and the chunks it was based on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaResponse {
    pub result: String,
    pub source_documents: Vec<Chunk>,
}

/// One answered question with full retrieval detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QaExchange {
    pub id: Uuid,
    pub asked_at: DateTime<Utc>,
    pub question: String,
    pub answer: String,
    pub retrieval: RetrievalResult,
}

impl QaExchange {
    pub fn new(question: impl Into<String>, answer: impl Into<String>, retrieval: RetrievalResult) -> Self {
        Self {
            id: Uuid::new_v4(),
            asked_at: Utc::now(),
            question: question.into(),
            answer: answer.into(),
            retrieval,
        }
    }
}

impl From<QaExchange> for QaResponse {
    fn from(exchange: QaExchange) -> Self {
        Self {
            result: exchange.answer,
            source_documents: exchange.retrieval.into_chunks(),
        }
    }
}
