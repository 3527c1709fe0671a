//! Chat session history
//!
//! Caller-side record of the questions asked in one interactive run. The
//! history is kept for display and transcripts only; it is never fed back
//! into retrieval.
use crate::error::{Result, SyllabotError};
use crate::pipeline::QaExchange;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use uuid::Uuid;

/// A chat session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique session identifier
    pub id: Uuid,

    /// When the session was started
    pub started_at: DateTime<Utc>,

    /// Answered questions, oldest first
    #[serde(default)]
    pub exchanges: Vec<QaExchange>,
}

impl ChatSession {
    /// Create a new session
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            exchanges: Vec::new(),
        }
    }

    /// Append an answered question
    pub fn record(&mut self, exchange: QaExchange) -> &QaExchange {
        self.exchanges.push(exchange);
        &self.exchanges[self.exchanges.len() - 1]
    }

    /// Exchanges in the order they happened
    pub fn history(&self) -> &[QaExchange] {
        &self.exchanges
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }

    /// Save the session as a pretty JSON transcript
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                SyllabotError::io(
                    e,
                    format!("Failed to create transcript directory: {}", parent.display()),
                )
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| SyllabotError::json(e, "Failed to serialize chat session"))?;
        std::fs::write(path, content).map_err(|e| {
            SyllabotError::io(e, format!("Failed to write transcript: {}", path.display()))
        })?;

        Ok(())
    }

    /// Load a transcript written by [`save`](Self::save)
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SyllabotError::io(e, format!("Failed to read transcript: {}", path.display()))
        })?;
        serde_json::from_str(&content)
            .map_err(|e| SyllabotError::json(e, "Failed to deserialize chat session"))
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}
