//! Core data model: pages extracted from the source PDF and the chunks cut from them

use serde::{Deserialize, Serialize};

/// Raw text of one page of the input document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceDocument {
    /// 1-indexed page number, as printed in citations
    pub page: u32,
    /// Extracted page text
    pub text: String,
}

impl SourceDocument {
    pub fn new(page: u32, text: impl Into<String>) -> Self {
        Self {
            page,
            text: text.into(),
        }
    }
}

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Source file identifier (the document path as given)
    pub source: String,
    /// Page the chunk was cut from
    pub page: u32,
    /// Position of the chunk within its page
    #[serde(default)]
    pub chunk_index: usize,
}

/// A bounded slice of page text, the unit of embedding and retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(flatten)]
    pub metadata: ChunkMetadata,
}

impl Chunk {
    pub fn new(text: impl Into<String>, source: impl Into<String>, page: u32, chunk_index: usize) -> Self {
        Self {
            text: text.into(),
            metadata: ChunkMetadata {
                source: source.into(),
                page,
                chunk_index,
            },
        }
    }

    pub fn page(&self) -> u32 {
        self.metadata.page
    }

    pub fn source(&self) -> &str {
        &self.metadata.source
    }

    /// Number of characters (not bytes) in the chunk
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Short single-line preview for log lines and terminal output
    pub fn preview(&self, max_chars: usize) -> String {
        let flat: String = self
            .text
            .chars()
            .map(|c| if c.is_whitespace() { ' ' } else { c })
            .collect();
        if flat.chars().count() <= max_chars {
            flat
        } else {
            let head: String = flat.chars().take(max_chars).collect();
            format!("{}...", head)
        }
    }
}
