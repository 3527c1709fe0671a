//! Retrieved chunks and their ranking

use crate::document::Chunk;
use serde::{Deserialize, Serialize};

/// A chunk with its rank and relevance score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedChunk {
    /// 1-based position in the result list
    pub rank: usize,

    /// Cosine similarity to the query (higher is better)
    pub score: f32,

    pub chunk: Chunk,
}

impl RetrievedChunk {
    pub fn new(rank: usize, score: f32, chunk: Chunk) -> Self {
        Self { rank, score, chunk }
    }

    /// Get a short preview of the text (first N characters)
    pub fn preview(&self, max_chars: usize) -> String {
        self.chunk.preview(max_chars)
    }
}

/// Ordered retrieval hits, most similar first
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub hits: Vec<RetrievedChunk>,
}

impl RetrievalResult {
    pub fn new(hits: Vec<RetrievedChunk>) -> Self {
        Self { hits }
    }

    pub fn len(&self) -> usize {
        self.hits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.hits.iter().map(|hit| &hit.chunk)
    }

    /// The chunks alone, in rank order
    pub fn into_chunks(self) -> Vec<Chunk> {
        self.hits.into_iter().map(|hit| hit.chunk).collect()
    }
}
