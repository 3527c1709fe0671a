//! Semantic retrieval over the chunk index
//!
//! Embeds the question with the provider that built the index and returns
//! the nearest chunks, metadata untouched.

mod result;

pub use result::{RetrievalResult, RetrievedChunk};

use crate::config::RetrievalConfig;
use crate::embedding::EmbeddingProvider;
use crate::index::ChunkIndex;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Embedding generation failed: {0}")]
    EmbeddingError(String),

    #[error("Vector search failed: {0}")]
    VectorSearchError(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Top-k semantic retriever
pub struct Retriever {
    embedding_provider: Arc<dyn EmbeddingProvider>,
    index: Arc<ChunkIndex>,
    k: usize,
}

impl Retriever {
    pub fn new(
        embedding_provider: Arc<dyn EmbeddingProvider>,
        index: Arc<ChunkIndex>,
        config: &RetrievalConfig,
    ) -> Self {
        Self {
            embedding_provider,
            index,
            k: config.k,
        }
    }

    /// Retrieve the configured number of chunks for `query`
    pub fn retrieve(&self, query: &str) -> Result<RetrievalResult, SearchError> {
        self.retrieve_k(query, self.k)
    }

    /// Retrieve at most `k` chunks for `query`, most similar first
    pub fn retrieve_k(&self, query: &str, k: usize) -> Result<RetrievalResult, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery(
                "Query text cannot be empty".to_string(),
            ));
        }

        let query_embedding = self
            .embedding_provider
            .embed(query)
            .map_err(|e| SearchError::EmbeddingError(e.to_string()))?;

        let results = self
            .index
            .search(&query_embedding, k)
            .map_err(|e| SearchError::VectorSearchError(e.to_string()))?;

        let mut hits = Vec::with_capacity(results.len());
        for result in results {
            let chunk = self.index.chunk(result.id).ok_or_else(|| {
                SearchError::VectorSearchError(format!("Chunk {} missing from index", result.id))
            })?;
            hits.push(RetrievedChunk::new(hits.len() + 1, result.score, chunk.clone()));
        }

        debug!("Retrieved {} chunks", hits.len());
        for hit in &hits {
            debug!(
                "  #{} page {} ({:.3}) {}",
                hit.rank,
                hit.chunk.page(),
                hit.score,
                hit.preview(40)
            );
        }

        Ok(RetrievalResult::new(hits))
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::IndexConfig;
    use crate::document::Chunk;
    use crate::embedding::EmbeddingError;
    use crate::storage::{IndexManifest, StoredEntry};

    /// One axis per keyword
    struct KeywordEmbedder;

    const KEYWORDS: [&str; 4] = ["期中", "期末", "作業", "出席"];

    impl EmbeddingProvider for KeywordEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
            let mut v: Vec<f32> = KEYWORDS
                .iter()
                .map(|k| text.matches(k).count() as f32)
                .collect();
            v.push(0.1);
            Ok(v)
        }

        fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            texts.iter().map(|t| self.embed(t)).collect()
        }

        fn dimension(&self) -> usize {
            KEYWORDS.len() + 1
        }

        fn model_name(&self) -> &str {
            "keywords"
        }
    }

    fn retriever(k: usize) -> Retriever {
        let provider = Arc::new(KeywordEmbedder);
        let texts = ["期中報告說明", "期末考試範圍", "每週作業", "出席規定", "課程介紹"];
        let entries: Vec<StoredEntry> = texts
            .iter()
            .enumerate()
            .map(|(i, text)| StoredEntry {
                id: i as u64,
                chunk: Chunk::new(*text, "s.pdf", i as u32 + 1, 0),
                vector: provider.embed(text).unwrap(),
            })
            .collect();
        let manifest = IndexManifest::new("keywords", 5, entries.len(), "s.pdf", "fp");
        let index = ChunkIndex::from_entries(manifest, entries, &IndexConfig::default()).unwrap();

        Retriever::new(provider, Arc::new(index), &RetrievalConfig { k })
    }

    #[test]
    fn test_top_hit_and_ranks() {
        let result = retriever(4).retrieve("期中報告什麼時候交").unwrap();
        assert_eq!(result.len(), 4);
        assert_eq!(result.hits[0].chunk.page(), 1);
        for (i, hit) in result.hits.iter().enumerate() {
            assert_eq!(hit.rank, i + 1);
        }
        assert!(result
            .hits
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score));
    }

    #[test]
    fn test_explicit_k() {
        let retriever = retriever(4);
        assert_eq!(retriever.retrieve_k("作業", 2).unwrap().len(), 2);
        assert_eq!(retriever.retrieve_k("作業", 50).unwrap().len(), 5);
    }

    #[test]
    fn test_empty_query_rejected() {
        let err = retriever(4).retrieve("   ").unwrap_err();
        assert!(matches!(err, SearchError::InvalidQuery(_)));
    }

    #[test]
    fn test_deterministic() {
        let retriever = retriever(3);
        let first = retriever.retrieve("出席").unwrap();
        for _ in 0..5 {
            assert_eq!(retriever.retrieve("出席").unwrap(), first);
        }
    }
}
