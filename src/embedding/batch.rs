/// Batched embedding of chunks for the index build
use super::{EmbeddingError, EmbeddingProvider};
use crate::document::Chunk;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of embedding a set of chunks
#[derive(Debug)]
pub struct BatchResult {
    /// One vector per input chunk, in input order
    pub vectors: Vec<Vec<f32>>,
    pub batches: usize,
    pub duration_ms: u64,
}

/// Embeds chunks in fixed-size batches
///
/// Any failing batch aborts the whole run: a partially embedded corpus is
/// never handed to the index.
pub struct BatchEmbedder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
}

impl BatchEmbedder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, batch_size: usize) -> Self {
        Self {
            provider,
            batch_size: batch_size.max(1),
        }
    }

    pub fn embed_chunks(&self, chunks: &[Chunk]) -> Result<BatchResult, EmbeddingError> {
        let start = std::time::Instant::now();
        let total = chunks.len();

        info!(
            "Embedding {} chunks with {} (batch size {})",
            total,
            self.provider.model_name(),
            self.batch_size
        );

        let mut vectors = Vec::with_capacity(total);
        let mut batches = 0;

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = self.provider.embed_batch(&texts)?;

            if embeddings.len() != batch.len() {
                return Err(EmbeddingError::GenerationError(format!(
                    "Embedding count mismatch: expected {}, got {}",
                    batch.len(),
                    embeddings.len()
                )));
            }

            if let Some(bad) = embeddings
                .iter()
                .find(|e| e.len() != self.provider.dimension())
            {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.provider.dimension(),
                    actual: bad.len(),
                });
            }

            vectors.extend(embeddings);
            batches += 1;
            debug!("Embedded batch {} ({}/{})", batches, vectors.len(), total);
        }

        let duration_ms = start.elapsed().as_millis() as u64;

        info!(
            "Embedding complete: {} vectors in {} batches, {}ms",
            vectors.len(),
            batches,
            duration_ms
        );

        Ok(BatchResult {
            vectors,
            batches,
            duration_ms,
        })
    }
}
