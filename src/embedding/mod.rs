mod batch;
/// Embedding & vector indexing
///
/// Architecture:
/// - EmbeddingProvider trait for abstraction
/// - FastEmbedProvider for local embedding (all-MiniLM-L6-v2, 384-dim)
/// - BatchEmbedder for the one-time corpus embedding
/// - HNSW for vector similarity search
mod provider;
mod vector_index;

pub use batch::{BatchEmbedder, BatchResult};
pub use provider::{EmbeddingError, EmbeddingProvider, FastEmbedProvider};
pub use vector_index::{SearchResult, VectorIndex, VectorIndexError};
