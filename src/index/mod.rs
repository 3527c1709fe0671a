//! Vector index manager
//!
//! Builds the chunk index once and reuses the persisted copy on every later
//! run. A persisted index is authoritative: when its manifest disagrees with
//! the current document or embedding model a warning is logged and the index
//! is used as is. Remove the directory (`syllabot index --rebuild`) to
//! rebuild.

use crate::config::{EmbeddingConfig, IndexConfig};
use crate::document::Chunk;
use crate::embedding::{BatchEmbedder, EmbeddingProvider, SearchResult, VectorIndex, VectorIndexError};
use crate::error::{Result, SyllabotError};
use crate::ingest::IngestedDocument;
use crate::storage::{IndexManifest, IndexStore, StoredEntry};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Searchable chunks with their embeddings, loaded or freshly built
#[derive(Debug)]
pub struct ChunkIndex {
    manifest: IndexManifest,
    chunks: Vec<Chunk>,
    vectors: VectorIndex,
    ef_search: usize,
}

impl ChunkIndex {
    /// Build the in-memory HNSW graph from stored entries
    pub fn from_entries(
        manifest: IndexManifest,
        entries: Vec<StoredEntry>,
        config: &IndexConfig,
    ) -> std::result::Result<Self, VectorIndexError> {
        let vectors = VectorIndex::new(
            manifest.dimension,
            entries.len(),
            config.hnsw_m,
            config.hnsw_ef_construction,
        );

        let mut chunks = Vec::with_capacity(entries.len());
        for entry in entries {
            vectors.insert(entry.id, &entry.vector)?;
            chunks.push(entry.chunk);
        }

        Ok(Self {
            manifest,
            chunks,
            vectors,
            ef_search: config.hnsw_ef_search,
        })
    }

    /// Nearest chunks to `query`, best first
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
    ) -> std::result::Result<Vec<SearchResult>, VectorIndexError> {
        self.vectors.search(query, k, self.ef_search)
    }

    pub fn chunk(&self, id: u64) -> Option<&Chunk> {
        self.chunks.get(id as usize)
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn manifest(&self) -> &IndexManifest {
        &self.manifest
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.manifest.dimension
    }
}

/// How `open_or_build` obtained its index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrigin {
    Loaded,
    Built,
}

/// Opens the persisted index or builds and persists a new one
pub struct IndexManager {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    config: IndexConfig,
}

impl IndexManager {
    pub fn new(
        provider: Arc<dyn EmbeddingProvider>,
        embedding: &EmbeddingConfig,
        config: &IndexConfig,
    ) -> Self {
        Self {
            provider,
            batch_size: embedding.batch_size,
            config: config.clone(),
        }
    }

    /// Load the index at `persist_path` if it is populated, otherwise embed
    /// `document`'s chunks and persist them there first
    pub fn open_or_build(&self, document: &IngestedDocument, persist_path: &Path) -> Result<ChunkIndex> {
        self.open_or_build_traced(document, persist_path)
            .map(|(index, _)| index)
    }

    /// Same as [`open_or_build`](Self::open_or_build), also reporting which path was taken
    pub fn open_or_build_traced(
        &self,
        document: &IngestedDocument,
        persist_path: &Path,
    ) -> Result<(ChunkIndex, IndexOrigin)> {
        let store = IndexStore::new(persist_path);

        if store.is_populated() {
            info!("Loading persisted index from {}", persist_path.display());
            let index = self.load(&store)?;

            for reason in index
                .manifest()
                .staleness(self.provider.model_name(), &document.fingerprint)
            {
                warn!(
                    "Persisted index at {} may be stale ({}); using it anyway, rebuild with `syllabot index --rebuild`",
                    persist_path.display(),
                    reason
                );
            }

            return Ok((index, IndexOrigin::Loaded));
        }

        info!(
            "Building index for {} ({} chunks) into {}",
            document.source,
            document.chunks.len(),
            persist_path.display()
        );
        let index = self.build(document, &store)?;
        Ok((index, IndexOrigin::Built))
    }

    fn load(&self, store: &IndexStore) -> Result<ChunkIndex> {
        let (manifest, entries) = store.load()?;

        if manifest.dimension != self.provider.dimension() {
            warn!(
                "Persisted index has dimension {} but the embedding model produces {}",
                manifest.dimension,
                self.provider.dimension()
            );
        }

        let count = entries.len();
        let index = ChunkIndex::from_entries(manifest, entries, &self.config).map_err(|e| {
            SyllabotError::IndexLoad {
                path: store.dir().to_path_buf(),
                message: e.to_string(),
            }
        })?;

        info!("Loaded index with {} chunks", count);
        Ok(index)
    }

    fn build(&self, document: &IngestedDocument, store: &IndexStore) -> Result<ChunkIndex> {
        let embedder = BatchEmbedder::new(self.provider.clone(), self.batch_size);
        let batch = embedder
            .embed_chunks(&document.chunks)
            .map_err(|e| SyllabotError::IndexBuild {
                message: format!("Embedding failed: {}", e),
            })?;

        let entries: Vec<StoredEntry> = document
            .chunks
            .iter()
            .cloned()
            .zip(batch.vectors)
            .enumerate()
            .map(|(id, (chunk, vector))| StoredEntry {
                id: id as u64,
                chunk,
                vector,
            })
            .collect();

        let manifest = IndexManifest::new(
            self.provider.model_name(),
            self.provider.dimension(),
            entries.len(),
            document.source.clone(),
            document.fingerprint.clone(),
        );

        store.save(&manifest, &entries)?;

        ChunkIndex::from_entries(manifest, entries, &self.config).map_err(|e| {
            SyllabotError::IndexBuild {
                message: e.to_string(),
            }
        })
    }
}
