/// HNSW vector index for similarity search
use hnsw_rs::prelude::*;
use std::collections::HashSet;
use std::sync::RwLock;
use thiserror::Error;

/// Upper bound on HNSW layers; hnsw_rs caps this internally as well
const MAX_LAYERS: usize = 16;

#[derive(Error, Debug)]
pub enum VectorIndexError {
    #[error("Invalid dimension: expected {expected}, got {actual}")]
    InvalidDimension { expected: usize, actual: usize },

    #[error("Duplicate id: {0}")]
    DuplicateId(u64),

    #[error("Index lock poisoned")]
    Poisoned,
}

/// Search result with ID and similarity score
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Position of the chunk in the index
    pub id: u64,
    /// Cosine similarity (higher is more similar)
    pub score: f32,
}

/// HNSW vector index wrapper
///
/// Approximate nearest neighbour search under cosine distance. The graph is
/// filled once and only read afterwards.
pub struct VectorIndex {
    index: RwLock<Hnsw<'static, f32, DistCosine>>,
    dimension: usize,
    ids: RwLock<HashSet<u64>>,
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.dimension)
            .finish_non_exhaustive()
    }
}

impl VectorIndex {
    /// Create a new vector index
    ///
    /// # Arguments
    /// * `dimension` - Vector dimension (must match embedding dimension)
    /// * `capacity` - Expected number of vectors
    /// * `m` - HNSW M parameter (number of connections per layer)
    /// * `ef_construction` - HNSW construction parameter (higher = better recall, slower build)
    pub fn new(dimension: usize, capacity: usize, m: usize, ef_construction: usize) -> Self {
        let index = Hnsw::<f32, DistCosine>::new(
            m,
            capacity.max(1),
            MAX_LAYERS,
            ef_construction,
            DistCosine,
        );

        Self {
            index: RwLock::new(index),
            dimension,
            ids: RwLock::new(HashSet::new()),
        }
    }

    /// Insert a vector into the index
    ///
    /// # Arguments
    /// * `id` - Unique ID for the vector (the chunk's position)
    /// * `vector` - Embedding vector
    pub fn insert(&self, id: u64, vector: &[f32]) -> Result<(), VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: vector.len(),
            });
        }

        let mut ids = self.ids.write().map_err(|_| VectorIndexError::Poisoned)?;
        if !ids.insert(id) {
            return Err(VectorIndexError::DuplicateId(id));
        }

        let index = self.index.write().map_err(|_| VectorIndexError::Poisoned)?;
        index.insert((vector, id as usize));

        Ok(())
    }

    /// Insert multiple vectors, ids taken from their position
    pub fn insert_all(&self, vectors: &[Vec<f32>]) -> Result<(), VectorIndexError> {
        for (id, vector) in vectors.iter().enumerate() {
            self.insert(id as u64, vector)?;
        }
        Ok(())
    }

    /// Search for k nearest neighbors
    ///
    /// # Arguments
    /// * `query` - Query vector
    /// * `k` - Number of results to return
    /// * `ef_search` - HNSW search parameter (higher = better recall, slower search)
    ///
    /// # Returns
    /// At most `k` results sorted by score descending, ties broken by id ascending
    pub fn search(
        &self,
        query: &[f32],
        k: usize,
        ef_search: usize,
    ) -> Result<Vec<SearchResult>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::InvalidDimension {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }

        let index = self.index.read().map_err(|_| VectorIndexError::Poisoned)?;
        let neighbours = index.search(query, k, ef_search.max(k));

        let mut results: Vec<SearchResult> = neighbours
            .into_iter()
            .map(|neighbour| SearchResult {
                id: neighbour.d_id as u64,
                score: 1.0 - neighbour.distance,
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        results.truncate(k);

        Ok(results)
    }

    /// Get the number of vectors in the index
    pub fn len(&self) -> u64 {
        self.ids.read().map(|ids| ids.len() as u64).unwrap_or(0)
    }

    /// Check if index is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get vector dimension
    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
