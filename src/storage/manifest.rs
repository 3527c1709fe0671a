//! Manifest describing a persisted index

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Layout version of the persisted index directory
pub const INDEX_SCHEMA_VERSION: u32 = 1;

/// Written next to the entries so a later run can tell what it is loading
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexManifest {
    pub schema_version: u32,
    /// Embedding model the vectors were produced with
    pub embedding_model: String,
    pub dimension: usize,
    pub chunk_count: usize,
    /// Source document identifier
    pub source: String,
    /// BLAKE3 hex digest of the source document bytes
    pub source_fingerprint: String,
    pub created_at: DateTime<Utc>,
}

impl IndexManifest {
    pub fn new(
        embedding_model: impl Into<String>,
        dimension: usize,
        chunk_count: usize,
        source: impl Into<String>,
        source_fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            schema_version: INDEX_SCHEMA_VERSION,
            embedding_model: embedding_model.into(),
            dimension,
            chunk_count,
            source: source.into(),
            source_fingerprint: source_fingerprint.into(),
            created_at: Utc::now(),
        }
    }

    /// Reasons this manifest may not describe the current run, if any
    pub fn staleness(&self, embedding_model: &str, source_fingerprint: &str) -> Vec<String> {
        let mut reasons = Vec::new();
        if self.embedding_model != embedding_model {
            reasons.push(format!(
                "built with embedding model {} but {} is configured",
                self.embedding_model, embedding_model
            ));
        }
        if self.source_fingerprint != source_fingerprint {
            reasons.push(format!(
                "built from a different version of {}",
                self.source
            ));
        }
        reasons
    }
}
