//! Storage layer for the persisted index
//!
//! Provides the manifest and the atomic directory store holding chunks and
//! their embeddings

pub mod manifest;
pub mod store;

pub use manifest::{IndexManifest, INDEX_SCHEMA_VERSION};
pub use store::{IndexStore, StoredEntry};
