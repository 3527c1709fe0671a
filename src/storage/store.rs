//! Atomic on-disk store for the built index
//!
//! Layout of the persist directory:
//! - `manifest.json`: the [`IndexManifest`]
//! - `entries.json.zst`: zstd-compressed JSON array of [`StoredEntry`]
//!
//! Everything is written into a sibling staging directory, synced, and then
//! renamed into place, so the persist directory is either complete or absent.

use super::manifest::IndexManifest;
use crate::document::Chunk;
use crate::error::{Result, SyllabotError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MANIFEST_FILE: &str = "manifest.json";
const ENTRIES_FILE: &str = "entries.json.zst";
const ZSTD_LEVEL: i32 = 3;

/// One indexed chunk together with its embedding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    /// Position of the chunk in the index
    pub id: u64,
    pub chunk: Chunk,
    pub vector: Vec<f32>,
}

/// Persisted index directory
pub struct IndexStore {
    dir: PathBuf,
}

impl IndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether the directory exists and contains anything
    pub fn is_populated(&self) -> bool {
        fs::read_dir(&self.dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false)
    }

    /// Persist `entries` atomically
    ///
    /// Fails with `IndexBuild` and leaves no directory behind on any error.
    pub fn save(&self, manifest: &IndexManifest, entries: &[StoredEntry]) -> Result<()> {
        let staging = self.staging_path()?;
        debug!("Staging index in {}", staging.display());

        let result = self
            .write_staging(&staging, manifest, entries)
            .and_then(|_| self.commit(&staging));

        match result {
            Ok(()) => {
                info!(
                    "Persisted {} entries to {}",
                    entries.len(),
                    self.dir.display()
                );
                Ok(())
            }
            Err(e) => {
                if staging.exists() {
                    if let Err(cleanup) = fs::remove_dir_all(&staging) {
                        warn!(
                            "Failed to remove staging directory {}: {}",
                            staging.display(),
                            cleanup
                        );
                    }
                }
                Err(SyllabotError::IndexBuild {
                    message: format!("Failed to persist index to {}: {}", self.dir.display(), e),
                })
            }
        }
    }

    /// Read the manifest and every entry back
    ///
    /// Fails with `IndexLoad` when files are missing, corrupt, or disagree
    /// with the manifest.
    pub fn load(&self) -> Result<(IndexManifest, Vec<StoredEntry>)> {
        let manifest_path = self.dir.join(MANIFEST_FILE);
        let manifest_bytes = fs::read(&manifest_path)
            .map_err(|e| self.load_error(format!("cannot read {}: {}", MANIFEST_FILE, e)))?;
        let manifest: IndexManifest = serde_json::from_slice(&manifest_bytes)
            .map_err(|e| self.load_error(format!("invalid {}: {}", MANIFEST_FILE, e)))?;

        let entries_path = self.dir.join(ENTRIES_FILE);
        let compressed = fs::read(&entries_path)
            .map_err(|e| self.load_error(format!("cannot read {}: {}", ENTRIES_FILE, e)))?;
        let raw = zstd::decode_all(&compressed[..])
            .map_err(|e| self.load_error(format!("cannot decompress {}: {}", ENTRIES_FILE, e)))?;
        let entries: Vec<StoredEntry> = serde_json::from_slice(&raw)
            .map_err(|e| self.load_error(format!("invalid {}: {}", ENTRIES_FILE, e)))?;

        if entries.len() != manifest.chunk_count {
            return Err(self.load_error(format!(
                "manifest lists {} chunks but {} entries were found",
                manifest.chunk_count,
                entries.len()
            )));
        }

        for (position, entry) in entries.iter().enumerate() {
            if entry.id != position as u64 {
                return Err(self.load_error(format!(
                    "entry at position {} has id {}",
                    position, entry.id
                )));
            }
            if entry.vector.len() != manifest.dimension {
                return Err(self.load_error(format!(
                    "entry {} has dimension {}, expected {}",
                    entry.id,
                    entry.vector.len(),
                    manifest.dimension
                )));
            }
        }

        debug!(
            "Loaded {} entries from {}",
            entries.len(),
            self.dir.display()
        );

        Ok((manifest, entries))
    }

    /// Delete the persisted index, if any
    pub fn remove(&self) -> Result<()> {
        if self.dir.exists() {
            fs::remove_dir_all(&self.dir).map_err(|e| {
                SyllabotError::io(
                    e,
                    format!("Failed to remove index directory: {}", self.dir.display()),
                )
            })?;
            info!("Removed persisted index at {}", self.dir.display());
        }
        Ok(())
    }

    fn write_staging(
        &self,
        staging: &Path,
        manifest: &IndexManifest,
        entries: &[StoredEntry],
    ) -> Result<()> {
        fs::create_dir_all(staging).map_err(|e| {
            SyllabotError::io(
                e,
                format!("Failed to create staging directory: {}", staging.display()),
            )
        })?;

        let manifest_bytes = serde_json::to_vec_pretty(manifest)
            .map_err(|e| SyllabotError::json(e, "Failed to serialize index manifest"))?;
        write_synced(&staging.join(MANIFEST_FILE), &manifest_bytes)?;

        let raw = serde_json::to_vec(entries)
            .map_err(|e| SyllabotError::json(e, "Failed to serialize index entries"))?;
        let compressed = zstd::encode_all(&raw[..], ZSTD_LEVEL)
            .map_err(|e| SyllabotError::io(e, "Failed to compress index entries"))?;
        write_synced(&staging.join(ENTRIES_FILE), &compressed)?;

        debug!(
            "Wrote {} entries ({} bytes compressed from {})",
            entries.len(),
            compressed.len(),
            raw.len()
        );

        Ok(())
    }

    fn commit(&self, staging: &Path) -> Result<()> {
        if self.dir.exists() {
            if self.is_populated() {
                return Err(SyllabotError::Config(format!(
                    "Index directory {} is already populated",
                    self.dir.display()
                )));
            }
            fs::remove_dir(&self.dir).map_err(|e| {
                SyllabotError::io(
                    e,
                    format!("Failed to replace empty directory: {}", self.dir.display()),
                )
            })?;
        }

        fs::rename(staging, &self.dir).map_err(|e| {
            SyllabotError::io(
                e,
                format!(
                    "Failed to rename staging directory into place: {} -> {}",
                    staging.display(),
                    self.dir.display()
                ),
            )
        })?;

        // Make the rename itself durable where the platform allows it
        if let Ok(parent) = fs::File::open(self.parent_dir()) {
            let _ = parent.sync_all();
        }

        Ok(())
    }

    fn parent_dir(&self) -> PathBuf {
        match self.dir.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn staging_path(&self) -> Result<PathBuf> {
        let name = self
            .dir
            .file_name()
            .ok_or_else(|| SyllabotError::IndexBuild {
                message: format!("Invalid index directory: {}", self.dir.display()),
            })?
            .to_string_lossy();

        Ok(self.parent_dir().join(format!(
            ".{}.staging-{}",
            name,
            uuid::Uuid::new_v4().simple()
        )))
    }

    fn load_error(&self, message: String) -> SyllabotError {
        SyllabotError::IndexLoad {
            path: self.dir.clone(),
            message,
        }
    }
}

fn write_synced(path: &Path, data: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)
        .map_err(|e| SyllabotError::io(e, format!("Failed to create {}", path.display())))?;
    file.write_all(data)
        .map_err(|e| SyllabotError::io(e, format!("Failed to write {}", path.display())))?;
    file.sync_all()
        .map_err(|e| SyllabotError::io(e, format!("Failed to sync {}", path.display())))?;
    Ok(())
}
