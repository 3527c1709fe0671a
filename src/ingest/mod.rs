//! Document ingestion
//!
//! Loads the syllabus PDF into one `SourceDocument` per page and cuts each
//! page into overlapping chunks ready for embedding.

mod pdf;
mod splitter;

pub use pdf::extract_pages;
pub use splitter::RecursiveSplitter;

use crate::config::ChunkingConfig;
use crate::document::{Chunk, SourceDocument};
use crate::error::{Result, SyllabotError};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::info;

/// A loaded and chunked source document
#[derive(Debug, Clone)]
pub struct IngestedDocument {
    /// Source identifier carried in every chunk's metadata
    pub source: String,
    /// BLAKE3 hex digest of the file bytes
    pub fingerprint: String,
    pub page_count: usize,
    pub chunks: Vec<Chunk>,
}

impl IngestedDocument {
    /// Read, parse and chunk the PDF at `path`
    pub fn load(path: &Path, chunking: &ChunkingConfig) -> Result<Self> {
        if !path.exists() {
            return Err(SyllabotError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let bytes = std::fs::read(path)
            .map_err(|e| SyllabotError::io(e, format!("Failed to read document: {}", path.display())))?;

        let source = path.display().to_string();
        let fingerprint = blake3::hash(&bytes).to_hex().to_string();
        let pages = extract_pages(&bytes)?;

        Ok(Self::assemble(source, fingerprint, &pages, chunking))
    }

    /// Chunk pages that were extracted elsewhere
    ///
    /// The fingerprint is taken over the page numbers and texts.
    pub fn from_pages(source: impl Into<String>, pages: &[SourceDocument], chunking: &ChunkingConfig) -> Self {
        let mut hasher = blake3::Hasher::new();
        for page in pages {
            hasher.update(&page.page.to_le_bytes());
            hasher.update(page.text.as_bytes());
        }
        let fingerprint = hasher.finalize().to_hex().to_string();

        Self::assemble(source.into(), fingerprint, pages, chunking)
    }

    fn assemble(source: String, fingerprint: String, pages: &[SourceDocument], chunking: &ChunkingConfig) -> Self {
        let chunks = split_pages(&source, pages, chunking);

        info!(
            "Ingested {}: {} pages, {} chunks",
            source,
            pages.len(),
            chunks.len()
        );

        Self {
            source,
            fingerprint,
            page_count: pages.len(),
            chunks,
        }
    }
}

/// Load the document at `path` and return its chunks
pub fn ingest(path: &Path, chunking: &ChunkingConfig) -> Result<Vec<Chunk>> {
    IngestedDocument::load(path, chunking).map(|doc| doc.chunks)
}

/// BLAKE3 fingerprint of the file at `path`
pub fn fingerprint(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)
        .map_err(|e| SyllabotError::io(e, format!("Failed to read document: {}", path.display())))?;
    Ok(blake3::hash(&bytes).to_hex().to_string())
}

/// Chunk already-extracted pages, tagging each chunk with `source` and its page
pub fn split_pages(source: &str, pages: &[SourceDocument], chunking: &ChunkingConfig) -> Vec<Chunk> {
    let splitter = RecursiveSplitter::from_config(chunking);

    pages
        .iter()
        .flat_map(|page| {
            splitter
                .split(&page.text)
                .into_iter()
                .enumerate()
                .map(move |(i, text)| Chunk::new(text, source, page.page, i))
        })
        .collect()
}

fn horizontal_space() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[ \t\u{00A0}\u{3000}]+").expect("static regex"))
}

fn blank_lines() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n[ \t]*(\n[ \t]*)+").expect("static regex"))
}

/// Normalize extracted page text: unify line endings, collapse runs of
/// horizontal whitespace, and reduce blank-line runs to one paragraph break.
pub fn normalize_text(text: &str) -> String {
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    let text = horizontal_space().replace_all(&text, " ");
    let text = blank_lines().replace_all(&text, "\n\n");
    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn normalize_collapses_whitespace() {
        let raw = "Week 1\r\n\r\n\r\n  Intro\t\tto   RAG\n \n\nWeek 2";
        assert_eq!(normalize_text(raw), "Week 1\n\nIntro to RAG\n\nWeek 2");
    }

    #[test]
    fn split_pages_keeps_page_metadata() {
        let pages = vec![
            SourceDocument::new(1, "課程介紹"),
            SourceDocument::new(2, "   "),
            SourceDocument::new(3, "期中報告需於第 8 週前繳交"),
        ];
        let chunks = split_pages("syllabus.pdf", &pages, &ChunkingConfig::default());

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].page(), 1);
        assert_eq!(chunks[1].page(), 3);
        assert!(chunks.iter().all(|c| c.source() == "syllabus.pdf"));
    }

    #[test]
    fn long_page_chunk_indexes() {
        let text = "這是一段很長的課程說明。".repeat(200);
        let pages = vec![SourceDocument::new(4, text)];
        let chunks = split_pages("s.pdf", &pages, &ChunkingConfig::default());

        assert!(chunks.len() > 1);
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.metadata.chunk_index, i);
            assert_eq!(chunk.page(), 4);
            assert!(chunk.char_len() <= 1000);
        }
    }

    #[test]
    fn from_pages_fingerprint_tracks_content() {
        let pages = vec![SourceDocument::new(1, "課程介紹"), SourceDocument::new(2, "評分方式")];
        let a = IngestedDocument::from_pages("s.pdf", &pages, &ChunkingConfig::default());
        let b = IngestedDocument::from_pages("s.pdf", &pages, &ChunkingConfig::default());
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_eq!(a.page_count, 2);
        assert_eq!(a.chunks.len(), 2);

        let changed = vec![SourceDocument::new(1, "課程介紹"), SourceDocument::new(2, "評分標準")];
        let c = IngestedDocument::from_pages("s.pdf", &changed, &ChunkingConfig::default());
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn missing_document_names_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("syllabus.pdf");
        let err = ingest(&path, &ChunkingConfig::default()).unwrap_err();

        match err {
            SyllabotError::NotFound { path: missing } => assert_eq!(missing, path),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
