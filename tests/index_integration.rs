/// Index persistence integration tests
mod common;

use common::{syllabus_pages, FailingEmbedder, HashingEmbedder, EMBED_DIM};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use syllabot::config::{ChunkingConfig, EmbeddingConfig, IndexConfig};
use syllabot::document::SourceDocument;
use syllabot::index::{IndexManager, IndexOrigin};
use syllabot::ingest::IngestedDocument;
use syllabot::storage::IndexStore;
use syllabot::SyllabotError;
use tempfile::TempDir;

fn syllabus() -> IngestedDocument {
    IngestedDocument::from_pages("data/syllabus.pdf", &syllabus_pages(), &ChunkingConfig::default())
}

fn manager(embedder: Arc<HashingEmbedder>) -> IndexManager {
    IndexManager::new(embedder, &EmbeddingConfig::default(), &IndexConfig::default())
}

#[test]
fn test_second_open_reuses_persisted_index() {
    let temp = TempDir::new().unwrap();
    let persist = temp.path().join("vector_db");
    let document = syllabus();

    let embedder = Arc::new(HashingEmbedder::new());
    let (first, origin) = manager(embedder.clone())
        .open_or_build_traced(&document, &persist)
        .unwrap();
    assert_eq!(origin, IndexOrigin::Built);
    assert_eq!(first.len(), 10);
    assert_eq!(first.dimension(), EMBED_DIM);
    assert!(persist.join("manifest.json").exists());

    let embedded = embedder.batch_calls.load(Ordering::SeqCst);
    assert!(embedded > 0);

    let (second, origin) = manager(embedder.clone())
        .open_or_build_traced(&document, &persist)
        .unwrap();
    assert_eq!(origin, IndexOrigin::Loaded);
    assert_eq!(embedder.batch_calls.load(Ordering::SeqCst), embedded);
    assert_eq!(second.len(), first.len());
    assert_eq!(second.chunks(), first.chunks());
    assert_eq!(second.manifest().source_fingerprint, document.fingerprint);

    // Same query, same ranking from the reloaded index
    let query = HashingEmbedder::vector("期中報告");
    assert_eq!(first.search(&query, 4).unwrap(), second.search(&query, 4).unwrap());
}

#[test]
fn test_changed_document_still_loads_existing_index() {
    let temp = TempDir::new().unwrap();
    let persist = temp.path().join("vector_db");
    let embedder = Arc::new(HashingEmbedder::new());

    manager(embedder.clone()).open_or_build(&syllabus(), &persist).unwrap();

    let edited = IngestedDocument::from_pages(
        "data/syllabus.pdf",
        &[SourceDocument::new(1, "全新的課綱內容")],
        &ChunkingConfig::default(),
    );
    let (index, origin) = manager(embedder)
        .open_or_build_traced(&edited, &persist)
        .unwrap();

    // Stale but reused until an explicit rebuild
    assert_eq!(origin, IndexOrigin::Loaded);
    assert_eq!(index.len(), 10);
    assert_ne!(index.manifest().source_fingerprint, edited.fingerprint);
}

#[test]
fn test_rebuild_after_remove() {
    let temp = TempDir::new().unwrap();
    let persist = temp.path().join("vector_db");
    let embedder = Arc::new(HashingEmbedder::new());

    manager(embedder.clone()).open_or_build(&syllabus(), &persist).unwrap();
    IndexStore::new(&persist).remove().unwrap();
    assert!(!persist.exists());

    let edited = IngestedDocument::from_pages(
        "data/syllabus.pdf",
        &[
            SourceDocument::new(1, "課程名稱：資料科學導論。"),
            SourceDocument::new(2, "期末考於第 18 週舉行。"),
        ],
        &ChunkingConfig::default(),
    );
    let (index, origin) = manager(embedder)
        .open_or_build_traced(&edited, &persist)
        .unwrap();

    assert_eq!(origin, IndexOrigin::Built);
    assert_eq!(index.len(), 2);
    assert_eq!(index.manifest().source_fingerprint, edited.fingerprint);
}

#[test]
fn test_embedding_failure_leaves_no_index() {
    let temp = TempDir::new().unwrap();
    let persist = temp.path().join("vector_db");

    let manager = IndexManager::new(
        Arc::new(FailingEmbedder),
        &EmbeddingConfig::default(),
        &IndexConfig::default(),
    );
    let err = manager.open_or_build(&syllabus(), &persist).unwrap_err();

    assert!(matches!(err, SyllabotError::IndexBuild { .. }), "{}", err);
    assert!(!persist.exists());
    // Nothing left behind next to it either
    assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
}

#[test]
fn test_unwritable_location_fails_build() {
    let temp = TempDir::new().unwrap();
    let blocker = temp.path().join("not_a_dir");
    std::fs::write(&blocker, b"file").unwrap();
    let persist = blocker.join("vector_db");

    let err = manager(Arc::new(HashingEmbedder::new()))
        .open_or_build(&syllabus(), &persist)
        .unwrap_err();

    assert!(matches!(err, SyllabotError::IndexBuild { .. }), "{}", err);
    assert!(!persist.exists());
}

#[test]
fn test_corrupt_index_reports_load_error() {
    let temp = TempDir::new().unwrap();
    let persist = temp.path().join("vector_db");
    let embedder = Arc::new(HashingEmbedder::new());

    manager(embedder.clone()).open_or_build(&syllabus(), &persist).unwrap();
    std::fs::write(persist.join("entries.json.zst"), b"garbage").unwrap();

    let err = manager(embedder).open_or_build(&syllabus(), &persist).unwrap_err();
    match err {
        SyllabotError::IndexLoad { path, .. } => assert_eq!(path, persist),
        other => panic!("unexpected error: {}", other),
    }
}
