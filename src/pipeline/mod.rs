//! Question-answering pipeline
//!
//! Wires ingestion, the index, retrieval and answer composition together
//! once, then answers questions against the shared handles.

mod response;
mod shared;

pub use response::{QaExchange, QaResponse};
pub use shared::PipelineCell;

use crate::answer::AnswerComposer;
use crate::config::Config;
use crate::document::Chunk;
use crate::embedding::{EmbeddingProvider, FastEmbedProvider};
use crate::error::{Result, SyllabotError};
use crate::index::{ChunkIndex, IndexManager, IndexOrigin};
use crate::ingest::IngestedDocument;
use crate::llm::{self, ChatModelFactory};
use crate::retrieval::Retriever;
use crate::storage::IndexManifest;
use std::sync::Arc;
use tracing::{error, info};

/// External services the pipeline is built on
#[derive(Clone)]
pub struct PipelineComponents {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub chat_factory: Arc<dyn ChatModelFactory>,
}

impl PipelineComponents {
    /// FastEmbed for embeddings and the configured generative provider
    pub fn from_config(config: &Config) -> Result<Self> {
        let chat_factory = llm::factory_for(&config.llm)?;
        let embedder = FastEmbedProvider::new(&config.embedding.model)?;
        Ok(Self {
            embedder: Arc::new(embedder),
            chat_factory,
        })
    }
}

/// Built pipeline; cheap to share behind an `Arc`
pub struct Pipeline {
    retriever: Retriever,
    composer: AnswerComposer,
    index: Arc<ChunkIndex>,
    index_origin: IndexOrigin,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("index", &self.index)
            .field("index_origin", &self.index_origin)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Build with the default embedding and generative services
    ///
    /// Blocking: loads models and may embed the whole document.
    pub fn build(config: &Config) -> Result<Self> {
        ensure_document(config)?;
        let components = PipelineComponents::from_config(config)?;
        Self::build_with(config, components)
    }

    /// Build with injected services
    pub fn build_with(config: &Config, components: PipelineComponents) -> Result<Self> {
        let document = IngestedDocument::load(&config.document.path, &config.chunking)?;
        Self::from_document(config, &document, components)
    }

    /// Build from an already ingested document
    ///
    /// `config.document` is not read; the index still lives at
    /// `config.index.persist_dir`.
    pub fn from_document(
        config: &Config,
        document: &IngestedDocument,
        components: PipelineComponents,
    ) -> Result<Self> {
        let manager = IndexManager::new(components.embedder.clone(), &config.embedding, &config.index);
        let (index, index_origin) = manager.open_or_build_traced(document, &config.index.persist_dir)?;
        let index = Arc::new(index);

        let retriever = Retriever::new(components.embedder, index.clone(), &config.retrieval);
        let composer = AnswerComposer::new(components.chat_factory.as_ref(), &config.llm, &config.answer)?;

        info!(
            "Pipeline ready: {} chunks ({:?}), model {}",
            index.len(),
            index_origin,
            composer.model().active_model()
        );

        Ok(Self {
            retriever,
            composer,
            index,
            index_origin,
        })
    }

    /// Answer `question`, failing on any retrieval or generation error
    pub async fn ask(&self, question: &str) -> Result<QaResponse> {
        self.exchange(question).await.map(QaResponse::from)
    }

    /// Answer `question` and keep the full retrieval detail
    pub async fn exchange(&self, question: &str) -> Result<QaExchange> {
        let retrieval = self.retriever.retrieve(question)?;
        let chunks: Vec<Chunk> = retrieval.chunks().cloned().collect();
        let answer = self.composer.compose(question, &chunks).await?;
        Ok(QaExchange::new(question, answer, retrieval))
    }

    /// Answer `question`, never failing
    ///
    /// Errors are logged; `result` then carries the fallback answer and
    /// `source_documents` whatever was retrieved before the failure.
    pub async fn query(&self, question: &str) -> QaResponse {
        let chunks = match self.retriever.retrieve(question) {
            Ok(retrieval) => retrieval.into_chunks(),
            Err(e) => {
                error!("Retrieval failed: {}", e);
                return self.fallback_response(Vec::new());
            }
        };

        match self.composer.compose(question, &chunks).await {
            Ok(answer) => QaResponse {
                result: answer,
                source_documents: chunks,
            },
            Err(e) => {
                error!("Answer generation failed: {}", e);
                self.fallback_response(chunks)
            }
        }
    }

    fn fallback_response(&self, source_documents: Vec<Chunk>) -> QaResponse {
        QaResponse {
            result: self.composer.fallback_answer().to_string(),
            source_documents,
        }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub fn composer(&self) -> &AnswerComposer {
        &self.composer
    }

    pub fn index(&self) -> &ChunkIndex {
        &self.index
    }

    pub fn manifest(&self) -> &IndexManifest {
        self.index.manifest()
    }

    /// Whether the index was loaded from disk or built by this process
    pub fn index_origin(&self) -> IndexOrigin {
        self.index_origin
    }
}

/// Fail with `NotFound` before any model is loaded if the document is missing
pub fn ensure_document(config: &Config) -> Result<()> {
    if config.document.path.exists() {
        Ok(())
    } else {
        Err(SyllabotError::NotFound {
            path: config.document.path.clone(),
        })
    }
}

/// Ingest the configured document and open or build its index
pub fn open_index(
    config: &Config,
    embedder: Arc<dyn EmbeddingProvider>,
) -> Result<(ChunkIndex, IndexOrigin)> {
    let document = IngestedDocument::load(&config.document.path, &config.chunking)?;
    let manager = IndexManager::new(embedder, &config.embedding, &config.index);
    manager.open_or_build_traced(&document, &config.index.persist_dir)
}
