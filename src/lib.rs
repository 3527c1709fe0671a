//! Syllabot - Course Syllabus Assistant
//!
//! Answers questions about a course syllabus PDF. The document is split into
//! overlapping chunks, embedded locally and kept in a persisted vector index;
//! each question retrieves the closest chunks and a generative model composes
//! an answer from them, citing the pages it drew on.

pub mod answer;
pub mod cli;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod index;
pub mod ingest;
pub mod llm;
pub mod pipeline;
pub mod retrieval;
pub mod session;
pub mod storage;

pub use document::{Chunk, SourceDocument};
pub use error::{Result, SyllabotError};
pub use pipeline::{Pipeline, PipelineCell, PipelineComponents, QaExchange, QaResponse};
