//! Process-wide init-once holder for the built pipeline

use super::Pipeline;
use crate::error::{Result, SyllabotError};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

static GLOBAL: PipelineCell = PipelineCell::new();

/// Builds the pipeline at most once and hands out shared handles
///
/// Concurrent first callers wait on the same build. A failed build leaves
/// the cell empty so the next caller retries.
pub struct PipelineCell {
    cell: OnceCell<Arc<Pipeline>>,
}

impl PipelineCell {
    pub const fn new() -> Self {
        Self {
            cell: OnceCell::const_new(),
        }
    }

    /// The process-wide cell
    pub fn global() -> &'static PipelineCell {
        &GLOBAL
    }

    /// Return the cached pipeline, running `build` on the blocking pool if
    /// there is none yet
    pub async fn get_or_build<F>(&self, build: F) -> Result<Arc<Pipeline>>
    where
        F: FnOnce() -> Result<Pipeline> + Send + 'static,
    {
        let pipeline = self
            .cell
            .get_or_try_init(|| async move {
                debug!("Building pipeline");
                let pipeline = tokio::task::spawn_blocking(build)
                    .await
                    .map_err(|e| SyllabotError::Other(anyhow::anyhow!("Pipeline build task failed: {}", e)))??;
                Ok::<_, SyllabotError>(Arc::new(pipeline))
            })
            .await?;

        Ok(pipeline.clone())
    }

    /// The cached pipeline, if built
    pub fn get(&self) -> Option<Arc<Pipeline>> {
        self.cell.get().cloned()
    }

    pub fn is_built(&self) -> bool {
        self.cell.initialized()
    }
}

impl Default for PipelineCell {
    fn default() -> Self {
        Self::new()
    }
}
