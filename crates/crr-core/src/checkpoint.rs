use async_trait::async_trait;
use tracing::debug;

use crate::error::Result;
use crate::processor::Checkpointer;

/// Which of the pipelines fanned out from one shard may advance its checkpoint.
///
/// Every pipeline sees the same batch and finishes it at its own pace. When
/// several of them advance the shared checkpoint, a fast pipeline can move it
/// past records a slower one has not written yet; a crash in that window
/// loses those records for the slower pipeline's destination.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CheckpointPolicy {
    /// Every pipeline receives the real checkpointer and may advance it.
    #[default]
    BestEffortConcurrent,
    /// Only the named pipeline advances the checkpoint; the rest are ignored.
    SingleWriter(String),
}

impl CheckpointPolicy {
    /// Whether the pipeline called `name` may advance the checkpoint.
    pub fn allows(&self, name: &str) -> bool {
        match self {
            CheckpointPolicy::BestEffortConcurrent => true,
            CheckpointPolicy::SingleWriter(writer) => writer == name,
        }
    }
}

/// A checkpointer handed to pipelines that do not own the checkpoint.
#[derive(Debug, Clone)]
pub struct DiscardingCheckpointer {
    pipeline: String,
}

impl DiscardingCheckpointer {
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            pipeline: pipeline.into(),
        }
    }
}

#[async_trait]
impl Checkpointer for DiscardingCheckpointer {
    async fn checkpoint(&self, sequence_number: &str) -> Result<()> {
        debug!(
            pipeline = %self.pipeline,
            sequence_number,
            "Ignoring checkpoint from non-writer pipeline"
        );
        Ok(())
    }
}
