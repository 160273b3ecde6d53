//! The capability interface a host runtime drives for every leased shard.
//!
//! A host calls `initialize` once when it takes a shard, `process_records`
//! for every batch it reads, and `shutdown` when it gives the shard up.
//! Processors never call these on themselves.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{ChangeRecord, ShutdownReason};

/// A batch of records shared between every processor that receives it.
pub type RecordBatch = Arc<[ChangeRecord]>;

/// Advances the durable read position of one shard.
#[async_trait]
pub trait Checkpointer: Send + Sync {
    /// Record that every record up to and including `sequence_number` is processed.
    async fn checkpoint(&self, sequence_number: &str) -> Result<()>;
}

pub type SharedCheckpointer = Arc<dyn Checkpointer>;

/// Processes the records of a single shard.
#[async_trait]
pub trait RecordProcessor: Send {
    /// Called once before any records of `shard_id` are delivered.
    async fn initialize(&mut self, shard_id: &str) -> Result<()>;

    /// Called with every batch read from the shard. An open shard with
    /// nothing new is reported with an empty batch.
    async fn process_records(
        &mut self,
        records: RecordBatch,
        checkpointer: SharedCheckpointer,
    ) -> Result<()>;

    /// Called once when the shard is given up or fully consumed.
    async fn shutdown(
        &mut self,
        checkpointer: SharedCheckpointer,
        reason: ShutdownReason,
    ) -> Result<()>;
}

/// Creates one processor per shard.
pub trait RecordProcessorFactory: Send + Sync {
    /// Name used for logging and checkpoint ownership.
    fn name(&self) -> &str;

    fn create_processor(&self) -> Result<Box<dyn RecordProcessor>>;
}
