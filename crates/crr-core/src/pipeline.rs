//! The contract a pluggable replication pipeline fulfils.
//!
//! A pipeline turns buffered change records into destination writes. It is
//! assembled from four parts, each built from a shared connector
//! configuration: a buffer, an emitter, a transformer and a filter.

use std::any::Any;

use async_trait::async_trait;

use crate::buffer::RecordBuffer;
use crate::error::{Error, Result};
use crate::transform::RecordTransformer;
use crate::types::ChangeRecord;

/// Configuration shared by the components of a pipeline.
///
/// Pipelines expect a particular concrete configuration type and recover it
/// with [`downcast_config`].
pub trait ConnectorConfiguration: Any + Send + Sync {
    /// The replication task this configuration belongs to.
    fn app_name(&self) -> &str;

    fn as_any(&self) -> &dyn Any;
}

/// Recover the concrete configuration type a pipeline needs.
pub fn downcast_config<'a, T: ConnectorConfiguration>(
    config: &'a dyn ConnectorConfiguration,
    pipeline: &str,
) -> Result<&'a T> {
    config
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| Error::ConfigTypeMismatch {
            pipeline: pipeline.to_string(),
            expected: std::any::type_name::<T>(),
        })
}

/// Decides which records enter the buffer.
pub trait RecordFilter: Send + Sync {
    fn keep(&self, record: &ChangeRecord) -> bool;
}

/// Keeps every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllPassFilter;

impl RecordFilter for AllPassFilter {
    fn keep(&self, _record: &ChangeRecord) -> bool {
        true
    }
}

/// Result of emitting a buffer's contents.
#[derive(Debug, Default)]
pub struct EmitOutcome {
    /// Number of records written to the destination.
    pub emitted: usize,
    /// Records that could not be written.
    pub failed: Vec<ChangeRecord>,
}

/// Writes buffered records to a destination.
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Write the records. Records that could not be written are returned in the outcome.
    async fn emit(&self, records: Vec<ChangeRecord>) -> Result<EmitOutcome>;

    /// Handle records the emitter gave up on.
    fn fail(&self, records: &[ChangeRecord]);

    /// Release any resources held by the emitter.
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

/// A pluggable replication pipeline.
pub trait Pipeline: Send + Sync {
    /// Symbolic name the pipeline is registered under.
    fn name(&self) -> &str;

    fn buffer(&self, config: &dyn ConnectorConfiguration) -> Result<Box<dyn RecordBuffer>>;

    fn emitter(&self, config: &dyn ConnectorConfiguration) -> Result<Box<dyn Emitter>>;

    fn transformer(&self, config: &dyn ConnectorConfiguration)
        -> Result<Box<dyn RecordTransformer>>;

    fn filter(&self, config: &dyn ConnectorConfiguration) -> Result<Box<dyn RecordFilter>>;
}
