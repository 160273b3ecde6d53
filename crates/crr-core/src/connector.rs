//! Runs a [`Pipeline`] as a shard record processor.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::buffer::RecordBuffer;
use crate::error::Result;
use crate::metrics::events::{CheckpointAdvanced, RecordsEmitted, RecordsFailed};
use crate::metrics::Metrics;
use crate::pipeline::{ConnectorConfiguration, Emitter, Pipeline, RecordFilter};
use crate::processor::{RecordBatch, RecordProcessor, RecordProcessorFactory, SharedCheckpointer};
use crate::transform::RecordTransformer;
use crate::types::ShutdownReason;

/// Creates a [`PipelineProcessor`] per shard for one pipeline.
pub struct PipelineProcessorFactory {
    pipeline: Arc<dyn Pipeline>,
    config: Arc<dyn ConnectorConfiguration>,
    metrics: Metrics,
}

impl PipelineProcessorFactory {
    /// Pair a pipeline with its configuration.
    ///
    /// Every component is built once up front so that a pipeline handed an
    /// incompatible configuration fails here instead of on the first shard.
    pub fn new(
        pipeline: Arc<dyn Pipeline>,
        config: Arc<dyn ConnectorConfiguration>,
        metrics: Metrics,
    ) -> Result<Self> {
        let factory = Self {
            pipeline,
            config,
            metrics,
        };
        factory.build()?;
        Ok(factory)
    }

    fn build(&self) -> Result<PipelineProcessor> {
        let config = self.config.as_ref();
        Ok(PipelineProcessor {
            pipeline: self.pipeline.name().to_string(),
            shard_id: None,
            last_sequence_number: None,
            buffer: self.pipeline.buffer(config)?,
            emitter: self.pipeline.emitter(config)?,
            transformer: self.pipeline.transformer(config)?,
            filter: self.pipeline.filter(config)?,
            metrics: self.metrics,
        })
    }
}

impl RecordProcessorFactory for PipelineProcessorFactory {
    fn name(&self) -> &str {
        self.pipeline.name()
    }

    fn create_processor(&self) -> Result<Box<dyn RecordProcessor>> {
        Ok(Box::new(self.build()?))
    }
}

/// Filters, transforms and buffers a shard's records, emitting and
/// checkpointing whenever the buffer asks to be flushed.
pub struct PipelineProcessor {
    pipeline: String,
    shard_id: Option<String>,
    /// Last sequence number seen, including filtered records.
    last_sequence_number: Option<String>,
    buffer: Box<dyn RecordBuffer>,
    emitter: Box<dyn Emitter>,
    transformer: Box<dyn RecordTransformer>,
    filter: Box<dyn RecordFilter>,
    metrics: Metrics,
}

impl PipelineProcessor {
    pub fn pipeline(&self) -> &str {
        &self.pipeline
    }

    async fn flush(&mut self, checkpointer: &SharedCheckpointer) -> Result<()> {
        let records = self.buffer.drain();
        let count = records.len();

        if count > 0 {
            let outcome = self.emitter.emit(records).await?;
            self.metrics.emit(RecordsEmitted {
                pipeline: self.pipeline.clone(),
                count: outcome.emitted as u64,
            });

            if !outcome.failed.is_empty() {
                warn!(
                    pipeline = %self.pipeline,
                    failed = outcome.failed.len(),
                    "Records could not be emitted"
                );
                self.metrics.emit(RecordsFailed {
                    pipeline: self.pipeline.clone(),
                    count: outcome.failed.len() as u64,
                });
                self.emitter.fail(&outcome.failed);
            }
        }

        if let Some(sequence_number) = &self.last_sequence_number {
            checkpointer.checkpoint(sequence_number).await?;
            self.metrics.emit(CheckpointAdvanced {
                pipeline: self.pipeline.clone(),
            });
            debug!(
                pipeline = %self.pipeline,
                shard_id = self.shard_id.as_deref().unwrap_or("-"),
                sequence_number = %sequence_number,
                records = count,
                "Flushed buffer"
            );
        }
        Ok(())
    }
}

#[async_trait]
impl RecordProcessor for PipelineProcessor {
    async fn initialize(&mut self, shard_id: &str) -> Result<()> {
        info!(pipeline = %self.pipeline, shard_id, "Initializing pipeline processor");
        self.shard_id = Some(shard_id.to_string());
        Ok(())
    }

    async fn process_records(
        &mut self,
        records: RecordBatch,
        checkpointer: SharedCheckpointer,
    ) -> Result<()> {
        for record in records.iter() {
            if self.filter.keep(record) {
                match self.transformer.transform(record.clone()) {
                    Ok(transformed) => self.buffer.consume(transformed),
                    Err(e) => {
                        warn!(
                            pipeline = %self.pipeline,
                            sequence_number = %record.sequence_number,
                            error = %e,
                            "Transform failed, skipping record"
                        );
                    }
                }
            }
            self.last_sequence_number = Some(record.sequence_number.clone());
        }

        if self.buffer.should_flush() {
            self.flush(&checkpointer).await?;
        }
        Ok(())
    }

    async fn shutdown(
        &mut self,
        checkpointer: SharedCheckpointer,
        reason: ShutdownReason,
    ) -> Result<()> {
        info!(
            pipeline = %self.pipeline,
            shard_id = self.shard_id.as_deref().unwrap_or("-"),
            reason = %reason,
            "Shutting down pipeline processor"
        );

        match reason {
            ShutdownReason::ShardEnd => self.flush(&checkpointer).await?,
            ShutdownReason::LeaseLost => {
                // Another worker resumes from the last checkpoint.
                let discarded = self.buffer.drain().len();
                if discarded > 0 {
                    debug!(pipeline = %self.pipeline, discarded, "Discarded buffered records");
                }
            }
        }

        self.emitter.shutdown().await
    }
}
