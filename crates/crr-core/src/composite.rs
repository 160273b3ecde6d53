//! Fan-out of one shard's records to several pipelines.
//!
//! A [`CompositeRecordProcessor`] presents N pipeline processors to the host
//! as a single processor. Lifecycle calls (`initialize`, `shutdown`) are
//! forwarded to every delegate in pipeline order and return only once all of
//! them have returned. `process_records` hands the batch to one worker per
//! delegate and returns immediately.
//!
//! Each delegate is owned by its worker task and fed through its own queue,
//! so a delegate sees its batches in delivery order and a `shutdown` runs
//! after every batch queued before it. Errors raised while processing a
//! batch are logged by the worker and are not reported to the host.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::checkpoint::{CheckpointPolicy, DiscardingCheckpointer};
use crate::error::{Error, Result};
use crate::metrics::{events::RecordsDelivered, Metrics};
use crate::processor::{RecordBatch, RecordProcessor, RecordProcessorFactory, SharedCheckpointer};
use crate::types::ShutdownReason;

/// Builds a [`CompositeRecordProcessor`] for every shard the host assigns.
pub struct CompositeRecordProcessorFactory {
    delegates: Vec<Arc<dyn RecordProcessorFactory>>,
    policy: CheckpointPolicy,
    metrics: Metrics,
}

impl CompositeRecordProcessorFactory {
    /// Wrap the per-pipeline factories, in the order their processors are
    /// initialized and shut down.
    pub fn new(
        delegates: Vec<Arc<dyn RecordProcessorFactory>>,
        policy: CheckpointPolicy,
        metrics: Metrics,
    ) -> Result<Self> {
        if delegates.is_empty() {
            return Err(Error::NoPipelines);
        }

        if let CheckpointPolicy::SingleWriter(writer) = &policy {
            if !delegates.iter().any(|d| d.name() == writer) {
                return Err(Error::UnknownCheckpointWriter(writer.clone()));
            }
        }

        Ok(Self {
            delegates,
            policy,
            metrics,
        })
    }

    pub fn pipeline_names(&self) -> Vec<&str> {
        self.delegates.iter().map(|d| d.name()).collect()
    }

    pub fn policy(&self) -> &CheckpointPolicy {
        &self.policy
    }

    /// Create the composite for one shard.
    pub fn create(&self) -> Result<CompositeRecordProcessor> {
        let mut delegates = Vec::with_capacity(self.delegates.len());
        for factory in &self.delegates {
            let name = factory.name().to_string();
            let processor = factory.create_processor()?;
            delegates.push(Delegate::new(
                name.clone(),
                processor,
                self.policy.allows(&name),
            ));
        }

        Ok(CompositeRecordProcessor {
            delegates,
            shard_id: None,
            metrics: self.metrics,
        })
    }
}

impl RecordProcessorFactory for CompositeRecordProcessorFactory {
    fn name(&self) -> &str {
        "composite"
    }

    fn create_processor(&self) -> Result<Box<dyn RecordProcessor>> {
        Ok(Box::new(self.create()?))
    }
}

enum Command {
    Process {
        records: RecordBatch,
        checkpointer: SharedCheckpointer,
    },
    Shutdown {
        checkpointer: SharedCheckpointer,
        reason: ShutdownReason,
        done: oneshot::Sender<Result<()>>,
    },
}

/// One pipeline's processor plus the worker that drives it.
struct Delegate {
    name: String,
    writes_checkpoints: bool,
    sender: mpsc::UnboundedSender<Command>,
    /// Present until the worker is started by `initialize`.
    idle: Option<(Box<dyn RecordProcessor>, mpsc::UnboundedReceiver<Command>)>,
    worker: Option<JoinHandle<()>>,
}

impl Delegate {
    fn new(name: String, processor: Box<dyn RecordProcessor>, writes_checkpoints: bool) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        Self {
            name,
            writes_checkpoints,
            sender,
            idle: Some((processor, receiver)),
            worker: None,
        }
    }

    /// The checkpointer this delegate is allowed to see.
    fn checkpointer(&self, shared: &SharedCheckpointer) -> SharedCheckpointer {
        if self.writes_checkpoints {
            shared.clone()
        } else {
            Arc::new(DiscardingCheckpointer::new(self.name.clone()))
        }
    }

    fn start(&mut self) {
        if let Some((processor, receiver)) = self.idle.take() {
            self.worker = Some(tokio::spawn(run_delegate(
                self.name.clone(),
                processor,
                receiver,
            )));
        }
    }
}

async fn run_delegate(
    name: String,
    mut processor: Box<dyn RecordProcessor>,
    mut receiver: mpsc::UnboundedReceiver<Command>,
) {
    while let Some(command) = receiver.recv().await {
        match command {
            Command::Process {
                records,
                checkpointer,
            } => {
                let count = records.len();
                if let Err(e) = processor.process_records(records, checkpointer).await {
                    error!(pipeline = %name, records = count, error = %e, "Pipeline failed to process records");
                }
            }
            Command::Shutdown {
                checkpointer,
                reason,
                done,
            } => {
                let result = processor.shutdown(checkpointer, reason).await;
                // The caller may have stopped waiting.
                let _ = done.send(result);
            }
        }
    }
    debug!(pipeline = %name, "Pipeline worker stopped");
}

/// Presents the processors of several pipelines as a single processor.
pub struct CompositeRecordProcessor {
    delegates: Vec<Delegate>,
    shard_id: Option<String>,
    metrics: Metrics,
}

impl CompositeRecordProcessor {
    /// The shard this group was initialized for.
    pub fn shard_id(&self) -> Option<&str> {
        self.shard_id.as_deref()
    }

    /// Number of delegates (and workers) in this group.
    pub fn len(&self) -> usize {
        self.delegates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.delegates.is_empty()
    }
}

#[async_trait]
impl RecordProcessor for CompositeRecordProcessor {
    async fn initialize(&mut self, shard_id: &str) -> Result<()> {
        if let Some(current) = &self.shard_id {
            return Err(Error::AlreadyInitialized(current.clone()));
        }

        for delegate in &mut self.delegates {
            if let Some((processor, _)) = delegate.idle.as_mut() {
                processor.initialize(shard_id).await?;
            }
        }

        for delegate in &mut self.delegates {
            delegate.start();
        }

        self.shard_id = Some(shard_id.to_string());
        info!(
            shard_id,
            pipelines = self.delegates.len(),
            "Initialized processor group"
        );
        Ok(())
    }

    async fn process_records(
        &mut self,
        records: RecordBatch,
        checkpointer: SharedCheckpointer,
    ) -> Result<()> {
        if self.shard_id.is_none() {
            return Err(Error::NotInitialized);
        }
        if !records.is_empty() {
            self.metrics.emit(RecordsDelivered {
                count: records.len() as u64,
            });
        }

        for delegate in &self.delegates {
            let command = Command::Process {
                records: records.clone(),
                checkpointer: delegate.checkpointer(&checkpointer),
            };
            if delegate.sender.send(command).is_err() {
                warn!(pipeline = %delegate.name, "Pipeline worker is gone, dropping batch");
            }
        }
        Ok(())
    }

    async fn shutdown(
        &mut self,
        checkpointer: SharedCheckpointer,
        reason: ShutdownReason,
    ) -> Result<()> {
        for delegate in &mut self.delegates {
            let delegate_checkpointer = delegate.checkpointer(&checkpointer);

            // Never initialized: there is no worker to go through.
            if let Some((processor, _)) = delegate.idle.as_mut() {
                processor.shutdown(delegate_checkpointer, reason).await?;
                continue;
            }

            let (done, wait) = oneshot::channel();
            delegate
                .sender
                .send(Command::Shutdown {
                    checkpointer: delegate_checkpointer,
                    reason,
                    done,
                })
                .map_err(|_| Error::WorkerGone(delegate.name.clone()))?;

            wait.await
                .map_err(|_| Error::WorkerGone(delegate.name.clone()))??;
        }

        info!(
            shard_id = self.shard_id.as_deref().unwrap_or("-"),
            reason = %reason,
            "Shut down processor group"
        );
        Ok(())
    }
}
