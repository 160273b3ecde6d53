//! A single-process host that reads the source stream and drives one
//! processor group per shard.
//!
//! There is no lease table: the poller owns every shard of the stream and
//! keeps checkpoints in memory. A shard is only started once its parent has
//! been read to the end, so records for one key are delivered in order across
//! shard splits.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use crr_config::WorkerConfig;
use crr_core::{
    compare_sequence_numbers, Checkpointer, InitialPosition, RecordBatch, RecordProcessor,
    RecordProcessorFactory, SharedCheckpointer, ShutdownReason,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::client::{DescribeClient, IteratorPosition, ShardInfo, ShardReader};
use crate::error::{AwsError, AwsResult};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Last checkpointed sequence number per shard.
#[derive(Debug, Clone, Default)]
pub struct CheckpointStore {
    positions: Arc<Mutex<HashMap<String, String>>>,
}

impl CheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, shard_id: &str) -> Option<String> {
        lock(&self.positions).get(shard_id).cloned()
    }

    pub fn set(&self, shard_id: &str, sequence_number: &str) {
        lock(&self.positions).insert(shard_id.to_string(), sequence_number.to_string());
    }

    pub fn len(&self) -> usize {
        lock(&self.positions).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Checkpointer handed to the processor group of one shard.
struct ShardCheckpointer {
    shard_id: String,
    store: CheckpointStore,
    /// Highest sequence number delivered on this shard.
    delivered: Arc<Mutex<Option<String>>>,
    validate: bool,
}

#[async_trait]
impl Checkpointer for ShardCheckpointer {
    async fn checkpoint(&self, sequence_number: &str) -> crr_core::Result<()> {
        if self.validate {
            let delivered = lock(&self.delivered).clone();
            let beyond = match &delivered {
                Some(highest) => compare_sequence_numbers(sequence_number, highest).is_gt(),
                None => true,
            };
            if beyond {
                return Err(crr_core::Error::CheckpointError(format!(
                    "sequence number {} has not been delivered on shard {}",
                    sequence_number, self.shard_id
                )));
            }
        }

        self.store.set(&self.shard_id, sequence_number);
        debug!(shard_id = %self.shard_id, sequence_number, "Checkpoint stored");
        Ok(())
    }
}

/// Stream consumption tunables.
#[derive(Debug, Clone)]
pub struct PollerSettings {
    pub stream_id: String,
    pub batch_size: u32,
    pub idle_time_between_reads: Duration,
    pub parent_shard_poll_interval: Duration,
    pub failover_time: Duration,
    pub initial_position: InitialPosition,
    pub validate_sequence_number_before_checkpointing: bool,
}

impl From<&WorkerConfig> for PollerSettings {
    fn from(config: &WorkerConfig) -> Self {
        Self {
            stream_id: config.stream.stream_id().to_string(),
            batch_size: config.batch_size,
            idle_time_between_reads: config.idle_time_between_reads,
            parent_shard_poll_interval: config.parent_shard_poll_interval,
            failover_time: config.failover_time,
            initial_position: config.initial_position,
            validate_sequence_number_before_checkpointing: config
                .validate_sequence_number_before_checkpointing,
        }
    }
}

/// How a shard consumer finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShardOutcome {
    /// The shard is closed and every record was delivered.
    Ended,
    /// The poller is stopping.
    Released,
}

/// Reads every shard of a stream and hands the records to processors
/// created by `factory`.
pub struct StreamPoller<C> {
    client: Arc<C>,
    factory: Arc<dyn RecordProcessorFactory>,
    settings: PollerSettings,
    checkpoints: CheckpointStore,
}

impl<C> StreamPoller<C>
where
    C: DescribeClient + ShardReader + 'static,
{
    pub fn new(
        client: Arc<C>,
        factory: Arc<dyn RecordProcessorFactory>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            client,
            factory,
            settings,
            checkpoints: CheckpointStore::new(),
        }
    }

    /// Resume from previously stored checkpoints.
    pub fn with_checkpoints(mut self, checkpoints: CheckpointStore) -> Self {
        self.checkpoints = checkpoints;
        self
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Poll the stream until `shutdown` resolves.
    ///
    /// Only a failure to list the stream's shards the first time is returned;
    /// later failures are logged and retried on the next poll.
    pub async fn run<F>(&self, shutdown: F) -> AwsResult<()>
    where
        F: Future<Output = ()>,
    {
        let (stop_tx, stop_rx) = watch::channel(false);
        let mut running: HashMap<String, JoinHandle<AwsResult<ShardOutcome>>> = HashMap::new();
        let mut ended: HashSet<String> = HashSet::new();
        let mut listed_once = false;
        tokio::pin!(shutdown);

        info!(
            stream_id = %self.settings.stream_id,
            batch_size = self.settings.batch_size,
            "Starting stream poller"
        );

        loop {
            reap_finished(&mut running, &mut ended).await;

            match self.client.describe_stream(&self.settings.stream_id).await {
                Ok(description) => {
                    listed_once = true;
                    let listed: HashSet<&str> = description
                        .shards
                        .iter()
                        .map(|s| s.shard_id.as_str())
                        .collect();

                    for shard in &description.shards {
                        if ended.contains(&shard.shard_id) || running.contains_key(&shard.shard_id)
                        {
                            continue;
                        }

                        // A parent that aged out of the stream no longer blocks its children.
                        if let Some(parent) = &shard.parent_shard_id {
                            if listed.contains(parent.as_str()) && !ended.contains(parent) {
                                debug!(
                                    shard_id = %shard.shard_id,
                                    parent_shard_id = %parent,
                                    "Waiting for parent shard"
                                );
                                continue;
                            }
                        }

                        let handle = tokio::spawn(consume_shard(
                            self.client.clone(),
                            self.factory.clone(),
                            shard.clone(),
                            self.settings.clone(),
                            self.checkpoints.clone(),
                            stop_rx.clone(),
                        ));
                        running.insert(shard.shard_id.clone(), handle);
                    }
                }
                Err(e) if !listed_once => return Err(e),
                Err(e) => warn!(error = %e, "Failed to list shards"),
            }

            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(self.settings.parent_shard_poll_interval) => {}
            }
        }

        info!(shards = running.len(), "Stopping stream poller");
        let _ = stop_tx.send(true);
        for (shard_id, handle) in running {
            match handle.await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => error!(shard_id = %shard_id, error = %e, "Shard consumer failed"),
                Err(e) => error!(shard_id = %shard_id, error = %e, "Shard consumer panicked"),
            }
        }
        Ok(())
    }
}

async fn reap_finished(
    running: &mut HashMap<String, JoinHandle<AwsResult<ShardOutcome>>>,
    ended: &mut HashSet<String>,
) {
    let finished: Vec<String> = running
        .iter()
        .filter(|(_, handle)| handle.is_finished())
        .map(|(shard_id, _)| shard_id.clone())
        .collect();

    for shard_id in finished {
        let Some(handle) = running.remove(&shard_id) else {
            continue;
        };
        match handle.await {
            Ok(Ok(ShardOutcome::Ended)) => {
                info!(shard_id = %shard_id, "Shard fully processed");
                ended.insert(shard_id);
            }
            Ok(Ok(ShardOutcome::Released)) => {}
            Ok(Err(e)) => {
                warn!(shard_id = %shard_id, error = %e, "Shard consumer stopped, restarting on next poll")
            }
            Err(e) => error!(shard_id = %shard_id, error = %e, "Shard consumer panicked"),
        }
    }
}

/// Run `future`, giving up after the failover time.
async fn bounded<F>(
    timeout: Duration,
    shard_id: &str,
    phase: &'static str,
    future: F,
) -> AwsResult<()>
where
    F: Future<Output = crr_core::Result<()>>,
{
    match tokio::time::timeout(timeout, future).await {
        Ok(result) => Ok(result?),
        Err(_) => Err(AwsError::ProcessorTimeout {
            shard_id: shard_id.to_string(),
            phase,
            timeout_ms: timeout.as_millis(),
        }),
    }
}

async fn consume_shard<C>(
    client: Arc<C>,
    factory: Arc<dyn RecordProcessorFactory>,
    shard: ShardInfo,
    settings: PollerSettings,
    store: CheckpointStore,
    mut stop: watch::Receiver<bool>,
) -> AwsResult<ShardOutcome>
where
    C: ShardReader + 'static,
{
    let shard_id = shard.shard_id;
    let mut processor = factory.create_processor()?;
    bounded(
        settings.failover_time,
        &shard_id,
        "initialize",
        processor.initialize(&shard_id),
    )
    .await?;

    let start = match store.get(&shard_id) {
        Some(sequence_number) => IteratorPosition::AfterSequenceNumber(sequence_number),
        None => settings.initial_position.into(),
    };
    info!(shard_id = %shard_id, start = ?start, "Processing shard");

    let delivered = Arc::new(Mutex::new(None));
    let checkpointer: SharedCheckpointer = Arc::new(ShardCheckpointer {
        shard_id: shard_id.clone(),
        store,
        delivered: delivered.clone(),
        validate: settings.validate_sequence_number_before_checkpointing,
    });

    let result = read_shard(
        client.as_ref(),
        processor.as_mut(),
        &shard_id,
        start,
        &settings,
        &checkpointer,
        &delivered,
        &mut stop,
    )
    .await;

    match result {
        Ok(ShardOutcome::Ended) => {
            bounded(
                settings.failover_time,
                &shard_id,
                "shut down",
                processor.shutdown(checkpointer, ShutdownReason::ShardEnd),
            )
            .await?;
            Ok(ShardOutcome::Ended)
        }
        Ok(ShardOutcome::Released) => {
            bounded(
                settings.failover_time,
                &shard_id,
                "shut down",
                processor.shutdown(checkpointer, ShutdownReason::LeaseLost),
            )
            .await?;
            Ok(ShardOutcome::Released)
        }
        Err(e) => {
            let released = bounded(
                settings.failover_time,
                &shard_id,
                "shut down",
                processor.shutdown(checkpointer, ShutdownReason::LeaseLost),
            )
            .await;
            if let Err(shutdown_error) = released {
                warn!(shard_id = %shard_id, error = %shutdown_error, "Failed to release shard");
            }
            Err(e)
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn read_shard<C>(
    client: &C,
    processor: &mut dyn RecordProcessor,
    shard_id: &str,
    start: IteratorPosition,
    settings: &PollerSettings,
    checkpointer: &SharedCheckpointer,
    delivered: &Mutex<Option<String>>,
    stop: &mut watch::Receiver<bool>,
) -> AwsResult<ShardOutcome>
where
    C: ShardReader,
{
    let mut position = start;
    let mut iterator = Some(
        client
            .get_shard_iterator(&settings.stream_id, shard_id, &position)
            .await?,
    );

    while let Some(current) = iterator.take() {
        if *stop.borrow() {
            return Ok(ShardOutcome::Released);
        }

        let page = match client
            .get_records(shard_id, &current, settings.batch_size)
            .await
        {
            Ok(page) => page,
            Err(AwsError::ExpiredIterator { .. }) => {
                debug!(shard_id, "Shard iterator expired, refreshing");
                iterator = Some(
                    client
                        .get_shard_iterator(&settings.stream_id, shard_id, &position)
                        .await?,
                );
                continue;
            }
            Err(e) => return Err(e),
        };

        if let Some(last) = page.records.last() {
            position = IteratorPosition::AfterSequenceNumber(last.sequence_number.clone());
            *lock(delivered) = Some(last.sequence_number.clone());

            let count = page.records.len();
            processor
                .process_records(page.records.into(), checkpointer.clone())
                .await?;
            debug!(shard_id, records = count, "Delivered records");
        } else if page.next_iterator.is_some() {
            // Lets processors flush buffers that only age out.
            processor
                .process_records(RecordBatch::from(Vec::new()), checkpointer.clone())
                .await?;
            tokio::select! {
                _ = stop.changed() => {}
                _ = tokio::time::sleep(settings.idle_time_between_reads) => {}
            }
        }

        iterator = page.next_iterator;
    }

    Ok(ShardOutcome::Ended)
}
