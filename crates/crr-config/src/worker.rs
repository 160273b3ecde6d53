//! Assembly of the configuration a replication worker runs with.

use std::fmt;
use std::time::Duration;

use crr_core::{CheckpointPolicy, InitialPosition, Metrics};

use crate::credentials::{select_credentials, CredentialSource};
use crate::error::ConfigResult;
use crate::file::ReplicationFile;
use crate::region::{resolve_endpoint, Endpoint, ServiceFamily};
use crate::stream::StreamDescriptor;
use crate::task::TaskIdentity;
use crate::validation::validate_replication;

/// One end of the replication: a table, where it lives and how to reach it.
#[derive(Debug, Clone)]
pub struct ReplicationSide {
    pub table: String,
    pub endpoint: Endpoint,
    pub credentials: CredentialSource,
}

impl ReplicationSide {
    pub fn region(&self) -> &str {
        self.endpoint.region()
    }
}

/// Every endpoint a worker talks to.
#[derive(Debug, Clone)]
pub struct Topology {
    pub source: ReplicationSide,
    /// Streams API of the source table.
    pub streams_endpoint: Endpoint,
    pub destination: ReplicationSide,
    /// Table holding worker progress. Uses the source credentials.
    pub lease_endpoint: Endpoint,
    pub metrics_endpoint: Endpoint,
}

impl Topology {
    /// Resolve every endpoint and credential source named by `config`.
    ///
    /// The streams endpoint defaults to the source endpoint override so a
    /// single local emulator can serve both APIs. Without a lease region the
    /// lease table lives with the source (and a lease endpoint is ignored).
    pub fn resolve(config: &ReplicationFile) -> ConfigResult<Self> {
        let source = &config.source;
        let destination = &config.destination;

        let source_side = ReplicationSide {
            table: source.table.clone(),
            endpoint: resolve_endpoint(
                &source.region,
                source.endpoint.as_deref(),
                ServiceFamily::DynamoDb,
            )?,
            credentials: select_credentials(
                source.access_key_id.as_deref(),
                source.secret_access_key.as_deref(),
            ),
        };

        let streams_endpoint = resolve_endpoint(
            &source.region,
            source
                .streams_endpoint
                .as_deref()
                .or(source.endpoint.as_deref()),
            ServiceFamily::DynamoDbStreams,
        )?;

        let destination_side = ReplicationSide {
            table: destination.table.clone(),
            endpoint: resolve_endpoint(
                &destination.region,
                destination.endpoint.as_deref(),
                ServiceFamily::DynamoDb,
            )?,
            credentials: select_credentials(
                destination.access_key_id.as_deref(),
                destination.secret_access_key.as_deref(),
            ),
        };

        let (lease_region, lease_override) = match &config.lease.region {
            Some(region) => (region.as_str(), config.lease.endpoint.as_deref()),
            None => (source.region.as_str(), source.endpoint.as_deref()),
        };
        let lease_endpoint = resolve_endpoint(lease_region, lease_override, ServiceFamily::DynamoDb)?;
        let metrics_endpoint = resolve_endpoint(lease_region, None, ServiceFamily::CloudWatch)?;

        Ok(Self {
            source: source_side,
            streams_endpoint,
            destination: destination_side,
            lease_endpoint,
            metrics_endpoint,
        })
    }
}

/// Everything a worker needs to start consuming the source stream.
#[derive(Debug)]
pub struct WorkerConfig {
    pub app_name: String,
    pub worker_id: String,
    pub stream: StreamDescriptor,
    pub topology: Topology,
    /// Pipelines to fan batches out to, in order.
    pub pipelines: Vec<String>,
    pub checkpoint_policy: CheckpointPolicy,
    /// Maximum records per `GetRecords` call.
    pub batch_size: u32,
    pub idle_time_between_reads: Duration,
    pub parent_shard_poll_interval: Duration,
    /// How long a processor group may take to initialize or shut down.
    pub failover_time: Duration,
    pub initial_position: InitialPosition,
    pub validate_sequence_number_before_checkpointing: bool,
    pub metrics: Metrics,
}

impl WorkerConfig {
    /// Region metrics are published to.
    pub fn metrics_region(&self) -> &str {
        self.topology.metrics_endpoint.region()
    }
}

/// Combine a validated configuration, its resolved topology and the
/// discovered stream into a worker configuration.
pub fn assemble_worker_config(
    config: &ReplicationFile,
    topology: Topology,
    stream: StreamDescriptor,
) -> ConfigResult<WorkerConfig> {
    validate_replication(config)?;

    let identity = TaskIdentity::new(
        config.task_name.as_deref(),
        topology.source.region(),
        &topology.source.table,
        topology.destination.region(),
        &topology.destination.table,
    );

    let checkpoint_policy = match &config.checkpoint_writer {
        Some(writer) => CheckpointPolicy::SingleWriter(writer.clone()),
        None => CheckpointPolicy::BestEffortConcurrent,
    };

    let worker = &config.worker;
    Ok(WorkerConfig {
        app_name: identity.app_name,
        worker_id: identity.worker_id,
        stream,
        topology,
        pipelines: config.pipelines.clone(),
        checkpoint_policy,
        batch_size: worker.batch_size,
        idle_time_between_reads: Duration::from_millis(worker.idle_time_between_reads_ms),
        parent_shard_poll_interval: Duration::from_millis(worker.parent_shard_poll_interval_ms),
        failover_time: Duration::from_millis(worker.failover_time_ms),
        initial_position: worker.initial_position.to_core_position(),
        validate_sequence_number_before_checkpointing: worker
            .validate_sequence_number_before_checkpointing,
        metrics: Metrics::from_flag(worker.publish_metrics),
    })
}

impl fmt::Display for WorkerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let topology = &self.topology;
        writeln!(f, "application:      {}", self.app_name)?;
        writeln!(f, "worker id:        {}", self.worker_id)?;
        writeln!(f, "stream:           {}", self.stream.stream_id())?;
        writeln!(
            f,
            "source:           {} @ {} [{}]",
            topology.source.table, topology.source.endpoint, topology.source.credentials
        )?;
        writeln!(f, "streams endpoint: {}", topology.streams_endpoint)?;
        writeln!(
            f,
            "destination:      {} @ {} [{}]",
            topology.destination.table,
            topology.destination.endpoint,
            topology.destination.credentials
        )?;
        writeln!(f, "lease endpoint:   {}", topology.lease_endpoint)?;
        writeln!(f, "pipelines:        {}", self.pipelines.join(", "))?;
        match &self.checkpoint_policy {
            CheckpointPolicy::BestEffortConcurrent => {
                writeln!(f, "checkpoints:      every pipeline")?
            }
            CheckpointPolicy::SingleWriter(writer) => writeln!(f, "checkpoints:      {}", writer)?,
        }
        writeln!(f, "batch size:       {}", self.batch_size)?;
        writeln!(f, "initial position: {:?}", self.initial_position)?;
        if self.metrics.is_enabled() {
            write!(f, "metrics:          {}", self.metrics_region())
        } else {
            write!(f, "metrics:          disabled")
        }
    }
}
