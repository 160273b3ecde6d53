use std::sync::Arc;

use anyhow::{Context, Result};
use crr_aws::{
    discover_stream, register_builtin_pipelines, AwsError, AwsItemWriter, AwsStreamsClient,
    ItemWriter, ReplicationConnectorConfig,
};
use crr_config::{
    assemble_worker_config, validate_replication, ConfigError, ReplicationFile, Topology,
    WorkerConfig,
};
use crr_core::{
    BufferConfig, CompositeRecordProcessorFactory, ConnectorConfiguration,
    PipelineProcessorFactory, PipelineRegistry, RecordProcessorFactory,
};
use tracing::info;

/// Everything a worker needs to start consuming the source stream.
pub struct Bootstrap {
    pub worker: WorkerConfig,
    pub client: AwsStreamsClient,
    pub factory: Arc<dyn RecordProcessorFactory>,
}

/// Validate the config, connect to both regions, discover the source stream
/// and build the processor factory. Nothing is started on failure.
pub async fn bootstrap(config: &ReplicationFile) -> Result<Bootstrap> {
    validate_replication(config)?;

    let topology = Topology::resolve(config)?;
    info!(
        source = %topology.source.endpoint,
        destination = %topology.destination.endpoint,
        "Resolved endpoints"
    );

    let client = AwsStreamsClient::connect(&topology).await;
    let stream = discover_stream(&client, &topology.source.table)
        .await
        .with_context(|| format!("Failed to discover the stream of {}", topology.source.table))?;

    let writer = Arc::new(AwsItemWriter::connect(&topology.destination).await);
    let worker = assemble_worker_config(config, topology, stream)?;
    let factory = build_processor_factory(&worker, writer)?;

    Ok(Bootstrap {
        worker,
        client,
        factory,
    })
}

/// Build one processor factory per configured pipeline and wrap them in a composite.
pub fn build_processor_factory<W: ItemWriter>(
    worker: &WorkerConfig,
    writer: Arc<W>,
) -> Result<Arc<dyn RecordProcessorFactory>> {
    let mut registry = PipelineRegistry::new();
    register_builtin_pipelines::<W>(&mut registry);
    let pipelines = registry.build_all(worker.pipelines.as_slice())?;

    let connector: Arc<dyn ConnectorConfiguration> = Arc::new(ReplicationConnectorConfig {
        app_name: worker.app_name.clone(),
        destination_table: worker.topology.destination.table.clone(),
        destination_region: worker.topology.destination.region().to_string(),
        writer,
        buffer: BufferConfig::with_max_records(worker.batch_size as usize),
    });

    let delegates = pipelines
        .into_iter()
        .map(|pipeline| {
            PipelineProcessorFactory::new(pipeline, connector.clone(), worker.metrics)
                .map(|factory| Arc::new(factory) as Arc<dyn RecordProcessorFactory>)
        })
        .collect::<crr_core::Result<Vec<_>>>()?;

    let composite = CompositeRecordProcessorFactory::new(
        delegates,
        worker.checkpoint_policy.clone(),
        worker.metrics,
    )?;
    info!(pipelines = ?composite.pipeline_names(), "Built record processors");

    Ok(Arc::new(composite))
}

/// Whether `error` was caused by invalid configuration rather than a failing service.
pub fn is_configuration_error(error: &anyhow::Error) -> bool {
    error.chain().any(|cause| {
        cause.is::<ConfigError>()
            || cause
                .downcast_ref::<crr_core::Error>()
                .is_some_and(|e| e.is_configuration())
            || cause
                .downcast_ref::<AwsError>()
                .is_some_and(|e| e.is_configuration())
    })
}
