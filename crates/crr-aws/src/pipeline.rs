//! The built-in pipeline that writes every source mutation to one replica table.

use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use crr_core::{
    downcast_config, AllPassFilter, BufferConfig, ChangeRecord, ConnectorConfiguration,
    EmitOutcome, Emitter, EventKind, IdentityTransformer, Pipeline, PipelineRegistry,
    RecordBuffer, RecordFilter, RecordTransformer, ThresholdBuffer,
};
use tracing::{error, warn};

use crate::client::ItemWriter;
use crate::error::{AwsError, AwsResult};

/// Registered name of [`MasterToReplicasPipeline`].
pub const MASTER_TO_REPLICAS: &str = "master-to-replicas";

/// Configuration handed to every pipeline of a replication task.
pub struct ReplicationConnectorConfig<W> {
    pub app_name: String,
    pub destination_table: String,
    pub destination_region: String,
    pub writer: Arc<W>,
    pub buffer: BufferConfig,
}

impl<W: ItemWriter> ConnectorConfiguration for ReplicationConnectorConfig<W> {
    fn app_name(&self) -> &str {
        &self.app_name
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Replicates a single master table into a replica: every record is kept,
/// passed through unchanged and written with the destination writer `W`.
pub struct MasterToReplicasPipeline<W> {
    writer: PhantomData<fn() -> W>,
}

impl<W: ItemWriter> MasterToReplicasPipeline<W> {
    pub fn new() -> Self {
        Self {
            writer: PhantomData,
        }
    }
}

impl<W: ItemWriter> Default for MasterToReplicasPipeline<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: ItemWriter> Pipeline for MasterToReplicasPipeline<W> {
    fn name(&self) -> &str {
        MASTER_TO_REPLICAS
    }

    fn buffer(&self, config: &dyn ConnectorConfiguration) -> crr_core::Result<Box<dyn RecordBuffer>> {
        let config = downcast_config::<ReplicationConnectorConfig<W>>(config, self.name())?;
        Ok(Box::new(ThresholdBuffer::new(config.buffer.clone())))
    }

    fn emitter(&self, config: &dyn ConnectorConfiguration) -> crr_core::Result<Box<dyn Emitter>> {
        let config = downcast_config::<ReplicationConnectorConfig<W>>(config, self.name())?;
        Ok(Box::new(ReplicationEmitter {
            writer: config.writer.clone(),
            table: config.destination_table.clone(),
            region: config.destination_region.clone(),
        }))
    }

    fn transformer(
        &self,
        _config: &dyn ConnectorConfiguration,
    ) -> crr_core::Result<Box<dyn RecordTransformer>> {
        Ok(Box::new(IdentityTransformer::new()))
    }

    fn filter(&self, _config: &dyn ConnectorConfiguration) -> crr_core::Result<Box<dyn RecordFilter>> {
        Ok(Box::new(AllPassFilter))
    }
}

/// Register the pipelines that ship with crr.
pub fn register_builtin_pipelines<W: ItemWriter>(registry: &mut PipelineRegistry) {
    registry.register(MASTER_TO_REPLICAS, || {
        Arc::new(MasterToReplicasPipeline::<W>::new()) as Arc<dyn Pipeline>
    });
}

/// Writes inserts and modifications as puts and removals as deletes.
pub struct ReplicationEmitter<W> {
    writer: Arc<W>,
    table: String,
    region: String,
}

impl<W: ItemWriter> ReplicationEmitter<W> {
    async fn write(&self, record: &ChangeRecord) -> AwsResult<()> {
        match record.kind {
            EventKind::Insert | EventKind::Modify => {
                let image = record.new_image.clone().ok_or_else(|| AwsError::Transport {
                    operation: "PutItem",
                    message: format!("record {} has no new image", record.sequence_number),
                })?;
                self.writer.put_item(&self.table, image).await
            }
            EventKind::Remove => self.writer.delete_item(&self.table, record.keys.clone()).await,
        }
    }
}

#[async_trait]
impl<W: ItemWriter> Emitter for ReplicationEmitter<W> {
    async fn emit(&self, records: Vec<ChangeRecord>) -> crr_core::Result<EmitOutcome> {
        let mut outcome = EmitOutcome::default();

        // Records for the same key must land in stream order, so writes are sequential.
        for record in records {
            match self.write(&record).await {
                Ok(()) => outcome.emitted += 1,
                Err(e) => {
                    warn!(
                        table = %self.table,
                        sequence_number = %record.sequence_number,
                        error = %e,
                        "Replication write failed"
                    );
                    outcome.failed.push(record);
                }
            }
        }

        Ok(outcome)
    }

    fn fail(&self, records: &[ChangeRecord]) {
        for record in records {
            error!(
                table = %self.table,
                region = %self.region,
                kind = %record.kind,
                sequence_number = %record.sequence_number,
                "Record could not be replicated"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockStreamsClient, MockWrite};
    use crr_core::{AttributeValue, Item};

    fn config(writer: MockStreamsClient) -> ReplicationConnectorConfig<MockStreamsClient> {
        ReplicationConnectorConfig {
            app_name: "task".into(),
            destination_table: "replica".into(),
            destination_region: "eu-west-1".into(),
            writer: Arc::new(writer),
            buffer: BufferConfig::with_max_records(10),
        }
    }

    fn item(id: &str) -> Item {
        [("id".into(), AttributeValue::S(id.into()))]
            .into_iter()
            .collect()
    }

    fn record(kind: EventKind, id: &str, seq: &str) -> ChangeRecord {
        ChangeRecord {
            event_id: format!("e{}", seq),
            kind,
            keys: item(id),
            new_image: (kind != EventKind::Remove).then(|| item(id)),
            old_image: (kind != EventKind::Insert).then(|| item(id)),
            sequence_number: seq.into(),
            approximate_creation_time: None,
            size_bytes: 10,
        }
    }

    struct OtherConfig;

    impl ConnectorConfiguration for OtherConfig {
        fn app_name(&self) -> &str {
            "other"
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    #[tokio::test]
    async fn test_emitter_puts_and_deletes() {
        let writer = MockStreamsClient::new();
        let pipeline = MasterToReplicasPipeline::<MockStreamsClient>::new();
        let emitter = pipeline.emitter(&config(writer.clone())).unwrap();

        let outcome = emitter
            .emit(vec![
                record(EventKind::Insert, "a", "1"),
                record(EventKind::Modify, "a", "2"),
                record(EventKind::Remove, "a", "3"),
            ])
            .await
            .unwrap();

        assert_eq!(outcome.emitted, 3);
        assert!(outcome.failed.is_empty());
        assert_eq!(
            writer.writes(),
            vec![
                MockWrite::Put {
                    table: "replica".into(),
                    item: item("a"),
                },
                MockWrite::Put {
                    table: "replica".into(),
                    item: item("a"),
                },
                MockWrite::Delete {
                    table: "replica".into(),
                    keys: item("a"),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_emitter_returns_failed_records() {
        let writer = MockStreamsClient::failing("throttled");
        let pipeline = MasterToReplicasPipeline::<MockStreamsClient>::new();
        let emitter = pipeline.emitter(&config(writer)).unwrap();

        let mut missing_image = record(EventKind::Insert, "b", "2");
        missing_image.new_image = None;

        let outcome = emitter
            .emit(vec![record(EventKind::Insert, "a", "1"), missing_image])
            .await
            .unwrap();
        assert_eq!(outcome.emitted, 0);
        assert_eq!(outcome.failed.len(), 2);
    }

    #[test]
    fn test_components_require_replication_config() {
        let pipeline = MasterToReplicasPipeline::<MockStreamsClient>::new();

        let err = pipeline.emitter(&OtherConfig).err().unwrap();
        assert!(matches!(err, crr_core::Error::ConfigTypeMismatch { .. }));
        assert!(err.to_string().contains(MASTER_TO_REPLICAS));
        assert!(pipeline.buffer(&OtherConfig).is_err());

        // Transformer and filter do not depend on the configuration.
        assert!(pipeline.transformer(&OtherConfig).is_ok());
        assert!(pipeline.filter(&OtherConfig).is_ok());
    }

    #[test]
    fn test_buffer_uses_configured_thresholds() {
        let pipeline = MasterToReplicasPipeline::<MockStreamsClient>::new();
        let mut buffer = pipeline.buffer(&config(MockStreamsClient::new())).unwrap();
        for i in 0..9 {
            buffer.consume(record(EventKind::Insert, "a", &i.to_string()));
        }
        assert!(!buffer.should_flush());
        buffer.consume(record(EventKind::Insert, "a", "9"));
        assert!(buffer.should_flush());
    }

    #[test]
    fn test_registered_as_builtin() {
        let mut registry = PipelineRegistry::new();
        register_builtin_pipelines::<MockStreamsClient>(&mut registry);
        assert_eq!(registry.names(), vec![MASTER_TO_REPLICAS]);
        assert_eq!(
            registry.build(MASTER_TO_REPLICAS).unwrap().name(),
            MASTER_TO_REPLICAS
        );
    }
}
