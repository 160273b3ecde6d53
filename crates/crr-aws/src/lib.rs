mod client;
pub mod discovery;
mod error;
pub mod mock;
pub mod pipeline;
pub mod poller;

pub use client::{
    load_sdk_config, AwsItemWriter, AwsStreamsClient, DescribeClient, ItemWriter,
    IteratorPosition, RecordPage, ShardInfo, ShardReader, StreamDescription,
};
pub use discovery::discover_stream;
pub use error::{AwsError, AwsResult};
pub use mock::{MockStreamsClient, MockWrite};
pub use pipeline::{
    register_builtin_pipelines, MasterToReplicasPipeline, ReplicationConnectorConfig,
    ReplicationEmitter, MASTER_TO_REPLICAS,
};
pub use poller::{CheckpointStore, PollerSettings, StreamPoller};
