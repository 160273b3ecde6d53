mod credentials;
mod error;
mod file;
mod region;
mod stream;
mod task;
mod validation;
mod worker;

pub use credentials::{select_credentials, CredentialSource};
pub use error::{ConfigError, ConfigResult};
pub use file::{
    DestinationConfig, LeaseConfig, ReplicationFile, SourceConfig, StartingPosition,
    WorkerSettings, DEFAULT_PIPELINE, MAX_BATCH_SIZE, SAMPLE_CONFIG,
};
pub use region::{is_known_region, resolve_endpoint, Endpoint, ServiceFamily};
pub use stream::{require_stream_id, StreamDescriptor, DUAL_IMAGE_VIEW_TYPE};
pub use task::{task_name, worker_id, TaskIdentity, TASK_NAME_PREFIX};
pub use validation::{validate_batch_size, validate_replication};
pub use worker::{assemble_worker_config, ReplicationSide, Topology, WorkerConfig};
