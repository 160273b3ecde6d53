pub mod buffer;
pub mod checkpoint;
pub mod composite;
pub mod connector;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod processor;
pub mod registry;
pub mod transform;
pub mod types;

pub use buffer::{BufferConfig, RecordBuffer, ThresholdBuffer};
pub use checkpoint::{CheckpointPolicy, DiscardingCheckpointer};
pub use composite::{CompositeRecordProcessor, CompositeRecordProcessorFactory};
pub use connector::{PipelineProcessor, PipelineProcessorFactory};
pub use error::{Error, Result};
pub use metrics::{InternalEvent, Metrics};
pub use pipeline::{
    downcast_config, AllPassFilter, ConnectorConfiguration, EmitOutcome, Emitter, Pipeline,
    RecordFilter,
};
pub use processor::{
    Checkpointer, RecordBatch, RecordProcessor, RecordProcessorFactory, SharedCheckpointer,
};
pub use registry::PipelineRegistry;
pub use transform::{IdentityTransformer, RecordTransformer};
pub use types::{
    compare_sequence_numbers, AttributeValue, ChangeRecord, EventKind, InitialPosition, Item,
    ShutdownReason,
};
