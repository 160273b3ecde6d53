use thiserror::Error;

/// Errors that can occur when loading, validating or assembling configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("missing required field: {field}")]
    MissingField { field: String },

    #[error("unknown region '{region}'")]
    UnknownRegion { region: String },

    #[error("invalid endpoint '{endpoint}': {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("batch size must be between 1 and {max}, got {value}")]
    InvalidBatchSize { value: u32, max: u32 },

    #[error("no stream found for table '{table}'")]
    NoStreamFound { table: String },

    #[error("stream {stream_id} is not ready: view type is {view_type}, expected NEW_AND_OLD_IMAGES")]
    StreamNotReady { stream_id: String, view_type: String },

    #[error("checkpoint writer '{writer}' is not one of the configured pipelines")]
    UnknownCheckpointWriter { writer: String },

    #[error("pipeline configuration error: {0}")]
    Pipeline(#[from] crr_core::Error),
}

pub type ConfigResult<T> = Result<T, ConfigError>;
