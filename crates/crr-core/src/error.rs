use thiserror::Error;

/// Errors that can occur in crr-core.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown pipeline '{name}': registered pipelines are {known}")]
    UnknownPipeline { name: String, known: String },

    #[error("pipeline '{pipeline}' needs a {expected} configuration argument")]
    ConfigTypeMismatch {
        pipeline: String,
        expected: &'static str,
    },

    #[error("checkpoint writer '{0}' is not one of the configured pipelines")]
    UnknownCheckpointWriter(String),

    #[error("no pipelines configured")]
    NoPipelines,

    #[error("pipeline '{pipeline}' failed: {message}")]
    Delegate { pipeline: String, message: String },

    #[error("transform error: {0}")]
    TransformError(String),

    #[error("emit error: {0}")]
    EmitError(String),

    #[error("checkpoint error: {0}")]
    CheckpointError(String),

    #[error("processor for pipeline '{0}' is no longer running")]
    WorkerGone(String),

    #[error("processor group is already initialized for shard {0}")]
    AlreadyInitialized(String),

    #[error("processor group has not been initialized")]
    NotInitialized,
}

impl Error {
    /// Whether this error stems from invalid configuration rather than a runtime failure.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::UnknownPipeline { .. }
                | Error::ConfigTypeMismatch { .. }
                | Error::UnknownCheckpointWriter(_)
                | Error::NoPipelines
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_errors_are_not_configuration() {
        let runtime = [
            Error::Delegate {
                pipeline: "audit".into(),
                message: "boom".into(),
            },
            Error::WorkerGone("audit".into()),
            Error::AlreadyInitialized("shardId-1".into()),
            Error::NotInitialized,
        ];
        for error in runtime {
            assert!(!error.is_configuration(), "{}", error);
        }

        assert!(Error::NoPipelines.is_configuration());
        assert_eq!(
            Error::NotInitialized.to_string(),
            "processor group has not been initialized"
        );
    }
}
