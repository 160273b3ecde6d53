use std::error::Error as StdError;

use aws_sdk_dynamodb::error::DisplayErrorContext;
use crr_config::ConfigError;
use thiserror::Error;

/// Errors from talking to DynamoDB and DynamoDB Streams.
#[derive(Debug, Error)]
pub enum AwsError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },

    #[error("shard iterator expired for shard {shard_id}")]
    ExpiredIterator { shard_id: String },

    #[error("processor for shard {shard_id} did not {phase} within {timeout_ms} ms")]
    ProcessorTimeout {
        shard_id: String,
        phase: &'static str,
        timeout_ms: u128,
    },

    #[error(transparent)]
    Core(#[from] crr_core::Error),
}

impl AwsError {
    /// Wrap an SDK failure, keeping the full error chain in the message.
    pub fn transport<E>(operation: &'static str, error: E) -> Self
    where
        E: StdError,
    {
        AwsError::Transport {
            operation,
            message: DisplayErrorContext(error).to_string(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AwsError::Transport { .. }
                | AwsError::ExpiredIterator { .. }
                | AwsError::ProcessorTimeout { .. }
        )
    }

    /// Whether this error stems from invalid configuration.
    pub fn is_configuration(&self) -> bool {
        match self {
            AwsError::Config(_) => true,
            AwsError::Core(e) => e.is_configuration(),
            _ => false,
        }
    }
}

impl From<AwsError> for crr_core::Error {
    fn from(error: AwsError) -> Self {
        match error {
            AwsError::Core(e) => e,
            other => crr_core::Error::EmitError(other.to_string()),
        }
    }
}

pub type AwsResult<T> = Result<T, AwsError>;
