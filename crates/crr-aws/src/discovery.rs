use crr_config::{require_stream_id, StreamDescriptor};
use tracing::info;

use crate::client::DescribeClient;
use crate::error::AwsResult;

/// Find the stream attached to `table` and check it carries both item images.
///
/// Transport failures are returned as-is; nothing here is retried.
pub async fn discover_stream<C: DescribeClient>(
    client: &C,
    table: &str,
) -> AwsResult<StreamDescriptor> {
    let stream_id = require_stream_id(table, client.describe_table_stream(table).await?)?;
    let description = client.describe_stream(&stream_id).await?;
    let stream = StreamDescriptor::new(stream_id, description.view_type.as_deref())?;

    info!(
        table,
        stream_id = stream.stream_id(),
        shards = description.shards.len(),
        "Discovered source stream"
    );
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AwsError;
    use crate::mock::MockStreamsClient;
    use crr_config::ConfigError;

    const ARN: &str = "arn:aws:dynamodb:us-east-1:123456789012:table/orders/stream/label";

    #[tokio::test]
    async fn test_discovers_dual_image_stream() {
        let client = MockStreamsClient::new()
            .with_table("orders", Some(ARN))
            .with_stream(ARN, Some("NEW_AND_OLD_IMAGES"));

        let stream = discover_stream(&client, "orders").await.unwrap();
        assert_eq!(stream.stream_id(), ARN);
    }

    #[tokio::test]
    async fn test_table_without_stream() {
        let client = MockStreamsClient::new().with_table("orders", None);

        let err = discover_stream(&client, "orders").await.unwrap_err();
        assert!(matches!(
            err,
            AwsError::Config(ConfigError::NoStreamFound { .. })
        ));
        assert!(err.to_string().contains("no stream found"));

        let client = MockStreamsClient::new().with_table("orders", Some(""));
        let err = discover_stream(&client, "orders").await.unwrap_err();
        assert!(matches!(
            err,
            AwsError::Config(ConfigError::NoStreamFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_stream_without_both_images() {
        let client = MockStreamsClient::new()
            .with_table("orders", Some(ARN))
            .with_stream(ARN, Some("KEYS_ONLY"));

        let err = discover_stream(&client, "orders").await.unwrap_err();
        assert!(matches!(
            err,
            AwsError::Config(ConfigError::StreamNotReady { .. })
        ));
        assert!(err.is_configuration());
    }

    #[tokio::test]
    async fn test_transport_errors_propagate() {
        let client = MockStreamsClient::failing("connection reset");

        let err = discover_stream(&client, "orders").await.unwrap_err();
        match err {
            AwsError::Transport { operation, message } => {
                assert_eq!(operation, "DescribeTable");
                assert_eq!(message, "connection reset");
            }
            other => panic!("expected a transport error, got {:?}", other),
        }
    }
}
