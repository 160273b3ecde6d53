use std::collections::HashMap;
use std::future::Future;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_dynamodb::primitives::Blob;
use aws_sdk_dynamodb::types::AttributeValue as DynamoValue;
use aws_sdk_dynamodbstreams::types::{
    AttributeValue as StreamValue, OperationType, Record, Shard, ShardIteratorType,
};
use chrono::{DateTime, Utc};
use crr_config::{CredentialSource, Endpoint, ReplicationSide, Topology};
use crr_core::{AttributeValue, ChangeRecord, EventKind, InitialPosition, Item};
use tracing::debug;

use crate::error::{AwsError, AwsResult};

/// Trait for describing the source table and its stream.
pub trait DescribeClient: Send + Sync {
    /// The latest stream id attached to `table`, if streams are enabled.
    fn describe_table_stream(
        &self,
        table: &str,
    ) -> impl Future<Output = AwsResult<Option<String>>> + Send;

    /// Describe a stream, including every shard it currently lists.
    fn describe_stream(
        &self,
        stream_id: &str,
    ) -> impl Future<Output = AwsResult<StreamDescription>> + Send;
}

/// Trait for reading records from stream shards.
pub trait ShardReader: Send + Sync {
    fn get_shard_iterator(
        &self,
        stream_id: &str,
        shard_id: &str,
        position: &IteratorPosition,
    ) -> impl Future<Output = AwsResult<String>> + Send;

    /// Read up to `limit` records. A page without a next iterator means the
    /// shard is closed and fully read.
    fn get_records(
        &self,
        shard_id: &str,
        iterator: &str,
        limit: u32,
    ) -> impl Future<Output = AwsResult<RecordPage>> + Send;
}

/// Trait for writing replicated items to the destination table.
pub trait ItemWriter: Send + Sync + 'static {
    fn put_item(&self, table: &str, item: Item) -> impl Future<Output = AwsResult<()>> + Send;

    fn delete_item(&self, table: &str, keys: Item) -> impl Future<Output = AwsResult<()>> + Send;
}

/// A described stream.
#[derive(Debug, Clone, Default)]
pub struct StreamDescription {
    pub stream_id: String,
    pub view_type: Option<String>,
    pub status: Option<String>,
    pub shards: Vec<ShardInfo>,
}

/// One shard of a stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ShardInfo {
    pub shard_id: String,
    pub parent_shard_id: Option<String>,
    pub starting_sequence_number: Option<String>,
    /// Set once the shard is closed.
    pub ending_sequence_number: Option<String>,
}

impl ShardInfo {
    pub fn is_closed(&self) -> bool {
        self.ending_sequence_number.is_some()
    }
}

/// Where a shard iterator starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IteratorPosition {
    TrimHorizon,
    Latest,
    AfterSequenceNumber(String),
}

impl From<InitialPosition> for IteratorPosition {
    fn from(position: InitialPosition) -> Self {
        match position {
            InitialPosition::TrimHorizon => IteratorPosition::TrimHorizon,
            InitialPosition::Latest => IteratorPosition::Latest,
        }
    }
}

/// Records returned by one read.
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    pub records: Vec<ChangeRecord>,
    pub next_iterator: Option<String>,
}

/// Load SDK configuration for one side of the replication.
pub async fn load_sdk_config(region: &str, credentials: &CredentialSource) -> SdkConfig {
    let loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(region.to_string()));

    let loader = match credentials {
        CredentialSource::Static {
            access_key_id,
            secret_access_key,
        } => loader.credentials_provider(Credentials::new(
            access_key_id.clone(),
            secret_access_key.clone(),
            None,
            None,
            "crr-static",
        )),
        CredentialSource::DefaultChain => loader,
    };

    loader.load().await
}

fn dynamodb_client(config: &SdkConfig, endpoint: &Endpoint) -> aws_sdk_dynamodb::Client {
    let conf = aws_sdk_dynamodb::config::Builder::from(config)
        .endpoint_url(endpoint.uri())
        .build();
    aws_sdk_dynamodb::Client::from_conf(conf)
}

fn streams_client(config: &SdkConfig, endpoint: &Endpoint) -> aws_sdk_dynamodbstreams::Client {
    let conf = aws_sdk_dynamodbstreams::config::Builder::from(config)
        .endpoint_url(endpoint.uri())
        .build();
    aws_sdk_dynamodbstreams::Client::from_conf(conf)
}

/// Source-side client over the DynamoDB and DynamoDB Streams SDKs.
#[derive(Clone)]
pub struct AwsStreamsClient {
    dynamodb: aws_sdk_dynamodb::Client,
    streams: aws_sdk_dynamodbstreams::Client,
}

impl AwsStreamsClient {
    pub fn new(dynamodb: aws_sdk_dynamodb::Client, streams: aws_sdk_dynamodbstreams::Client) -> Self {
        Self { dynamodb, streams }
    }

    /// Build clients for the source table and its stream.
    pub async fn connect(topology: &Topology) -> Self {
        let source = &topology.source;
        let config = load_sdk_config(source.region(), &source.credentials).await;
        debug!(
            endpoint = %source.endpoint,
            streams_endpoint = %topology.streams_endpoint,
            "Connecting to source"
        );
        Self::new(
            dynamodb_client(&config, &source.endpoint),
            streams_client(&config, &topology.streams_endpoint),
        )
    }
}

impl DescribeClient for AwsStreamsClient {
    fn describe_table_stream(
        &self,
        table: &str,
    ) -> impl Future<Output = AwsResult<Option<String>>> + Send {
        let client = self.dynamodb.clone();
        let table = table.to_string();
        async move {
            let output = client
                .describe_table()
                .table_name(table)
                .send()
                .await
                .map_err(|e| AwsError::transport("DescribeTable", e))?;

            Ok(output
                .table()
                .and_then(|t| t.latest_stream_arn())
                .map(str::to_string))
        }
    }

    fn describe_stream(
        &self,
        stream_id: &str,
    ) -> impl Future<Output = AwsResult<StreamDescription>> + Send {
        let client = self.streams.clone();
        let stream_id = stream_id.to_string();
        async move {
            let mut result = StreamDescription {
                stream_id: stream_id.clone(),
                ..Default::default()
            };
            let mut start_shard_id: Option<String> = None;

            // Shards are listed a page at a time.
            loop {
                let output = client
                    .describe_stream()
                    .stream_arn(&stream_id)
                    .set_exclusive_start_shard_id(start_shard_id.take())
                    .send()
                    .await
                    .map_err(|e| AwsError::transport("DescribeStream", e))?;

                let description =
                    output
                        .stream_description()
                        .ok_or_else(|| AwsError::Transport {
                            operation: "DescribeStream",
                            message: "response has no stream description".into(),
                        })?;

                result.view_type = description
                    .stream_view_type()
                    .map(|v| v.as_str().to_string());
                result.status = description.stream_status().map(|s| s.as_str().to_string());
                result
                    .shards
                    .extend(description.shards().iter().map(convert_shard));

                match description.last_evaluated_shard_id() {
                    Some(shard_id) => start_shard_id = Some(shard_id.to_string()),
                    None => break,
                }
            }

            Ok(result)
        }
    }
}

impl ShardReader for AwsStreamsClient {
    fn get_shard_iterator(
        &self,
        stream_id: &str,
        shard_id: &str,
        position: &IteratorPosition,
    ) -> impl Future<Output = AwsResult<String>> + Send {
        let client = self.streams.clone();
        let stream_id = stream_id.to_string();
        let shard_id = shard_id.to_string();
        let (iterator_type, sequence_number) = match position {
            IteratorPosition::TrimHorizon => (ShardIteratorType::TrimHorizon, None),
            IteratorPosition::Latest => (ShardIteratorType::Latest, None),
            IteratorPosition::AfterSequenceNumber(seq) => {
                (ShardIteratorType::AfterSequenceNumber, Some(seq.clone()))
            }
        };

        async move {
            let output = client
                .get_shard_iterator()
                .stream_arn(stream_id)
                .shard_id(&shard_id)
                .shard_iterator_type(iterator_type)
                .set_sequence_number(sequence_number)
                .send()
                .await
                .map_err(|e| AwsError::transport("GetShardIterator", e))?;

            output
                .shard_iterator()
                .map(str::to_string)
                .ok_or_else(|| AwsError::Transport {
                    operation: "GetShardIterator",
                    message: format!("no iterator returned for shard {}", shard_id),
                })
        }
    }

    fn get_records(
        &self,
        shard_id: &str,
        iterator: &str,
        limit: u32,
    ) -> impl Future<Output = AwsResult<RecordPage>> + Send {
        let client = self.streams.clone();
        let shard_id = shard_id.to_string();
        let iterator = iterator.to_string();
        async move {
            let output = match client
                .get_records()
                .shard_iterator(iterator)
                .limit(limit as i32)
                .send()
                .await
            {
                Ok(output) => output,
                Err(e)
                    if e.as_service_error()
                        .is_some_and(|se| se.is_expired_iterator_exception()) =>
                {
                    return Err(AwsError::ExpiredIterator { shard_id });
                }
                Err(e) => return Err(AwsError::transport("GetRecords", e)),
            };

            let records = output
                .records()
                .iter()
                .map(convert_record)
                .collect::<AwsResult<Vec<_>>>()?;

            Ok(RecordPage {
                records,
                next_iterator: output.next_shard_iterator().map(str::to_string),
            })
        }
    }
}

/// Destination-side writer over the DynamoDB SDK.
#[derive(Clone)]
pub struct AwsItemWriter {
    client: aws_sdk_dynamodb::Client,
}

impl AwsItemWriter {
    pub fn new(client: aws_sdk_dynamodb::Client) -> Self {
        Self { client }
    }

    pub async fn connect(destination: &ReplicationSide) -> Self {
        let config = load_sdk_config(destination.region(), &destination.credentials).await;
        debug!(endpoint = %destination.endpoint, "Connecting to destination");
        Self::new(dynamodb_client(&config, &destination.endpoint))
    }
}

impl ItemWriter for AwsItemWriter {
    fn put_item(&self, table: &str, item: Item) -> impl Future<Output = AwsResult<()>> + Send {
        let client = self.client.clone();
        let table = table.to_string();
        async move {
            client
                .put_item()
                .table_name(table)
                .set_item(Some(to_dynamo_item(item)))
                .send()
                .await
                .map_err(|e| AwsError::transport("PutItem", e))?;
            Ok(())
        }
    }

    fn delete_item(&self, table: &str, keys: Item) -> impl Future<Output = AwsResult<()>> + Send {
        let client = self.client.clone();
        let table = table.to_string();
        async move {
            client
                .delete_item()
                .table_name(table)
                .set_key(Some(to_dynamo_item(keys)))
                .send()
                .await
                .map_err(|e| AwsError::transport("DeleteItem", e))?;
            Ok(())
        }
    }
}

fn malformed(message: impl Into<String>) -> AwsError {
    AwsError::Transport {
        operation: "GetRecords",
        message: message.into(),
    }
}

fn convert_shard(shard: &Shard) -> ShardInfo {
    let range = shard.sequence_number_range();
    ShardInfo {
        shard_id: shard.shard_id().unwrap_or_default().to_string(),
        parent_shard_id: shard.parent_shard_id().map(str::to_string),
        starting_sequence_number: range
            .and_then(|r| r.starting_sequence_number())
            .map(str::to_string),
        ending_sequence_number: range
            .and_then(|r| r.ending_sequence_number())
            .map(str::to_string),
    }
}

fn convert_record(record: &Record) -> AwsResult<ChangeRecord> {
    let stream_record = record
        .dynamodb()
        .ok_or_else(|| malformed("record without stream data"))?;

    let kind = match record.event_name() {
        Some(OperationType::Insert) => EventKind::Insert,
        Some(OperationType::Modify) => EventKind::Modify,
        Some(OperationType::Remove) => EventKind::Remove,
        other => return Err(malformed(format!("unsupported event name {:?}", other))),
    };

    let sequence_number = stream_record
        .sequence_number()
        .ok_or_else(|| malformed("record without sequence number"))?
        .to_string();

    Ok(ChangeRecord {
        event_id: record.event_id().unwrap_or_default().to_string(),
        kind,
        keys: stream_record
            .keys()
            .map(convert_stream_item)
            .transpose()?
            .unwrap_or_default(),
        new_image: stream_record.new_image().map(convert_stream_item).transpose()?,
        old_image: stream_record.old_image().map(convert_stream_item).transpose()?,
        sequence_number,
        approximate_creation_time: stream_record
            .approximate_creation_date_time()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
        size_bytes: stream_record.size_bytes().unwrap_or_default().max(0) as u64,
    })
}

fn convert_stream_item(item: &HashMap<String, StreamValue>) -> AwsResult<Item> {
    item.iter()
        .map(|(name, value)| Ok((name.clone(), convert_stream_value(value)?)))
        .collect()
}

fn convert_stream_value(value: &StreamValue) -> AwsResult<AttributeValue> {
    Ok(match value {
        StreamValue::S(s) => AttributeValue::S(s.clone()),
        StreamValue::N(n) => AttributeValue::N(n.clone()),
        StreamValue::B(b) => AttributeValue::B(b.as_ref().to_vec()),
        StreamValue::Ss(v) => AttributeValue::Ss(v.clone()),
        StreamValue::Ns(v) => AttributeValue::Ns(v.clone()),
        StreamValue::Bs(v) => AttributeValue::Bs(v.iter().map(|b| b.as_ref().to_vec()).collect()),
        StreamValue::M(m) => AttributeValue::M(convert_stream_item(m)?),
        StreamValue::L(l) => AttributeValue::L(
            l.iter()
                .map(convert_stream_value)
                .collect::<AwsResult<Vec<_>>>()?,
        ),
        StreamValue::Null(n) => AttributeValue::Null(*n),
        StreamValue::Bool(b) => AttributeValue::Bool(*b),
        other => return Err(malformed(format!("unsupported attribute value {:?}", other))),
    })
}

fn to_dynamo_item(item: Item) -> HashMap<String, DynamoValue> {
    item.into_iter()
        .map(|(name, value)| (name, to_dynamo_value(value)))
        .collect()
}

fn to_dynamo_value(value: AttributeValue) -> DynamoValue {
    match value {
        AttributeValue::S(s) => DynamoValue::S(s),
        AttributeValue::N(n) => DynamoValue::N(n),
        AttributeValue::B(b) => DynamoValue::B(Blob::new(b)),
        AttributeValue::Ss(v) => DynamoValue::Ss(v),
        AttributeValue::Ns(v) => DynamoValue::Ns(v),
        AttributeValue::Bs(v) => DynamoValue::Bs(v.into_iter().map(Blob::new).collect()),
        AttributeValue::M(m) => DynamoValue::M(to_dynamo_item(m)),
        AttributeValue::L(l) => DynamoValue::L(l.into_iter().map(to_dynamo_value).collect()),
        AttributeValue::Null(n) => DynamoValue::Null(n),
        AttributeValue::Bool(b) => DynamoValue::Bool(b),
    }
}
