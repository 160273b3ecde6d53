use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use crr_core::{compare_sequence_numbers, ChangeRecord, Item};

use crate::client::{
    DescribeClient, IteratorPosition, ItemWriter, RecordPage, ShardInfo, ShardReader,
    StreamDescription,
};
use crate::error::{AwsError, AwsResult};

/// A write recorded by the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum MockWrite {
    Put { table: String, item: Item },
    Delete { table: String, keys: Item },
}

/// A mock DynamoDB / DynamoDB Streams client for testing.
#[derive(Clone, Default)]
pub struct MockStreamsClient {
    state: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    /// Latest stream id per table.
    tables: HashMap<String, Option<String>>,
    streams: HashMap<String, MockStream>,
    writes: Vec<MockWrite>,
    /// Iterators handed out, by token.
    iterators: HashMap<String, (String, String, usize)>,
    next_iterator: usize,
    get_records_calls: usize,
    /// If set, all operations will fail with this error.
    fail_with: Option<String>,
}

#[derive(Default)]
struct MockStream {
    view_type: Option<String>,
    shards: Vec<MockShard>,
}

struct MockShard {
    info: ShardInfo,
    records: Vec<ChangeRecord>,
}

impl MockStreamsClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock client that simulates failures.
    pub fn failing(error_message: impl Into<String>) -> Self {
        let client = Self::new();
        client.state.lock().unwrap().fail_with = Some(error_message.into());
        client
    }

    /// Register a table, optionally with a stream attached.
    pub fn with_table(self, table: impl Into<String>, stream_id: Option<&str>) -> Self {
        self.state
            .lock()
            .unwrap()
            .tables
            .insert(table.into(), stream_id.map(str::to_string));
        self
    }

    /// Register a stream with the given view type.
    pub fn with_stream(self, stream_id: impl Into<String>, view_type: Option<&str>) -> Self {
        self.state.lock().unwrap().streams.insert(
            stream_id.into(),
            MockStream {
                view_type: view_type.map(str::to_string),
                shards: Vec::new(),
            },
        );
        self
    }

    /// Add an open shard to a stream.
    pub fn add_shard(&self, stream_id: &str, shard_id: &str, parent_shard_id: Option<&str>) {
        let mut state = self.state.lock().unwrap();
        let stream = state.streams.entry(stream_id.to_string()).or_default();
        stream.shards.push(MockShard {
            info: ShardInfo {
                shard_id: shard_id.to_string(),
                parent_shard_id: parent_shard_id.map(str::to_string),
                ..Default::default()
            },
            records: Vec::new(),
        });
    }

    /// Append records to a shard.
    pub fn push_records(&self, stream_id: &str, shard_id: &str, records: Vec<ChangeRecord>) {
        let mut state = self.state.lock().unwrap();
        if let Some(shard) = Self::shard_mut(&mut state, stream_id, shard_id) {
            shard.records.extend(records);
        }
    }

    /// Close a shard; readers reaching its end get no next iterator.
    pub fn close_shard(&self, stream_id: &str, shard_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(shard) = Self::shard_mut(&mut state, stream_id, shard_id) {
            let last = shard
                .records
                .last()
                .map(|r| r.sequence_number.clone())
                .unwrap_or_else(|| "0".to_string());
            shard.info.ending_sequence_number = Some(last);
        }
    }

    /// Make every later call fail.
    pub fn fail_with(&self, error_message: impl Into<String>) {
        self.state.lock().unwrap().fail_with = Some(error_message.into());
    }

    /// All writes recorded so far, in order.
    pub fn writes(&self) -> Vec<MockWrite> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn get_records_calls(&self) -> usize {
        self.state.lock().unwrap().get_records_calls
    }

    fn shard_mut<'a>(
        state: &'a mut MockState,
        stream_id: &str,
        shard_id: &str,
    ) -> Option<&'a mut MockShard> {
        state
            .streams
            .get_mut(stream_id)?
            .shards
            .iter_mut()
            .find(|s| s.info.shard_id == shard_id)
    }

    fn check(state: &MockState, operation: &'static str) -> AwsResult<()> {
        match &state.fail_with {
            Some(error) => Err(AwsError::Transport {
                operation,
                message: error.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl DescribeClient for MockStreamsClient {
    fn describe_table_stream(
        &self,
        table: &str,
    ) -> impl Future<Output = AwsResult<Option<String>>> + Send {
        let state = self.state.clone();
        let table = table.to_string();
        async move {
            let state = state.lock().unwrap();
            Self::check(&state, "DescribeTable")?;

            state
                .tables
                .get(&table)
                .cloned()
                .ok_or_else(|| AwsError::Transport {
                    operation: "DescribeTable",
                    message: format!("table not found: {}", table),
                })
        }
    }

    fn describe_stream(
        &self,
        stream_id: &str,
    ) -> impl Future<Output = AwsResult<StreamDescription>> + Send {
        let state = self.state.clone();
        let stream_id = stream_id.to_string();
        async move {
            let state = state.lock().unwrap();
            Self::check(&state, "DescribeStream")?;

            let stream = state
                .streams
                .get(&stream_id)
                .ok_or_else(|| AwsError::Transport {
                    operation: "DescribeStream",
                    message: format!("stream not found: {}", stream_id),
                })?;

            Ok(StreamDescription {
                stream_id: stream_id.clone(),
                view_type: stream.view_type.clone(),
                status: Some("ENABLED".to_string()),
                shards: stream.shards.iter().map(|s| s.info.clone()).collect(),
            })
        }
    }
}

impl ShardReader for MockStreamsClient {
    fn get_shard_iterator(
        &self,
        stream_id: &str,
        shard_id: &str,
        position: &IteratorPosition,
    ) -> impl Future<Output = AwsResult<String>> + Send {
        let state = self.state.clone();
        let stream_id = stream_id.to_string();
        let shard_id = shard_id.to_string();
        let position = position.clone();
        async move {
            let mut state = state.lock().unwrap();
            Self::check(&state, "GetShardIterator")?;

            let shard = Self::shard_mut(&mut state, &stream_id, &shard_id).ok_or_else(|| {
                AwsError::Transport {
                    operation: "GetShardIterator",
                    message: format!("shard not found: {}", shard_id),
                }
            })?;

            let offset = match &position {
                IteratorPosition::TrimHorizon => 0,
                IteratorPosition::Latest => shard.records.len(),
                IteratorPosition::AfterSequenceNumber(seq) => shard
                    .records
                    .iter()
                    .position(|r| compare_sequence_numbers(&r.sequence_number, seq).is_gt())
                    .unwrap_or(shard.records.len()),
            };

            state.next_iterator += 1;
            let token = format!("iterator-{}", state.next_iterator);
            state
                .iterators
                .insert(token.clone(), (stream_id, shard_id, offset));
            Ok(token)
        }
    }

    fn get_records(
        &self,
        shard_id: &str,
        iterator: &str,
        limit: u32,
    ) -> impl Future<Output = AwsResult<RecordPage>> + Send {
        let state = self.state.clone();
        let shard_id = shard_id.to_string();
        let iterator = iterator.to_string();
        async move {
            let mut state = state.lock().unwrap();
            Self::check(&state, "GetRecords")?;
            state.get_records_calls += 1;

            let (stream_id, iterator_shard, offset) = state
                .iterators
                .remove(&iterator)
                .ok_or(AwsError::ExpiredIterator {
                    shard_id: shard_id.clone(),
                })?;

            let shard = Self::shard_mut(&mut state, &stream_id, &iterator_shard).ok_or_else(
                || AwsError::Transport {
                    operation: "GetRecords",
                    message: format!("shard not found: {}", iterator_shard),
                },
            )?;

            let end = (offset + limit as usize).min(shard.records.len());
            let records = shard.records[offset..end].to_vec();
            let exhausted = end == shard.records.len() && shard.info.is_closed();

            let next_iterator = if exhausted {
                None
            } else {
                state.next_iterator += 1;
                let token = format!("iterator-{}", state.next_iterator);
                state
                    .iterators
                    .insert(token.clone(), (stream_id, iterator_shard, end));
                Some(token)
            };

            Ok(RecordPage {
                records,
                next_iterator,
            })
        }
    }
}

impl ItemWriter for MockStreamsClient {
    fn put_item(&self, table: &str, item: Item) -> impl Future<Output = AwsResult<()>> + Send {
        let state = self.state.clone();
        let table = table.to_string();
        async move {
            let mut state = state.lock().unwrap();
            Self::check(&state, "PutItem")?;
            state.writes.push(MockWrite::Put { table, item });
            Ok(())
        }
    }

    fn delete_item(&self, table: &str, keys: Item) -> impl Future<Output = AwsResult<()>> + Send {
        let state = self.state.clone();
        let table = table.to_string();
        async move {
            let mut state = state.lock().unwrap();
            Self::check(&state, "DeleteItem")?;
            state.writes.push(MockWrite::Delete { table, keys });
            Ok(())
        }
    }
}
