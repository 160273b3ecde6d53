use serde::Deserialize;

use crate::error::ConfigResult;

/// Name of the pipeline used when none are configured.
pub const DEFAULT_PIPELINE: &str = "master-to-replicas";

/// Largest page a single `GetRecords` call returns.
pub const MAX_BATCH_SIZE: u32 = 1000;

/// Starter configuration written by `crr init`.
pub const SAMPLE_CONFIG: &str = r#"# crr replication task
#
# Values of the form ${VAR} are read from the environment (and .env).

# Optional. Defaults to a name derived from the source and destination.
# task_name = "orders-us-to-eu"

# Pipelines every stream batch is handed to, in initialization order.
pipelines = ["master-to-replicas"]

# Only this pipeline may advance the shared checkpoint. When unset every
# pipeline checkpoints independently.
# checkpoint_writer = "master-to-replicas"

[source]
region = "us-east-1"
table = "orders"
# endpoint = "http://localhost:8000"
# streams_endpoint = "http://localhost:8000"
# access_key_id = "${SOURCE_AWS_ACCESS_KEY_ID}"
# secret_access_key = "${SOURCE_AWS_SECRET_ACCESS_KEY}"

[destination]
region = "eu-west-1"
table = "orders"
# endpoint = "http://localhost:8001"
# access_key_id = "${DESTINATION_AWS_ACCESS_KEY_ID}"
# secret_access_key = "${DESTINATION_AWS_SECRET_ACCESS_KEY}"

# Where worker progress is coordinated. Defaults to the source.
# [lease]
# region = "us-east-1"
# endpoint = "http://localhost:8000"

[worker]
batch_size = 1000
idle_time_between_reads_ms = 500
parent_shard_poll_interval_ms = 10000
failover_time_ms = 60000
initial_position = "trim_horizon"
validate_sequence_number_before_checkpointing = false
publish_metrics = true
"#;

/// Replication task configuration as parsed from TOML.
#[derive(Debug, Deserialize)]
pub struct ReplicationFile {
    /// Explicit application name.
    pub task_name: Option<String>,
    /// Pipelines to run, in order.
    #[serde(default = "default_pipelines")]
    pub pipelines: Vec<String>,
    /// Sole pipeline allowed to advance checkpoints.
    pub checkpoint_writer: Option<String>,
    pub source: SourceConfig,
    pub destination: DestinationConfig,
    #[serde(default)]
    pub lease: LeaseConfig,
    #[serde(default)]
    pub worker: WorkerSettings,
}

impl ReplicationFile {
    /// Parse a replication config from a TOML string.
    pub fn parse(toml_str: &str) -> ConfigResult<Self> {
        let config: ReplicationFile = toml::from_str(toml_str)?;
        Ok(config)
    }
}

fn default_pipelines() -> Vec<String> {
    vec![DEFAULT_PIPELINE.to_string()]
}

/// The table whose stream is replicated.
#[derive(Debug, Deserialize)]
pub struct SourceConfig {
    /// Signing region.
    pub region: String,
    pub table: String,
    /// DynamoDB endpoint override.
    pub endpoint: Option<String>,
    /// Streams endpoint override. Falls back to `endpoint`.
    pub streams_endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// The table replicated into.
#[derive(Debug, Deserialize)]
pub struct DestinationConfig {
    /// Signing region.
    pub region: String,
    pub table: String,
    /// DynamoDB endpoint override.
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

/// Location of the lease table.
#[derive(Debug, Default, Deserialize)]
pub struct LeaseConfig {
    pub region: Option<String>,
    /// Only honoured together with `region`.
    pub endpoint: Option<String>,
}

/// Stream consumption tunables.
#[derive(Debug, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_idle_time")]
    pub idle_time_between_reads_ms: u64,
    #[serde(default = "default_parent_shard_poll_interval")]
    pub parent_shard_poll_interval_ms: u64,
    #[serde(default = "default_failover_time")]
    pub failover_time_ms: u64,
    #[serde(default)]
    pub initial_position: StartingPosition,
    #[serde(default)]
    pub validate_sequence_number_before_checkpointing: bool,
    #[serde(default = "default_publish_metrics")]
    pub publish_metrics: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            idle_time_between_reads_ms: default_idle_time(),
            parent_shard_poll_interval_ms: default_parent_shard_poll_interval(),
            failover_time_ms: default_failover_time(),
            initial_position: StartingPosition::default(),
            validate_sequence_number_before_checkpointing: false,
            publish_metrics: default_publish_metrics(),
        }
    }
}

fn default_batch_size() -> u32 {
    MAX_BATCH_SIZE
}

fn default_idle_time() -> u64 {
    500
}

fn default_parent_shard_poll_interval() -> u64 {
    10_000
}

fn default_failover_time() -> u64 {
    60_000
}

fn default_publish_metrics() -> bool {
    true
}

/// Where shards without a checkpoint start reading.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartingPosition {
    #[default]
    TrimHorizon,
    Latest,
}

impl StartingPosition {
    pub fn to_core_position(self) -> crr_core::InitialPosition {
        match self {
            StartingPosition::TrimHorizon => crr_core::InitialPosition::TrimHorizon,
            StartingPosition::Latest => crr_core::InitialPosition::Latest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let toml = r#"
[source]
region = "us-east-1"
table = "orders"

[destination]
region = "eu-west-1"
table = "orders_replica"
"#;

        let config = ReplicationFile::parse(toml).unwrap();
        assert!(config.task_name.is_none());
        assert_eq!(config.pipelines, vec!["master-to-replicas"]);
        assert!(config.checkpoint_writer.is_none());
        assert_eq!(config.source.table, "orders");
        assert_eq!(config.destination.table, "orders_replica");
        assert!(config.lease.region.is_none());
        assert_eq!(config.worker.batch_size, 1000);
        assert_eq!(config.worker.idle_time_between_reads_ms, 500);
        assert_eq!(config.worker.parent_shard_poll_interval_ms, 10_000);
        assert_eq!(config.worker.failover_time_ms, 60_000);
        assert_eq!(config.worker.initial_position, StartingPosition::TrimHorizon);
        assert!(!config.worker.validate_sequence_number_before_checkpointing);
        assert!(config.worker.publish_metrics);
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
task_name = "orders-us-to-eu"
pipelines = ["master-to-replicas", "audit"]
checkpoint_writer = "master-to-replicas"

[source]
region = "us-east-1"
table = "orders"
endpoint = "http://localhost:8000"
streams_endpoint = "http://localhost:8002"
access_key_id = "AKID"
secret_access_key = "secret"

[destination]
region = "eu-west-1"
table = "orders"
endpoint = "http://localhost:8001"

[lease]
region = "us-west-2"

[worker]
batch_size = 250
initial_position = "latest"
validate_sequence_number_before_checkpointing = true
publish_metrics = false
"#;

        let config = ReplicationFile::parse(toml).unwrap();
        assert_eq!(config.task_name.as_deref(), Some("orders-us-to-eu"));
        assert_eq!(config.pipelines, vec!["master-to-replicas", "audit"]);
        assert_eq!(
            config.source.streams_endpoint.as_deref(),
            Some("http://localhost:8002")
        );
        assert_eq!(config.lease.region.as_deref(), Some("us-west-2"));
        assert_eq!(config.worker.batch_size, 250);
        assert_eq!(config.worker.idle_time_between_reads_ms, 500);
        assert_eq!(config.worker.initial_position, StartingPosition::Latest);
        assert!(config.worker.validate_sequence_number_before_checkpointing);
        assert!(!config.worker.publish_metrics);
    }

    #[test]
    fn test_sample_config_parses() {
        let config = ReplicationFile::parse(SAMPLE_CONFIG).unwrap();
        assert_eq!(config.source.region, "us-east-1");
        assert_eq!(config.destination.region, "eu-west-1");
        assert_eq!(config.worker.batch_size, MAX_BATCH_SIZE);
    }

    #[test]
    fn test_sample_config_lists_only_read_sections() {
        for line in SAMPLE_CONFIG.lines() {
            let section = line.trim_start_matches("# ").trim();
            if section.starts_with('[') {
                assert!(
                    ["[source]", "[destination]", "[lease]", "[worker]"].contains(&section),
                    "unexpected section {}",
                    section
                );
            }
        }

        let legacy = "[source]\nregion = \"us-east-1\"\ntable = \"orders\"\n\n\
            [destination]\nregion = \"eu-west-1\"\ntable = \"orders\"\n\n\
            [replication]\npartition_key_name = \"id\"\n";
        assert!(ReplicationFile::parse(legacy).is_ok());
    }

    #[test]
    fn test_missing_destination_is_a_parse_error() {
        let toml = r#"
[source]
region = "us-east-1"
table = "orders"
"#;
        assert!(ReplicationFile::parse(toml).is_err());
    }

    #[test]
    fn test_unknown_initial_position() {
        let toml = r#"
[source]
region = "us-east-1"
table = "orders"

[destination]
region = "eu-west-1"
table = "orders"

[worker]
initial_position = "at_timestamp"
"#;
        assert!(ReplicationFile::parse(toml).is_err());
    }
}
