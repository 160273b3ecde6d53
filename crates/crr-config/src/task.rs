use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Prefix of generated application names.
pub const TASK_NAME_PREFIX: &str = "DynamoDBCrossRegionReplication-";

/// Identity of one replication worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskIdentity {
    /// Shared by every worker replicating the same source into the same destination.
    pub app_name: String,
    /// Unique to this process.
    pub worker_id: String,
}

impl TaskIdentity {
    pub fn new(
        explicit_task_name: Option<&str>,
        source_region: &str,
        source_table: &str,
        destination_region: &str,
        destination_table: &str,
    ) -> Self {
        let app_name = task_name(
            explicit_task_name,
            source_region,
            source_table,
            destination_region,
            destination_table,
        );
        let worker_id = worker_id(&app_name);
        Self {
            app_name,
            worker_id,
        }
    }
}

/// The application name for a replication task.
///
/// Uses the explicit name when one is given (and non-empty), otherwise
/// derives a stable name from the source and destination coordinates.
pub fn task_name(
    explicit: Option<&str>,
    source_region: &str,
    source_table: &str,
    destination_region: &str,
    destination_table: &str,
) -> String {
    if let Some(name) = explicit.filter(|name| !name.is_empty()) {
        return name.to_string();
    }

    let mut hasher = Sha256::new();
    hasher.update(
        format!(
            "{}|{}|{}|{}",
            source_region, source_table, destination_region, destination_table
        )
        .as_bytes(),
    );
    let digest = hex::encode(hasher.finalize());
    format!("{}{}", TASK_NAME_PREFIX, &digest[..32])
}

/// A fresh worker id for an application.
pub fn worker_id(app_name: &str) -> String {
    format!("{}-worker-{}", app_name, Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_name_is_deterministic() {
        let a = task_name(None, "us-east-1", "orders", "eu-west-1", "orders");
        let b = task_name(None, "us-east-1", "orders", "eu-west-1", "orders");
        assert_eq!(a, b);
        assert!(a.starts_with(TASK_NAME_PREFIX));
        assert_eq!(a.len(), TASK_NAME_PREFIX.len() + 32);
    }

    #[test]
    fn test_task_name_depends_on_every_coordinate() {
        let base = task_name(None, "us-east-1", "orders", "eu-west-1", "orders");
        assert_ne!(base, task_name(None, "us-east-2", "orders", "eu-west-1", "orders"));
        assert_ne!(base, task_name(None, "us-east-1", "carts", "eu-west-1", "orders"));
        assert_ne!(base, task_name(None, "us-east-1", "orders", "eu-west-2", "orders"));
        assert_ne!(base, task_name(None, "us-east-1", "orders", "eu-west-1", "carts"));
    }

    #[test]
    fn test_explicit_task_name() {
        assert_eq!(
            task_name(Some("nightly"), "us-east-1", "a", "eu-west-1", "b"),
            "nightly"
        );
        assert!(task_name(Some(""), "us-east-1", "a", "eu-west-1", "b").starts_with(TASK_NAME_PREFIX));
    }

    #[test]
    fn test_worker_ids_are_unique_with_shared_prefix() {
        let first = TaskIdentity::new(None, "us-east-1", "orders", "eu-west-1", "orders");
        let second = TaskIdentity::new(None, "us-east-1", "orders", "eu-west-1", "orders");

        assert_eq!(first.app_name, second.app_name);
        assert_ne!(first.worker_id, second.worker_id);

        let prefix = format!("{}-worker-", first.app_name);
        assert!(first.worker_id.starts_with(&prefix));
        assert!(second.worker_id.starts_with(&prefix));
    }
}
