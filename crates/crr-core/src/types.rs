use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An attribute value as carried by a stream record image.
///
/// Serializes to the same tagged shape DynamoDB uses on the wire,
/// e.g. `{"S": "abc"}` or `{"N": "42"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    #[serde(rename = "S")]
    S(String),
    #[serde(rename = "N")]
    N(String),
    #[serde(rename = "B")]
    B(Vec<u8>),
    #[serde(rename = "SS")]
    Ss(Vec<String>),
    #[serde(rename = "NS")]
    Ns(Vec<String>),
    #[serde(rename = "BS")]
    Bs(Vec<Vec<u8>>),
    #[serde(rename = "M")]
    M(HashMap<String, AttributeValue>),
    #[serde(rename = "L")]
    L(Vec<AttributeValue>),
    #[serde(rename = "NULL")]
    Null(bool),
    #[serde(rename = "BOOL")]
    Bool(bool),
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null(true))
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::S(s) => Some(s),
            _ => None,
        }
    }

    /// Numbers are kept as their decimal string to avoid precision loss.
    pub fn as_number(&self) -> Option<&str> {
        match self {
            AttributeValue::N(n) => Some(n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttributeValue::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

/// An item image: attribute name to value.
pub type Item = HashMap<String, AttributeValue>;

/// The kind of mutation that produced a stream record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Insert,
    Modify,
    Remove,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventKind::Insert => write!(f, "INSERT"),
            EventKind::Modify => write!(f, "MODIFY"),
            EventKind::Remove => write!(f, "REMOVE"),
        }
    }
}

/// A change record delivered from one shard of the source table's stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Unique identifier of the stream event.
    pub event_id: String,
    /// The type of mutation.
    pub kind: EventKind,
    /// Primary key attributes of the modified item.
    pub keys: Item,
    /// The item after the mutation (insert/modify).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_image: Option<Item>,
    /// The item before the mutation (modify/remove).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_image: Option<Item>,
    /// Position of the record within its shard.
    pub sequence_number: String,
    /// Approximate time the mutation was captured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approximate_creation_time: Option<DateTime<Utc>>,
    /// Size of the record as reported by the stream.
    #[serde(default)]
    pub size_bytes: u64,
}

impl ChangeRecord {
    /// The image that represents the item state after this event.
    /// For inserts/modifies this is the new image; for removes, the old one.
    pub fn image(&self) -> Option<&Item> {
        match self.kind {
            EventKind::Insert | EventKind::Modify => self.new_image.as_ref(),
            EventKind::Remove => self.old_image.as_ref(),
        }
    }

    /// Whether both the pre- and post-mutation images are present where the event kind allows.
    pub fn has_both_images(&self) -> bool {
        match self.kind {
            EventKind::Insert => self.new_image.is_some(),
            EventKind::Modify => self.new_image.is_some() && self.old_image.is_some(),
            EventKind::Remove => self.old_image.is_some(),
        }
    }
}

/// Compare two stream sequence numbers.
///
/// Sequence numbers are unbounded decimal strings, so they are ordered by
/// length first and then lexically.
pub fn compare_sequence_numbers(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Where a shard without a checkpoint starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InitialPosition {
    /// The oldest record still retained by the stream.
    #[default]
    TrimHorizon,
    /// Only records written after the reader attaches.
    Latest,
}

/// Why a processor is being shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownReason {
    /// The lease on the shard was lost or released; another worker may take over.
    LeaseLost,
    /// The shard is closed and every record in it has been delivered.
    ShardEnd,
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::LeaseLost => write!(f, "lease_lost"),
            ShutdownReason::ShardEnd => write!(f, "shard_end"),
        }
    }
}
