use std::time::{Duration, Instant};

use crate::types::ChangeRecord;

/// Collects records between flushes of a pipeline.
pub trait RecordBuffer: Send {
    /// Add a record to the buffer.
    fn consume(&mut self, record: ChangeRecord);

    /// Whether the buffered records should be emitted now.
    fn should_flush(&self) -> bool;

    /// Take every buffered record, leaving the buffer empty.
    fn drain(&mut self) -> Vec<ChangeRecord>;

    /// Number of buffered records.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Buffer flush thresholds.
#[derive(Debug, Clone)]
pub struct BufferConfig {
    /// Maximum records per flush.
    pub max_records: usize,
    /// Maximum bytes per flush (approximate).
    pub max_bytes: usize,
    /// Maximum age of the oldest buffered record before a flush.
    pub max_age: Duration,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            max_records: 1000,
            max_bytes: 1024 * 1024, // 1MB
            max_age: Duration::from_secs(1),
        }
    }
}

impl BufferConfig {
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            max_records,
            ..Default::default()
        }
    }
}

/// A buffer that flushes on record count, byte size, or age.
pub struct ThresholdBuffer {
    config: BufferConfig,
    records: Vec<ChangeRecord>,
    estimated_size: usize,
    oldest: Option<Instant>,
}

impl ThresholdBuffer {
    pub fn new(config: BufferConfig) -> Self {
        Self {
            config,
            records: Vec::new(),
            estimated_size: 0,
            oldest: None,
        }
    }

    /// Approximate size of the buffered records in bytes.
    pub fn size(&self) -> usize {
        self.estimated_size
    }

    pub fn config(&self) -> &BufferConfig {
        &self.config
    }
}

impl RecordBuffer for ThresholdBuffer {
    fn consume(&mut self, record: ChangeRecord) {
        self.estimated_size += estimate_record_size(&record);
        self.oldest.get_or_insert_with(Instant::now);
        self.records.push(record);
    }

    fn should_flush(&self) -> bool {
        if self.records.is_empty() {
            return false;
        }

        self.records.len() >= self.config.max_records
            || self.estimated_size >= self.config.max_bytes
            || self
                .oldest
                .is_some_and(|oldest| oldest.elapsed() >= self.config.max_age)
    }

    fn drain(&mut self) -> Vec<ChangeRecord> {
        self.estimated_size = 0;
        self.oldest = None;
        std::mem::take(&mut self.records)
    }

    fn len(&self) -> usize {
        self.records.len()
    }
}

/// Estimate the size of a record in bytes.
fn estimate_record_size(record: &ChangeRecord) -> usize {
    if record.size_bytes > 0 {
        return record.size_bytes as usize;
    }
    // Rough estimate: serialize to JSON and measure
    serde_json::to_string(record).map(|s| s.len()).unwrap_or(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributeValue, EventKind};

    fn make_record(seq: u64, size_bytes: u64) -> ChangeRecord {
        ChangeRecord {
            event_id: format!("e{}", seq),
            kind: EventKind::Insert,
            keys: [("id".into(), AttributeValue::N(seq.to_string()))]
                .into_iter()
                .collect(),
            new_image: None,
            old_image: None,
            sequence_number: seq.to_string(),
            approximate_creation_time: None,
            size_bytes,
        }
    }

    fn config(max_records: usize, max_bytes: usize) -> BufferConfig {
        BufferConfig {
            max_records,
            max_bytes,
            max_age: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_buffer_basic() {
        let mut buffer = ThresholdBuffer::new(config(10, 1024 * 1024));
        assert!(buffer.is_empty());
        assert!(!buffer.should_flush());

        buffer.consume(make_record(1, 10));
        buffer.consume(make_record(2, 10));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.size(), 20);
        assert!(!buffer.should_flush());

        let drained = buffer.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].sequence_number, "1");
        assert!(buffer.is_empty());
        assert_eq!(buffer.size(), 0);
    }

    #[test]
    fn test_buffer_max_records() {
        let mut buffer = ThresholdBuffer::new(config(3, 1024 * 1024));

        buffer.consume(make_record(1, 10));
        buffer.consume(make_record(2, 10));
        assert!(!buffer.should_flush());

        buffer.consume(make_record(3, 10));
        assert!(buffer.should_flush());
    }

    #[test]
    fn test_buffer_max_bytes() {
        let mut buffer = ThresholdBuffer::new(config(100, 50));

        buffer.consume(make_record(1, 30));
        assert!(!buffer.should_flush());

        buffer.consume(make_record(2, 30));
        assert!(buffer.should_flush());
    }

    #[test]
    fn test_buffer_max_age() {
        let mut buffer = ThresholdBuffer::new(BufferConfig {
            max_records: 100,
            max_bytes: 1024 * 1024,
            max_age: Duration::ZERO,
        });

        assert!(!buffer.should_flush());
        buffer.consume(make_record(1, 10));
        assert!(buffer.should_flush());
    }

    #[test]
    fn test_estimate_without_reported_size() {
        let record = make_record(7, 0);
        assert!(estimate_record_size(&record) > 0);
        assert_eq!(estimate_record_size(&make_record(7, 123)), 123);
    }
}
