//! Metrics emission for replication.
//!
//! Events are emitted through the `metrics` facade to whatever recorder the
//! embedding application installed. When metrics are disabled every emit is
//! a no-op, so a missing or unreachable backend never affects replication.

/// Whether metric events are forwarded to the metrics facade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Metrics {
    Enabled,
    #[default]
    Disabled,
}

impl Metrics {
    pub fn from_flag(enabled: bool) -> Self {
        if enabled {
            Metrics::Enabled
        } else {
            Metrics::Disabled
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Metrics::Enabled)
    }

    /// Emit an event if metrics are enabled.
    pub fn emit(&self, event: impl InternalEvent) {
        if self.is_enabled() {
            event.emit();
        }
    }
}

/// An occurrence that maps onto one or more metrics.
pub trait InternalEvent {
    fn emit(self);
}

pub mod events {
    use metrics::counter;
    use tracing::trace;

    use super::InternalEvent;

    /// A batch was handed to a processor group.
    pub struct RecordsDelivered {
        pub count: u64,
    }

    impl InternalEvent for RecordsDelivered {
        fn emit(self) {
            trace!(count = self.count, "Records delivered");
            counter!("crr_records_delivered_total").increment(self.count);
        }
    }

    /// A pipeline wrote records to its destination.
    pub struct RecordsEmitted {
        pub pipeline: String,
        pub count: u64,
    }

    impl InternalEvent for RecordsEmitted {
        fn emit(self) {
            trace!(pipeline = %self.pipeline, count = self.count, "Records emitted");
            counter!("crr_records_emitted_total", "pipeline" => self.pipeline).increment(self.count);
        }
    }

    /// A pipeline gave up on records.
    pub struct RecordsFailed {
        pub pipeline: String,
        pub count: u64,
    }

    impl InternalEvent for RecordsFailed {
        fn emit(self) {
            trace!(pipeline = %self.pipeline, count = self.count, "Records failed");
            counter!("crr_records_failed_total", "pipeline" => self.pipeline).increment(self.count);
        }
    }

    /// A pipeline advanced its shard checkpoint.
    pub struct CheckpointAdvanced {
        pub pipeline: String,
    }

    impl InternalEvent for CheckpointAdvanced {
        fn emit(self) {
            trace!(pipeline = %self.pipeline, "Checkpoint advanced");
            counter!("crr_checkpoints_total", "pipeline" => self.pipeline).increment(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct Probe<'a>(&'a Cell<u32>);

    impl InternalEvent for Probe<'_> {
        fn emit(self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_disabled_metrics_never_emit() {
        let emitted = Cell::new(0);
        Metrics::Disabled.emit(Probe(&emitted));
        assert_eq!(emitted.get(), 0);

        Metrics::Enabled.emit(Probe(&emitted));
        assert_eq!(emitted.get(), 1);
    }

    #[test]
    fn test_enabled_without_recorder_is_harmless() {
        Metrics::Enabled.emit(events::RecordsDelivered { count: 3 });
        Metrics::from_flag(false).emit(events::CheckpointAdvanced {
            pipeline: "p".into(),
        });
        assert!(Metrics::from_flag(true).is_enabled());
    }
}
