//! Lifecycle notifications
//!
//! The connection manager, migrator and models report what they did through an
//! [`EventSink`]. Notifications are one-way: a sink observes, it cannot veto.

use std::sync::{Arc, Mutex};
use tracing::debug;

/// A lifecycle notification
#[derive(Debug, Clone, PartialEq)]
pub enum LifecycleEvent {
    ConnectionEstablished { connection: String },
    Saving { table: String },
    Saved { table: String },
    Creating { table: String },
    Created { table: String, id: i64 },
    Updating { table: String, id: i64 },
    Updated { table: String, id: i64 },
    Deleted { table: String, id: i64 },
    MigrationApplied { name: String, batch: i64 },
    MigrationRolledBack { name: String },
}

/// Receiver of lifecycle notifications
pub trait EventSink: Send + Sync {
    fn notify(&self, event: &LifecycleEvent);
}

/// Shared handle to a sink
pub type SharedEventSink = Arc<dyn EventSink>;

/// Forwards every notification to `tracing` at debug level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn notify(&self, event: &LifecycleEvent) {
        debug!(?event, "lifecycle event");
    }
}

/// Keeps every notification in memory, in order
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the notifications received so far
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl EventSink for RecordingEventSink {
    fn notify(&self, event: &LifecycleEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sink_keeps_order() {
        let sink = RecordingEventSink::new();
        sink.notify(&LifecycleEvent::Saving {
            table: "users".into(),
        });
        sink.notify(&LifecycleEvent::Saved {
            table: "users".into(),
        });

        let events = sink.events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], LifecycleEvent::Saving { .. }));
        assert!(matches!(events[1], LifecycleEvent::Saved { .. }));
    }
}
