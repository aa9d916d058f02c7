//! Synchronization events
//!
//! Published on a broadcast bus; the event names are a stable contract for
//! UI consumers. Payload snapshots may be partial.

use crate::model::ProjectSnapshot;
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Where a restored snapshot came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreSource {
    /// Automatic restore of the autosaved project
    Autosave,
    /// Restore of an imported project file
    Import,
    /// Restore requested by the user
    Manual,
}

impl fmt::Display for RestoreSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Autosave => "autosave",
            Self::Import => "import",
            Self::Manual => "manual",
        })
    }
}

/// Event published after saves, restores and clears
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A snapshot was persisted
    SaveCompleted {
        /// Always true; kept for consumers that check it
        success: bool,
        /// When the save finished
        timestamp: DateTime<Utc>,
        /// What was written
        snapshot: Arc<ProjectSnapshot>,
    },
    /// A save attempt failed in the store
    SaveFailed {
        /// Failure message
        error: String,
        /// When the save failed
        timestamp: DateTime<Utc>,
    },
    /// A snapshot was replayed into the collaborators
    RestoreCompleted {
        /// What was restored
        snapshot: Arc<ProjectSnapshot>,
        /// Origin of the snapshot
        source: RestoreSource,
    },
    /// The persisted project was cleared
    ClearCompleted {
        /// When the clear happened
        timestamp: DateTime<Utc>,
    },
}

impl SyncEvent {
    /// Stable event name
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::SaveCompleted { .. } => "autosave.completed",
            Self::SaveFailed { .. } => "autosave.error",
            Self::RestoreCompleted { .. } => "project.restored",
            Self::ClearCompleted { .. } => "localStorage.clear.success",
        }
    }
}

/// Broadcast bus for [`SyncEvent`]s
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    /// Bus buffering up to `capacity` events per lagging subscriber
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to future events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    /// Publish to every current subscriber; no subscribers is not an error
    pub fn publish(&self, event: SyncEvent) {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event = name, receivers, "event published"),
            Err(_) => tracing::trace!(event = name, "event dropped, no subscribers"),
        }
    }

    /// Number of live subscribers
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_published_events() {
        let bus = EventBus::new(4);
        let mut rx = bus.subscribe();
        bus.publish(SyncEvent::ClearCompleted {
            timestamp: Utc::now(),
        });
        let event = rx.recv().await.unwrap();
        assert_eq!(event.name(), "localStorage.clear.success");
    }

    #[test]
    fn publishing_without_subscribers_is_silent() {
        let bus = EventBus::default();
        bus.publish(SyncEvent::SaveFailed {
            error: "quota".into(),
            timestamp: Utc::now(),
        });
        assert_eq!(bus.subscriber_count(), 0);
    }
}
