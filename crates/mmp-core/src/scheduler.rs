//! Debounced, single-flight autosave
//!
//! State machine: `Idle → Dirty → Saving → Idle`, plus an orthogonal
//! suspension count that blocks `Dirty → Saving` while above zero.
//!
//! - [`AutosaveScheduler::mark_dirty`] arms one debounce timer; further
//!   changes while it is armed are coalesced.
//! - The timer and [`AutosaveScheduler::flush_now`] share one save path
//!   that refuses, rather than queues, a second concurrent save.
//! - A failed save keeps the dirty flag so the next change retries.
//!
//! Timers are cancelled by generation: each arm bumps a counter and a
//! timer that wakes with a stale generation does nothing.

use crate::config::AutosaveConfig;
use crate::error::SaveError;
use crate::events::{EventBus, SyncEvent};
use crate::model::ProjectSnapshot;
use crate::snapshot::SnapshotBuilder;
use crate::store::{SnapshotStore, WriteReceipt};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Change notification that marks the project dirty
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// A graph element's properties changed
    ElementChanged,
    /// A graph element was added
    ElementAdded,
    /// A graph element was removed
    ElementRemoved,
    /// A shape was added
    ShapeAdded,
    /// A shape was removed
    ShapeRemoved,
    /// A connection was added
    ConnectionAdded,
    /// A connection was removed
    ConnectionRemoved,
    /// The model changed as a whole (undo, import)
    ModelChanged,
    /// The indicator panel changed
    IndicatorsChanged,
    /// Roles or the matrix changed
    MatrixChanged,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ElementChanged => "element.changed",
            Self::ElementAdded => "element.added",
            Self::ElementRemoved => "element.removed",
            Self::ShapeAdded => "shape.added",
            Self::ShapeRemoved => "shape.removed",
            Self::ConnectionAdded => "connection.added",
            Self::ConnectionRemoved => "connection.removed",
            Self::ModelChanged => "model.changed",
            Self::IndicatorsChanged => "ppinot.changed",
            Self::MatrixChanged => "rasci.changed",
        })
    }
}

/// Observable scheduler phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// Nothing to save
    Idle,
    /// Unsaved changes
    Dirty,
    /// A save is in flight
    Saving,
}

/// Result of a successful save
#[derive(Debug, Clone)]
pub struct SaveReport {
    /// Snapshot that was written
    pub snapshot: Arc<ProjectSnapshot>,
    /// Storage receipt
    pub receipt: WriteReceipt,
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Saves written
    pub saves_completed: u64,
    /// Saves that reached the store and failed
    pub saves_failed: u64,
    /// Last successful save
    pub last_saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct SchedulerState {
    dirty: bool,
    saving: bool,
    suspend_depth: u32,
    enabled: bool,
    dirty_during_save: bool,
    generation: u64,
    armed: Option<u64>,
    stats: SchedulerStats,
}

impl SchedulerState {
    fn suspended(&self) -> bool {
        self.suspend_depth > 0
    }
}

struct Inner {
    builder: SnapshotBuilder,
    store: SnapshotStore,
    events: EventBus,
    debounce: Duration,
    state: Mutex<SchedulerState>,
}

/// Keeps autosave suspended while alive
#[derive(Debug)]
#[must_use = "autosave resumes as soon as the guard is dropped"]
pub struct SuspendGuard {
    scheduler: AutosaveScheduler,
}

impl Drop for SuspendGuard {
    fn drop(&mut self) {
        self.scheduler.resume();
    }
}

/// Debounced single-flight autosave driver
///
/// Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct AutosaveScheduler {
    inner: Arc<Inner>,
}

impl fmt::Debug for AutosaveScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutosaveScheduler")
            .field("debounce", &self.inner.debounce)
            .field("state", &*self.inner.state.lock())
            .finish_non_exhaustive()
    }
}

impl AutosaveScheduler {
    /// Scheduler capturing with `builder` and writing to `store`
    #[must_use]
    pub fn new(
        builder: SnapshotBuilder,
        store: SnapshotStore,
        events: EventBus,
        config: &AutosaveConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                builder,
                store,
                events,
                debounce: config.debounce,
                state: Mutex::new(SchedulerState {
                    dirty: false,
                    saving: false,
                    suspend_depth: 0,
                    enabled: config.enabled,
                    dirty_during_save: false,
                    generation: 0,
                    armed: None,
                    stats: SchedulerStats::default(),
                }),
            }),
        }
    }

    /// Record an unsaved change and arm the debounce timer if needed
    pub fn mark_dirty(&self) {
        let mut state = self.inner.state.lock();
        state.dirty = true;
        if state.saving {
            state.dirty_during_save = true;
            return;
        }
        if state.armed.is_none() && !state.suspended() && state.enabled {
            self.inner.arm(&mut state);
        }
    }

    /// Record a typed change notification
    pub fn notify(&self, change: ChangeKind) {
        debug!(%change, "change observed");
        self.mark_dirty();
    }

    /// Save immediately, bypassing the debounce window
    pub async fn flush_now(&self) -> Result<SaveReport, SaveError> {
        self.inner.try_save().await
    }

    /// Block saves and cancel any armed timer
    ///
    /// Suspensions nest: saves stay blocked until every `suspend` has been
    /// matched by a [`resume`](Self::resume).
    pub fn suspend(&self) {
        let mut state = self.inner.state.lock();
        state.suspend_depth += 1;
        state.armed = None;
        debug!(depth = state.suspend_depth, "autosave suspended");
    }

    /// Undo one [`suspend`](Self::suspend), re-arming once none remain
    pub fn resume(&self) {
        let mut state = self.inner.state.lock();
        state.suspend_depth = state.suspend_depth.saturating_sub(1);
        if state.suspended() {
            debug!(depth = state.suspend_depth, "autosave still suspended");
            return;
        }
        if state.dirty && !state.saving && state.armed.is_none() && state.enabled {
            self.inner.arm(&mut state);
        }
        debug!(dirty = state.dirty, "autosave resumed");
    }

    /// Suspend until the returned guard is dropped
    pub fn suspend_guard(&self) -> SuspendGuard {
        self.suspend();
        SuspendGuard {
            scheduler: self.clone(),
        }
    }

    /// Re-enable the debounce timer
    pub fn enable(&self) {
        let mut state = self.inner.state.lock();
        state.enabled = true;
        if state.dirty && !state.saving && !state.suspended() && state.armed.is_none() {
            self.inner.arm(&mut state);
        }
        info!("autosave enabled");
    }

    /// Stop arming the debounce timer; changes are still recorded
    pub fn disable(&self) {
        let mut state = self.inner.state.lock();
        state.enabled = false;
        state.armed = None;
        info!("autosave disabled");
    }

    /// Current phase
    #[must_use]
    pub fn phase(&self) -> SchedulerPhase {
        let state = self.inner.state.lock();
        if state.saving {
            SchedulerPhase::Saving
        } else if state.dirty {
            SchedulerPhase::Dirty
        } else {
            SchedulerPhase::Idle
        }
    }

    /// Whether saves are suspended
    #[must_use]
    pub fn is_suspended(&self) -> bool {
        self.inner.state.lock().suspended()
    }

    /// Whether the debounce timer is enabled
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.state.lock().enabled
    }

    /// Whether a debounce timer is pending
    #[must_use]
    pub fn is_timer_armed(&self) -> bool {
        self.inner.state.lock().armed.is_some()
    }

    /// Counters
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.state.lock().stats
    }

    /// Forward every change received on `changes` until the sender closes
    pub fn watch(&self, mut changes: mpsc::Receiver<ChangeKind>) -> JoinHandle<()> {
        let scheduler = self.clone();
        tokio::spawn(async move {
            while let Some(change) = changes.recv().await {
                scheduler.notify(change);
            }
            debug!("change channel closed");
        })
    }
}

impl Inner {
    fn arm(self: &Arc<Self>, state: &mut SchedulerState) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, debounce timer not armed");
            return;
        };
        state.generation += 1;
        let generation = state.generation;
        state.armed = Some(generation);

        let inner = Arc::clone(self);
        runtime.spawn(async move {
            tokio::time::sleep(inner.debounce).await;
            inner.fire(generation).await;
        });
        debug!(generation, debounce_ms = self.debounce.as_millis(), "debounce timer armed");
    }

    async fn fire(self: Arc<Self>, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.armed != Some(generation) {
                return;
            }
            state.armed = None;
        }
        match self.try_save().await {
            Ok(report) => debug!(bytes = report.receipt.bytes, "autosave completed"),
            Err(err) if err.is_refusal() => debug!(reason = %err, "autosave skipped"),
            Err(err) => warn!(error = %err, "autosave failed"),
        }
    }

    async fn try_save(self: &Arc<Self>) -> Result<SaveReport, SaveError> {
        {
            let mut state = self.state.lock();
            if state.saving {
                return Err(SaveError::AlreadySaving);
            }
            if state.suspended() {
                return Err(SaveError::Suspended);
            }
            if !state.dirty {
                return Err(SaveError::NoChanges);
            }
            state.saving = true;
            state.dirty_during_save = false;
            state.armed = None;
        }

        let snapshot = self.builder.capture().await;
        let written = self.store.write(&snapshot).await;
        let now = self.store.clock().now();

        let mut state = self.state.lock();
        state.saving = false;
        match written {
            Ok(receipt) => {
                state.dirty = state.dirty_during_save;
                state.stats.saves_completed += 1;
                state.stats.last_saved_at = Some(now);
                if state.dirty && !state.suspended() && state.enabled {
                    self.arm(&mut state);
                }
                drop(state);

                let snapshot = Arc::new(snapshot);
                self.events.publish(SyncEvent::SaveCompleted {
                    success: true,
                    timestamp: now,
                    snapshot: Arc::clone(&snapshot),
                });
                info!(bytes = receipt.bytes, mirrored = receipt.mirrored, "project saved");
                Ok(SaveReport { snapshot, receipt })
            }
            Err(err) => {
                state.stats.saves_failed += 1;
                if state.dirty_during_save && !state.suspended() && state.enabled {
                    self.arm(&mut state);
                }
                drop(state);

                warn!(error = %err, "project save failed");
                self.events.publish(SyncEvent::SaveFailed {
                    error: err.to_string(),
                    timestamp: now,
                });
                Err(SaveError::Store(err))
            }
        }
    }
}
