//! Wiring of store, builder, scheduler and restoration behind one handle

use crate::clock::{Clock, SystemClock};
use crate::collaborators::Collaborators;
use crate::config::AutosaveConfig;
use crate::error::{ConfigError, RestoreError, SaveError};
use crate::events::{EventBus, RestoreSource, SyncEvent};
use crate::restore::{RestorationEngine, RestoreReport};
use crate::scheduler::{AutosaveScheduler, SaveReport};
use crate::snapshot::SnapshotBuilder;
use crate::store::{KeyValueStore, SnapshotStore};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Project persistence engine
///
/// # Example
///
/// ```rust,ignore
/// use mmp_core::prelude::*;
///
/// # async fn example(collaborators: Collaborators) -> Result<(), Box<dyn std::error::Error>> {
/// let engine = PersistenceEngine::new(
///     AutosaveConfig::default(),
///     Arc::new(MemoryStore::new()),
///     collaborators,
/// )?;
/// engine.restore_on_startup().await.ok();
/// engine.scheduler().notify(ChangeKind::ShapeAdded);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PersistenceEngine {
    config: AutosaveConfig,
    events: EventBus,
    store: SnapshotStore,
    builder: SnapshotBuilder,
    scheduler: AutosaveScheduler,
    restoration: RestorationEngine,
}

impl PersistenceEngine {
    /// Engine on the system clock
    pub fn new(
        config: AutosaveConfig,
        backend: Arc<dyn KeyValueStore>,
        collaborators: Collaborators,
    ) -> Result<Self, ConfigError> {
        Self::with_clock(config, backend, collaborators, Arc::new(SystemClock))
    }

    /// Engine on an explicit clock
    pub fn with_clock(
        config: AutosaveConfig,
        backend: Arc<dyn KeyValueStore>,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let events = EventBus::new(config.event_capacity);
        let store = SnapshotStore::new(backend, Arc::clone(&clock), config.clone())
            .with_events(events.clone());
        let builder = SnapshotBuilder::new(
            collaborators.clone(),
            Arc::clone(&clock),
            config.schema_version.clone(),
        );
        let scheduler =
            AutosaveScheduler::new(builder.clone(), store.clone(), events.clone(), &config);
        let restoration = RestorationEngine::new(collaborators, clock, events.clone(), config.ttl)
            .with_scheduler(scheduler.clone());

        Ok(Self {
            config,
            events,
            store,
            builder,
            scheduler,
            restoration,
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    /// Storage adapter
    #[inline]
    #[must_use]
    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Snapshot builder
    #[inline]
    #[must_use]
    pub fn builder(&self) -> &SnapshotBuilder {
        &self.builder
    }

    /// Autosave scheduler
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &AutosaveScheduler {
        &self.scheduler
    }

    /// Restoration engine
    #[inline]
    #[must_use]
    pub fn restoration(&self) -> &RestorationEngine {
        &self.restoration
    }

    /// Subscribe to synchronization events
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Migrate any legacy draft, then restore the saved project
    pub async fn restore_on_startup(&self) -> Result<RestoreReport, RestoreError> {
        match self.store.migrate_legacy().await {
            Ok(outcome) if outcome.migrated() => info!("legacy draft migrated on startup"),
            Ok(_) => {}
            Err(err) => warn!(error = %err, "legacy migration failed, continuing"),
        }
        self.restoration
            .restore_latest(&self.store, RestoreSource::Autosave)
            .await
    }

    /// Force a save now
    pub async fn save_now(&self) -> Result<SaveReport, SaveError> {
        self.scheduler.flush_now().await
    }

    /// Remove the saved project
    pub async fn clear(&self) -> bool {
        self.store.clear().await
    }
}
