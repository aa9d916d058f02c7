//! MMP Core - multi-notation project persistence
//!
//! Keeps a composite project (process graph, performance indicators,
//! responsibility matrix, organizational roles) durable across reloads:
//! - Captures a consistent snapshot from the live editors
//! - Persists it through a versioned key/value store with expiry
//! - Migrates the legacy draft format once
//! - Replays a snapshot back into the editors in dependency order
//! - Debounces change bursts into single-flight autosaves
//!
//! # Example
//!
//! ```rust,ignore
//! use mmp_core::prelude::*;
//!
//! # async fn example(collaborators: Collaborators) -> Result<(), Box<dyn std::error::Error>> {
//! let engine = PersistenceEngine::new(
//!     AutosaveConfig::default(),
//!     Arc::new(FileStore::new("./.mmp")),
//!     collaborators,
//! )?;
//!
//! let mut events = engine.subscribe();
//! engine.scheduler().notify(ChangeKind::ElementChanged);
//! let event = events.recv().await?;
//! println!("{}", event.name());
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod clock;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod model;
pub mod restore;
pub mod scheduler;
pub mod snapshot;
pub mod store;
pub mod telemetry;

// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use collaborators::{
    Collaborators, GraphEngine, IndicatorRestorer, IndicatorStore, MatrixStore, RoleSymbolStore,
};
pub use config::AutosaveConfig;
pub use engine::PersistenceEngine;
pub use error::{
    CollaboratorError, ConfigError, ReadError, RestoreError, SaveError, StoreError,
};
pub use events::{EventBus, RestoreSource, SyncEvent};
pub use model::{
    Assignment, Bounds, ElementKind, GraphNode, Indicator, IndicatorElement, IndicatorKind,
    MeasureKind, ProjectSnapshot, Responsibility, ResponsibilityMatrix, RoleSymbol, SchemaVersion,
};
pub use restore::{RestorationEngine, RestoreReport, RestoreStep};
pub use scheduler::{
    AutosaveScheduler, ChangeKind, SaveReport, SchedulerPhase, SchedulerStats, SuspendGuard,
};
pub use snapshot::{collect_indicator_elements, SnapshotBuilder};
pub use store::{
    FileStore, KeyValueStore, MemoryStore, MigrationOutcome, PersistedRecord, SnapshotStore,
    StorageInfo, WriteReceipt,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for embedding the persistence engine
    pub use crate::{
        AutosaveConfig, AutosaveScheduler, ChangeKind, Collaborators, FileStore, MemoryStore,
        PersistenceEngine, ProjectSnapshot, RestoreSource, SnapshotStore, SyncEvent,
    };
    pub use std::sync::Arc;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
