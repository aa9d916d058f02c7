//! Versioned snapshot storage
//!
//! [`SnapshotStore`] owns the on-disk contract:
//! - the current record under the versioned storage key
//! - a compatibility record carrying the legacy mirror
//! - expiry of stale records on read
//! - one-shot, idempotent migration of the legacy draft
//!
//! The byte-level backend is any [`KeyValueStore`].

mod file;
mod memory;
mod record;

pub use file::FileStore;
pub use memory::MemoryStore;
pub use record::PersistedRecord;

use crate::clock::Clock;
use crate::config::AutosaveConfig;
use crate::error::{ReadError, StoreError};
use crate::events::{EventBus, SyncEvent};
use crate::model::ProjectSnapshot;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use record::LegacyDraft;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Byte-level persistent key/value backend
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: String) -> Result<(), StoreError>;

    /// Delete a value; deleting a missing key succeeds
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Outcome of a successful write
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteReceipt {
    /// Key the current record was written under
    pub key: String,
    /// Size of the current record
    pub bytes: usize,
    /// Write time, epoch milliseconds
    pub saved_at: i64,
    /// Whether the compatibility mirror was also written
    pub mirrored: bool,
}

/// Outcome of a successful migration call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Current data already exists; nothing done
    AlreadyCurrent,
    /// No usable legacy draft; nothing done
    NothingToMigrate,
    /// Legacy draft was reshaped and written under the current key
    Migrated,
}

impl MigrationOutcome {
    /// Whether a write happened
    #[inline]
    #[must_use]
    pub fn migrated(self) -> bool {
        matches!(self, Self::Migrated)
    }
}

/// Inspection of what is stored, for diagnostics
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StorageInfo {
    /// A record is present
    pub has_data: bool,
    /// Record schema version
    pub version: Option<String>,
    /// Snapshot capture time
    pub timestamp: Option<DateTime<Utc>>,
    /// Write time, epoch milliseconds
    pub saved_at: Option<i64>,
    /// Serialized size
    pub size_bytes: usize,
    /// Age of the snapshot
    pub age: Option<Duration>,
    /// Why the record could not be inspected
    pub error: Option<String>,
}

/// Store adapter for project snapshots
#[derive(Clone)]
pub struct SnapshotStore {
    backend: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: AutosaveConfig,
    events: Option<EventBus>,
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("storage_key", &self.config.storage_key)
            .field("compat_key", &self.config.compat_key)
            .field("ttl", &self.config.ttl)
            .finish_non_exhaustive()
    }
}

impl SnapshotStore {
    /// Adapter over `backend`
    #[must_use]
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: AutosaveConfig,
    ) -> Self {
        Self {
            backend,
            clock,
            config,
            events: None,
        }
    }

    /// Publish clear notifications on `events`
    #[must_use]
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &AutosaveConfig {
        &self.config
    }

    /// Clock used for stamps and expiry
    #[inline]
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Persist `snapshot` as a full replacement
    ///
    /// A failed current-record write is returned as an error. A failed
    /// mirror write is logged and reported through [`WriteReceipt::mirrored`].
    pub async fn write(&self, snapshot: &ProjectSnapshot) -> Result<WriteReceipt, StoreError> {
        let saved_at = self.clock.now().timestamp_millis();
        let mut record = PersistedRecord {
            version: self.config.schema_version.clone(),
            timestamp: snapshot.timestamp,
            saved_at,
            autosaved: true,
            value: None,
            data: snapshot.clone(),
        };

        let current = serde_json::to_string(&record)?;
        record.value = Some(snapshot.legacy_view());
        let compat = serde_json::to_string(&record)?;

        let bytes = current.len();
        self.backend.set(&self.config.storage_key, current).await?;

        let mirrored = match self.backend.set(&self.config.compat_key, compat).await {
            Ok(()) => true,
            Err(err) => {
                warn!(key = %self.config.compat_key, error = %err, "compatibility mirror not written");
                false
            }
        };

        debug!(key = %self.config.storage_key, bytes, mirrored, "snapshot written");
        Ok(WriteReceipt {
            key: self.config.storage_key.clone(),
            bytes,
            saved_at,
            mirrored,
        })
    }

    /// Load the most recent snapshot
    ///
    /// Falls back to the compatibility key when the versioned key is
    /// empty. Expired records are evicted before reporting them.
    pub async fn read(&self) -> Result<ProjectSnapshot, ReadError> {
        let (key, raw) = self.load_raw().await?.ok_or(ReadError::Absent)?;

        let record: PersistedRecord =
            serde_json::from_str(&raw).map_err(|err| ReadError::Corrupt {
                key: key.clone(),
                reason: err.to_string(),
            })?;

        let now = self.clock.now();
        if record.data.is_expired_at(now, self.config.ttl) {
            let age = record.data.age_at(now);
            info!(key = %key, age_secs = age.as_secs(), "saved project expired, evicting");
            self.evict().await;
            return Err(ReadError::Expired { age });
        }

        Ok(record.data)
    }

    /// Whether any record is stored; backend failures count as absent
    pub async fn exists(&self) -> bool {
        match self.load_raw().await {
            Ok(found) => found.is_some(),
            Err(err) => {
                warn!(error = %err, "storage check failed");
                false
            }
        }
    }

    /// Remove every record this adapter writes
    pub async fn clear(&self) -> bool {
        let mut ok = true;
        for key in self.owned_keys() {
            if let Err(err) = self.backend.remove(key).await {
                warn!(key = %key, error = %err, "failed to clear saved project");
                ok = false;
            }
        }
        if ok {
            info!("saved project cleared");
            if let Some(events) = &self.events {
                events.publish(SyncEvent::ClearCompleted {
                    timestamp: self.clock.now(),
                });
            }
        }
        ok
    }

    /// Reshape the legacy draft into the current record, once
    ///
    /// Calling this with no legacy draft, an unparsable one, or with
    /// current data already present is a successful no-op.
    pub async fn migrate_legacy(&self) -> Result<MigrationOutcome, StoreError> {
        if self.backend.get(&self.config.storage_key).await?.is_some() {
            debug!("current record present, migration skipped");
            return Ok(MigrationOutcome::AlreadyCurrent);
        }

        let Some(raw) = self.backend.get(&self.config.legacy_key).await? else {
            return Ok(MigrationOutcome::NothingToMigrate);
        };

        let draft: LegacyDraft = match serde_json::from_str(&raw) {
            Ok(draft) => draft,
            Err(err) => {
                warn!(key = %self.config.legacy_key, error = %err, "legacy draft unreadable, not migrated");
                return Ok(MigrationOutcome::NothingToMigrate);
            }
        };

        let Some(snapshot) = draft.into_snapshot(self.clock.now()) else {
            return Ok(MigrationOutcome::NothingToMigrate);
        };

        let record = PersistedRecord {
            version: self.config.schema_version.clone(),
            timestamp: snapshot.timestamp,
            saved_at: self.clock.now().timestamp_millis(),
            autosaved: false,
            value: None,
            data: snapshot,
        };
        let text = serde_json::to_string(&record)?;
        self.backend.set(&self.config.storage_key, text).await?;

        info!(
            from = %self.config.legacy_key,
            to = %self.config.storage_key,
            schema = %record.data.version,
            "legacy draft migrated"
        );
        Ok(MigrationOutcome::Migrated)
    }

    /// Describe the stored record without restoring it
    pub async fn info(&self) -> StorageInfo {
        let (key, raw) = match self.load_raw().await {
            Ok(Some(found)) => found,
            Ok(None) => return StorageInfo::default(),
            Err(err) => {
                return StorageInfo {
                    error: Some(err.to_string()),
                    ..StorageInfo::default()
                }
            }
        };

        match serde_json::from_str::<PersistedRecord>(&raw) {
            Ok(record) => StorageInfo {
                has_data: true,
                version: Some(record.version),
                timestamp: Some(record.timestamp),
                saved_at: Some(record.saved_at),
                size_bytes: raw.len(),
                age: Some(record.data.age_at(self.clock.now())),
                error: None,
            },
            Err(err) => StorageInfo {
                has_data: true,
                size_bytes: raw.len(),
                error: Some(format!("{key}: {err}")),
                ..StorageInfo::default()
            },
        }
    }

    async fn load_raw(&self) -> Result<Option<(String, String)>, StoreError> {
        for key in self.owned_keys() {
            if let Some(raw) = self.backend.get(key).await? {
                return Ok(Some((key.to_owned(), raw)));
            }
        }
        Ok(None)
    }

    async fn evict(&self) {
        for key in self.owned_keys() {
            if let Err(err) = self.backend.remove(key).await {
                warn!(key = %key, error = %err, "failed to evict expired record");
            }
        }
    }

    fn owned_keys(&self) -> [&str; 2] {
        [&self.config.storage_key, &self.config.compat_key]
    }
}
