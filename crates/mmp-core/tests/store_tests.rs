//! Functional tests for the snapshot store adapter.
//!
//! Covers the on-disk contract:
//! - Expiry at the lifetime boundary, with eviction of stale records.
//! - Corrupt and oversized records reported as values, never panics.
//! - Legacy migration that runs at most once and is a no-op without data.

use chrono::Duration as ChronoDuration;
use mmp_core::{
    Assignment, AutosaveConfig, Bounds, Clock, FileStore, IndicatorElement, KeyValueStore,
    ManualClock, MemoryStore, MigrationOutcome, ProjectSnapshot, ReadError, Responsibility,
    SchemaVersion, SnapshotStore, StoreError,
};
use mmp_test_utils::fixed_time;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;

const CURRENT_KEY: &str = "multinotation_project_data";
const LEGACY_KEY: &str = "draft:multinotation";

fn store_with(backend: Arc<MemoryStore>) -> (Arc<ManualClock>, SnapshotStore) {
    let clock = Arc::new(ManualClock::new(fixed_time()));
    let store = SnapshotStore::new(backend, clock.clone(), AutosaveConfig::default());
    (clock, store)
}

/// Tenet: a record exactly at the lifetime is still returned.
///
/// Expiry is strictly "older than three hours". A record read at exactly
/// three hours must come back; one millisecond later it must not.
#[tokio::test]
async fn record_at_ttl_is_returned() {
    let backend = Arc::new(MemoryStore::new());
    let (clock, store) = store_with(backend);
    let snap = ProjectSnapshot::empty(clock.now());
    store.write(&snap).await.unwrap();

    clock.advance(Duration::from_secs(3 * 3600));
    assert_eq!(store.read().await.unwrap(), snap);
}

/// Tenet: a record past the lifetime reads as expired and is evicted.
#[tokio::test]
async fn record_past_ttl_is_expired_and_evicted() {
    let backend = Arc::new(MemoryStore::new());
    let (clock, store) = store_with(backend.clone());
    store.write(&ProjectSnapshot::empty(clock.now())).await.unwrap();

    clock.set(fixed_time() + ChronoDuration::hours(3) + ChronoDuration::milliseconds(1));
    let err = store.read().await.unwrap_err();
    assert!(matches!(err, ReadError::Expired { .. }));

    assert!(backend.raw(CURRENT_KEY).is_none());
    assert!(backend.raw(LEGACY_KEY).is_none());
    assert!(matches!(store.read().await, Err(ReadError::Absent)));
}

/// Tenet: a corrupt record never crashes the reader.
#[tokio::test]
async fn corrupt_record_is_reported() {
    let backend = Arc::new(MemoryStore::new());
    backend.seed(CURRENT_KEY, r#"{"version":"2.0.0","data":"#);
    let (_, store) = store_with(backend);

    match store.read().await {
        Err(ReadError::Corrupt { key, .. }) => assert_eq!(key, CURRENT_KEY),
        other => panic!("expected corrupt, got {other:?}"),
    }
    assert!(store.exists().await);
}

/// Tenet: a full store turns into an error value.
#[tokio::test]
async fn quota_exceeded_is_returned_not_thrown() {
    let backend = Arc::new(MemoryStore::with_quota(64));
    let (clock, store) = store_with(backend.clone());
    let err = store
        .write(&ProjectSnapshot::empty(clock.now()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::QuotaExceeded { .. }));
    assert!(!store.exists().await);
}

/// Tenet: migration without any legacy draft succeeds and writes nothing.
#[tokio::test]
async fn migration_without_legacy_is_noop() {
    let backend = Arc::new(MemoryStore::new());
    let (_, store) = store_with(backend.clone());

    assert_eq!(
        store.migrate_legacy().await.unwrap(),
        MigrationOutcome::NothingToMigrate
    );
    assert_eq!(
        store.migrate_legacy().await.unwrap(),
        MigrationOutcome::NothingToMigrate
    );
    assert_eq!(backend.write_count(CURRENT_KEY), 0);
    assert_eq!(backend.used_bytes(), 0);
}

/// Tenet: a legacy draft is reshaped once; the second call is a no-op.
#[tokio::test]
async fn legacy_draft_migrates_exactly_once() {
    let backend = Arc::new(MemoryStore::new());
    let draft = serde_json::json!({
        "savedAt": fixed_time().timestamp_millis(),
        "value": {
            "bpmn": { "xml": "<bpmn:definitions/>" },
            "ppi": { "indicators": [
                { "id": "PPI_1", "type": "PPINOT:Ppi", "name": "Lead time" },
                { "id": "Target_1", "type": "PPINOT:Target", "parent_id": "PPI_1" },
                { "id": "Weird_1", "type": "PPINOT:Unknown" }
            ] },
            "rasci": {
                "roles": ["Analyst", "Manager"],
                "matrixData": { "Task_1": { "Analyst": "R", "Manager": "A" } }
            }
        }
    });
    backend.seed(LEGACY_KEY, draft.to_string());
    let (_, store) = store_with(backend.clone());

    assert_eq!(store.migrate_legacy().await.unwrap(), MigrationOutcome::Migrated);
    assert_eq!(
        store.migrate_legacy().await.unwrap(),
        MigrationOutcome::AlreadyCurrent
    );
    assert_eq!(backend.write_count(CURRENT_KEY), 1);

    let snap = store.read().await.unwrap();
    assert_eq!(snap.schema(), Some(SchemaVersion::Legacy));
    assert_eq!(snap.timestamp, fixed_time());
    assert_eq!(snap.graph_document.as_deref(), Some("<bpmn:definitions/>"));
    assert_eq!(snap.indicator_elements.len(), 2);
    assert_eq!(
        snap.matrix.get("Task_1", "Manager"),
        Some(Assignment::from(Responsibility::Accountable))
    );
}

/// Tenet: the draft envelope written by the previous autosave migrates.
///
/// That writer nests a project without a timestamp under `data` and a
/// welcome-screen layout under `value`. The envelope time stands in for the
/// missing capture time.
#[tokio::test]
async fn previous_autosave_envelope_migrates() {
    let backend = Arc::new(MemoryStore::new());
    let draft = serde_json::json!({
        "version": "1.0.0",
        "timestamp": fixed_time().to_rfc3339(),
        "savedAt": fixed_time().timestamp_millis(),
        "autosaved": true,
        "value": {
            "bpmn": { "xml": "<bpmn:definitions/>" },
            "ppi": { "indicators": [] },
            "rasci": { "roles": [], "tasks": [], "matrix": {} }
        },
        "data": {
            "version": "1.0.0",
            "bpmn": "<bpmn:definitions/>",
            "ppinot": { "ppis": [
                { "id": "PPI_1", "type": "PPINOT:Ppi", "name": "Lead time" },
                { "id": "Label_1", "type": "label" }
            ] },
            "ralph": { "roles": [] },
            "rasci": {
                "roles": ["Analyst", "Manager"],
                "tasks": ["Task_1", "Task_2"],
                "matrix": {
                    "Task_1": { "Analyst": "R", "Manager": "A" },
                    "Task_2": { "Analyst": "RA", "Manager": "" }
                }
            },
            "metadata": { "createdAt": fixed_time().to_rfc3339(), "lastModified": null }
        }
    });
    backend.seed(LEGACY_KEY, draft.to_string());
    let (_, store) = store_with(backend.clone());

    assert_eq!(store.migrate_legacy().await.unwrap(), MigrationOutcome::Migrated);

    let snap = store.read().await.unwrap();
    assert_eq!(snap.timestamp, fixed_time());
    assert_eq!(snap.graph_document.as_deref(), Some("<bpmn:definitions/>"));
    assert_eq!(snap.roles, vec!["Analyst".to_string(), "Manager".to_string()]);
    assert_eq!(
        snap.indicator_elements.iter().map(|el| el.id.as_str()).collect::<Vec<_>>(),
        vec!["PPI_1"]
    );
    let combined = snap.matrix.get("Task_2", "Analyst").unwrap();
    assert!(combined.binds_duties());
    assert_eq!(snap.matrix.get("Task_2", "Manager"), None);
}

/// Tenet: combination and blank cells never block a migration.
#[tokio::test]
async fn combination_cells_do_not_block_migration() {
    let backend = Arc::new(MemoryStore::new());
    let draft = serde_json::json!({
        "savedAt": fixed_time().timestamp_millis(),
        "value": {
            "rasci": {
                "roles": ["Dev", "Lead"],
                "matrixData": { "T": { "Dev": "RA", "Lead": "", "Ops": null } }
            }
        }
    });
    backend.seed(LEGACY_KEY, draft.to_string());
    let (_, store) = store_with(backend);

    assert_eq!(store.migrate_legacy().await.unwrap(), MigrationOutcome::Migrated);
    let snap = store.read().await.unwrap();
    assert_eq!(snap.matrix.get("T", "Dev").map(|cell| cell.to_string()).as_deref(), Some("RA"));
    assert_eq!(snap.matrix.row("T").map(|row| row.len()), Some(1));
}

/// Tenet: one indicator of an unknown type does not make a record corrupt.
#[tokio::test]
async fn unknown_indicator_type_is_skipped_on_read() {
    let backend = Arc::new(MemoryStore::new());
    let (clock, store) = store_with(backend.clone());
    let mut snap = ProjectSnapshot::empty(clock.now());
    snap.indicator_elements = vec![IndicatorElement::principal("PPI_1", "Lead time", Bounds::default())];
    store.write(&snap).await.unwrap();

    let mut record: serde_json::Value =
        serde_json::from_str(&backend.raw(CURRENT_KEY).unwrap()).unwrap();
    record["data"]["ppinot"]["ppis"]
        .as_array_mut()
        .unwrap()
        .push(serde_json::json!({ "id": "Future_1", "type": "PPINOT:NotYetKnown" }));
    backend.seed(CURRENT_KEY, record.to_string());

    let back = store.read().await.unwrap();
    assert_eq!(back.indicator_elements, snap.indicator_elements);
}

/// Tenet: an unreadable legacy draft is left alone and reported as nothing to do.
#[tokio::test]
async fn corrupt_legacy_draft_is_skipped() {
    let backend = Arc::new(MemoryStore::new());
    backend.seed(LEGACY_KEY, "<<<not json>>>");
    let (_, store) = store_with(backend.clone());

    assert_eq!(
        store.migrate_legacy().await.unwrap(),
        MigrationOutcome::NothingToMigrate
    );
    assert_eq!(backend.raw(LEGACY_KEY).as_deref(), Some("<<<not json>>>"));
    assert!(backend.raw(CURRENT_KEY).is_none());
}

/// Tenet: inspection reports size, version and age without restoring.
#[tokio::test]
async fn info_describes_stored_record() {
    let backend = Arc::new(MemoryStore::new());
    let (clock, store) = store_with(backend.clone());
    store.write(&ProjectSnapshot::empty(clock.now())).await.unwrap();
    clock.advance(Duration::from_secs(600));

    let info = store.info().await;
    assert!(info.has_data);
    assert_eq!(info.version.as_deref(), Some("2.0.0"));
    assert_eq!(info.age, Some(Duration::from_secs(600)));
    assert_eq!(info.size_bytes, backend.raw(CURRENT_KEY).unwrap().len());
    assert_eq!(info.saved_at, Some(fixed_time().timestamp_millis()));
}

/// Tenet: the directory backend honours the same contract as memory.
#[tokio::test]
async fn file_backend_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let backend: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(dir.path()));
    let clock = Arc::new(ManualClock::new(fixed_time()));
    let store = SnapshotStore::new(backend, clock.clone(), AutosaveConfig::default());

    let mut snap = ProjectSnapshot::empty(clock.now());
    snap.roles = vec!["Analyst".into()];
    store.write(&snap).await.unwrap();
    assert_eq!(store.read().await.unwrap(), snap);

    assert!(store.clear().await);
    assert!(!store.exists().await);
}
