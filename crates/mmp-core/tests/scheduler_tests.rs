//! Functional tests for debounced, single-flight autosave.
//!
//! Time is paused where debounce windows matter so that timer behaviour is
//! deterministic.

use futures::future::join_all;
use mmp_core::{
    AutosaveConfig, ChangeKind, ManualClock, MemoryStore, PersistenceEngine, SaveError,
    SchedulerPhase, SyncEvent,
};
use mmp_test_utils::{fixed_time, FakeWorkspace};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::TryRecvError;

const CURRENT_KEY: &str = "multinotation_project_data";

fn engine(workspace: &FakeWorkspace, backend: Arc<MemoryStore>) -> PersistenceEngine {
    PersistenceEngine::with_clock(
        AutosaveConfig::default(),
        backend,
        workspace.collaborators(),
        Arc::new(ManualClock::new(fixed_time())),
    )
    .unwrap()
}

fn drain_saves(rx: &mut tokio::sync::broadcast::Receiver<SyncEvent>) -> usize {
    let mut saves = 0;
    loop {
        match rx.try_recv() {
            Ok(SyncEvent::SaveCompleted { .. }) => saves += 1,
            Ok(_) => {}
            Err(TryRecvError::Empty | TryRecvError::Closed) => return saves,
            Err(TryRecvError::Lagged(_)) => {}
        }
    }
}

/// Tenet: at most one save is in flight.
///
/// N forced saves issued together while the first is suspended in the graph
/// export must yield exactly one success; every other caller is refused
/// immediately with "already saving" instead of being queued.
#[tokio::test]
async fn concurrent_saves_are_single_flight() {
    let workspace = FakeWorkspace::sample();
    let backend = Arc::new(MemoryStore::new());
    let engine = engine(&workspace, backend.clone());
    engine.scheduler().mark_dirty();

    let results = join_all((0..8).map(|_| engine.save_now())).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(SaveError::AlreadySaving)))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(refused, 7);
    assert_eq!(workspace.graph.export_count(), 1);
    assert_eq!(backend.write_count(CURRENT_KEY), 1);
    assert_eq!(engine.scheduler().phase(), SchedulerPhase::Idle);
}

/// Tenet: a burst of changes inside the debounce window produces one save.
#[tokio::test(start_paused = true)]
async fn change_burst_is_coalesced_into_one_save() {
    let workspace = FakeWorkspace::sample();
    let backend = Arc::new(MemoryStore::new());
    let engine = engine(&workspace, backend.clone());
    let mut rx = engine.subscribe();

    for _ in 0..10 {
        engine.scheduler().notify(ChangeKind::MatrixChanged);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(backend.write_count(CURRENT_KEY), 0);

    tokio::time::sleep(Duration::from_secs(6)).await;
    assert_eq!(backend.write_count(CURRENT_KEY), 1);
    assert_eq!(drain_saves(&mut rx), 1);
    assert_eq!(engine.scheduler().phase(), SchedulerPhase::Idle);
    assert!(!engine.scheduler().is_timer_armed());
}

/// Tenet: a change observed mid-save is not lost.
///
/// The save that was already running completes, the scheduler stays dirty
/// and re-arms so the later change is persisted by the next window.
#[tokio::test(start_paused = true)]
async fn change_during_save_rearms() {
    let workspace = FakeWorkspace::sample();
    let backend = Arc::new(MemoryStore::new());
    let engine = engine(&workspace, backend.clone());
    let scheduler = engine.scheduler().clone();
    scheduler.mark_dirty();

    let (saved, ()) = tokio::join!(engine.save_now(), async {
        assert_eq!(scheduler.phase(), SchedulerPhase::Saving);
        scheduler.notify(ChangeKind::MatrixChanged);
    });
    assert!(saved.is_ok());
    assert_eq!(scheduler.phase(), SchedulerPhase::Dirty);
    assert!(scheduler.is_timer_armed());

    tokio::time::sleep(Duration::from_millis(5001)).await;
    assert_eq!(backend.write_count(CURRENT_KEY), 2);
    assert_eq!(scheduler.phase(), SchedulerPhase::Idle);
}

/// Tenet: a failing store keeps the project dirty so a later trigger retries.
#[tokio::test]
async fn failed_save_is_retried_by_next_trigger() {
    let workspace = FakeWorkspace::sample();
    let engine = PersistenceEngine::with_clock(
        AutosaveConfig::default(),
        Arc::new(MemoryStore::with_quota(32)),
        workspace.collaborators(),
        Arc::new(ManualClock::new(fixed_time())),
    )
    .unwrap();
    let mut rx = engine.subscribe();

    engine.scheduler().mark_dirty();
    assert!(matches!(engine.save_now().await, Err(SaveError::Store(_))));
    assert_eq!(engine.scheduler().phase(), SchedulerPhase::Dirty);
    match rx.recv().await.unwrap() {
        SyncEvent::SaveFailed { error, .. } => assert!(error.contains("quota")),
        other => panic!("unexpected event {}", other.name()),
    }

    assert!(matches!(engine.save_now().await, Err(SaveError::Store(_))));
    assert_eq!(engine.scheduler().stats().saves_failed, 2);
}

/// Tenet: a failed automatic save stays dirty and the next change retries it.
///
/// The debounced save hits the quota. Nothing re-arms on its own; the next
/// change arms a fresh window, and once space is available that save lands.
#[tokio::test(start_paused = true)]
async fn failed_debounced_save_is_retried_by_next_change() {
    let workspace = FakeWorkspace::sample();
    let backend = Arc::new(MemoryStore::with_quota(32));
    let engine = engine(&workspace, backend.clone());
    let mut rx = engine.subscribe();

    engine.scheduler().notify(ChangeKind::ShapeAdded);
    tokio::time::sleep(Duration::from_millis(5001)).await;
    assert!(matches!(rx.recv().await.unwrap(), SyncEvent::SaveFailed { .. }));
    assert_eq!(engine.scheduler().phase(), SchedulerPhase::Dirty);
    assert!(!engine.scheduler().is_timer_armed());
    assert_eq!(backend.write_count(CURRENT_KEY), 0);

    backend.set_quota(None);
    engine.scheduler().notify(ChangeKind::MatrixChanged);
    assert!(engine.scheduler().is_timer_armed());

    tokio::time::sleep(Duration::from_millis(4999)).await;
    assert_eq!(backend.write_count(CURRENT_KEY), 0);
    tokio::time::sleep(Duration::from_millis(2)).await;

    assert_eq!(backend.write_count(CURRENT_KEY), 1);
    assert_eq!(engine.scheduler().phase(), SchedulerPhase::Idle);
    assert_eq!(drain_saves(&mut rx), 1);
    let stats = engine.scheduler().stats();
    assert_eq!((stats.saves_failed, stats.saves_completed), (1, 1));
}

/// Tenet: a graph export failure still produces a partial save.
#[tokio::test]
async fn partial_capture_is_still_saved() {
    let workspace = FakeWorkspace::sample();
    workspace.graph.set_fail_export(true);
    let engine = engine(&workspace, Arc::new(MemoryStore::new()));
    let mut rx = engine.subscribe();

    engine.scheduler().mark_dirty();
    let report = engine.save_now().await.unwrap();
    assert!(report.snapshot.graph_document.is_none());
    assert_eq!(report.snapshot.indicator_elements.len(), 5);

    match rx.recv().await.unwrap() {
        SyncEvent::SaveCompleted { success, snapshot, .. } => {
            assert!(success);
            assert!(snapshot.graph_document.is_none());
        }
        other => panic!("unexpected event {}", other.name()),
    }
}
