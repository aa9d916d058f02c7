//! Restoration of a snapshot into the live collaborators
//!
//! Replay order:
//! 1. suspend autosave
//! 2. import the graph document
//! 3. recreate indicator principals, then their children
//! 4. replay roles and matrix
//! 5. replay organizational role symbols and their shapes
//! 6. publish `project.restored`
//! 7. resume autosave, unless another holder still keeps it suspended
//!
//! Steps 2-5 are independent: a failure is recorded in the report and the
//! next step still runs.

use crate::clock::Clock;
use crate::collaborators::{Collaborators, GraphEngine};
use crate::error::RestoreError;
use crate::events::{EventBus, RestoreSource, SyncEvent};
use crate::model::{GraphNode, IndicatorElement, ProjectSnapshot, SchemaVersion};
use crate::scheduler::AutosaveScheduler;
use crate::store::SnapshotStore;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Replay step that can fail independently
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreStep {
    /// Graph document import
    Document,
    /// Indicator element recreation
    Indicators,
    /// Roles and matrix replay
    Matrix,
    /// Organizational role replay
    OrganizationalRoles,
}

impl fmt::Display for RestoreStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Document => "document",
            Self::Indicators => "indicators",
            Self::Matrix => "matrix",
            Self::OrganizationalRoles => "organizational roles",
        })
    }
}

/// What a restore actually did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Indicator shapes created
    pub indicators_created: usize,
    /// Indicator shapes that already existed (e.g. imported with the document)
    pub indicators_existing: usize,
    /// Indicator children skipped because their parent was missing or creation failed
    pub indicators_skipped: usize,
    /// Elements handed to the legacy indicator restorer
    pub delegated: Option<usize>,
    /// Organizational role shapes created
    pub role_shapes_created: usize,
    /// Steps that failed, with the reason
    pub failed_steps: Vec<(RestoreStep, String)>,
}

impl RestoreReport {
    /// Whether every step succeeded
    #[inline]
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed_steps.is_empty()
    }

    fn fail(&mut self, step: RestoreStep, reason: impl fmt::Display) {
        warn!(%step, reason = %reason, "restore step failed");
        self.failed_steps.push((step, reason.to_string()));
    }
}

/// Replays snapshots into the collaborators
#[derive(Debug, Clone)]
pub struct RestorationEngine {
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    events: EventBus,
    scheduler: Option<AutosaveScheduler>,
    ttl: Duration,
}

impl RestorationEngine {
    /// Engine replaying into `collaborators`, rejecting snapshots older than `ttl`
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        events: EventBus,
        ttl: Duration,
    ) -> Self {
        Self {
            collaborators,
            clock,
            events,
            scheduler: None,
            ttl,
        }
    }

    /// Suspend `scheduler` for the duration of each restore
    #[must_use]
    pub fn with_scheduler(mut self, scheduler: AutosaveScheduler) -> Self {
        self.scheduler = Some(scheduler);
        self
    }

    /// Read the stored snapshot and restore it
    pub async fn restore_latest(
        &self,
        store: &SnapshotStore,
        source: RestoreSource,
    ) -> Result<RestoreReport, RestoreError> {
        let snapshot = store.read().await?;
        self.restore(&snapshot, source).await
    }

    /// Replay `snapshot` into the collaborators
    ///
    /// Expired and unsupported snapshots are rejected before anything is
    /// touched. Once replay starts it runs to completion.
    pub async fn restore(
        &self,
        snapshot: &ProjectSnapshot,
        source: RestoreSource,
    ) -> Result<RestoreReport, RestoreError> {
        let now = self.clock.now();
        if snapshot.is_expired_at(now, self.ttl) {
            return Err(RestoreError::Expired {
                age: snapshot.age_at(now),
            });
        }
        let Some(schema) = snapshot.schema() else {
            return Err(RestoreError::Malformed(format!(
                "unsupported schema version '{}'",
                snapshot.version
            )));
        };

        info!(%source, version = %snapshot.version, "restoring project");
        let suspended = self.scheduler.as_ref().map(AutosaveScheduler::suspend_guard);

        let mut report = RestoreReport::default();
        self.restore_document(snapshot, &mut report).await;
        self.restore_indicators(snapshot, schema, &mut report).await;
        self.restore_matrix(snapshot, &mut report);
        self.restore_role_symbols(snapshot, &mut report);

        self.events.publish(SyncEvent::RestoreCompleted {
            snapshot: Arc::new(snapshot.clone()),
            source,
        });

        drop(suspended);

        info!(
            created = report.indicators_created,
            existing = report.indicators_existing,
            skipped = report.indicators_skipped,
            failed_steps = report.failed_steps.len(),
            "project restored"
        );
        Ok(report)
    }

    async fn restore_document(&self, snapshot: &ProjectSnapshot, report: &mut RestoreReport) {
        let Some(document) = snapshot.graph_document.as_deref() else {
            debug!("snapshot has no graph document");
            return;
        };
        let Some(graph) = self.collaborators.graph() else {
            report.fail(RestoreStep::Document, "graph engine not available");
            return;
        };
        if let Err(err) = graph.import_document(document).await {
            report.fail(RestoreStep::Document, err);
        }
    }

    async fn restore_indicators(
        &self,
        snapshot: &ProjectSnapshot,
        schema: SchemaVersion,
        report: &mut RestoreReport,
    ) {
        if snapshot.indicator_elements.is_empty() {
            return;
        }

        if let Some(graph) = self.collaborators.graph() {
            for principal in snapshot.principals() {
                Self::recreate(graph, principal, report);
            }
            for child in snapshot
                .indicator_elements
                .iter()
                .filter(|el| !el.kind.is_principal())
            {
                let parent_live = child
                    .parent_id
                    .as_deref()
                    .is_some_and(|parent| graph.element(parent).is_some());
                if parent_live {
                    Self::recreate(graph, child, report);
                } else {
                    debug!(id = %child.id, parent = ?child.parent_id, "parent missing, child skipped");
                    report.indicators_skipped += 1;
                }
            }
        } else {
            report.fail(RestoreStep::Indicators, "graph engine not available");
        }

        if schema == SchemaVersion::Legacy {
            if let Some(restorer) = self.collaborators.indicator_restorer() {
                match restorer.restore_indicators(&snapshot.indicator_elements).await {
                    Ok(count) => report.delegated = Some(count),
                    Err(err) => report.fail(RestoreStep::Indicators, err),
                }
            }
        }
    }

    fn recreate(
        graph: &dyn GraphEngine,
        element: &IndicatorElement,
        report: &mut RestoreReport,
    ) {
        if graph.element(&element.id).is_some() {
            report.indicators_existing += 1;
            return;
        }
        let mut node = GraphNode::new(element.id.clone(), element.kind.type_name())
            .with_name(element.name.clone())
            .with_bounds(element.position);
        if let Some(parent) = &element.parent_id {
            node = node.with_parent(parent.clone());
        }
        match graph.create_shape(node) {
            Ok(()) => report.indicators_created += 1,
            Err(err) => {
                warn!(id = %element.id, error = %err, "indicator shape not created");
                report.indicators_skipped += 1;
            }
        }
    }

    fn restore_matrix(&self, snapshot: &ProjectSnapshot, report: &mut RestoreReport) {
        let Some(store) = self.collaborators.matrix() else {
            if !snapshot.roles.is_empty() || !snapshot.matrix.is_empty() {
                report.fail(RestoreStep::Matrix, "matrix store not available");
            }
            return;
        };
        if let Err(err) = store.set_roles(snapshot.roles.clone()) {
            report.fail(RestoreStep::Matrix, err);
        }
        if let Err(err) = store.set_matrix(snapshot.matrix.clone()) {
            report.fail(RestoreStep::Matrix, err);
        }
    }

    fn restore_role_symbols(&self, snapshot: &ProjectSnapshot, report: &mut RestoreReport) {
        if snapshot.organizational_roles.is_empty() {
            return;
        }
        match self.collaborators.role_symbols() {
            Some(store) => {
                if let Err(err) = store.set_symbols(snapshot.organizational_roles.clone()) {
                    report.fail(RestoreStep::OrganizationalRoles, err);
                }
            }
            None => debug!("role store not available, only shapes restored"),
        }

        let Some(graph) = self.collaborators.graph() else {
            return;
        };
        for symbol in snapshot.organizational_roles.iter().filter(|s| s.is_drawable()) {
            if graph.element(&symbol.id).is_some() {
                continue;
            }
            let (Some(type_name), Some(position)) = (symbol.type_name.as_deref(), symbol.position)
            else {
                continue;
            };
            let node = GraphNode::new(symbol.id.clone(), type_name)
                .with_name(symbol.name.clone())
                .with_bounds(position);
            match graph.create_shape(node) {
                Ok(()) => report.role_shapes_created += 1,
                Err(err) => report.fail(RestoreStep::OrganizationalRoles, err),
            }
        }
    }
}
