//! Snapshot capture from live collaborators
//!
//! Capture never fails: a missing or failing collaborator contributes an
//! empty section and the rest of the snapshot is still assembled.

use crate::clock::Clock;
use crate::collaborators::Collaborators;
use crate::model::{
    snapshot::count_by_kind, ElementKind, GraphNode, IndicatorElement, ProjectSnapshot,
    ResponsibilityMatrix, RoleSymbol,
};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Assembles [`ProjectSnapshot`]s from the injected collaborators
#[derive(Debug, Clone)]
pub struct SnapshotBuilder {
    collaborators: Collaborators,
    clock: Arc<dyn Clock>,
    schema_version: String,
}

impl SnapshotBuilder {
    /// Builder over `collaborators`, stamping snapshots with `schema_version`
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        schema_version: impl Into<String>,
    ) -> Self {
        Self {
            collaborators,
            clock,
            schema_version: schema_version.into(),
        }
    }

    /// Collaborators this builder reads from
    #[inline]
    #[must_use]
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Capture the current state of every notation
    pub async fn capture(&self) -> ProjectSnapshot {
        let timestamp = self.clock.now();
        let graph_document = self.capture_document().await;
        let nodes = self.capture_nodes();
        let indicator_elements = collect_indicator_elements(&nodes);
        let (roles, matrix) = self.capture_matrix();
        let organizational_roles = self.capture_role_symbols(&nodes);

        let (principals, children) = count_by_kind(&indicator_elements);
        debug!(
            has_document = graph_document.is_some(),
            principals,
            children,
            roles = roles.len(),
            tasks = matrix.len(),
            org_roles = organizational_roles.len(),
            "snapshot captured"
        );

        ProjectSnapshot {
            version: self.schema_version.clone(),
            timestamp,
            graph_document,
            indicator_elements,
            roles,
            matrix,
            organizational_roles,
        }
    }

    async fn capture_document(&self) -> Option<String> {
        let graph = self.collaborators.graph()?;
        match graph.export_document().await {
            Ok(document) => Some(document),
            Err(err) => {
                warn!(error = %err, "graph export failed, snapshot has no document");
                None
            }
        }
    }

    fn capture_nodes(&self) -> Vec<GraphNode> {
        let Some(graph) = self.collaborators.graph() else {
            return Vec::new();
        };
        graph.elements().unwrap_or_else(|err| {
            warn!(error = %err, "element registry unavailable, no indicators captured");
            Vec::new()
        })
    }

    fn capture_matrix(&self) -> (Vec<String>, ResponsibilityMatrix) {
        let Some(store) = self.collaborators.matrix() else {
            return (Vec::new(), ResponsibilityMatrix::new());
        };
        let roles = store.roles().unwrap_or_else(|err| {
            warn!(error = %err, "roles unavailable");
            Vec::new()
        });
        let matrix = store.matrix().unwrap_or_else(|err| {
            warn!(error = %err, "matrix unavailable");
            ResponsibilityMatrix::new()
        });
        (roles, matrix)
    }

    fn capture_role_symbols(&self, nodes: &[GraphNode]) -> Vec<RoleSymbol> {
        if let Some(store) = self.collaborators.role_symbols() {
            match store.symbols() {
                Ok(symbols) => return symbols,
                Err(err) => warn!(error = %err, "role store failed, scanning graph instead"),
            }
        }
        nodes
            .iter()
            .filter(|node| *node.kind() == ElementKind::OrganizationalRole)
            .map(RoleSymbol::from_node)
            .collect()
    }
}

/// Flatten the indicator hierarchy of `nodes` into snapshot order
///
/// Principals appear in discovery order, each immediately followed by its
/// children in discovery order. Children without a principal parent are
/// dropped. Duplicate ids keep their first occurrence.
#[must_use]
pub fn collect_indicator_elements(nodes: &[GraphNode]) -> Vec<IndicatorElement> {
    let mut children: HashMap<&str, Vec<&GraphNode>> = HashMap::new();
    for node in nodes {
        if let (Some(kind), Some(parent)) = (node.indicator_kind(), node.parent_id()) {
            if !kind.is_principal() {
                children.entry(parent).or_default().push(node);
            }
        }
    }

    let mut seen: HashSet<&str> = HashSet::new();
    let mut out = Vec::new();
    for principal in nodes
        .iter()
        .filter(|n| n.indicator_kind().is_some_and(|k| k.is_principal()))
    {
        if !seen.insert(principal.id()) {
            continue;
        }
        out.push(IndicatorElement::principal(
            principal.id(),
            principal.name().unwrap_or_default(),
            principal.bounds(),
        ));
        for child in children.remove(principal.id()).unwrap_or_default() {
            if !seen.insert(child.id()) {
                continue;
            }
            let Some(kind) = child.indicator_kind() else {
                continue;
            };
            out.push(IndicatorElement::child(
                child.id(),
                kind,
                child.name().unwrap_or_default(),
                child.bounds(),
                principal.id(),
            ));
        }
    }

    for (parent, orphans) in children {
        for orphan in orphans {
            debug!(id = orphan.id(), parent, "indicator child has no principal parent, dropped");
        }
    }
    out
}
