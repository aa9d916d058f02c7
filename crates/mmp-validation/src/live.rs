//! Cross-notation checks
//!
//! [`validate_live`] reads the editors directly; [`check_snapshot`] runs the
//! same rules over a captured snapshot. An absent or failing collaborator
//! only narrows what can be checked.

use crate::graph::{analyze, FlowElementKind};
use crate::matrix::{check_matrix, MatrixCheckOptions, OrphanPolicy};
use crate::report::{Finding, FindingCode, ValidationReport};
use mmp_core::{Collaborators, ProjectSnapshot};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Check the live editors against each other
pub async fn validate_live(collaborators: &Collaborators) -> ValidationReport {
    let mut report = ValidationReport::new();

    let live_nodes = collaborators.graph().and_then(|graph| match graph.elements() {
        Ok(nodes) => Some(nodes),
        Err(err) => {
            warn!(error = %err, "graph registry unavailable, skipping element checks");
            None
        }
    });

    if let (Some(nodes), Some(panel)) = (&live_nodes, collaborators.indicators()) {
        let ids: HashSet<&str> = nodes.iter().map(|n| n.id()).collect();
        match panel.all_indicators() {
            Ok(indicators) => {
                for indicator in indicators {
                    let drawn = indicator
                        .element_id
                        .as_deref()
                        .is_some_and(|el| ids.contains(el));
                    if !drawn {
                        report.push(Finding::critical(
                            FindingCode::IndicatorWithoutElement,
                            indicator.id.as_str(),
                            format!(
                                "indicator '{}' does not reference a live graph element",
                                indicator.id
                            ),
                        ));
                    }
                }
            }
            Err(err) => warn!(error = %err, "indicator panel unavailable"),
        }
    }

    if let Some(store) = collaborators.matrix() {
        match (store.roles(), store.matrix()) {
            (Ok(roles), Ok(matrix)) => {
                let orphans = match &live_nodes {
                    Some(nodes) => OrphanPolicy::Prune(
                        nodes
                            .iter()
                            .filter(|n| n.is_process_task())
                            .map(|n| n.id().to_owned())
                            .collect(),
                    ),
                    None => OrphanPolicy::Strict,
                };
                let organizational_roles = collaborators
                    .role_symbols()
                    .and_then(|s| s.symbols().ok())
                    .map(|symbols| symbols.into_iter().map(|s| s.name).collect())
                    .unwrap_or_default();
                let options = MatrixCheckOptions {
                    orphans,
                    organizational_roles,
                };
                report.merge(check_matrix(&roles, &matrix, &options).report);
            }
            (Err(err), _) | (_, Err(err)) => warn!(error = %err, "matrix store unavailable"),
        }
    }

    if let Some(graph) = collaborators.graph() {
        match graph.export_document().await {
            Ok(document) => report.merge(analyze(&document).report()),
            Err(err) => report.push(Finding::warning(
                FindingCode::UnreadableDocument,
                "",
                format!("process document could not be exported: {err}"),
            )),
        }
    }

    debug!(
        errors = report.errors.len(),
        warnings = report.warnings.len(),
        "live validation finished"
    );
    report
}

/// Check a captured snapshot
#[must_use]
pub fn check_snapshot(snapshot: &ProjectSnapshot) -> ValidationReport {
    let mut report = ValidationReport::new();

    for child in snapshot.dangling_children() {
        let parent = child.parent_id.as_deref().unwrap_or("");
        report.push(Finding::critical(
            FindingCode::DanglingIndicatorParent,
            child.id.as_str(),
            format!(
                "indicator element '{}' references missing principal '{parent}'",
                child.id
            ),
        ));
    }

    let orphans = match snapshot.graph_document.as_deref() {
        Some(document) => {
            let analysis = analyze(document);
            let tasks = analysis
                .scan
                .ids_of(FlowElementKind::Task)
                .map(str::to_owned)
                .collect();
            report.merge(analysis.report());
            OrphanPolicy::Prune(tasks)
        }
        None => OrphanPolicy::Strict,
    };

    let options = MatrixCheckOptions {
        orphans,
        organizational_roles: snapshot
            .organizational_roles
            .iter()
            .map(|r| r.name.clone())
            .collect(),
    };
    report.merge(check_matrix(&snapshot.roles, &snapshot.matrix, &options).report);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use mmp_core::{Bounds, IndicatorElement, IndicatorKind, Responsibility, ResponsibilityMatrix};
    use mmp_test_utils::{fixed_time, SAMPLE_PROCESS_XML};

    #[test]
    fn snapshot_with_dangling_child_is_invalid() {
        let mut snapshot = ProjectSnapshot::empty(fixed_time());
        snapshot.graph_document = Some(SAMPLE_PROCESS_XML.to_owned());
        snapshot.indicator_elements = vec![
            IndicatorElement::principal("PPI_1", "Lead time", Bounds::default()),
            IndicatorElement::child(
                "Scope_1",
                IndicatorKind::Scope,
                "",
                Bounds::default(),
                "PPI_9",
            ),
        ];
        let report = check_snapshot(&snapshot);
        assert!(report.has(FindingCode::DanglingIndicatorParent));
        assert!(!report.is_valid());
    }

    #[test]
    fn snapshot_rows_for_deleted_tasks_are_ignored() {
        let mut snapshot = ProjectSnapshot::empty(fixed_time());
        snapshot.graph_document = Some(SAMPLE_PROCESS_XML.to_owned());
        snapshot.roles = vec!["Dev".into(), "Lead".into()];
        snapshot.matrix = ResponsibilityMatrix::new()
            .with("Task_1", "Dev", Responsibility::Responsible)
            .with("Task_1", "Lead", Responsibility::Accountable)
            .with("Task_2", "Dev", Responsibility::Responsible)
            .with("Task_2", "Lead", Responsibility::Accountable)
            .with("Task_deleted", "Dev", Responsibility::Consulted);
        let report = check_snapshot(&snapshot);
        assert!(report.is_valid(), "{:?}", report.errors);
    }
}
