//! Functional tests for the process graph checker.
//!
//! Cycles must be reported once regardless of where the search enters them
//! or in which order flows appear in the document.

use mmp_test_utils::{CYCLIC_PROCESS_XML, SAMPLE_PROCESS_XML};
use mmp_validation::{
    analyze, check_graph, extract_flows, find_cycles, FindingCode, FlowEdge, ScanMode,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

fn edge(source: &str, target: &str) -> FlowEdge {
    FlowEdge::new(format!("{source}-{target}"), source, target)
}

/// Tenet: A→B→C→A is one cycle, not three rotations.
#[test]
fn triangle_yields_exactly_one_cycle() {
    let cycles = find_cycles(&[edge("A", "B"), edge("B", "C"), edge("C", "A")]);
    assert_eq!(cycles.len(), 1);
    assert_eq!(cycles[0].nodes(), ["A", "B", "C"]);
}

/// Tenet: two loops sharing a node are distinct cycles.
#[test]
fn loops_sharing_a_node_are_both_reported() {
    let cycles = find_cycles(&[
        edge("A", "B"),
        edge("B", "A"),
        edge("B", "C"),
        edge("C", "B"),
    ]);
    let mut rendered: Vec<String> = cycles.iter().map(ToString::to_string).collect();
    rendered.sort();
    assert_eq!(rendered, vec!["A → B → A", "B → C → B"]);
}

/// Tenet: a cycle with no way out to an end event is critical.
#[test]
fn trapping_cycle_is_critical() {
    let analysis = analyze(CYCLIC_PROCESS_XML);
    assert_eq!(analysis.scan.mode, ScanMode::Strict);
    assert_eq!(analysis.cycles.len(), 1);
    assert!(analysis.has_cycles_without_end_event());

    let report = analysis.report();
    assert!(!report.is_valid());
    assert!(report.has(FindingCode::TrappingCycle));
    assert!(report.has(FindingCode::MissingEndEvent));
    assert!(!report.has(FindingCode::Cycle));
}

/// Tenet: a linear process is clean.
#[test]
fn sample_process_has_no_findings() {
    let analysis = analyze(SAMPLE_PROCESS_XML);
    assert!(analysis.stats.has_mandatory_events());
    assert_eq!(analysis.stats.tasks, 2);
    assert_eq!(analysis.stats.sequence_flows, 3);

    let report = check_graph(SAMPLE_PROCESS_XML);
    assert!(report.is_valid());
    assert!(report.warnings.is_empty());
}

/// Tenet: a broken document still yields its flows.
#[test]
fn malformed_document_is_scanned_leniently() {
    let broken = SAMPLE_PROCESS_XML.replace("</bpmn:process>", "</bpmn:proc>");
    let analysis = analyze(&broken);
    assert_eq!(analysis.scan.mode, ScanMode::Lenient);
    assert_eq!(analysis.scan.flows, extract_flows(SAMPLE_PROCESS_XML));
    assert!(analysis.stats.has_mandatory_events());
}

/// Tenet: an empty document reports missing events without failing.
#[test]
fn empty_document_warns_about_missing_events() {
    let report = check_graph("");
    assert!(report.is_valid());
    assert!(report.has(FindingCode::MissingStartEvent));
    assert!(report.has(FindingCode::MissingEndEvent));
}

proptest! {
    /// Tenet: flow order never changes which cycles are found.
    #[test]
    fn cycle_set_is_independent_of_flow_order(
        flows in Just(vec![
            edge("Start", "A"),
            edge("A", "B"),
            edge("B", "C"),
            edge("C", "A"),
            edge("C", "End"),
            edge("Start", "End"),
        ]).prop_shuffle()
    ) {
        let cycles = find_cycles(&flows);
        prop_assert_eq!(cycles.len(), 1);
        prop_assert_eq!(cycles[0].to_string(), "A → B → C → A");
    }
}
