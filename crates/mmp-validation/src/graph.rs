//! Structural checks over the process graph document
//!
//! # Overview
//!
//! The document is scanned once for flow elements and sequence flows. A
//! strict XML pass runs first; if the document is not well formed a
//! tag-level pattern scan recovers what it can.
//!
//! # Cycles
//!
//! - **DFS from every node**: each back edge to a node on the current path
//!   closes a cycle.
//! - **Canonical rotation**: a cycle is rotated to start at its smallest
//!   node id, so the same loop found from different starts is reported once.
//! - **Trapping**: a cycle from which no end event is reachable is critical;
//!   any other cycle is a warning.

use crate::report::{Finding, FindingCode, ValidationReport};
use once_cell::sync::Lazy;
use petgraph::graphmap::DiGraphMap;
use petgraph::visit::Bfs;
use petgraph::Direction;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::debug;

static TAG_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(?:[A-Za-z_][\w.-]*:)?([A-Za-z_][\w.-]*)\b([^>]*?)/?>").expect("valid tag regex")
});
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([A-Za-z_:][\w.:-]*)\s*=\s*"([^"]*)""#).expect("valid attribute regex")
});

/// Sequence flow between two flow elements
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FlowEdge {
    /// Flow id; `source-target` when the document has none
    pub id: String,
    /// Source element id
    pub source_ref: String,
    /// Target element id
    pub target_ref: String,
}

impl FlowEdge {
    /// Create an edge
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        source_ref: impl Into<String>,
        target_ref: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source_ref: source_ref.into(),
            target_ref: target_ref.into(),
        }
    }
}

/// Structural role of a scanned flow element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowElementKind {
    /// `startEvent`
    StartEvent,
    /// `endEvent`
    EndEvent,
    /// Any task, call activity or sub-process
    Task,
    /// Any gateway
    Gateway,
    /// Intermediate catch or throw event
    IntermediateEvent,
    /// Boundary event
    BoundaryEvent,
    /// Data object or data store reference
    DataObject,
}

impl FlowElementKind {
    fn classify(local_name: &str) -> Option<Self> {
        let kind = match local_name {
            "startEvent" => Self::StartEvent,
            "endEvent" => Self::EndEvent,
            "boundaryEvent" => Self::BoundaryEvent,
            "dataObjectReference" | "dataStoreReference" => Self::DataObject,
            "task" | "callActivity" | "subProcess" | "transaction" => Self::Task,
            name if name.ends_with("Task") => Self::Task,
            name if name.ends_with("Gateway") => Self::Gateway,
            name if name.starts_with("intermediate") && name.ends_with("Event") => {
                Self::IntermediateEvent
            }
            _ => return None,
        };
        Some(kind)
    }
}

/// Flow element found in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowElement {
    /// Element id
    pub id: String,
    /// Structural role
    pub kind: FlowElementKind,
}

/// Which pass produced a scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    /// Well-formed XML pass
    Strict,
    /// Tag-pattern recovery pass
    Lenient,
}

/// Flow elements and sequence flows of one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentScan {
    /// Pass that produced this scan
    pub mode: ScanMode,
    /// Flow elements with ids, in document order
    pub elements: Vec<FlowElement>,
    /// Sequence flows, in document order
    pub flows: Vec<FlowEdge>,
}

impl DocumentScan {
    /// Ids of elements of `kind`
    pub fn ids_of(&self, kind: FlowElementKind) -> impl Iterator<Item = &str> {
        self.elements
            .iter()
            .filter(move |el| el.kind == kind)
            .map(|el| el.id.as_str())
    }

    /// Element counts
    #[must_use]
    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            sequence_flows: self.flows.len(),
            ..GraphStats::default()
        };
        for el in &self.elements {
            match el.kind {
                FlowElementKind::StartEvent => stats.start_events += 1,
                FlowElementKind::EndEvent => stats.end_events += 1,
                FlowElementKind::Task => stats.tasks += 1,
                FlowElementKind::Gateway => stats.gateways += 1,
                FlowElementKind::IntermediateEvent => stats.intermediate_events += 1,
                FlowElementKind::BoundaryEvent => stats.boundary_events += 1,
                FlowElementKind::DataObject => stats.data_objects += 1,
            }
        }
        stats
    }
}

/// Element counts of a process document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    /// Start events
    pub start_events: usize,
    /// End events
    pub end_events: usize,
    /// Tasks and activities
    pub tasks: usize,
    /// Gateways
    pub gateways: usize,
    /// Intermediate events
    pub intermediate_events: usize,
    /// Boundary events
    pub boundary_events: usize,
    /// Data objects and stores
    pub data_objects: usize,
    /// Sequence flows
    pub sequence_flows: usize,
}

impl GraphStats {
    /// At least one start and one end event
    #[inline]
    #[must_use]
    pub fn has_mandatory_events(&self) -> bool {
        self.start_events > 0 && self.end_events > 0
    }
}

/// A flow cycle, rotated to start at its smallest node id
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Cycle {
    nodes: Vec<String>,
}

impl Cycle {
    /// Canonicalize the loop `path[0] → … → path[n-1] → path[0]`
    #[must_use]
    pub fn canonical(path: &[&str]) -> Self {
        let start = path
            .iter()
            .enumerate()
            .min_by_key(|(_, id)| **id)
            .map_or(0, |(i, _)| i);
        let nodes = path[start..]
            .iter()
            .chain(path[..start].iter())
            .map(|id| (*id).to_owned())
            .collect();
        Self { nodes }
    }

    /// Node ids, smallest first, without repeating the first node
    #[must_use]
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Whether `id` is on the cycle
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n == id)
    }

    /// Number of nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Never true for a found cycle
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl fmt::Display for Cycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in &self.nodes {
            write!(f, "{node} → ")?;
        }
        match self.nodes.first() {
            Some(first) => f.write_str(first),
            None => Ok(()),
        }
    }
}

/// Scan `document`, strictly if it is well formed, leniently otherwise
#[must_use]
pub fn scan_document(document: &str) -> DocumentScan {
    match scan_strict(document) {
        Ok(scan) => scan,
        Err(err) => {
            debug!(error = %err, "document not well formed, falling back to tag scan");
            scan_lenient(document)
        }
    }
}

/// Sequence flows of `document`
#[must_use]
pub fn extract_flows(document: &str) -> Vec<FlowEdge> {
    scan_document(document).flows
}

fn scan_strict(document: &str) -> Result<DocumentScan, quick_xml::Error> {
    let mut reader = Reader::from_str(document);
    let mut scan = DocumentScan {
        mode: ScanMode::Strict,
        elements: Vec::new(),
        flows: Vec::new(),
    };
    loop {
        match reader.read_event()? {
            Event::Start(tag) | Event::Empty(tag) => {
                let local = String::from_utf8_lossy(tag.local_name().as_ref()).into_owned();
                let attrs = strict_attributes(&tag)?;
                record(&mut scan, &local, &attrs);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    Ok(scan)
}

fn strict_attributes(tag: &BytesStart<'_>) -> Result<HashMap<String, String>, quick_xml::Error> {
    let mut attrs = HashMap::new();
    for attr in tag.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        attrs.insert(key, value);
    }
    Ok(attrs)
}

fn scan_lenient(document: &str) -> DocumentScan {
    let mut scan = DocumentScan {
        mode: ScanMode::Lenient,
        elements: Vec::new(),
        flows: Vec::new(),
    };
    for tag in TAG_RE.captures_iter(document) {
        let local = &tag[1];
        let attrs: HashMap<String, String> = ATTR_RE
            .captures_iter(&tag[2])
            .map(|a| {
                let key = a[1].rsplit(':').next().unwrap_or(&a[1]).to_owned();
                (key, a[2].to_owned())
            })
            .collect();
        record(&mut scan, local, &attrs);
    }
    scan
}

fn record(scan: &mut DocumentScan, local: &str, attrs: &HashMap<String, String>) {
    if local == "sequenceFlow" {
        let (Some(source), Some(target)) = (attrs.get("sourceRef"), attrs.get("targetRef")) else {
            return;
        };
        let id = attrs
            .get("id")
            .cloned()
            .unwrap_or_else(|| format!("{source}-{target}"));
        scan.flows.push(FlowEdge::new(id, source.clone(), target.clone()));
        return;
    }
    if let (Some(kind), Some(id)) = (FlowElementKind::classify(local), attrs.get("id")) {
        scan.elements.push(FlowElement {
            id: id.clone(),
            kind,
        });
    }
}

fn adjacency(flows: &[FlowEdge]) -> DiGraphMap<&str, ()> {
    let mut graph = DiGraphMap::new();
    for flow in flows {
        graph.add_edge(flow.source_ref.as_str(), flow.target_ref.as_str(), ());
    }
    graph
}

/// Every distinct cycle reachable by DFS from any node
#[must_use]
pub fn find_cycles(flows: &[FlowEdge]) -> Vec<Cycle> {
    let graph = adjacency(flows);
    let mut search = CycleSearch::default();
    for start in graph.nodes() {
        let mut visited = HashSet::new();
        let mut path = Vec::new();
        search.dfs(start, &graph, &mut visited, &mut path);
    }
    search.found
}

#[derive(Default)]
struct CycleSearch {
    found: Vec<Cycle>,
    seen: HashSet<Cycle>,
}

impl CycleSearch {
    fn dfs<'a>(
        &mut self,
        node: &'a str,
        graph: &DiGraphMap<&'a str, ()>,
        visited: &mut HashSet<&'a str>,
        path: &mut Vec<&'a str>,
    ) {
        visited.insert(node);
        path.push(node);
        for next in graph.neighbors_directed(node, Direction::Outgoing) {
            if let Some(pos) = path.iter().position(|n| *n == next) {
                let cycle = Cycle::canonical(&path[pos..]);
                if self.seen.insert(cycle.clone()) {
                    self.found.push(cycle);
                }
            } else if !visited.contains(next) {
                self.dfs(next, graph, visited, path);
            }
        }
        path.pop();
    }
}

/// Result of analysing one document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GraphAnalysis {
    /// Underlying scan
    pub scan: DocumentScan,
    /// Element counts
    pub stats: GraphStats,
    /// Every distinct cycle
    pub cycles: Vec<Cycle>,
    /// Cycles from which no end event is reachable
    pub trapping_cycles: Vec<Cycle>,
}

impl GraphAnalysis {
    /// Whether any cycle exists
    #[inline]
    #[must_use]
    pub fn has_cycles(&self) -> bool {
        !self.cycles.is_empty()
    }

    /// Whether any cycle traps its tokens
    #[inline]
    #[must_use]
    pub fn has_cycles_without_end_event(&self) -> bool {
        !self.trapping_cycles.is_empty()
    }

    /// Findings for this analysis
    #[must_use]
    pub fn report(&self) -> ValidationReport {
        let mut report = ValidationReport::new();
        for cycle in &self.cycles {
            let subject = cycle.nodes().first().cloned().unwrap_or_default();
            if self.trapping_cycles.contains(cycle) {
                report.push(Finding::critical(
                    FindingCode::TrappingCycle,
                    subject,
                    format!("flow cycle {cycle} has no path to an end event"),
                ));
            } else {
                report.push(Finding::warning(
                    FindingCode::Cycle,
                    subject,
                    format!("flow cycle {cycle}"),
                ));
            }
        }
        if self.stats.start_events == 0 {
            report.push(Finding::warning(
                FindingCode::MissingStartEvent,
                "",
                "process has no start event",
            ));
        }
        if self.stats.end_events == 0 {
            report.push(Finding::warning(
                FindingCode::MissingEndEvent,
                "",
                "process has no end event",
            ));
        }
        report
    }
}

/// Scan, count and find cycles in `document`
#[must_use]
pub fn analyze(document: &str) -> GraphAnalysis {
    let scan = scan_document(document);
    let stats = scan.stats();
    let cycles = find_cycles(&scan.flows);

    let graph = adjacency(&scan.flows);
    let mut reaches_end: HashSet<&str> = HashSet::new();
    let reversed = petgraph::visit::Reversed(&graph);
    for end in scan.ids_of(FlowElementKind::EndEvent) {
        if !graph.contains_node(end) {
            reaches_end.insert(end);
            continue;
        }
        let mut bfs = Bfs::new(reversed, end);
        while let Some(node) = bfs.next(reversed) {
            reaches_end.insert(node);
        }
    }
    let trapping_cycles = cycles
        .iter()
        .filter(|cycle| !cycle.nodes().iter().any(|n| reaches_end.contains(n.as_str())))
        .cloned()
        .collect();

    GraphAnalysis {
        scan,
        stats,
        cycles,
        trapping_cycles,
    }
}

/// Structural findings for `document`
#[must_use]
pub fn check_graph(document: &str) -> ValidationReport {
    analyze(document).report()
}
