//! Testing utilities for MMP workspace
//!
//! In-memory collaborator fakes and shared fixtures.

#![allow(missing_docs)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use mmp_core::{
    Bounds, CollaboratorError, Collaborators, GraphEngine, GraphNode, Indicator,
    IndicatorElement, IndicatorRestorer, IndicatorStore, MatrixStore, Responsibility,
    ResponsibilityMatrix, RoleSymbol, RoleSymbolStore,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// start → Task_1 → Task_2 → end
pub const SAMPLE_PROCESS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" id="Definitions_1">
  <bpmn:process id="Process_1" isExecutable="false">
    <bpmn:startEvent id="StartEvent_1" name="Request received" />
    <bpmn:task id="Task_1" name="Review request" />
    <bpmn:userTask id="Task_2" name="Approve request" />
    <bpmn:endEvent id="EndEvent_1" name="Done" />
    <bpmn:sequenceFlow id="Flow_1" sourceRef="StartEvent_1" targetRef="Task_1" />
    <bpmn:sequenceFlow id="Flow_2" sourceRef="Task_1" targetRef="Task_2" />
    <bpmn:sequenceFlow id="Flow_3" sourceRef="Task_2" targetRef="EndEvent_1" />
  </bpmn:process>
</bpmn:definitions>
"#;

/// start → A → B → C → A, no end event
pub const CYCLIC_PROCESS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<bpmn:definitions xmlns:bpmn="http://www.omg.org/spec/BPMN/20100524/MODEL" id="Definitions_2">
  <bpmn:process id="Process_2">
    <bpmn:startEvent id="Start" />
    <bpmn:task id="A" />
    <bpmn:task id="B" />
    <bpmn:task id="C" />
    <bpmn:sequenceFlow id="f0" sourceRef="Start" targetRef="A" />
    <bpmn:sequenceFlow id="f1" sourceRef="A" targetRef="B" />
    <bpmn:sequenceFlow id="f2" sourceRef="B" targetRef="C" />
    <bpmn:sequenceFlow id="f3" sourceRef="C" targetRef="A" />
  </bpmn:process>
</bpmn:definitions>
"#;

/// Fixed instant used by fixtures
#[must_use]
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Graph engine keeping its document and nodes in memory
///
/// Export and import yield once so that concurrent callers interleave.
#[derive(Debug, Default)]
pub struct FakeGraphEngine {
    document: Mutex<String>,
    nodes: Mutex<Vec<GraphNode>>,
    fail_export: AtomicBool,
    fail_import: AtomicBool,
    fail_registry: AtomicBool,
    exports: AtomicUsize,
    imports: AtomicUsize,
    import_gate: Mutex<Option<Arc<Semaphore>>>,
    waiting_imports: AtomicUsize,
}

impl FakeGraphEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(self, document: &str) -> Self {
        *self.document.lock() = document.to_owned();
        self
    }

    pub fn with_node(self, node: GraphNode) -> Self {
        self.nodes.lock().push(node);
        self
    }

    pub fn add_node(&self, node: GraphNode) {
        self.nodes.lock().push(node);
    }

    pub fn remove_node(&self, id: &str) {
        self.nodes.lock().retain(|n| n.id() != id);
    }

    pub fn set_fail_export(&self, fail: bool) {
        self.fail_export.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_import(&self, fail: bool) {
        self.fail_import.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_registry(&self, fail: bool) {
        self.fail_registry.store(fail, Ordering::SeqCst);
    }

    pub fn export_count(&self) -> usize {
        self.exports.load(Ordering::SeqCst)
    }

    pub fn import_count(&self) -> usize {
        self.imports.load(Ordering::SeqCst)
    }

    pub fn document(&self) -> String {
        self.document.lock().clone()
    }

    /// Replace the document without going through an import
    pub fn set_document(&self, document: &str) {
        *self.document.lock() = document.to_owned();
    }

    /// Park every later import until a permit is added to the returned gate
    pub fn hold_imports(&self) -> Arc<Semaphore> {
        let gate = Arc::new(Semaphore::new(0));
        *self.import_gate.lock() = Some(gate.clone());
        gate
    }

    /// Imports currently parked on the gate
    pub fn waiting_imports(&self) -> usize {
        self.waiting_imports.load(Ordering::SeqCst)
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.nodes.lock().iter().map(|n| n.id().to_owned()).collect()
    }
}

#[async_trait]
impl GraphEngine for FakeGraphEngine {
    async fn export_document(&self) -> Result<String, CollaboratorError> {
        self.exports.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        if self.fail_export.load(Ordering::SeqCst) {
            return Err(CollaboratorError::failed("graph engine", "export failed"));
        }
        Ok(self.document.lock().clone())
    }

    async fn import_document(&self, document: &str) -> Result<(), CollaboratorError> {
        tokio::task::yield_now().await;
        let gate = self.import_gate.lock().clone();
        if let Some(gate) = gate {
            self.waiting_imports.fetch_add(1, Ordering::SeqCst);
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
            self.waiting_imports.fetch_sub(1, Ordering::SeqCst);
        }
        if self.fail_import.load(Ordering::SeqCst) {
            return Err(CollaboratorError::failed("graph engine", "import failed"));
        }
        self.imports.fetch_add(1, Ordering::SeqCst);
        *self.document.lock() = document.to_owned();
        Ok(())
    }

    fn elements(&self) -> Result<Vec<GraphNode>, CollaboratorError> {
        if self.fail_registry.load(Ordering::SeqCst) {
            return Err(CollaboratorError::failed("element registry", "unavailable"));
        }
        Ok(self.nodes.lock().clone())
    }

    fn element(&self, id: &str) -> Option<GraphNode> {
        self.nodes.lock().iter().find(|n| n.id() == id).cloned()
    }

    fn create_shape(&self, node: GraphNode) -> Result<(), CollaboratorError> {
        let mut nodes = self.nodes.lock();
        if nodes.iter().any(|n| n.id() == node.id()) {
            return Err(CollaboratorError::failed(
                "graph engine",
                format!("element '{}' already exists", node.id()),
            ));
        }
        nodes.push(node);
        Ok(())
    }
}

/// Roles and matrix held in memory
#[derive(Debug, Default)]
pub struct FakeMatrixStore {
    roles: Mutex<Vec<String>>,
    matrix: Mutex<ResponsibilityMatrix>,
}

impl FakeMatrixStore {
    pub fn new(roles: Vec<String>, matrix: ResponsibilityMatrix) -> Self {
        Self {
            roles: Mutex::new(roles),
            matrix: Mutex::new(matrix),
        }
    }

    pub fn current_roles(&self) -> Vec<String> {
        self.roles.lock().clone()
    }

    pub fn current_matrix(&self) -> ResponsibilityMatrix {
        self.matrix.lock().clone()
    }
}

impl MatrixStore for FakeMatrixStore {
    fn roles(&self) -> Result<Vec<String>, CollaboratorError> {
        Ok(self.roles.lock().clone())
    }

    fn set_roles(&self, roles: Vec<String>) -> Result<(), CollaboratorError> {
        *self.roles.lock() = roles;
        Ok(())
    }

    fn matrix(&self) -> Result<ResponsibilityMatrix, CollaboratorError> {
        Ok(self.matrix.lock().clone())
    }

    fn set_matrix(&self, matrix: ResponsibilityMatrix) -> Result<(), CollaboratorError> {
        *self.matrix.lock() = matrix;
        Ok(())
    }
}

/// Organizational role symbols held in memory
#[derive(Debug, Default)]
pub struct FakeRoleStore {
    symbols: Mutex<Vec<RoleSymbol>>,
}

impl FakeRoleStore {
    pub fn new(symbols: Vec<RoleSymbol>) -> Self {
        Self {
            symbols: Mutex::new(symbols),
        }
    }

    pub fn current(&self) -> Vec<RoleSymbol> {
        self.symbols.lock().clone()
    }
}

impl RoleSymbolStore for FakeRoleStore {
    fn symbols(&self) -> Result<Vec<RoleSymbol>, CollaboratorError> {
        Ok(self.symbols.lock().clone())
    }

    fn set_symbols(&self, symbols: Vec<RoleSymbol>) -> Result<(), CollaboratorError> {
        *self.symbols.lock() = symbols;
        Ok(())
    }
}

/// Indicator panel held in memory
#[derive(Debug, Default)]
pub struct FakeIndicatorStore {
    indicators: Mutex<Vec<Indicator>>,
}

impl FakeIndicatorStore {
    pub fn new(indicators: Vec<Indicator>) -> Self {
        Self {
            indicators: Mutex::new(indicators),
        }
    }
}

impl IndicatorStore for FakeIndicatorStore {
    fn all_indicators(&self) -> Result<Vec<Indicator>, CollaboratorError> {
        Ok(self.indicators.lock().clone())
    }
}

/// Legacy restorer that records what it was given
#[derive(Debug, Default)]
pub struct RecordingRestorer {
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingRestorer {
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl IndicatorRestorer for RecordingRestorer {
    async fn restore_indicators(
        &self,
        elements: &[IndicatorElement],
    ) -> Result<usize, CollaboratorError> {
        self.calls
            .lock()
            .push(elements.iter().map(|e| e.id.clone()).collect());
        Ok(elements.len())
    }
}

/// Handles to every fake behind one [`Collaborators`] set
#[derive(Debug, Clone)]
pub struct FakeWorkspace {
    pub graph: Arc<FakeGraphEngine>,
    pub matrix: Arc<FakeMatrixStore>,
    pub roles: Arc<FakeRoleStore>,
    pub indicators: Arc<FakeIndicatorStore>,
}

impl FakeWorkspace {
    /// Workspace with nothing in it
    pub fn empty() -> Self {
        Self {
            graph: Arc::new(FakeGraphEngine::new()),
            matrix: Arc::new(FakeMatrixStore::default()),
            roles: Arc::new(FakeRoleStore::default()),
            indicators: Arc::new(FakeIndicatorStore::default()),
        }
    }

    /// Workspace populated with the sample project
    pub fn sample() -> Self {
        let (roles, matrix) = sample_matrix();
        Self {
            graph: Arc::new(sample_graph()),
            matrix: Arc::new(FakeMatrixStore::new(roles, matrix)),
            roles: Arc::new(FakeRoleStore::new(sample_role_symbols())),
            indicators: Arc::new(FakeIndicatorStore::new(vec![
                Indicator::new("ind-1", "Lead time").with_element("PPI_1"),
                Indicator::new("ind-2", "Approval rate").with_element("PPI_2"),
            ])),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators::new()
            .with_graph(self.graph.clone())
            .with_matrix(self.matrix.clone())
            .with_role_symbols(self.roles.clone())
            .with_indicators(self.indicators.clone())
    }
}

/// Process nodes of [`SAMPLE_PROCESS_XML`] plus two indicators and a role
pub fn sample_graph() -> FakeGraphEngine {
    FakeGraphEngine::new()
        .with_document(SAMPLE_PROCESS_XML)
        .with_node(GraphNode::new("StartEvent_1", "bpmn:StartEvent"))
        .with_node(GraphNode::new("Task_1", "bpmn:Task").with_name("Review request"))
        .with_node(GraphNode::new("Task_2", "bpmn:UserTask").with_name("Approve request"))
        .with_node(GraphNode::new("EndEvent_1", "bpmn:EndEvent"))
        .with_node(
            GraphNode::new("PPI_1", "PPINOT:Ppi")
                .with_name("Lead time")
                .with_bounds(Bounds::new(400.0, 80.0, 160.0, 120.0)),
        )
        .with_node(
            GraphNode::new("Target_1", "PPINOT:Target")
                .with_name("< 2 days")
                .with_bounds(Bounds::new(410.0, 90.0, 25.0, 25.0))
                .with_parent("PPI_1"),
        )
        .with_node(GraphNode::new("Target_1_label", "label").with_parent("PPI_1"))
        .with_node(
            GraphNode::new("Scope_1", "PPINOT:Scope")
                .with_bounds(Bounds::new(440.0, 90.0, 25.0, 25.0))
                .with_parent("PPI_1"),
        )
        .with_node(
            GraphNode::new("PPI_2", "PPINOT:Ppi")
                .with_name("Approval rate")
                .with_bounds(Bounds::new(600.0, 80.0, 160.0, 120.0)),
        )
        .with_node(
            GraphNode::new("Measure_2", "PPINOT:AggregatedMeasure")
                .with_name("Approved / total")
                .with_bounds(Bounds::new(610.0, 130.0, 60.0, 40.0))
                .with_parent("PPI_2"),
        )
        .with_node(
            GraphNode::new("Role_1", "RALph:RoleRALph")
                .with_name("Analyst")
                .with_bounds(Bounds::new(100.0, 300.0, 50.0, 50.0)),
        )
}

/// Valid roles and matrix over the sample tasks
pub fn sample_matrix() -> (Vec<String>, ResponsibilityMatrix) {
    let roles = vec!["Analyst".to_owned(), "Manager".to_owned(), "Developer".to_owned()];
    let matrix = ResponsibilityMatrix::new()
        .with("Task_1", "Analyst", Responsibility::Responsible)
        .with("Task_1", "Manager", Responsibility::Accountable)
        .with("Task_2", "Developer", Responsibility::Responsible)
        .with("Task_2", "Manager", Responsibility::Accountable)
        .with("Task_2", "Analyst", Responsibility::Consulted);
    (roles, matrix)
}

/// Organizational role symbols matching the sample graph
pub fn sample_role_symbols() -> Vec<RoleSymbol> {
    vec![
        RoleSymbol::new("Role_1", "Analyst")
            .drawn_as("RALph:RoleRALph", Bounds::new(100.0, 300.0, 50.0, 50.0)),
        RoleSymbol::new("Role_2", "Manager"),
    ]
}
