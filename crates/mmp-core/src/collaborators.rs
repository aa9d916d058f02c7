//! Live editor collaborators
//!
//! Capture and restoration talk to four editors through these traits:
//! - [`GraphEngine`]: process graph document plus its element registry
//! - [`IndicatorStore`]: the indicator panel
//! - [`MatrixStore`]: roles and responsibility matrix
//! - [`RoleSymbolStore`]: organizational role symbols
//!
//! [`IndicatorRestorer`] is an optional extra path used only for snapshots
//! in the legacy schema. All of them are injected through [`Collaborators`].

use crate::error::CollaboratorError;
use crate::model::{GraphNode, Indicator, IndicatorElement, ResponsibilityMatrix, RoleSymbol};
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;

/// Process graph engine
#[async_trait]
pub trait GraphEngine: Send + Sync {
    /// Serialize the current graph
    async fn export_document(&self) -> Result<String, CollaboratorError>;

    /// Replace the current graph with `document`
    async fn import_document(&self, document: &str) -> Result<(), CollaboratorError>;

    /// All registered nodes in discovery order
    fn elements(&self) -> Result<Vec<GraphNode>, CollaboratorError>;

    /// Look up one node
    fn element(&self, id: &str) -> Option<GraphNode>;

    /// Create a shape on the canvas, attached to `node.parent_id()` when set
    fn create_shape(&self, node: GraphNode) -> Result<(), CollaboratorError>;
}

/// Indicator panel
pub trait IndicatorStore: Send + Sync {
    /// Every indicator the panel knows about
    fn all_indicators(&self) -> Result<Vec<Indicator>, CollaboratorError>;
}

/// Roles and responsibility matrix
#[cfg_attr(test, mockall::automock)]
pub trait MatrixStore: Send + Sync {
    /// Declared roles
    fn roles(&self) -> Result<Vec<String>, CollaboratorError>;

    /// Replace declared roles
    fn set_roles(&self, roles: Vec<String>) -> Result<(), CollaboratorError>;

    /// Current assignments
    fn matrix(&self) -> Result<ResponsibilityMatrix, CollaboratorError>;

    /// Replace assignments
    fn set_matrix(&self, matrix: ResponsibilityMatrix) -> Result<(), CollaboratorError>;
}

/// Organizational role symbols
#[cfg_attr(test, mockall::automock)]
pub trait RoleSymbolStore: Send + Sync {
    /// Current symbols
    fn symbols(&self) -> Result<Vec<RoleSymbol>, CollaboratorError>;

    /// Replace symbols
    fn set_symbols(&self, symbols: Vec<RoleSymbol>) -> Result<(), CollaboratorError>;
}

/// Restoration path for indicator elements saved in the legacy schema
#[async_trait]
pub trait IndicatorRestorer: Send + Sync {
    /// Recreate `elements`, returning how many were restored
    async fn restore_indicators(
        &self,
        elements: &[IndicatorElement],
    ) -> Result<usize, CollaboratorError>;
}

/// Typed set of collaborators; any of them may be absent
#[derive(Clone, Default)]
pub struct Collaborators {
    graph: Option<Arc<dyn GraphEngine>>,
    indicators: Option<Arc<dyn IndicatorStore>>,
    matrix: Option<Arc<dyn MatrixStore>>,
    role_symbols: Option<Arc<dyn RoleSymbolStore>>,
    indicator_restorer: Option<Arc<dyn IndicatorRestorer>>,
}

impl Collaborators {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set graph engine
    #[must_use]
    pub fn with_graph(mut self, graph: Arc<dyn GraphEngine>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Set indicator panel
    #[must_use]
    pub fn with_indicators(mut self, indicators: Arc<dyn IndicatorStore>) -> Self {
        self.indicators = Some(indicators);
        self
    }

    /// Set matrix store
    #[must_use]
    pub fn with_matrix(mut self, matrix: Arc<dyn MatrixStore>) -> Self {
        self.matrix = Some(matrix);
        self
    }

    /// Set organizational role store
    #[must_use]
    pub fn with_role_symbols(mut self, role_symbols: Arc<dyn RoleSymbolStore>) -> Self {
        self.role_symbols = Some(role_symbols);
        self
    }

    /// Set legacy indicator restorer
    #[must_use]
    pub fn with_indicator_restorer(mut self, restorer: Arc<dyn IndicatorRestorer>) -> Self {
        self.indicator_restorer = Some(restorer);
        self
    }

    /// Graph engine, if registered
    #[inline]
    #[must_use]
    pub fn graph(&self) -> Option<&dyn GraphEngine> {
        self.graph.as_deref()
    }

    /// Indicator panel, if registered
    #[inline]
    #[must_use]
    pub fn indicators(&self) -> Option<&dyn IndicatorStore> {
        self.indicators.as_deref()
    }

    /// Matrix store, if registered
    #[inline]
    #[must_use]
    pub fn matrix(&self) -> Option<&dyn MatrixStore> {
        self.matrix.as_deref()
    }

    /// Organizational role store, if registered
    #[inline]
    #[must_use]
    pub fn role_symbols(&self) -> Option<&dyn RoleSymbolStore> {
        self.role_symbols.as_deref()
    }

    /// Legacy indicator restorer, if registered
    #[inline]
    #[must_use]
    pub fn indicator_restorer(&self) -> Option<&dyn IndicatorRestorer> {
        self.indicator_restorer.as_deref()
    }
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators")
            .field("graph", &self.graph.is_some())
            .field("indicators", &self.indicators.is_some())
            .field("matrix", &self.matrix.is_some())
            .field("role_symbols", &self.role_symbols.is_some())
            .field("indicator_restorer", &self.indicator_restorer.is_some())
            .finish()
    }
}
