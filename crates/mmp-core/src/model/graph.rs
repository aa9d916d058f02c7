//! Live graph nodes and organizational role symbols

use super::indicator::{Bounds, IndicatorKind};
use serde::{Deserialize, Serialize};

/// Type-name prefix of organizational role symbols, compared case-insensitively
pub const ORG_ROLE_NAMESPACE: &str = "ralph:";

/// Classification of a live graph node, derived once from its type name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ElementKind {
    /// Indicator-notation element with a structural role
    Indicator(IndicatorKind),
    /// Organizational role symbol
    OrganizationalRole,
    /// Process element (`bpmn:*`)
    Process,
    /// Text label attached to another element
    Label,
    /// Anything else
    Other,
}

impl ElementKind {
    /// Classify a node from its type name and id
    #[must_use]
    pub fn classify(type_name: &str, id: &str) -> Self {
        if type_name.eq_ignore_ascii_case("label") || id.ends_with("_label") {
            return Self::Label;
        }
        if let Some(kind) = IndicatorKind::from_type_name(type_name) {
            return Self::Indicator(kind);
        }
        let lower = type_name.to_ascii_lowercase();
        if lower.starts_with(ORG_ROLE_NAMESPACE) {
            Self::OrganizationalRole
        } else if lower.starts_with("bpmn:") {
            Self::Process
        } else {
            Self::Other
        }
    }
}

/// Node as reported by the graph engine's element registry
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    id: String,
    type_name: String,
    kind: ElementKind,
    name: Option<String>,
    bounds: Bounds,
    parent_id: Option<String>,
}

impl GraphNode {
    /// Create a node, classifying it from `type_name`
    #[must_use]
    pub fn new(id: impl Into<String>, type_name: impl Into<String>) -> Self {
        let id = id.into();
        let type_name = type_name.into();
        let kind = ElementKind::classify(&type_name, &id);
        Self {
            id,
            type_name,
            kind,
            name: None,
            bounds: Bounds::default(),
            parent_id: None,
        }
    }

    /// Set display name
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set canvas bounds
    #[must_use]
    pub fn with_bounds(mut self, bounds: Bounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Set owning element
    #[must_use]
    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    /// Element id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Raw type name, e.g. `bpmn:Task`
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Derived classification
    #[inline]
    #[must_use]
    pub fn kind(&self) -> &ElementKind {
        &self.kind
    }

    /// Display name, if set
    #[inline]
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Canvas bounds
    #[inline]
    #[must_use]
    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    /// Owning element, if any
    #[inline]
    #[must_use]
    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Indicator role, if this node belongs to the indicator notation
    #[must_use]
    pub fn indicator_kind(&self) -> Option<IndicatorKind> {
        match self.kind {
            ElementKind::Indicator(kind) => Some(kind),
            _ => None,
        }
    }

    /// Whether the node is a process activity a responsibility row can refer to
    #[must_use]
    pub fn is_process_task(&self) -> bool {
        if self.kind != ElementKind::Process {
            return false;
        }
        let local = self
            .type_name
            .split_once(':')
            .map_or(self.type_name.as_str(), |(_, local)| local);
        local == "Task"
            || local.ends_with("Task")
            || local == "CallActivity"
            || local == "SubProcess"
    }
}

/// Organizational role symbol as persisted in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleSymbol {
    /// Symbol id
    pub id: String,
    /// Role name
    #[serde(default)]
    pub name: String,
    /// Graph type name, when the symbol is drawn on the canvas
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
    /// Canvas position, when drawn
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Bounds>,
}

impl RoleSymbol {
    /// Create a symbol that lives only in the role store
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            type_name: None,
            position: None,
        }
    }

    /// Mark the symbol as drawn on the canvas
    #[must_use]
    pub fn drawn_as(mut self, type_name: impl Into<String>, position: Bounds) -> Self {
        self.type_name = Some(type_name.into());
        self.position = Some(position);
        self
    }

    /// Whether the symbol must be recreated as a shape on restore
    #[must_use]
    pub fn is_drawable(&self) -> bool {
        self.position.is_some()
            && self
                .type_name
                .as_deref()
                .is_some_and(|t| t.to_ascii_lowercase().starts_with(ORG_ROLE_NAMESPACE))
    }

    /// Build the symbol from a canvas node
    #[must_use]
    pub fn from_node(node: &GraphNode) -> Self {
        Self {
            id: node.id().to_owned(),
            name: node.name().unwrap_or(node.id()).to_owned(),
            type_name: Some(node.type_name().to_owned()),
            position: Some(node.bounds()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_by_namespace() {
        assert_eq!(
            ElementKind::classify("PPINOT:Ppi", "PPI_1"),
            ElementKind::Indicator(IndicatorKind::Principal)
        );
        assert_eq!(
            ElementKind::classify("RALph:Person", "P_1"),
            ElementKind::OrganizationalRole
        );
        assert_eq!(ElementKind::classify("bpmn:UserTask", "T"), ElementKind::Process);
        assert_eq!(
            ElementKind::classify("PPINOT:Target", "Target_1_label"),
            ElementKind::Label
        );
        assert_eq!(ElementKind::classify("custom", "x"), ElementKind::Other);
    }

    #[test]
    fn task_detection() {
        assert!(GraphNode::new("a", "bpmn:Task").is_process_task());
        assert!(GraphNode::new("b", "bpmn:UserTask").is_process_task());
        assert!(!GraphNode::new("c", "bpmn:StartEvent").is_process_task());
        assert!(!GraphNode::new("d", "PPINOT:Ppi").is_process_task());
    }

    #[test]
    fn only_positioned_org_symbols_are_drawable() {
        let plain = RoleSymbol::new("r1", "Analyst");
        assert!(!plain.is_drawable());
        let drawn = plain.drawn_as("RALph:RoleRALph", Bounds::new(0.0, 0.0, 40.0, 40.0));
        assert!(drawn.is_drawable());
        let other = RoleSymbol::new("r2", "x").drawn_as("bpmn:Task", Bounds::default());
        assert!(!other.is_drawable());
    }
}
