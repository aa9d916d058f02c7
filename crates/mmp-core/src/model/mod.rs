//! Data model shared by capture, storage, restoration and validation
//!
//! - [`indicator`]: indicator elements and their structural roles
//! - [`matrix`]: the task × role responsibility matrix
//! - [`graph`]: live graph nodes and organizational role symbols
//! - [`snapshot`]: the persisted project snapshot and legacy layout

pub mod graph;
pub mod indicator;
pub mod matrix;
pub mod snapshot;

pub use graph::{ElementKind, GraphNode, RoleSymbol, ORG_ROLE_NAMESPACE};
pub use indicator::{
    Bounds, Indicator, IndicatorElement, IndicatorKind, MeasureKind, INDICATOR_NAMESPACE,
};
pub use matrix::{Assignment, InvalidAssignment, Responsibility, ResponsibilityMatrix};
pub use snapshot::{
    LegacyProjectValue, ProjectSnapshot, SchemaVersion, CURRENT_SCHEMA_VERSION,
    LEGACY_SCHEMA_VERSION,
};
