//! MMP Validation - structural and cross-notation checks
//!
//! Pure checkers over a multi-notation project:
//! - [`graph`]: flow cycles, trapping cycles and element counts of the
//!   process document
//! - [`matrix`]: responsibility matrix business rules
//! - [`container`]: shape and cross-references of a raw project container
//! - [`live`]: indicators, matrix and graph checked against each other
//!
//! Findings never block a save or a restore; they are returned as a
//! [`ValidationReport`].
//!
//! # Example
//!
//! ```rust,ignore
//! use mmp_validation::prelude::*;
//!
//! let report = check_graph(&document);
//! if !report.is_valid() {
//!     for finding in &report.errors {
//!         eprintln!("{finding}");
//!     }
//! }
//! ```

#![warn(unreachable_pub)]

pub mod container;
pub mod graph;
pub mod live;
pub mod matrix;
pub mod report;

pub use container::{
    detect_format, validate_project, validate_project_str, ContainerFormat, ContainerReport,
};
pub use graph::{
    analyze, check_graph, extract_flows, find_cycles, scan_document, Cycle, DocumentScan,
    FlowEdge, FlowElement, FlowElementKind, GraphAnalysis, GraphStats, ScanMode,
};
pub use live::{check_snapshot, validate_live};
pub use matrix::{check_matrix, prune_orphans, MatrixCheck, MatrixCheckOptions, OrphanPolicy};
pub use report::{Finding, FindingCode, Severity, ValidationReport};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running the checkers
    pub use crate::{
        check_graph, check_matrix, check_snapshot, validate_live, validate_project,
        MatrixCheckOptions, ValidationReport,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
