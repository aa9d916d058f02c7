//! Validation findings
//!
//! Findings are advisory values. Nothing in this crate returns an error for
//! an invalid project; the report says what is wrong.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::fmt;

/// How bad a finding is
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Makes the project invalid
    Critical,
    /// Worth fixing, does not invalidate
    Warning,
}

/// Machine-readable finding kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FindingCode {
    /// Task row without an `R`
    NoResponsible,
    /// Task row with more than one `R`
    MultipleResponsible,
    /// Task row without an `A`
    NoAccountable,
    /// Task row with more than one `A`
    MultipleAccountable,
    /// Task row with declared roles but no assignment at all
    EmptyTaskRow,
    /// Cell holding more than two letters or a repeated letter
    InvalidCombination,
    /// Cell giving one role both `R` and `A`
    BindingOfDuties,
    /// Matrix uses a role missing from the declared list
    UndeclaredRole,
    /// Support-only role missing from the organizational roles
    SupportRoleNotInOrganization,
    /// Role name too generic to identify anyone
    GenericRoleName,
    /// Flow cycle with an exit to an end event
    Cycle,
    /// Flow cycle from which no end event is reachable
    TrappingCycle,
    /// No start event
    MissingStartEvent,
    /// No end event
    MissingEndEvent,
    /// Graph document could not be read
    UnreadableDocument,
    /// Indicator child whose principal is not present
    DanglingIndicatorParent,
    /// Panel indicator not drawn on the live graph
    IndicatorWithoutElement,
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// Severity
    pub severity: Severity,
    /// Kind
    pub code: FindingCode,
    /// Element, task or role the finding is about
    pub subject: String,
    /// Human-readable message
    pub message: String,
}

impl Finding {
    /// Critical finding
    #[must_use]
    pub fn critical(code: FindingCode, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Critical,
            code,
            subject: subject.into(),
            message: message.into(),
        }
    }

    /// Warning finding
    #[must_use]
    pub fn warning(code: FindingCode, subject: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            subject: subject.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// `{is_valid, errors, warnings}` report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Critical findings
    pub errors: Vec<Finding>,
    /// Warnings
    pub warnings: Vec<Finding>,
}

impl ValidationReport {
    /// Empty, valid report
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Valid when there are no critical findings
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// File a finding by severity
    pub fn push(&mut self, finding: Finding) {
        match finding.severity {
            Severity::Critical => self.errors.push(finding),
            Severity::Warning => self.warnings.push(finding),
        }
    }

    /// Append every finding of `other`
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Whether any finding has `code`
    #[must_use]
    pub fn has(&self, code: FindingCode) -> bool {
        self.findings().any(|f| f.code == code)
    }

    /// Errors then warnings
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

impl Serialize for ValidationReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationReport", 3)?;
        state.serialize_field("is_valid", &self.is_valid())?;
        state.serialize_field("errors", &self.errors)?;
        state.serialize_field("warnings", &self.warnings)?;
        state.end()
    }
}
