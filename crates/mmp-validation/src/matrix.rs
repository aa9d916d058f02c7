//! Responsibility matrix rules
//!
//! Every task row needs exactly one `R` and exactly one `A`, counting
//! combination cells such as `RA` towards both. A cell repeating `A` is as
//! bad as two `A` cells. Roles used in a row must be declared. The remaining
//! rules only warn:
//! - a row with no assignment at all, once per declared role
//! - a cell with more than two letters or a repeated letter
//! - a cell giving one role both `R` and `A` (binding of duties)
//! - a role used solely as `S` that the organizational model does not know
//! - a role name too generic to identify anyone

use crate::report::{Finding, FindingCode, ValidationReport};
use mmp_core::{Assignment, Responsibility, ResponsibilityMatrix};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

const GENERIC_ROLE_NAMES: &[&str] = &[
    "usuario",
    "persona",
    "técnico",
    "empleado",
    "staff",
    "personal",
    "user",
    "person",
    "technician",
    "employee",
    "worker",
    "member",
];

/// What to do with rows whose task is not on the live graph
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum OrphanPolicy {
    /// Check every row as given
    #[default]
    Strict,
    /// Drop rows whose task id is not in the set before checking
    Prune(HashSet<String>),
}

/// Inputs beyond the roles and the matrix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixCheckOptions {
    /// Orphan row handling
    pub orphans: OrphanPolicy,
    /// Roles known to the organizational model; empty disables the support rule
    pub organizational_roles: Vec<String>,
}

impl MatrixCheckOptions {
    /// Strict mode, no organizational roles
    #[inline]
    #[must_use]
    pub fn strict() -> Self {
        Self::default()
    }

    /// Prune rows for tasks not in `live_tasks`
    #[must_use]
    pub fn pruning<I, S>(live_tasks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            orphans: OrphanPolicy::Prune(live_tasks.into_iter().map(Into::into).collect()),
            organizational_roles: Vec::new(),
        }
    }

    /// Set the organizational roles
    #[must_use]
    pub fn with_organizational_roles<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.organizational_roles = roles.into_iter().map(Into::into).collect();
        self
    }
}

/// Outcome of [`check_matrix`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatrixCheck {
    /// Findings
    pub report: ValidationReport,
    /// Rows dropped as orphans, in task-id order
    pub pruned_tasks: Vec<String>,
    /// Rows that were checked
    pub checked_tasks: usize,
}

/// Copy of `matrix` without rows whose task is not in `live_tasks`
#[must_use]
pub fn prune_orphans(
    matrix: &ResponsibilityMatrix,
    live_tasks: &HashSet<String>,
) -> (ResponsibilityMatrix, Vec<String>) {
    let pruned: Vec<String> = matrix
        .task_ids()
        .filter(|task| !live_tasks.contains(*task))
        .map(str::to_owned)
        .collect();
    let mut kept = matrix.clone();
    kept.retain_tasks(|task| live_tasks.contains(task));
    (kept, pruned)
}

/// Check `matrix` against the declared `roles`
#[must_use]
pub fn check_matrix(
    roles: &[String],
    matrix: &ResponsibilityMatrix,
    options: &MatrixCheckOptions,
) -> MatrixCheck {
    let mut check = MatrixCheck::default();
    if roles.is_empty() || matrix.is_empty() {
        debug!("no roles or no rows, nothing to check");
        return check;
    }

    let (matrix, pruned) = match &options.orphans {
        OrphanPolicy::Strict => (matrix.clone(), Vec::new()),
        OrphanPolicy::Prune(live) => prune_orphans(matrix, live),
    };
    if !pruned.is_empty() {
        debug!(count = pruned.len(), "pruned orphan rows");
    }
    check.pruned_tasks = pruned;
    check.checked_tasks = matrix.len();

    let declared: HashSet<&str> = roles.iter().map(String::as_str).collect();
    let report = &mut check.report;
    for (task, row) in matrix.rows() {
        check_row(task, row, roles, &declared, report);
    }
    check_support_roles(&matrix, &options.organizational_roles, report);
    check_role_names(roles, report);
    check
}

fn check_row(
    task: &str,
    row: &BTreeMap<String, Assignment>,
    roles: &[String],
    declared: &HashSet<&str>,
    report: &mut ValidationReport,
) {
    if row.is_empty() {
        for role in roles {
            report.push(Finding::warning(
                FindingCode::EmptyTaskRow,
                task,
                format!("task '{task}' has nothing assigned to role '{role}'"),
            ));
        }
    }

    let holders = |wanted: Responsibility| {
        row.iter()
            .filter(|(_, cell)| cell.contains(wanted))
            .map(|(role, _)| role.as_str())
            .collect::<Vec<_>>()
    };
    let responsible = holders(Responsibility::Responsible);
    let accountable = holders(Responsibility::Accountable);

    match responsible.len() {
        0 => report.push(Finding::critical(
            FindingCode::NoResponsible,
            task,
            format!("task '{task}' has no responsible role (R)"),
        )),
        1 => {}
        _ => report.push(Finding::critical(
            FindingCode::MultipleResponsible,
            task,
            format!(
                "task '{task}' has multiple responsible roles ({})",
                responsible.join(", ")
            ),
        )),
    }
    match accountable.len() {
        0 => report.push(Finding::critical(
            FindingCode::NoAccountable,
            task,
            format!("task '{task}' has no accountable role (A)"),
        )),
        1 => {}
        _ => report.push(Finding::critical(
            FindingCode::MultipleAccountable,
            task,
            format!(
                "task '{task}' has multiple accountable roles ({})",
                accountable.join(", ")
            ),
        )),
    }

    for role in row.keys().filter(|role| !declared.contains(role.as_str())) {
        report.push(Finding::critical(
            FindingCode::UndeclaredRole,
            role.as_str(),
            format!("task '{task}' assigns undeclared role '{role}'"),
        ));
    }

    for (role, cell) in row {
        check_cell(task, role, *cell, report);
    }
}

fn check_cell(task: &str, role: &str, cell: Assignment, report: &mut ValidationReport) {
    if !cell.is_valid_combination() {
        report.push(Finding::warning(
            FindingCode::InvalidCombination,
            role,
            format!("role '{role}' holds '{cell}' in task '{task}'; check that the combination is intended"),
        ));
    }
    if cell.is_repeated(Responsibility::Accountable) {
        report.push(Finding::critical(
            FindingCode::MultipleAccountable,
            role,
            format!("role '{role}' holds multiple accountable letters in task '{task}' ({cell})"),
        ));
    }
    if cell.binds_duties() {
        report.push(Finding::warning(
            FindingCode::BindingOfDuties,
            role,
            format!("role '{role}' is both responsible and accountable in task '{task}'"),
        ));
    }
}

fn check_support_roles(
    matrix: &ResponsibilityMatrix,
    organizational_roles: &[String],
    report: &mut ValidationReport,
) {
    if organizational_roles.is_empty() {
        return;
    }
    let mut usage: BTreeMap<&str, bool> = BTreeMap::new();
    for (_, row) in matrix.rows() {
        for (role, cell) in row {
            let only_support = usage.entry(role.as_str()).or_insert(true);
            *only_support &= cell.is_only(Responsibility::Support);
        }
    }
    for (role, only_support) in usage {
        if only_support && !organizational_roles.iter().any(|known| known == role) {
            report.push(Finding::warning(
                FindingCode::SupportRoleNotInOrganization,
                role,
                format!(
                    "support role '{role}' is not defined in the organizational model ({})",
                    organizational_roles.join(", ")
                ),
            ));
        }
    }
}

fn check_role_names(roles: &[String], report: &mut ValidationReport) {
    for role in roles {
        let lower = role.to_lowercase();
        if GENERIC_ROLE_NAMES.iter().any(|generic| lower.contains(generic)) {
            report.push(Finding::warning(
                FindingCode::GenericRoleName,
                role.as_str(),
                format!("role '{role}' is too generic; name the concrete position"),
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use mmp_core::Responsibility::{Accountable, Consulted, Responsible, Support};

    fn roles(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| (*n).to_owned()).collect()
    }

    #[test]
    fn well_formed_row_is_valid() {
        let matrix = ResponsibilityMatrix::new()
            .with("T", "Dev", Responsible)
            .with("T", "Lead", Accountable)
            .with("T", "Ops", Consulted);
        let check = check_matrix(&roles(&["Dev", "Lead", "Ops"]), &matrix, &MatrixCheckOptions::strict());
        assert!(check.report.is_valid(), "{:?}", check.report.errors);
        assert_eq!(check.checked_tasks, 1);
    }

    #[test]
    fn empty_inputs_are_valid() {
        let matrix = ResponsibilityMatrix::new().with("T", "Dev", Consulted);
        assert!(check_matrix(&[], &matrix, &MatrixCheckOptions::strict()).report.is_valid());
        let empty = ResponsibilityMatrix::new();
        assert!(check_matrix(&roles(&["Dev"]), &empty, &MatrixCheckOptions::strict())
            .report
            .is_valid());
    }

    #[test]
    fn multiple_responsible_is_critical() {
        let matrix = ResponsibilityMatrix::new()
            .with("T", "Dev", Responsible)
            .with("T", "Ops", Responsible)
            .with("T", "Lead", Accountable);
        let check = check_matrix(&roles(&["Dev", "Ops", "Lead"]), &matrix, &MatrixCheckOptions::strict());
        assert!(check.report.has(FindingCode::MultipleResponsible));
        assert!(check.report.errors[0].message.contains("Dev, Ops"));
    }

    #[test]
    fn combination_cell_counts_for_both_letters() {
        let matrix = ResponsibilityMatrix::new()
            .with("T", "Dev", Assignment::from(Responsible).with(Accountable))
            .with("T", "Ops", Consulted);
        let check = check_matrix(&roles(&["Dev", "Ops"]), &matrix, &MatrixCheckOptions::strict());
        assert!(check.report.is_valid(), "{:?}", check.report.errors);
        let codes: Vec<_> = check.report.warnings.iter().map(|f| f.code).collect();
        assert_eq!(codes, vec![FindingCode::BindingOfDuties]);
        assert_eq!(check.report.warnings[0].subject, "Dev");
    }

    #[test]
    fn oversized_or_repeated_cells_are_flagged() {
        let three = Assignment::from(Responsible).with(Support).with(Consulted);
        let twice_accountable = Assignment::from(Accountable).with(Accountable);
        let matrix = ResponsibilityMatrix::new()
            .with("T", "Dev", three)
            .with("T", "Lead", twice_accountable);
        let check = check_matrix(&roles(&["Dev", "Lead"]), &matrix, &MatrixCheckOptions::strict());

        let invalid: Vec<&str> = check
            .report
            .warnings
            .iter()
            .filter(|f| f.code == FindingCode::InvalidCombination)
            .map(|f| f.subject.as_str())
            .collect();
        assert_eq!(invalid, vec!["Dev", "Lead"]);
        let critical: Vec<_> = check.report.errors.iter().map(|f| f.code).collect();
        assert_eq!(critical, vec![FindingCode::MultipleAccountable]);
        assert!(check.report.errors[0].message.contains("AA"));
    }

    #[test]
    fn undeclared_role_is_critical() {
        let matrix = ResponsibilityMatrix::new()
            .with("T", "Dev", Responsible)
            .with("T", "Ghost", Accountable);
        let check = check_matrix(&roles(&["Dev"]), &matrix, &MatrixCheckOptions::strict());
        let codes: Vec<_> = check.report.errors.iter().map(|f| f.code).collect();
        assert_eq!(codes, vec![FindingCode::UndeclaredRole]);
    }

    #[test]
    fn empty_row_warns_per_role() {
        let mut matrix = ResponsibilityMatrix::new();
        matrix.add_task("T");
        let check = check_matrix(&roles(&["Dev", "Lead"]), &matrix, &MatrixCheckOptions::strict());
        let empty_warnings = check
            .report
            .warnings
            .iter()
            .filter(|f| f.code == FindingCode::EmptyTaskRow)
            .count();
        assert_eq!(empty_warnings, 2);
        assert!(check.report.has(FindingCode::NoResponsible));
    }

    #[test]
    fn support_only_role_outside_organization_warns() {
        let matrix = ResponsibilityMatrix::new()
            .with("T", "Dev", Responsible)
            .with("T", "Lead", Accountable)
            .with("T", "Helper", Support);
        let options = MatrixCheckOptions::strict().with_organizational_roles(["Dev", "Lead"]);
        let check = check_matrix(&roles(&["Dev", "Lead", "Helper"]), &matrix, &options);
        assert!(check.report.is_valid());
        assert_eq!(check.report.warnings.len(), 1);
        assert_eq!(check.report.warnings[0].code, FindingCode::SupportRoleNotInOrganization);
        assert_eq!(check.report.warnings[0].subject, "Helper");
    }

    #[test]
    fn generic_role_names_warn() {
        let matrix = ResponsibilityMatrix::new()
            .with("T", "Staff member", Responsible)
            .with("T", "CFO", Accountable);
        let check = check_matrix(&roles(&["Staff member", "CFO"]), &matrix, &MatrixCheckOptions::strict());
        assert!(check.report.is_valid());
        assert!(check.report.has(FindingCode::GenericRoleName));
        assert_eq!(check.report.warnings.len(), 1);
    }

    #[test]
    fn pruning_drops_rows_for_missing_tasks() {
        let matrix = ResponsibilityMatrix::new()
            .with("Live", "Dev", Responsible)
            .with("Live", "Lead", Accountable)
            .with("Gone", "Dev", Consulted);
        let check = check_matrix(
            &roles(&["Dev", "Lead"]),
            &matrix,
            &MatrixCheckOptions::pruning(["Live"]),
        );
        assert!(check.report.is_valid());
        assert_eq!(check.pruned_tasks, vec!["Gone".to_string()]);
        assert_eq!(check.checked_tasks, 1);

        let strict = check_matrix(&roles(&["Dev", "Lead"]), &matrix, &MatrixCheckOptions::strict());
        assert!(!strict.report.is_valid());
    }
}
