//! Functional tests for the responsibility matrix rules.
//!
//! Exactly one `R` and exactly one `A` per task row; everything else is a
//! warning at most.

use mmp_core::{Responsibility, ResponsibilityMatrix};
use mmp_test_utils::sample_matrix;
use mmp_validation::{check_matrix, FindingCode, MatrixCheckOptions, Severity};
use pretty_assertions::assert_eq;

fn declared(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| (*n).to_owned()).collect()
}

/// Tenet: a row without `R` is invalid and says so.
#[test]
fn missing_responsible_is_critical() {
    let matrix = ResponsibilityMatrix::new()
        .with("Task_1", "Manager", Responsibility::Accountable)
        .with("Task_1", "Developer", Responsibility::Consulted);
    let check = check_matrix(
        &declared(&["Manager", "Developer"]),
        &matrix,
        &MatrixCheckOptions::strict(),
    );

    assert!(!check.report.is_valid());
    assert_eq!(check.report.errors.len(), 1);
    let finding = &check.report.errors[0];
    assert_eq!(finding.code, FindingCode::NoResponsible);
    assert_eq!(finding.severity, Severity::Critical);
    assert!(finding.message.contains("no responsible"));
}

/// Tenet: two `A` cells on one row are invalid.
#[test]
fn multiple_accountable_is_critical() {
    let matrix = ResponsibilityMatrix::new()
        .with("Task_1", "Manager", Responsibility::Accountable)
        .with("Task_1", "Developer", Responsibility::Accountable);
    let check = check_matrix(
        &declared(&["Manager", "Developer"]),
        &matrix,
        &MatrixCheckOptions::strict(),
    );

    assert!(!check.report.is_valid());
    assert!(check.report.has(FindingCode::MultipleAccountable));
    assert!(check
        .report
        .errors
        .iter()
        .any(|f| f.message.contains("multiple accountable")));
}

/// Tenet: a row without `A` is invalid.
#[test]
fn missing_accountable_is_critical() {
    let matrix = ResponsibilityMatrix::new().with("Task_1", "Developer", Responsibility::Responsible);
    let check = check_matrix(&declared(&["Developer"]), &matrix, &MatrixCheckOptions::strict());
    let codes: Vec<_> = check.report.errors.iter().map(|f| f.code).collect();
    assert_eq!(codes, vec![FindingCode::NoAccountable]);
}

/// Tenet: the shared sample matrix is valid as-is.
#[test]
fn sample_matrix_is_valid() {
    let (roles, matrix) = sample_matrix();
    let options = MatrixCheckOptions::pruning(["Task_1", "Task_2"])
        .with_organizational_roles(["Analyst", "Manager"]);
    let check = check_matrix(&roles, &matrix, &options);
    assert!(check.report.is_valid(), "{:?}", check.report.errors);
    assert!(check.report.warnings.is_empty());
    assert_eq!(check.checked_tasks, 2);
}

/// Tenet: orphan pruning hides rows for deleted tasks; strict mode does not.
#[test]
fn orphan_rows_only_count_in_strict_mode() {
    let (roles, mut matrix) = sample_matrix();
    matrix.assign("Task_deleted", "Analyst", Responsibility::Informed);

    let pruned = check_matrix(&roles, &matrix, &MatrixCheckOptions::pruning(["Task_1", "Task_2"]));
    assert!(pruned.report.is_valid());
    assert_eq!(pruned.pruned_tasks, vec!["Task_deleted".to_string()]);

    let strict = check_matrix(&roles, &matrix, &MatrixCheckOptions::strict());
    assert!(!strict.report.is_valid());
    assert!(strict.report.errors.iter().all(|f| f.subject == "Task_deleted"));
}
