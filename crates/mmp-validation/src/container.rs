//! Project container checks over raw JSON
//!
//! Two container shapes are recognised:
//! - **Export**: `{panels: {bpmn, ppi, rasci}, connections: {ppiToBpmn}}`
//! - **Autosave**: `{version, bpmn, ppinot: {ppis}, rasci: {matrix}}`, which
//!   is also what the snapshot store writes
//!
//! Errors are plain user-facing strings. Nothing here fails on bad input.

use mmp_core::IndicatorKind;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

const REQUIRED_PANELS: &[&str] = &["bpmn", "ppi", "rasci"];
const REQUIRED_FIELDS: &[&str] = &["version", "bpmn", "ppinot", "rasci"];

/// Recognised container shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerFormat {
    /// Panel/connection export
    Export,
    /// Snapshot store record
    Autosave,
}

/// `{is_valid, errors}` for one container
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContainerReport {
    /// Detected shape, if any
    pub format: Option<ContainerFormat>,
    /// Human-readable errors
    pub errors: Vec<String>,
}

impl ContainerReport {
    /// Valid when there are no errors
    #[inline]
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Detect the shape of `project`, if it has one
#[must_use]
pub fn detect_format(project: &Value) -> Option<ContainerFormat> {
    let obj = project.as_object()?;
    if truthy(obj.get("panels")) && truthy(obj.get("connections")) {
        Some(ContainerFormat::Export)
    } else if REQUIRED_FIELDS.iter().all(|f| truthy(obj.get(*f))) {
        Some(ContainerFormat::Autosave)
    } else {
        None
    }
}

/// Check a parsed project container
#[must_use]
pub fn validate_project(project: &Value) -> ContainerReport {
    let mut report = ContainerReport::default();
    let Some(obj) = project.as_object() else {
        report.errors.push("El proyecto debe ser un objeto válido".to_owned());
        return report;
    };
    report.format = detect_format(project);
    match report.format {
        Some(ContainerFormat::Export) => check_export(obj, &mut report.errors),
        Some(ContainerFormat::Autosave) => check_autosave(obj, &mut report.errors),
        None => report.errors.push("Formato de proyecto no reconocido".to_owned()),
    }
    report
}

/// Parse and check a project container
#[must_use]
pub fn validate_project_str(text: &str) -> ContainerReport {
    match serde_json::from_str::<Value>(text) {
        Ok(value) => validate_project(&value),
        Err(err) => ContainerReport {
            format: None,
            errors: vec![format!("El proyecto no es JSON válido: {err}")],
        },
    }
}

/// JSON truthiness: absent, null, false, 0 and "" are false
fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_) | Value::Object(_)) => true,
    }
}

fn check_export(obj: &Map<String, Value>, errors: &mut Vec<String>) {
    let panels = obj.get("panels");
    for panel in REQUIRED_PANELS {
        if !truthy(panels.and_then(|p| p.get(*panel))) {
            errors.push(format!("Panel requerido '{panel}' no encontrado"));
        }
    }

    let indicator_ids: Vec<&str> = panels
        .and_then(|p| p.pointer("/ppi/indicators"))
        .and_then(Value::as_array)
        .map(|list| {
            list.iter()
                .filter_map(|ppi| ppi.get("id").and_then(Value::as_str))
                .collect()
        })
        .unwrap_or_default();
    let connected = obj
        .get("connections")
        .and_then(|c| c.get("ppiToBpmn"))
        .and_then(Value::as_object);

    if let Some(connected) = connected {
        let known: HashSet<&str> = indicator_ids.iter().copied().collect();
        for id in connected.keys() {
            if !known.contains(id.as_str()) {
                errors.push(format!(
                    "Conexión PPI '{id}' referencia un PPI que no existe en el panel"
                ));
            }
        }
    }
    for id in &indicator_ids {
        if !truthy(connected.and_then(|c| c.get(*id))) {
            errors.push(format!("PPI '{id}' no tiene conexiones BPMN definidas"));
        }
    }

    if let Some(matrix) = panels.and_then(|p| p.pointer("/rasci/matrix")) {
        check_matrix_rows(matrix, errors);
    }
}

fn check_autosave(obj: &Map<String, Value>, errors: &mut Vec<String>) {
    for field in REQUIRED_FIELDS {
        if !truthy(obj.get(*field)) {
            errors.push(format!("Campo requerido '{field}' no encontrado"));
        }
    }

    match obj.get("ppinot").and_then(|p| p.get("ppis")) {
        Some(Value::Array(ppis)) => check_indicator_parents(ppis, errors),
        _ if truthy(obj.get("ppinot")) => {
            errors.push("PPINOT debe contener un array de PPIs".to_owned());
        }
        _ => {}
    }

    if let Some(matrix) = obj.get("rasci").and_then(|r| r.get("matrix")) {
        check_matrix_rows(matrix, errors);
    }
}

fn check_indicator_parents(ppis: &[Value], errors: &mut Vec<String>) {
    let principals: HashSet<&str> = ppis
        .iter()
        .filter(|el| {
            el.get("type")
                .and_then(Value::as_str)
                .and_then(IndicatorKind::from_type_name)
                .is_some_and(IndicatorKind::is_principal)
        })
        .filter_map(|el| el.get("id").and_then(Value::as_str))
        .collect();

    for el in ppis {
        let parent = el
            .get("parent_id")
            .or_else(|| el.get("parentId"))
            .and_then(Value::as_str);
        let Some(parent) = parent else { continue };
        if !principals.contains(parent) {
            let id = el.get("id").and_then(Value::as_str).unwrap_or("?");
            errors.push(format!(
                "Elemento PPINOT '{id}' referencia un PPI padre inexistente '{parent}'"
            ));
        }
    }
}

fn check_matrix_rows(matrix: &Value, errors: &mut Vec<String>) {
    let Some(rows) = matrix.as_object() else {
        return;
    };
    for (task, cells) in rows {
        let letters: Vec<String> = cells
            .as_object()
            .map(|cells| {
                cells
                    .values()
                    .filter_map(Value::as_str)
                    .map(|v| v.trim().to_uppercase())
                    .collect()
            })
            .unwrap_or_default();
        if !letters.iter().any(|l| l == "A") {
            errors.push(format!(
                "Tarea '{task}' debe tener al menos un rol 'A' (Accountable)"
            ));
        }
        if !letters.iter().any(|l| l == "R") {
            errors.push(format!(
                "Tarea '{task}' debe tener al menos un rol 'R' (Responsible)"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn non_object_is_rejected() {
        let report = validate_project(&json!([1, 2]));
        assert!(!report.is_valid());
        assert_eq!(report.format, None);
    }

    #[test]
    fn export_cross_checks_connections_both_ways() {
        let project = json!({
            "panels": {
                "bpmn": { "xml": "<x/>" },
                "ppi": { "indicators": [{ "id": "ind-1" }, { "id": "ind-2" }] }
            },
            "connections": { "ppiToBpmn": { "ind-1": "Task_1", "ind-9": "Task_2" } }
        });
        let report = validate_project(&project);
        assert_eq!(report.format, Some(ContainerFormat::Export));
        assert_eq!(
            report.errors,
            vec![
                "Panel requerido 'rasci' no encontrado".to_string(),
                "Conexión PPI 'ind-9' referencia un PPI que no existe en el panel".to_string(),
                "PPI 'ind-2' no tiene conexiones BPMN definidas".to_string(),
            ]
        );
    }

    #[test]
    fn autosave_requires_indicator_array() {
        let project = json!({
            "version": "2.0.0",
            "bpmn": "<x/>",
            "ppinot": { "ppis": "nope" },
            "rasci": { "roles": [] }
        });
        let report = validate_project(&project);
        assert_eq!(report.format, Some(ContainerFormat::Autosave));
        assert_eq!(report.errors, vec!["PPINOT debe contener un array de PPIs".to_string()]);
    }

    #[test]
    fn autosave_flags_dangling_parent() {
        let project = json!({
            "version": "2.0.0",
            "bpmn": "<x/>",
            "ppinot": { "ppis": [
                { "id": "PPI_1", "type": "PPINOT:Ppi" },
                { "id": "Target_1", "type": "PPINOT:Target", "parent_id": "PPI_1" },
                { "id": "Scope_9", "type": "PPINOT:Scope", "parent_id": "PPI_9" }
            ] },
            "rasci": { "matrix": { "Task_1": { "Dev": "R", "Lead": "A" } } }
        });
        let report = validate_project(&project);
        assert_eq!(
            report.errors,
            vec!["Elemento PPINOT 'Scope_9' referencia un PPI padre inexistente 'PPI_9'".to_string()]
        );
    }

    #[test]
    fn invalid_json_is_an_error_value() {
        let report = validate_project_str("{ not json");
        assert!(!report.is_valid());
        assert!(report.errors[0].starts_with("El proyecto no es JSON válido"));
    }
}
