//! Project snapshot and its persisted shapes
//!
//! The snapshot is written in the autosave container shape:
//!
//! ```json
//! { "version": "2.0.0", "timestamp": "...", "bpmn": "<xml/>",
//!   "ppinot": { "ppis": [] },
//!   "rasci": { "roles": [], "tasks": [], "matrix": {} },
//!   "ralph": { "roles": [] } }
//! ```
//!
//! [`LegacyProjectValue`] is the older draft layout kept as a mirror for
//! readers that predate the current format.

use super::graph::RoleSymbol;
use super::indicator::{IndicatorElement, IndicatorKind};
use super::matrix::ResponsibilityMatrix;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::time::Duration;

/// Schema version written by this crate
pub const CURRENT_SCHEMA_VERSION: &str = "2.0.0";

/// Schema version stamped on snapshots reshaped from a legacy draft
pub const LEGACY_SCHEMA_VERSION: &str = "1.0.0";

/// On-disk schema family, decided by the major version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVersion {
    /// `1.x`: reshaped from the legacy draft
    Legacy,
    /// `2.x`: written natively
    Current,
}

impl SchemaVersion {
    /// Parse the major component of a semver-like string
    #[must_use]
    pub fn parse(version: &str) -> Option<Self> {
        let major = version.trim().split('.').next()?;
        match major.parse::<u32>().ok()? {
            1 => Some(Self::Legacy),
            2 => Some(Self::Current),
            _ => None,
        }
    }
}

/// One immutable persistence unit covering all four notations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "SnapshotWire", into = "SnapshotWire")]
pub struct ProjectSnapshot {
    /// Schema version
    pub version: String,
    /// Capture time
    pub timestamp: DateTime<Utc>,
    /// Serialized process graph
    pub graph_document: Option<String>,
    /// Principals first, each followed by its children
    pub indicator_elements: Vec<IndicatorElement>,
    /// Declared matrix roles
    pub roles: Vec<String>,
    /// Responsibility assignments
    pub matrix: ResponsibilityMatrix,
    /// Organizational role symbols
    pub organizational_roles: Vec<RoleSymbol>,
}

impl ProjectSnapshot {
    /// Empty snapshot at the current schema version
    #[must_use]
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            version: CURRENT_SCHEMA_VERSION.to_owned(),
            timestamp,
            graph_document: None,
            indicator_elements: Vec::new(),
            roles: Vec::new(),
            matrix: ResponsibilityMatrix::new(),
            organizational_roles: Vec::new(),
        }
    }

    /// Schema family, `None` when the version string is unsupported
    #[must_use]
    pub fn schema(&self) -> Option<SchemaVersion> {
        SchemaVersion::parse(&self.version)
    }

    /// Age relative to `now`; zero for timestamps in the future
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        (now - self.timestamp).to_std().unwrap_or(Duration::ZERO)
    }

    /// Expired only when strictly older than `ttl`
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        self.age_at(now) > ttl
    }

    /// Principal elements in snapshot order
    pub fn principals(&self) -> impl Iterator<Item = &IndicatorElement> {
        self.indicator_elements
            .iter()
            .filter(|el| el.kind.is_principal())
    }

    /// Children attached to `principal_id`, in snapshot order
    pub fn children_of<'a>(
        &'a self,
        principal_id: &'a str,
    ) -> impl Iterator<Item = &'a IndicatorElement> + 'a {
        self.indicator_elements
            .iter()
            .filter(move |el| el.parent_id.as_deref() == Some(principal_id))
    }

    /// Non-principal elements whose parent is not a principal in this snapshot
    #[must_use]
    pub fn dangling_children(&self) -> Vec<&IndicatorElement> {
        let principals: HashSet<&str> = self.principals().map(|p| p.id.as_str()).collect();
        self.indicator_elements
            .iter()
            .filter(|el| !el.kind.is_principal())
            .filter(|el| {
                el.parent_id
                    .as_deref()
                    .map_or(true, |parent| !principals.contains(parent))
            })
            .collect()
    }

    /// Whether any notation carries content
    #[must_use]
    pub fn has_content(&self) -> bool {
        self.graph_document.as_deref().is_some_and(|d| !d.trim().is_empty())
            || !self.indicator_elements.is_empty()
            || !self.roles.is_empty()
            || !self.matrix.is_empty()
            || !self.organizational_roles.is_empty()
    }

    /// Reshape into the legacy draft layout
    #[must_use]
    pub fn legacy_view(&self) -> LegacyProjectValue {
        LegacyProjectValue {
            bpmn: LegacyDocument {
                xml: self.graph_document.clone(),
            },
            ppi: LegacyIndicators {
                indicators: self
                    .indicator_elements
                    .iter()
                    .filter_map(|el| serde_json::to_value(el).ok())
                    .collect(),
            },
            rasci: LegacyMatrix {
                roles: self.roles.clone(),
                tasks: self.matrix.task_ids().map(str::to_owned).collect(),
                matrix: self.matrix.clone(),
            },
            ralph: LegacyRoles {
                roles: self.organizational_roles.clone(),
            },
        }
    }

    /// Rebuild a snapshot from the legacy draft layout
    ///
    /// Indicator entries that do not decode are skipped. The result is
    /// stamped with the legacy schema version.
    #[must_use]
    pub fn from_legacy(value: LegacyProjectValue, timestamp: DateTime<Utc>) -> Self {
        let indicator_elements = decode_entries(value.ppi.indicators);
        let mut matrix = value.rasci.matrix;
        for task in value.rasci.tasks {
            matrix.add_task(task);
        }
        Self {
            version: LEGACY_SCHEMA_VERSION.to_owned(),
            timestamp,
            graph_document: value.bpmn.xml,
            indicator_elements,
            roles: value.rasci.roles,
            matrix,
            organizational_roles: value.ralph.roles,
        }
    }
}

/// Legacy draft layout
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyProjectValue {
    /// Process document
    #[serde(default)]
    pub bpmn: LegacyDocument,
    /// Indicator list, kept loosely typed
    #[serde(default)]
    pub ppi: LegacyIndicators,
    /// Matrix section
    #[serde(default)]
    pub rasci: LegacyMatrix,
    /// Organizational roles
    #[serde(default)]
    pub ralph: LegacyRoles,
}

/// Legacy process document section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyDocument {
    /// Serialized graph
    #[serde(default)]
    pub xml: Option<String>,
}

/// Legacy indicator section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyIndicators {
    /// Raw indicator entries
    #[serde(default)]
    pub indicators: Vec<serde_json::Value>,
}

/// Legacy matrix section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyMatrix {
    /// Declared roles
    #[serde(default)]
    pub roles: Vec<String>,
    /// Task ids, including rows without assignments
    #[serde(default)]
    pub tasks: Vec<String>,
    /// Assignments
    #[serde(default, alias = "matrixData")]
    pub matrix: ResponsibilityMatrix,
}

/// Legacy organizational role section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacyRoles {
    /// Role symbols
    #[serde(default)]
    pub roles: Vec<RoleSymbol>,
}

/// Decode each entry on its own, skipping the ones that do not fit `T`
pub(crate) fn decode_entries<T: DeserializeOwned>(raw: Vec<Value>) -> Vec<T> {
    raw.into_iter()
        .filter_map(|entry| match serde_json::from_value::<T>(entry) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                tracing::debug!(error = %err, "skipping undecodable entry");
                None
            }
        })
        .collect()
}

fn lenient_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(decode_entries(raw.unwrap_or_default()))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotWire {
    version: String,
    timestamp: DateTime<Utc>,
    #[serde(default)]
    bpmn: Option<String>,
    #[serde(default)]
    ppinot: IndicatorSection,
    #[serde(default)]
    rasci: MatrixSection,
    #[serde(default)]
    ralph: OrgRoleSection,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndicatorSection {
    #[serde(default, deserialize_with = "lenient_list")]
    ppis: Vec<IndicatorElement>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct MatrixSection {
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    tasks: Vec<String>,
    #[serde(default, alias = "matrixData")]
    matrix: ResponsibilityMatrix,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OrgRoleSection {
    #[serde(default, deserialize_with = "lenient_list")]
    roles: Vec<RoleSymbol>,
}

impl From<SnapshotWire> for ProjectSnapshot {
    fn from(wire: SnapshotWire) -> Self {
        let mut matrix = wire.rasci.matrix;
        for task in wire.rasci.tasks {
            matrix.add_task(task);
        }
        Self {
            version: wire.version,
            timestamp: wire.timestamp,
            graph_document: wire.bpmn,
            indicator_elements: wire.ppinot.ppis,
            roles: wire.rasci.roles,
            matrix,
            organizational_roles: wire.ralph.roles,
        }
    }
}

impl From<ProjectSnapshot> for SnapshotWire {
    fn from(snapshot: ProjectSnapshot) -> Self {
        let tasks = snapshot.matrix.task_ids().map(str::to_owned).collect();
        Self {
            version: snapshot.version,
            timestamp: snapshot.timestamp,
            bpmn: snapshot.graph_document,
            ppinot: IndicatorSection {
                ppis: snapshot.indicator_elements,
            },
            rasci: MatrixSection {
                roles: snapshot.roles,
                tasks,
                matrix: snapshot.matrix,
            },
            ralph: OrgRoleSection {
                roles: snapshot.organizational_roles,
            },
        }
    }
}

/// Count children per kind; used by logging
#[must_use]
pub fn count_by_kind(elements: &[IndicatorElement]) -> (usize, usize) {
    let principals = elements
        .iter()
        .filter(|el| el.kind == IndicatorKind::Principal)
        .count();
    (principals, elements.len() - principals)
}
