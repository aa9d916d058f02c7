//! Persisted record envelopes

use crate::model::{LegacyProjectValue, ProjectSnapshot, LEGACY_SCHEMA_VERSION};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Envelope written under the storage keys
///
/// The versioned key carries no `value`; the compatibility key carries the
/// legacy mirror alongside `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Record schema version
    pub version: String,
    /// Snapshot capture time
    pub timestamp: DateTime<Utc>,
    /// Write time, epoch milliseconds
    #[serde(rename = "savedAt")]
    pub saved_at: i64,
    /// Written by the scheduler rather than an explicit export
    #[serde(default)]
    pub autosaved: bool,
    /// Legacy mirror for older readers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<LegacyProjectValue>,
    /// The snapshot
    pub data: ProjectSnapshot,
}

/// Draft written by an older release, read during migration
///
/// Every section is kept loosely typed: older writers put a project without
/// a timestamp under `data` and either layout under `value`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct LegacyDraft {
    #[serde(default)]
    pub(crate) timestamp: Option<Value>,
    #[serde(rename = "savedAt", default)]
    pub(crate) saved_at: Option<Value>,
    #[serde(default)]
    pub(crate) value: Option<Value>,
    #[serde(default)]
    pub(crate) data: Option<Value>,
}

impl LegacyDraft {
    /// Convert into a snapshot; `None` when the draft carries nothing usable
    ///
    /// `data` is preferred; `value` is the fallback when `data` is absent or
    /// does not decode.
    pub(crate) fn into_snapshot(self, fallback_time: DateTime<Utc>) -> Option<ProjectSnapshot> {
        let timestamp = self.capture_time().unwrap_or(fallback_time);
        [("data", self.data), ("value", self.value)]
            .into_iter()
            .filter_map(|(section, raw)| Some((section, raw?)))
            .find_map(|(section, raw)| {
                let decoded = decode_section(raw, timestamp);
                if decoded.is_none() {
                    warn!(section, "legacy draft section unreadable");
                }
                decoded
            })
    }

    fn capture_time(&self) -> Option<DateTime<Utc>> {
        let stamped = self
            .timestamp
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|text| DateTime::parse_from_rfc3339(text).ok())
            .map(|at| at.with_timezone(&Utc));
        stamped.or_else(|| {
            self.saved_at
                .as_ref()
                .and_then(Value::as_i64)
                .and_then(DateTime::<Utc>::from_timestamp_millis)
        })
    }
}

/// Decode one section, as the older nested layout when it has that shape
fn decode_section(raw: Value, timestamp: DateTime<Utc>) -> Option<ProjectSnapshot> {
    let Value::Object(mut fields) = raw else {
        return None;
    };
    let nested = fields.get("bpmn").is_some_and(Value::is_object) || fields.contains_key("ppi");
    if nested {
        return serde_json::from_value::<LegacyProjectValue>(Value::Object(fields))
            .ok()
            .map(|value| ProjectSnapshot::from_legacy(value, timestamp));
    }
    fields
        .entry("version")
        .or_insert_with(|| Value::from(LEGACY_SCHEMA_VERSION));
    if fields.get("timestamp").map_or(true, Value::is_null) {
        fields.insert("timestamp".to_owned(), Value::from(timestamp.to_rfc3339()));
    }
    serde_json::from_value(Value::Object(fields)).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SchemaVersion, CURRENT_SCHEMA_VERSION};

    #[test]
    fn legacy_value_draft_becomes_legacy_snapshot() {
        let raw = serde_json::json!({
            "savedAt": 1_714_564_800_000_i64,
            "value": {
                "bpmn": { "xml": "<definitions/>" },
                "ppi": { "indicators": [ { "id": "PPI_1", "type": "PPINOT:Ppi" } ] },
                "rasci": { "roles": ["Dev"], "matrix": { "T": { "Dev": "R" } } }
            }
        });
        let draft: LegacyDraft = serde_json::from_value(raw).unwrap();
        let snap = draft.into_snapshot(Utc::now()).unwrap();
        assert_eq!(snap.schema(), Some(SchemaVersion::Legacy));
        assert_eq!(snap.indicator_elements.len(), 1);
        assert_eq!(snap.timestamp.timestamp_millis(), 1_714_564_800_000);
    }

    #[test]
    fn embedded_data_section_wins() {
        let snap = ProjectSnapshot::empty(Utc::now());
        let raw = serde_json::json!({
            "savedAt": 0,
            "value": {},
            "data": serde_json::to_value(&snap).unwrap()
        });
        let draft: LegacyDraft = serde_json::from_value(raw).unwrap();
        let out = draft.into_snapshot(Utc::now()).unwrap();
        assert_eq!(out.version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn data_without_timestamp_takes_the_envelope_time() {
        let raw = serde_json::json!({
            "version": "1.0.0",
            "timestamp": "2024-05-01T12:00:00.000Z",
            "savedAt": 1_714_564_800_000_i64,
            "autosaved": true,
            "data": {
                "version": "1.0.0",
                "bpmn": "<definitions/>",
                "ppinot": { "ppis": [] },
                "ralph": { "roles": [] },
                "rasci": { "roles": ["Dev"], "tasks": ["T"], "matrix": { "T": { "Dev": "RA" } } },
                "metadata": { "createdAt": "2024-05-01T11:00:00.000Z" }
            }
        });
        let draft: LegacyDraft = serde_json::from_value(raw).unwrap();
        let snap = draft.into_snapshot(Utc::now()).unwrap();
        assert_eq!(snap.timestamp.timestamp_millis(), 1_714_564_800_000);
        assert_eq!(snap.graph_document.as_deref(), Some("<definitions/>"));
        assert_eq!(snap.schema(), Some(SchemaVersion::Legacy));
        assert_eq!(snap.matrix.get("T", "Dev").map(|cell| cell.len()), Some(2));
    }

    #[test]
    fn unreadable_data_falls_back_to_value() {
        let raw = serde_json::json!({
            "savedAt": 1_714_564_800_000_i64,
            "data": "not a project",
            "value": { "bpmn": { "xml": "<definitions/>" } }
        });
        let draft: LegacyDraft = serde_json::from_value(raw).unwrap();
        let snap = draft.into_snapshot(Utc::now()).unwrap();
        assert_eq!(snap.graph_document.as_deref(), Some("<definitions/>"));
    }

    #[test]
    fn empty_draft_yields_nothing() {
        let draft: LegacyDraft = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(draft.into_snapshot(Utc::now()).is_none());
    }
}
