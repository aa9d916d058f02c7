//! Performance-indicator elements and their structural roles

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Type-name prefix shared by every indicator-notation element
pub const INDICATOR_NAMESPACE: &str = "PPINOT:";

/// Measure flavours of the indicator notation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MeasureKind {
    /// Generic measure
    Plain,
    /// Aggregation over instances
    Aggregated,
    /// Count or condition over a single instance
    Base,
    /// Value read from a data object
    Data,
    /// Duration between two events
    Time,
    /// Formula over other measures
    Derived,
}

/// Structural role of an indicator-notation element
///
/// Parsed once from the element type name; everything downstream matches
/// on this enum instead of comparing strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndicatorKind {
    /// Top-level indicator container
    Principal,
    /// Target value attached to a principal
    Target,
    /// Scope attached to a principal
    Scope,
    /// Measure attached to a principal
    Measure(MeasureKind),
}

impl IndicatorKind {
    /// Canonical type name used in graph documents and persisted snapshots
    #[must_use]
    pub fn type_name(self) -> &'static str {
        match self {
            Self::Principal => "PPINOT:Ppi",
            Self::Target => "PPINOT:Target",
            Self::Scope => "PPINOT:Scope",
            Self::Measure(MeasureKind::Plain) => "PPINOT:Measure",
            Self::Measure(MeasureKind::Aggregated) => "PPINOT:AggregatedMeasure",
            Self::Measure(MeasureKind::Base) => "PPINOT:BaseMeasure",
            Self::Measure(MeasureKind::Data) => "PPINOT:DataMeasure",
            Self::Measure(MeasureKind::Time) => "PPINOT:TimeMeasure",
            Self::Measure(MeasureKind::Derived) => "PPINOT:DerivedMeasure",
        }
    }

    /// Parse a type name such as `PPINOT:Target`
    ///
    /// Returns `None` for names outside the indicator namespace or for
    /// indicator types that carry no structural role (labels, connectors).
    #[must_use]
    pub fn from_type_name(name: &str) -> Option<Self> {
        let local = name
            .strip_prefix(INDICATOR_NAMESPACE)
            .or_else(|| name.strip_prefix("ppinot:"))?;
        let kind = match local {
            "Ppi" => Self::Principal,
            "Target" => Self::Target,
            "Scope" => Self::Scope,
            "Measure" => Self::Measure(MeasureKind::Plain),
            "AggregatedMeasure" => Self::Measure(MeasureKind::Aggregated),
            "BaseMeasure" | "CountMeasure" | "StateConditionMeasure" => {
                Self::Measure(MeasureKind::Base)
            }
            "DataMeasure" => Self::Measure(MeasureKind::Data),
            "TimeMeasure" | "CyclicTimeMeasure" => Self::Measure(MeasureKind::Time),
            "DerivedMeasure"
            | "DerivedSingleInstanceMeasure"
            | "DerivedMultiInstanceMeasure" => Self::Measure(MeasureKind::Derived),
            _ => return None,
        };
        Some(kind)
    }

    /// Whether this is the top-level container kind
    #[inline]
    #[must_use]
    pub fn is_principal(self) -> bool {
        matches!(self, Self::Principal)
    }
}

impl fmt::Display for IndicatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl Serialize for IndicatorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name())
    }
}

impl<'de> Deserialize<'de> for IndicatorKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_type_name(&raw)
            .ok_or_else(|| D::Error::custom(format!("unknown indicator type '{raw}'")))
    }
}

/// Position and size on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Bounds {
    /// Left edge
    #[serde(default)]
    pub x: f64,
    /// Top edge
    #[serde(default)]
    pub y: f64,
    /// Width
    #[serde(default)]
    pub width: f64,
    /// Height
    #[serde(default)]
    pub height: f64,
}

impl Bounds {
    /// Create bounds from position and size
    #[inline]
    #[must_use]
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// One indicator-notation element as persisted in a snapshot
///
/// Principals have no parent. Every other kind names the principal it was
/// attached to when the snapshot was captured.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorElement {
    /// Element id in the graph
    pub id: String,
    /// Structural role
    #[serde(rename = "type")]
    pub kind: IndicatorKind,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Canvas position
    #[serde(default)]
    pub position: Bounds,
    /// Owning principal, absent for principals
    #[serde(default, alias = "parentId")]
    pub parent_id: Option<String>,
}

impl IndicatorElement {
    /// Create a top-level principal element
    #[must_use]
    pub fn principal(id: impl Into<String>, name: impl Into<String>, position: Bounds) -> Self {
        Self {
            id: id.into(),
            kind: IndicatorKind::Principal,
            name: name.into(),
            position,
            parent_id: None,
        }
    }

    /// Create a child element attached to `parent_id`
    #[must_use]
    pub fn child(
        id: impl Into<String>,
        kind: IndicatorKind,
        name: impl Into<String>,
        position: Bounds,
        parent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            name: name.into(),
            position,
            parent_id: Some(parent_id.into()),
        }
    }
}

/// Indicator as listed by the indicator panel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Indicator {
    /// Indicator id
    pub id: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Graph element the indicator is drawn as, if any
    #[serde(default, alias = "elementId")]
    pub element_id: Option<String>,
}

impl Indicator {
    /// Create an indicator bound to a graph element
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            element_id: None,
        }
    }

    /// Bind the indicator to a graph element
    #[must_use]
    pub fn with_element(mut self, element_id: impl Into<String>) -> Self {
        self.element_id = Some(element_id.into());
        self
    }
}
