//! Autosave and storage configuration
//!
//! Durations are written in milliseconds in TOML:
//!
//! ```toml
//! debounce_ms = 5000
//! ttl_ms = 10800000
//! storage_key = "multinotation_project_data"
//! ```

use crate::error::ConfigError;
use crate::model::CURRENT_SCHEMA_VERSION;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Versioned key holding the current record
pub const DEFAULT_STORAGE_KEY: &str = "multinotation_project_data";

/// Key holding the record with its legacy mirror
pub const DEFAULT_COMPAT_KEY: &str = "draft:multinotation";

/// Key an older release wrote its drafts under
pub const DEFAULT_LEGACY_KEY: &str = "draft:multinotation";

/// Autosave configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Quiet period after the last change before a save fires
    #[serde(rename = "debounce_ms", with = "millis")]
    pub debounce: Duration,

    /// Age beyond which a stored record is discarded
    #[serde(rename = "ttl_ms", with = "millis")]
    pub ttl: Duration,

    /// Versioned key for the current record
    pub storage_key: String,

    /// Key for the record carrying the legacy mirror
    pub compat_key: String,

    /// Key read by legacy migration
    pub legacy_key: String,

    /// Schema version stamped on records and new snapshots
    pub schema_version: String,

    /// Whether change notifications arm the debounce timer
    pub enabled: bool,

    /// Broadcast buffer per subscriber
    pub event_capacity: usize,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce: Duration::from_millis(5000),
            ttl: Duration::from_secs(3 * 60 * 60),
            storage_key: DEFAULT_STORAGE_KEY.to_owned(),
            compat_key: DEFAULT_COMPAT_KEY.to_owned(),
            legacy_key: DEFAULT_LEGACY_KEY.to_owned(),
            schema_version: CURRENT_SCHEMA_VERSION.to_owned(),
            enabled: true,
            event_capacity: 64,
        }
    }
}

impl AutosaveConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set debounce window
    #[must_use]
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set record lifetime
    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Set the current-record key
    #[must_use]
    pub fn with_storage_key(mut self, key: impl Into<String>) -> Self {
        self.storage_key = key.into();
        self
    }

    /// Set the compatibility mirror key
    #[must_use]
    pub fn with_compat_key(mut self, key: impl Into<String>) -> Self {
        self.compat_key = key.into();
        self
    }

    /// Set the legacy migration key
    #[must_use]
    pub fn with_legacy_key(mut self, key: impl Into<String>) -> Self {
        self.legacy_key = key.into();
        self
    }

    /// Enable or disable the debounce timer
    #[must_use]
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set broadcast buffer size
    #[must_use]
    pub fn with_event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce.is_zero() {
            return Err(ConfigError::Invalid {
                field: "debounce_ms",
                reason: "must be greater than zero".into(),
            });
        }
        if self.ttl.is_zero() {
            return Err(ConfigError::Invalid {
                field: "ttl_ms",
                reason: "must be greater than zero".into(),
            });
        }
        for (field, key) in [
            ("storage_key", &self.storage_key),
            ("compat_key", &self.compat_key),
            ("legacy_key", &self.legacy_key),
        ] {
            if key.trim().is_empty() {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must not be empty".into(),
                });
            }
        }
        if self.storage_key == self.compat_key {
            return Err(ConfigError::Invalid {
                field: "compat_key",
                reason: format!("collides with storage_key '{}'", self.storage_key),
            });
        }
        // compat_key and legacy_key may name the same key: the mirror is
        // written where older releases left their drafts.
        if self.storage_key == self.legacy_key {
            return Err(ConfigError::Invalid {
                field: "legacy_key",
                reason: format!("collides with storage_key '{}'", self.storage_key),
            });
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::Invalid {
                field: "event_capacity",
                reason: "must be greater than zero".into(),
            });
        }
        Ok(())
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub(super) fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
