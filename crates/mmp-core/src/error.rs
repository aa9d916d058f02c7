//! Error types for MMP Core
//!
//! Provides error handling for:
//! - Storage backend failures (quota, I/O, serialization)
//! - Reading persisted snapshots (absent, corrupt, expired)
//! - Collaborator calls into the live editors
//! - Autosave attempts that were refused or failed
//! - Restoration of a snapshot into the live workspace
//! - Configuration loading

use std::time::Duration;

/// Failure raised by a key/value storage backend
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend refused the write because it is full
    #[error("storage quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded {
        /// Size of the rejected write
        needed: usize,
        /// Remaining capacity at the time of the write
        available: usize,
    },

    /// Payload could not be encoded
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem-backed store failed
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Backend is not usable
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Check if retrying the same write could succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Unavailable(_))
    }
}

/// Failure reading the persisted snapshot
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// Nothing stored under any known key
    #[error("no saved project")]
    Absent,

    /// Stored record is not valid JSON or has the wrong shape
    #[error("saved project under '{key}' is corrupt: {reason}")]
    Corrupt {
        /// Key whose payload failed to parse
        key: String,
        /// Parser message
        reason: String,
    },

    /// Stored record is older than the configured lifetime and was evicted
    #[error("saved project expired ({} minutes old)", age.as_secs() / 60)]
    Expired {
        /// Age of the record when it was read
        age: Duration,
    },

    /// Backend failure while reading
    #[error(transparent)]
    Backend(#[from] StoreError),
}

/// Failure reported by a live editor collaborator
#[derive(Debug, Clone, thiserror::Error)]
pub enum CollaboratorError {
    /// Collaborator is not registered
    #[error("{0} is not available")]
    Unavailable(&'static str),

    /// Collaborator call failed
    #[error("{collaborator} failed: {message}")]
    Failed {
        /// Which collaborator failed
        collaborator: &'static str,
        /// What went wrong
        message: String,
    },
}

impl CollaboratorError {
    /// Create a failure for the named collaborator
    #[inline]
    #[must_use]
    pub fn failed(collaborator: &'static str, message: impl Into<String>) -> Self {
        Self::Failed {
            collaborator,
            message: message.into(),
        }
    }
}

/// Reason an autosave attempt did not write anything, or failed writing
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Another save is in flight
    #[error("already saving")]
    AlreadySaving,

    /// Saves are suspended (restoration in progress)
    #[error("autosave suspended")]
    Suspended,

    /// Nothing changed since the last successful save
    #[error("no changes")]
    NoChanges,

    /// Snapshot was captured but could not be persisted
    #[error("save failed: {0}")]
    Store(#[from] StoreError),
}

impl SaveError {
    /// Refusals are expected outcomes of the single-flight guard, not faults
    #[inline]
    #[must_use]
    pub fn is_refusal(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

/// Failure restoring a snapshot into the live workspace
#[derive(Debug, thiserror::Error)]
pub enum RestoreError {
    /// No snapshot to restore
    #[error("no saved project to restore")]
    Absent,

    /// Snapshot is older than the configured lifetime
    #[error("saved project expired ({} minutes old)", age.as_secs() / 60)]
    Expired {
        /// Age of the snapshot
        age: Duration,
    },

    /// Stored payload could not be decoded
    #[error("saved project is corrupt: {0}")]
    Corrupt(String),

    /// Snapshot decoded but uses an unsupported shape
    #[error("saved project is malformed: {0}")]
    Malformed(String),

    /// Backend failure while reading the snapshot
    #[error(transparent)]
    Backend(StoreError),
}

impl From<ReadError> for RestoreError {
    fn from(err: ReadError) -> Self {
        match err {
            ReadError::Absent => Self::Absent,
            ReadError::Corrupt { key, reason } => Self::Corrupt(format!("{key}: {reason}")),
            ReadError::Expired { age } => Self::Expired { age },
            ReadError::Backend(inner) => Self::Backend(inner),
        }
    }
}

/// Configuration loading or validation failure
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config text is not valid TOML for the expected shape
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range
    #[error("invalid config value for '{field}': {reason}")]
    Invalid {
        /// Offending field
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}
