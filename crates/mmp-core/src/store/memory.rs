//! In-memory key/value backend

use super::KeyValueStore;
use crate::error::StoreError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

/// Key/value store held in memory, with an optional byte quota
///
/// The quota counts key and value bytes, like a browser local store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Mutex<Option<usize>>,
    writes: Mutex<HashMap<String, usize>>,
}

impl MemoryStore {
    /// Unbounded store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects writes once `quota` bytes are used
    #[must_use]
    pub fn with_quota(quota: usize) -> Self {
        Self {
            quota: Mutex::new(Some(quota)),
            ..Self::default()
        }
    }

    /// Replace the quota; `None` lifts it
    pub fn set_quota(&self, quota: Option<usize>) {
        *self.quota.lock() = quota;
    }

    /// Bytes currently used
    #[must_use]
    pub fn used_bytes(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    /// Successful writes to `key` since creation
    #[must_use]
    pub fn write_count(&self, key: &str) -> usize {
        self.writes.lock().get(key).copied().unwrap_or(0)
    }

    /// Raw value under `key`
    #[must_use]
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.lock().get(key).cloned()
    }

    /// Put a raw value without quota accounting or write counting
    pub fn seed(&self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.lock().insert(key.into(), value.into());
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StoreError> {
        let quota = *self.quota.lock();
        let mut entries = self.entries.lock();
        if let Some(quota) = quota {
            let used: usize = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(used);
            if needed > available {
                return Err(StoreError::QuotaExceeded { needed, available });
            }
        }
        entries.insert(key.to_owned(), value);
        drop(entries);
        *self.writes.lock().entry(key.to_owned()).or_default() += 1;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn quota_rejects_oversized_writes() {
        let store = MemoryStore::with_quota(16);
        store.set("k", "12345".into()).await.unwrap();
        let err = store.set("other", "x".repeat(32)).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { needed: 37, .. }));
        assert_eq!(store.raw("other"), None);
    }

    #[tokio::test]
    async fn overwrite_does_not_double_count() {
        let store = MemoryStore::with_quota(12);
        store.set("k", "0123456789".into()).await.unwrap();
        store.set("k", "9876543210".into()).await.unwrap();
        assert_eq!(store.write_count("k"), 2);
        assert_eq!(store.used_bytes(), 11);
    }
}
