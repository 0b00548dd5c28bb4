//! In-memory storage area with an optional byte quota.

use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{StorageArea, StorageError};

#[derive(Default)]
struct Entries {
    values: HashMap<String, String>,
    /// Sum of key and value lengths across all entries.
    used_bytes: usize,
}

/// `HashMap`-backed storage area. Used when no database is configured and
/// by tests.
#[derive(Default)]
pub struct MemoryStorage {
    entries: RwLock<Entries>,
    /// Maximum `used_bytes`. `0` means unlimited.
    quota_bytes: usize,
}

impl MemoryStorage {
    #[cfg(test)]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_quota(quota_bytes: usize) -> Self {
        Self { entries: RwLock::new(Entries::default()), quota_bytes }
    }

    /// Bytes currently counted against the quota.
    #[cfg(test)]
    pub async fn used_bytes(&self) -> usize {
        self.entries.read().await.used_bytes
    }
}

fn entry_size(key: &str, value: &str) -> usize {
    key.len() + value.len()
}

#[async_trait::async_trait]
impl StorageArea for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.values.get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        let previous = entries.values.get(key).map_or(0, |old| entry_size(key, old));
        let needed = entries.used_bytes - previous + entry_size(key, &value);
        if self.quota_bytes > 0 && needed > self.quota_bytes {
            return Err(StorageError::QuotaExceeded { key: key.to_owned(), needed, quota: self.quota_bytes });
        }
        entries.used_bytes = needed;
        entries.values.insert(key.to_owned(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.entries.write().await;
        if let Some(old) = entries.values.remove(key) {
            entries.used_bytes -= entry_size(key, &old);
        }
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.entries.read().await;
        let mut keys: Vec<String> = entries
            .values
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
