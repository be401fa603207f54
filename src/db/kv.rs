use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Mutex;

use crate::error::StorageError;

/// A string-keyed store of string values with an optional byte quota.
///
/// Writes that would push the total size of keys plus values past the quota
/// fail with `StorageError::QuotaExceeded` and leave the store unchanged.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>, StorageError>> + Send;

    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn keys(&self) -> impl Future<Output = Result<Vec<String>, StorageError>> + Send;

    /// Bytes currently held, counted as key plus value.
    fn usage_bytes(&self) -> impl Future<Output = Result<u64, StorageError>> + Send;

    fn quota_bytes(&self) -> Option<u64>;
}

fn entry_size(key: &str, value: &str) -> u64 {
    (key.len() + value.len()) as u64
}

/// In-process substrate. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
    quota_bytes: Option<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota_bytes: u64) -> Self {
        Self {
            entries: Mutex::new(BTreeMap::new()),
            quota_bytes: Some(quota_bytes),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<String, String>>, StorageError> {
        self.entries
            .lock()
            .map_err(|_| StorageError::Backend("memory store lock poisoned".to_string()))
    }
}

impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock()?;

        if let Some(quota) = self.quota_bytes {
            let others: u64 = entries
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| entry_size(k, v))
                .sum();
            let needed = others + entry_size(key, value);
            if needed > quota {
                return Err(StorageError::QuotaExceeded { needed, quota });
            }
        }

        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn usage_bytes(&self) -> Result<u64, StorageError> {
        Ok(self.lock()?.iter().map(|(k, v)| entry_size(k, v)).sum())
    }

    fn quota_bytes(&self) -> Option<u64> {
        self.quota_bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_get_remove() {
        tokio_test::block_on(async {
            let store = MemoryStore::new();
            store.set("a", "1").await.unwrap();
            store.set("b", "2").await.unwrap();
            assert_eq!(store.get("a").await.unwrap().as_deref(), Some("1"));
            assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);

            store.remove("a").await.unwrap();
            store.remove("a").await.unwrap();
            assert_eq!(store.get("a").await.unwrap(), None);
        });
    }

    #[test]
    fn quota_rejects_oversized_writes() {
        tokio_test::block_on(async {
            let store = MemoryStore::with_quota(10);
            store.set("k", "12345").await.unwrap();

            let err = store.set("j", "123456789").await.unwrap_err();
            assert!(matches!(err, StorageError::QuotaExceeded { needed: 16, quota: 10 }));
            assert_eq!(store.get("j").await.unwrap(), None);

            // Overwriting a key only counts the new value.
            store.set("k", "123456789").await.unwrap();
            assert_eq!(store.usage_bytes().await.unwrap(), 10);
            assert_eq!(store.quota_bytes(), Some(10));
        });
    }
}
