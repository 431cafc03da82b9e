//! Key-value backends for sealed mapping records.
//!
//! The vault only needs three primitives: an atomic insert-if-absent with a
//! TTL, a read, and a delete. Backends never see plaintext.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;

/// Backend failure, before it is mapped onto the vault's error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store operation timed out")]
    Timeout,
}

/// Expiring key-value storage.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Store `value` under `key` unless the key already exists.
    ///
    /// Returns `false` when an unexpired value was already present.
    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<bool, StoreError>;

    /// Read a value. Expired keys read as absent.
    async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError>;

    /// Remove a key. Returns whether anything was removed.
    async fn delete(&self, key: &str) -> std::result::Result<bool, StoreError>;
}

struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Instant,
}

/// Process-local store. Used in tests and single-process deployments.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, StoredValue>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of unexpired entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|v| v.expires_at > now)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn purge_expired(entries: &mut HashMap<String, StoredValue>, now: Instant) {
        entries.retain(|_, v| v.expires_at > now);
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn put_if_absent(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> std::result::Result<bool, StoreError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::purge_expired(&mut entries, now);

        if entries.contains_key(key) {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            StoredValue {
                bytes: value,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn get(&self, key: &str) -> std::result::Result<Option<Vec<u8>>, StoreError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some(v) if v.expires_at > Instant::now() => Ok(Some(v.bytes.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> std::result::Result<bool, StoreError> {
        Ok(self.entries.lock().remove(key).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_if_absent_rejects_existing() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(60);
        assert!(store.put_if_absent("k", b"one".to_vec(), ttl).await.unwrap());
        assert!(!store.put_if_absent("k", b"two".to_vec(), ttl).await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), Some(b"one".to_vec()));
    }

    #[tokio::test]
    async fn test_expired_entry_reads_absent() {
        let store = MemoryStore::new();
        store
            .put_if_absent("k", b"v".to_vec(), Duration::from_millis(10))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
        assert!(store.is_empty());
        // An expired key no longer blocks a fresh insert.
        assert!(store
            .put_if_absent("k", b"w".to_vec(), Duration::from_secs(60))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = MemoryStore::new();
        store
            .put_if_absent("k", b"v".to_vec(), Duration::from_secs(60))
            .await
            .unwrap();
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.len(), 0);
    }
}
