//! InMemoryDocumentStore - HashMap-backed document store for testing and development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use super::{Cas, DocumentStore};
use crate::error::StoreError;

/// Process-wide so a document deleted and recreated never sees an old token again.
static NEXT_CAS: AtomicU64 = AtomicU64::new(1);

fn next_cas() -> Cas {
    Cas::new(NEXT_CAS.fetch_add(1, Ordering::Relaxed))
}

/// Internal stored representation of a document.
struct StoredDocument {
    bytes: Vec<u8>,
    cas: Cas,
}

/// In-memory document store backed by a HashMap.
///
/// Clone-friendly via Arc; clones share the same documents.
#[derive(Clone)]
pub struct InMemoryDocumentStore {
    storage: Arc<RwLock<HashMap<String, StoredDocument>>>,
}

impl Default for InMemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDocumentStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            storage: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.storage
            .read()
            .map(|storage| storage.contains_key(key))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.storage.read().map(|storage| storage.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .storage
            .read()
            .map(|storage| storage.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    /// Decoded document stored under `key`, bypassing CAS bookkeeping.
    pub fn raw(&self, key: &str) -> Option<serde_json::Value> {
        let storage = self.storage.read().ok()?;
        let stored = storage.get(key)?;
        serde_json::from_slice(&stored.bytes).ok()
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, key: &str) -> Result<(serde_json::Value, Cas), StoreError> {
        let storage = self
            .storage
            .read()
            .map_err(|_| StoreError::Io("lock poisoned".into()))?;

        match storage.get(key) {
            Some(stored) => {
                let data = serde_json::from_slice(&stored.bytes)
                    .map_err(|e| StoreError::Io(e.to_string()))?;
                Ok((data, stored.cas))
            }
            None => Err(StoreError::NotFound {
                key: key.to_string(),
            }),
        }
    }

    async fn store(
        &self,
        key: &str,
        data: serde_json::Value,
        cas: Option<Cas>,
    ) -> Result<Cas, StoreError> {
        let bytes = serde_json::to_vec(&data).map_err(|e| StoreError::Io(e.to_string()))?;

        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::Io("lock poisoned".into()))?;

        if let Some(expected) = cas {
            match storage.get(key) {
                None => {
                    return Err(StoreError::NotFound {
                        key: key.to_string(),
                    })
                }
                Some(stored) if stored.cas != expected => {
                    return Err(StoreError::CasConflict {
                        key: key.to_string(),
                    })
                }
                Some(_) => {}
            }
        }

        let new_cas = next_cas();
        storage.insert(
            key.to_string(),
            StoredDocument {
                bytes,
                cas: new_cas,
            },
        );
        Ok(new_cas)
    }

    async fn remove(&self, key: &str, cas: Option<Cas>) -> Result<(), StoreError> {
        let mut storage = self
            .storage
            .write()
            .map_err(|_| StoreError::Io("lock poisoned".into()))?;

        let current = storage
            .get(key)
            .map(|stored| stored.cas)
            .ok_or_else(|| StoreError::NotFound {
                key: key.to_string(),
            })?;

        if let Some(expected) = cas {
            if current != expected {
                return Err(StoreError::CasConflict {
                    key: key.to_string(),
                });
            }
        }

        storage.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn store_and_get() {
        let store = InMemoryDocumentStore::new();
        let cas = store.store("User|1", json!({"name": "Ann"}), None).await.unwrap();

        let (data, loaded_cas) = store.get("User|1").await.unwrap();
        assert_eq!(data, json!({"name": "Ann"}));
        assert_eq!(loaded_cas, cas);
    }

    #[tokio::test]
    async fn store_issues_new_cas() {
        let store = InMemoryDocumentStore::new();
        let first = store.store("k", json!(1), None).await.unwrap();
        let second = store.store("k", json!(2), Some(first)).await.unwrap();
        assert_ne!(first, second);
    }

    #[tokio::test]
    async fn get_missing_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn stale_cas_is_rejected() {
        let store = InMemoryDocumentStore::new();
        let first = store.store("k", json!(1), None).await.unwrap();
        store.store("k", json!(2), Some(first)).await.unwrap();

        let err = store.store("k", json!(3), Some(first)).await.unwrap_err();
        assert!(matches!(err, StoreError::CasConflict { .. }));
        assert_eq!(store.raw("k"), Some(json!(2)));
    }

    #[tokio::test]
    async fn cas_on_missing_document_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store.store("k", json!(1), Some(Cas::new(7))).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
        assert!(!store.contains("k"));
    }

    #[tokio::test]
    async fn upsert_without_cas_overwrites() {
        let store = InMemoryDocumentStore::new();
        store.store("k", json!(1), None).await.unwrap();
        store.store("k", json!(2), None).await.unwrap();
        assert_eq!(store.raw("k"), Some(json!(2)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn remove_checks_cas() {
        let store = InMemoryDocumentStore::new();
        let cas = store.store("k", json!(1), None).await.unwrap();

        let err = store.remove("k", Some(Cas::new(cas.value() + 1000))).await.unwrap_err();
        assert!(matches!(err, StoreError::CasConflict { .. }));
        assert!(store.contains("k"));

        store.remove("k", Some(cas)).await.unwrap();
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn remove_missing_is_not_found() {
        let store = InMemoryDocumentStore::new();
        let err = store.remove("missing", None).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound { .. }));
    }

    #[tokio::test]
    async fn clone_shares_storage() {
        let store = InMemoryDocumentStore::new();
        let clone = store.clone();
        store.store("a", json!("x"), None).await.unwrap();
        store.store("b", json!("y"), None).await.unwrap();
        assert_eq!(clone.keys(), vec!["a".to_string(), "b".to_string()]);
    }
}
