//! Store wrapper that records every call and fails the ones it is told to.

use async_trait::async_trait;
use docmodel::{Cas, DocumentStore, InMemoryDocumentStore, StoreError};
use std::sync::{Arc, Mutex};

/// One call made against the store, in the order it was issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Get(String),
    Store(String),
    Remove(String),
}

impl Op {
    pub fn key(&self) -> &str {
        match self {
            Op::Get(key) | Op::Store(key) | Op::Remove(key) => key,
        }
    }
}

#[derive(Default)]
struct Faults {
    /// Store calls (1-based, counted since the last reset) that must fail.
    store_calls: Vec<usize>,
    store_seen: usize,
    store_prefixes: Vec<String>,
    remove_prefixes: Vec<String>,
}

/// Clones share the same documents, journal and faults.
#[derive(Clone, Default)]
pub struct FlakyStore {
    inner: InMemoryDocumentStore,
    ops: Arc<Mutex<Vec<Op>>>,
    faults: Arc<Mutex<Faults>>,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The backing store, for inspecting what actually got written.
    pub fn inner(&self) -> &InMemoryDocumentStore {
        &self.inner
    }

    pub fn ops(&self) -> Vec<Op> {
        self.ops.lock().unwrap().clone()
    }

    pub fn clear_ops(&self) {
        self.ops.lock().unwrap().clear();
    }

    pub fn stores(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Store(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub fn removes(&self) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Remove(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    /// Fail the `n`th store call from now on (1-based).
    pub fn fail_nth_store(&self, n: usize) {
        let mut faults = self.faults.lock().unwrap();
        let target = faults.store_seen + n;
        faults.store_calls.push(target);
    }

    pub fn fail_stores_matching(&self, prefix: &str) {
        self.faults
            .lock()
            .unwrap()
            .store_prefixes
            .push(prefix.to_string());
    }

    pub fn fail_removes_matching(&self, prefix: &str) {
        self.faults
            .lock()
            .unwrap()
            .remove_prefixes
            .push(prefix.to_string());
    }

    /// Drop every injected fault.
    pub fn heal(&self) {
        let mut faults = self.faults.lock().unwrap();
        faults.store_calls.clear();
        faults.store_prefixes.clear();
        faults.remove_prefixes.clear();
    }

    fn record(&self, op: Op) {
        self.ops.lock().unwrap().push(op);
    }

    fn injected(key: &str, call: &str) -> StoreError {
        StoreError::Io(format!("injected {} failure for {}", call, key))
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<(serde_json::Value, Cas), StoreError> {
        self.record(Op::Get(key.to_string()));
        self.inner.get(key).await
    }

    async fn store(
        &self,
        key: &str,
        data: serde_json::Value,
        cas: Option<Cas>,
    ) -> Result<Cas, StoreError> {
        self.record(Op::Store(key.to_string()));
        let fail = {
            let mut faults = self.faults.lock().unwrap();
            faults.store_seen += 1;
            let seen = faults.store_seen;
            faults.store_calls.contains(&seen)
                || faults.store_prefixes.iter().any(|p| key.starts_with(p))
        };
        if fail {
            return Err(Self::injected(key, "store"));
        }
        self.inner.store(key, data, cas).await
    }

    async fn remove(&self, key: &str, cas: Option<Cas>) -> Result<(), StoreError> {
        self.record(Op::Remove(key.to_string()));
        let fail = self
            .faults
            .lock()
            .unwrap()
            .remove_prefixes
            .iter()
            .any(|p| key.starts_with(p));
        if fail {
            return Err(Self::injected(key, "remove"));
        }
        self.inner.remove(key, cas).await
    }
}
