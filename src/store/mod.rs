//! Document stores - The single-document key-value interface models persist through.
//!
//! A store only ever sees one document per call. Compare-and-swap on
//! `store`/`remove` is the only concurrency primitive it offers; everything
//! that spans documents is coordinated by the model layer.

mod in_memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::StoreError;

/// Opaque version stamp of a stored document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Cas(u64);

impl Cas {
    pub fn new(value: u64) -> Self {
        Cas(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Cas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Abstract key-value document storage with compare-and-swap mutations.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document and its current CAS.
    async fn get(&self, key: &str) -> Result<(serde_json::Value, Cas), StoreError>;

    /// Write a document. With `None` the write is an unconditional upsert;
    /// with `Some(cas)` it only succeeds if the stored version still carries `cas`.
    async fn store(
        &self,
        key: &str,
        data: serde_json::Value,
        cas: Option<Cas>,
    ) -> Result<Cas, StoreError>;

    /// Delete a document, optionally guarded by `cas`.
    async fn remove(&self, key: &str, cas: Option<Cas>) -> Result<(), StoreError>;
}

pub use in_memory::InMemoryDocumentStore;
