//! Query delegation - Filters and counts are resolved by an external engine.
//!
//! This crate only defines the seam. An engine turns a filter into the keys
//! of matching documents; [`Model::find`](crate::Model::find) loads them.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::Model;

/// Options forwarded untouched to the query engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FindOptions {
    pub sort: Vec<String>,
    pub limit: Option<usize>,
    pub skip: Option<usize>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, field: impl Into<String>) -> Self {
        self.sort.push(field.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = Some(skip);
        self
    }
}

/// Resolves filters against stored documents of one model type.
#[async_trait]
pub trait QueryEngine: Send + Sync {
    /// Keys of the documents matching `filter`, in result order.
    async fn find(
        &self,
        model: &Model,
        filter: &serde_json::Value,
        options: &FindOptions,
    ) -> Result<Vec<String>>;

    /// Number of documents matching `filter`.
    async fn count(
        &self,
        model: &Model,
        filter: &serde_json::Value,
        options: &FindOptions,
    ) -> Result<usize>;
}
