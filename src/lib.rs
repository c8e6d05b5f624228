//! docmodel - Schema-driven document mapping over key-value document stores.
//!
//! Typed model instances are persisted as JSON documents keyed
//! `<namePath>|<id>`. Declared reference indexes are kept as secondary
//! documents so instances can be found by field value in stores that only
//! offer single-key compare-and-swap.

mod config;
mod error;
mod model;
mod odm;
mod query;
mod schema;
mod store;
mod value;

pub use config::{OdmConfig, DEFAULT_MAX_CLONE_DEPTH, DEFAULT_TYPE_KEY};
pub use error::{OdmError, Result, StoreError};
pub use model::{
    GetOptions, HydrationData, Model, ModelInstance, CIRCULAR, CIRCULAR_DEPTH_EXCEEDED,
};
pub use odm::{Odm, OdmBuilder};
pub use query::{FindOptions, QueryEngine};
pub use schema::{
    DefaultValue, Field, FieldType, Hook, HookEvent, HookRegistry, RefIndex, Schema,
    SchemaBuilder, Validator, ANY_MODEL, DEFAULT_ID_FIELD,
};
pub use store::{Cas, DocumentStore, InMemoryDocumentStore};
pub use value::{coerce_date, format_date, Value};
