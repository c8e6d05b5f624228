//! Models - Typed handles for registered schemas and their instances.
//!
//! A [`Model`] is what [`Odm::model`](crate::Odm::model) hands back: it builds
//! instances, resolves references and runs lookups for one model type. The
//! instances themselves ([`ModelInstance`]) carry identity, field data and
//! the save/load/remove protocol.
//!
//! ## Example
//!
//! ```ignore
//! use docmodel::{Field, FieldType, GetOptions, InMemoryDocumentStore, Odm, Schema};
//!
//! let odm = Odm::new(InMemoryDocumentStore::new());
//! let stores = odm.model(Schema::builder("Store").field(Field::new("name", FieldType::String)))?;
//!
//! let store = stores.create([("name", "Corner Shop")]).await?;
//! let again = stores.get_by_id(&store.id()?, &GetOptions::default()).await?;
//! assert_eq!(again.get("name"), store.get("name"));
//! ```

mod encode;
mod instance;
mod json;
mod path;
mod persist;
mod saga;

use futures::future::try_join_all;
use futures::FutureExt;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::error::{OdmError, Result};
use crate::odm::Odm;
use crate::query::FindOptions;
use crate::schema::{Hook, HookEvent, Schema};
use crate::value::Value;

pub use instance::{HydrationData, ModelInstance};
pub use json::{CIRCULAR, CIRCULAR_DEPTH_EXCEEDED};

/// Options for [`Model::get_by_id`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GetOptions {
    /// Path groups to load after the instance itself, in order. The paths
    /// of one group load together.
    pub load: Vec<Vec<String>>,
}

impl GetOptions {
    /// Load each path in turn.
    pub fn load<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        GetOptions {
            load: paths.into_iter().map(|path| vec![path.into()]).collect(),
        }
    }

    /// Append a group of paths that load as one concurrent batch.
    pub fn load_together<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.load.push(paths.into_iter().map(Into::into).collect());
        self
    }
}

/// Handle for one registered model type. Cheap to clone.
#[derive(Clone)]
pub struct Model {
    schema: Arc<Schema>,
    odm: Odm,
}

impl Model {
    pub(crate) fn new(schema: Arc<Schema>, odm: Odm) -> Self {
        Model { schema, odm }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn name_path(&self) -> &str {
        self.schema.name_path()
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn odm(&self) -> &Odm {
        &self.odm
    }

    /// Build a new, unsaved instance from user data over the schema defaults.
    pub fn new_instance<I, K, V>(&self, data: I) -> Result<ModelInstance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        ModelInstance::construct(self, data)
    }

    /// Build an instance from user data and save it.
    pub async fn create<I, K, V>(&self, data: I) -> Result<ModelInstance>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let instance = self.new_instance(data)?;
        instance.save().await?;
        Ok(instance)
    }

    /// Instance hydrated from a storage-format document, without defaults.
    pub fn from_data(&self, data: serde_json::Value) -> Result<ModelInstance> {
        ModelInstance::from_data(self, data)
    }

    /// Unloaded handle for a full store key. No I/O.
    pub fn ref_by_key(&self, key: impl Into<String>) -> ModelInstance {
        ModelInstance::reference(self, key.into())
    }

    /// Unloaded handle for an id. No I/O.
    pub fn ref_id(&self, id: &str) -> ModelInstance {
        self.ref_by_key(self.schema.key_for(id))
    }

    /// Load the instance stored under `id`, then any requested paths.
    pub async fn get_by_id(&self, id: &str, options: &GetOptions) -> Result<ModelInstance> {
        let instance = self.ref_id(id);
        let groups: Vec<Vec<&str>> = options
            .load
            .iter()
            .map(|group| group.iter().map(String::as_str).collect())
            .collect();
        let groups: Vec<&[&str]> = groups.iter().map(Vec::as_slice).collect();
        instance.load_path_groups(&groups).await?;
        Ok(instance)
    }

    /// Run `filter` through the configured query engine and load every match.
    pub async fn find(
        &self,
        filter: &serde_json::Value,
        options: &FindOptions,
    ) -> Result<Vec<ModelInstance>> {
        let engine = self
            .odm
            .query_engine()
            .ok_or(OdmError::QueryUnsupported)?;
        let keys = engine.find(self, filter, options).await?;
        let instances: Vec<ModelInstance> =
            keys.into_iter().map(|key| self.ref_by_key(key)).collect();
        try_join_all(instances.iter().map(ModelInstance::load)).await?;
        Ok(instances)
    }

    pub async fn count(&self, filter: &serde_json::Value, options: &FindOptions) -> Result<usize> {
        let engine = self
            .odm
            .query_engine()
            .ok_or(OdmError::QueryUnsupported)?;
        engine.count(self, filter, options).await
    }

    /// Follow the reference document of a declared index to its owner.
    pub async fn find_by_index(&self, fields: &[&str], values: &[Value]) -> Result<ModelInstance> {
        let index = self
            .schema
            .indexes()
            .iter()
            .find(|index| index.covers(fields))
            .ok_or_else(|| OdmError::UnknownField {
                owner: format!("{} ref index", self.name()),
                field: fields.join(","),
            })?;
        if values.len() != fields.len() {
            return Err(OdmError::TypeMismatch {
                field: fields.join(","),
                expected: format!("{} index values", fields.len()),
            });
        }
        let ref_key = index
            .key_for(self.name_path(), values)?
            .ok_or_else(|| OdmError::TypeMismatch {
                field: fields.join(","),
                expected: "non-null index values".to_string(),
            })?;

        let (owner, _) = self.odm.store().get(&ref_key).await?;
        let key = owner.as_str().ok_or_else(|| OdmError::TypeMismatch {
            field: ref_key.clone(),
            expected: "a key string".to_string(),
        })?;
        let instance = self.ref_by_key(key);
        instance.load().await?;
        Ok(instance)
    }

    /// Register a hook that runs before `event`.
    pub fn pre<F, Fut>(&self, event: HookEvent, handler: F)
    where
        F: Fn(ModelInstance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.schema.hooks().add_pre(event, into_hook(handler));
    }

    /// Register a hook that runs after `event`.
    pub fn post<F, Fut>(&self, event: HookEvent, handler: F)
    where
        F: Fn(ModelInstance) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.schema.hooks().add_post(event, into_hook(handler));
    }
}

fn into_hook<F, Fut>(handler: F) -> Hook
where
    F: Fn(ModelInstance) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |instance: ModelInstance| handler(instance).boxed())
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.schema.name())
            .field("name_path", &self.schema.name_path())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, FieldType};
    use crate::store::InMemoryDocumentStore;

    fn users() -> Model {
        let odm = Odm::new(InMemoryDocumentStore::new());
        odm.model(
            Schema::builder("User")
                .field(Field::new("name", FieldType::String))
                .field(Field::new("age", FieldType::Integer).default_value(18)),
        )
        .unwrap()
    }

    #[test]
    fn new_instance_applies_defaults() {
        let users = users();
        let user = users.new_instance([("name", "ada")]).unwrap();
        assert!(user.loaded());
        assert_eq!(user.get("age"), Some(Value::from(18)));
        assert!(user.get("_id").and_then(|v| v.as_str().map(str::to_string)).is_some());
        assert!(user.key().is_none());
    }

    #[test]
    fn new_instance_rejects_unknown_fields() {
        let err = users().new_instance([("nickname", "a")]).unwrap_err();
        assert!(matches!(err, OdmError::UnknownField { .. }));
    }

    #[test]
    fn references_are_unloaded_and_keyed() {
        let users = users();
        let user = users.ref_id("42");
        assert!(!user.loaded());
        assert_eq!(user.key().as_deref(), Some("User|42"));
        assert_eq!(user.id().unwrap(), "42");
        assert_eq!(user.to_json().unwrap(), serde_json::Value::Null);
    }

    #[test]
    fn id_fixes_the_key_once() {
        let users = users();
        let user = users.new_instance([("_id", "u1")]).unwrap();
        assert_eq!(user.id().unwrap(), "u1");
        assert_eq!(user.id().unwrap(), "u1");
        assert_eq!(user.key().as_deref(), Some("User|u1"));

        user.set("_id", "u2").unwrap();
        assert!(matches!(user.id(), Err(OdmError::KeyChanged { .. })));
    }

    #[test]
    fn malformed_reference_keys_fail_id() {
        let users = users();
        let user = users.ref_by_key("Other|1");
        assert!(matches!(user.id(), Err(OdmError::MalformedKey { .. })));
    }

    #[tokio::test]
    async fn find_without_engine_is_unsupported() {
        let users = users();
        let err = users
            .find(&serde_json::json!({}), &FindOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, OdmError::QueryUnsupported));
    }
}
