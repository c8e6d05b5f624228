//! Odm - The context models are registered on: store handle, configuration,
//! query engine and the model registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use crate::config::OdmConfig;
use crate::error::{OdmError, Result};
use crate::model::Model;
use crate::query::QueryEngine;
use crate::schema::{Schema, SchemaBuilder};
use crate::store::DocumentStore;

#[derive(Default)]
struct Registry {
    by_name: HashMap<String, Arc<Schema>>,
    by_path: HashMap<String, Arc<Schema>>,
}

struct OdmInner {
    config: OdmConfig,
    store: Arc<dyn DocumentStore>,
    query: Option<Arc<dyn QueryEngine>>,
    registry: RwLock<Registry>,
}

/// Shared ODM context. Cheap to clone; clones see the same registry.
#[derive(Clone)]
pub struct Odm {
    inner: Arc<OdmInner>,
}

impl Odm {
    /// Context with default configuration and no query engine.
    pub fn new<S: DocumentStore + 'static>(store: S) -> Self {
        Self::builder(store).build()
    }

    pub fn builder<S: DocumentStore + 'static>(store: S) -> OdmBuilder {
        OdmBuilder {
            config: OdmConfig::default(),
            store: Arc::new(store),
            query: None,
        }
    }

    pub fn config(&self) -> &OdmConfig {
        &self.inner.config
    }

    pub fn type_key(&self) -> &str {
        &self.inner.config.type_key
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.inner.store
    }

    pub fn query_engine(&self) -> Option<&Arc<dyn QueryEngine>> {
        self.inner.query.as_ref()
    }

    /// Build and register a model type. Names must be unique per context.
    pub fn model(&self, builder: SchemaBuilder) -> Result<Model> {
        let schema = Arc::new(builder.build(&self.inner.config)?);
        {
            let mut registry = self
                .inner
                .registry
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            if registry.by_name.contains_key(schema.name())
                || registry.by_path.contains_key(schema.name_path())
            {
                return Err(OdmError::DuplicateModel {
                    name: schema.name().to_string(),
                });
            }
            registry
                .by_name
                .insert(schema.name().to_string(), schema.clone());
            registry
                .by_path
                .insert(schema.name_path().to_string(), schema.clone());
        }
        log::debug!("registered model {}", schema.name_path());
        Ok(Model::new(schema, self.clone()))
    }

    /// Registered model by its short name.
    pub fn get_model(&self, name: &str) -> Result<Model> {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        registry
            .by_name
            .get(name)
            .cloned()
            .map(|schema| Model::new(schema, self.clone()))
            .ok_or_else(|| OdmError::UnknownModel {
                name: name.to_string(),
            })
    }

    /// Registered model by its name path (the form used in type tags).
    pub fn model_by_name_path(&self, name_path: &str) -> Result<Model> {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        registry
            .by_path
            .get(name_path)
            .cloned()
            .map(|schema| Model::new(schema, self.clone()))
            .ok_or_else(|| OdmError::UnknownModel {
                name: name_path.to_string(),
            })
    }

    /// Names of all registered models, sorted.
    pub fn model_names(&self) -> Vec<String> {
        let registry = self
            .inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = registry.by_name.keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for Odm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Odm")
            .field("config", &self.inner.config)
            .field("models", &self.model_names())
            .field("query_engine", &self.inner.query.is_some())
            .finish()
    }
}

/// Builder for [`Odm`].
pub struct OdmBuilder {
    config: OdmConfig,
    store: Arc<dyn DocumentStore>,
    query: Option<Arc<dyn QueryEngine>>,
}

impl OdmBuilder {
    pub fn config(mut self, config: OdmConfig) -> Self {
        self.config = config;
        self
    }

    pub fn query_engine<Q: QueryEngine + 'static>(mut self, engine: Q) -> Self {
        self.query = Some(Arc::new(engine));
        self
    }

    pub fn build(self) -> Odm {
        Odm {
            inner: Arc::new(OdmInner {
                config: self.config,
                store: self.store,
                query: self.query,
                registry: RwLock::new(Registry::default()),
            }),
        }
    }
}
