//! Persistence - The save / load / remove state machine of a single instance.

use futures::future::{join, join_all, BoxFuture};
use futures::FutureExt;
use serde_json::Value as Json;
use std::sync::Arc;

use super::saga::{CompensableAction, Saga, SagaFailure};
use super::{path, HydrationData, ModelInstance};
use crate::error::{OdmError, Result, StoreError};
use crate::schema::{self, HookEvent};
use crate::store::DocumentStore;
use crate::value::Value;

impl ModelInstance {
    /// Persist this instance and bring its reference documents up to date.
    ///
    /// New reference documents are written first and rolled back if any of
    /// them fails. The primary document is then stored under the held CAS.
    /// Reference documents the instance no longer implies are removed last,
    /// and failures there are only logged.
    pub async fn save(&self) -> Result<()> {
        if !self.loaded() {
            return Err(OdmError::NotLoaded {
                model: self.schema().name().to_string(),
            });
        }
        let schema = self.schema();
        schema.hooks().run_pre(HookEvent::Save, self).await?;
        schema::validate(self).await?;

        let key = self.model_key()?;
        let document = self.to_coo()?;
        let new_refs = schema::ref_keys(self)?;
        let old_refs = self.ref_keys();
        let added: Vec<String> = new_refs
            .iter()
            .filter(|k| !old_refs.contains(k))
            .cloned()
            .collect();
        let stale: Vec<String> = old_refs
            .iter()
            .filter(|k| !new_refs.contains(k))
            .cloned()
            .collect();

        let store = self.odm().store().clone();
        if !added.is_empty() {
            log::debug!("adding {} reference documents for {}", added.len(), key);
        }
        let mut saga = Saga::new();
        for ref_key in added {
            saga.push(add_ref_action(&store, ref_key, &key));
        }
        saga.run().await.map_err(|failure| match failure {
            SagaFailure::Failed(err) => OdmError::Store(err),
            SagaFailure::Critical(errors) => OdmError::AggregateRollback {
                errors: errors.into_iter().map(OdmError::Store).collect(),
            },
        })?;

        let cas = store.store(&key, document, self.cas()).await?;
        log::debug!("stored {} at cas {}", key, cas);
        self.record_saved(cas, new_refs);

        remove_refs(store.as_ref(), &stale, &key).await;

        schema.hooks().run_post(HookEvent::Save, self).await
    }

    /// Load this instance if it is not loaded yet.
    pub async fn load(&self) -> Result<()> {
        self.load_path_groups(&[]).await
    }

    /// Load this instance if needed, then every unloaded instance each path
    /// selects. Paths are handled in order; the instances one path selects
    /// load concurrently.
    pub async fn load_paths(&self, paths: &[&str]) -> Result<()> {
        let groups: Vec<&[&str]> = paths.iter().map(std::slice::from_ref).collect();
        self.load_path_groups(&groups).await
    }

    /// Like [`load_paths`](Self::load_paths), but every path of a group is
    /// resolved against the same state and all of their instances load as
    /// one concurrent batch. Groups run in order.
    ///
    /// Post-load hooks of this instance run alongside the sub-loads; their
    /// failures are logged.
    pub fn load_path_groups<'a>(
        &'a self,
        groups: &'a [&'a [&'a str]],
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            let fetched = !self.loaded();
            if fetched {
                self.fetch().await?;
            }
            let post_load = async {
                if fetched {
                    self.run_post_load().await;
                }
            };
            let ((), loaded) = join(post_load, self.load_groups(groups)).await;
            loaded
        }
        .boxed()
    }

    async fn load_groups(&self, groups: &[&[&str]]) -> Result<()> {
        let root = Value::Model(self.clone());
        for group in groups {
            let mut pending: Vec<ModelInstance> = Vec::new();
            for raw in group.iter().filter(|raw| !raw.trim().is_empty()) {
                let segments = path::parse(raw)?;
                for instance in path::collect_models(path::query(&root, &segments)) {
                    if !instance.loaded() && !pending.iter().any(|p| p.same_instance(&instance)) {
                        pending.push(instance);
                    }
                }
            }
            if pending.is_empty() {
                continue;
            }
            log::debug!(
                "paths {:?} selected {} unloaded instances",
                group,
                pending.len()
            );
            load_instances(pending).await;
        }
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        let schema = self.schema();
        schema.hooks().run_pre(HookEvent::Load, self).await?;

        let key = self.model_key()?;
        let (data, cas) = self.odm().store().get(&key).await?;
        self.apply_data(HydrationData {
            key: Some(key),
            data,
            cas: Some(cas),
        })
    }

    async fn run_post_load(&self) {
        if let Err(err) = self.schema().hooks().run_post(HookEvent::Load, self).await {
            log::warn!("post-load hook failed for {}: {}", self.short_label(), err);
        }
    }

    /// Load every unloaded instance among `items`, concurrently.
    ///
    /// Always resolves once every load has finished; individual failures are
    /// logged and otherwise ignored.
    pub async fn load_all(items: &[Value]) -> Result<()> {
        let pending: Vec<ModelInstance> = items
            .iter()
            .filter_map(Value::as_model)
            .filter(|instance| !instance.loaded())
            .cloned()
            .collect();
        load_instances(pending).await;
        Ok(())
    }

    /// [`load_all`](Self::load_all) for a dynamic value, which must be an array.
    pub async fn load_all_value(items: &Value) -> Result<()> {
        match items {
            Value::Array(items) => Self::load_all(items).await,
            other => Err(OdmError::TypeMismatch {
                field: "items".to_string(),
                expected: format!("an array, got {}", other.kind()),
            }),
        }
    }

    /// Delete the stored document, then its reference documents.
    ///
    /// The primary removal is CAS-checked. Once it has succeeded the remove
    /// counts as done: reference cleanup and post-remove hook failures are
    /// only logged.
    pub async fn remove(&self) -> Result<()> {
        let key = self.model_key()?;
        schema::ref_keys(self)?;

        let schema = self.schema();
        schema.hooks().run_pre(HookEvent::Remove, self).await?;

        let store = self.odm().store().clone();
        store.remove(&key, self.cas()).await?;
        log::debug!("removed {}", key);

        let recorded = self.ref_keys();
        self.record_removed();
        remove_refs(store.as_ref(), &recorded, &key).await;

        if let Err(err) = schema.hooks().run_post(HookEvent::Remove, self).await {
            log::warn!("post-remove hook failed for {}: {}", key, err);
        }
        Ok(())
    }
}

fn add_ref_action(
    store: &Arc<dyn DocumentStore>,
    ref_key: String,
    owner: &str,
) -> CompensableAction<StoreError> {
    let apply_store = store.clone();
    let undo_store = store.clone();
    let apply_key = ref_key.clone();
    let undo_key = ref_key.clone();
    let owner = Json::String(owner.to_string());

    CompensableAction::new(
        ref_key,
        move || {
            async move {
                apply_store
                    .store(&apply_key, owner, None)
                    .await
                    .map(|_| ())
            }
            .boxed()
        },
        move || async move { undo_store.remove(&undo_key, None).await }.boxed(),
    )
}

async fn load_instances(pending: Vec<ModelInstance>) {
    if pending.is_empty() {
        return;
    }
    let results = join_all(pending.iter().map(ModelInstance::load)).await;
    for (instance, result) in pending.iter().zip(results) {
        if let Err(err) = result {
            log::warn!("failed to load {}: {}", instance.short_label(), err);
        }
    }
}

async fn remove_refs(store: &dyn DocumentStore, keys: &[String], owner: &str) {
    let results = join_all(keys.iter().map(|key| store.remove(key, None))).await;
    for (key, result) in keys.iter().zip(results) {
        if let Err(err) = result {
            log::warn!("failed to remove reference {} of {}: {}", key, owner, err);
        }
    }
}
