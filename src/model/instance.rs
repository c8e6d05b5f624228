//! ModelInstance - One in-memory document: identity, lifecycle state and field values.

use indexmap::IndexMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::Model;
use crate::error::{OdmError, Result};
use crate::odm::Odm;
use crate::schema::{self, Schema};
use crate::store::Cas;
use crate::value::Value;

/// Storage-format data an instance is hydrated from.
#[derive(Debug, Clone)]
pub struct HydrationData {
    pub key: Option<String>,
    pub data: serde_json::Value,
    pub cas: Option<Cas>,
}

/// Persistence bookkeeping owned by a single instance.
#[derive(Debug, Clone, Default)]
struct InstanceState {
    /// `<namePath>|<id>`; fixed the first time it is known.
    key: Option<String>,
    cas: Option<Cas>,
    /// False for a bare reference handle that only knows its key.
    loaded: bool,
    /// Reference-index keys as of the last successful load or save.
    ref_keys: Vec<String>,
}

struct InstanceData {
    state: InstanceState,
    fields: IndexMap<String, Value>,
}

struct InstanceInner {
    model: Model,
    data: RwLock<InstanceData>,
}

/// A handle to one model instance.
///
/// Clones share the same instance, so a reference held in another
/// instance's field observes loads and saves made through any handle.
/// Locks are only held for the duration of a single accessor call.
#[derive(Clone)]
pub struct ModelInstance {
    inner: Arc<InstanceInner>,
}

impl ModelInstance {
    fn build(model: &Model, state: InstanceState, fields: IndexMap<String, Value>) -> Self {
        ModelInstance {
            inner: Arc::new(InstanceInner {
                model: model.clone(),
                data: RwLock::new(InstanceData { state, fields }),
            }),
        }
    }

    /// Fresh, loaded, not yet keyed instance built from user data on top of
    /// the schema defaults.
    pub(crate) fn construct<I, K, V>(model: &Model, data: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let schema = model.schema();
        let mut fields = IndexMap::new();
        for field in schema.fields() {
            if let Some(initial) = field.initial_value() {
                fields.insert(field.name().to_string(), initial);
            }
        }
        for (name, value) in data {
            let name = name.into();
            if schema.field(&name).is_none() {
                return Err(OdmError::UnknownField {
                    owner: schema.name().to_string(),
                    field: name,
                });
            }
            fields.insert(name, value.into());
        }

        let state = InstanceState {
            loaded: true,
            ..InstanceState::default()
        };
        Ok(Self::build(model, state, fields))
    }

    /// Unloaded handle for a stored document. No I/O.
    pub(crate) fn reference(model: &Model, key: String) -> Self {
        let state = InstanceState {
            key: Some(key),
            ..InstanceState::default()
        };
        Self::build(model, state, IndexMap::new())
    }

    /// Instance materialised purely from storage-format data. Defaults and
    /// validation are not applied.
    pub(crate) fn from_data(model: &Model, data: serde_json::Value) -> Result<Self> {
        let instance = Self::build(model, InstanceState::default(), IndexMap::new());
        instance.apply_data(HydrationData {
            key: None,
            data,
            cas: None,
        })?;
        Ok(instance)
    }

    fn read(&self) -> RwLockReadGuard<'_, InstanceData> {
        self.inner.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, InstanceData> {
        self.inner.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn model(&self) -> &Model {
        &self.inner.model
    }

    pub fn schema(&self) -> &Schema {
        self.inner.model.schema()
    }

    pub(crate) fn odm(&self) -> &Odm {
        self.inner.model.odm()
    }

    pub fn loaded(&self) -> bool {
        self.read().state.loaded
    }

    pub fn key(&self) -> Option<String> {
        self.read().state.key.clone()
    }

    pub fn cas(&self) -> Option<Cas> {
        self.read().state.cas
    }

    /// Reference-index keys recorded at the last load or save.
    pub fn ref_keys(&self) -> Vec<String> {
        self.read().state.ref_keys.clone()
    }

    pub fn get(&self, field: &str) -> Option<Value> {
        self.read().fields.get(field).cloned()
    }

    /// Assign a declared field.
    pub fn set(&self, field: &str, value: impl Into<Value>) -> Result<()> {
        if self.schema().field(field).is_none() {
            return Err(OdmError::UnknownField {
                owner: self.schema().name().to_string(),
                field: field.to_string(),
            });
        }
        self.write().fields.insert(field.to_string(), value.into());
        Ok(())
    }

    pub fn unset(&self, field: &str) -> Option<Value> {
        self.write().fields.shift_remove(field)
    }

    /// Snapshot of the current field values.
    pub fn fields(&self) -> IndexMap<String, Value> {
        self.read().fields.clone()
    }

    /// The instance id.
    ///
    /// Unloaded handles strip the name-path prefix off their key. Loaded
    /// instances render the id field and fix `key` the first time; a later
    /// disagreement fails with `KeyChanged`.
    pub fn id(&self) -> Result<String> {
        let schema = self.schema();
        let prefix = schema.key_prefix();

        let (loaded, key, raw_id) = {
            let data = self.read();
            (
                data.state.loaded,
                data.state.key.clone(),
                data.fields.get(schema.id_field()).cloned(),
            )
        };

        if !loaded {
            let key = key.unwrap_or_default();
            return match key.strip_prefix(&prefix) {
                Some(id) => Ok(id.to_string()),
                None => Err(OdmError::MalformedKey { key, prefix }),
            };
        }

        let id = render_id(schema, raw_id)?;
        let computed = format!("{}{}", prefix, id);

        let mut data = self.write();
        match &data.state.key {
            Some(existing) if *existing != computed => Err(OdmError::KeyChanged {
                existing: existing.clone(),
                computed,
            }),
            Some(_) => Ok(id),
            None => {
                data.state.key = Some(computed);
                Ok(id)
            }
        }
    }

    /// Current key, deriving it from the id field first when loaded.
    pub(crate) fn model_key(&self) -> Result<String> {
        if self.loaded() {
            self.id()?;
        }
        self.key().ok_or_else(|| OdmError::MalformedKey {
            key: String::new(),
            prefix: self.schema().key_prefix(),
        })
    }

    /// The only way an instance becomes loaded from stored data.
    pub(crate) fn apply_data(&self, hydration: HydrationData) -> Result<()> {
        if let Some(existing) = self.key() {
            if hydration.key.as_deref() != Some(existing.as_str()) {
                return Err(OdmError::KeyMismatch {
                    existing,
                    incoming: hydration.key.unwrap_or_default(),
                });
            }
        }

        let fields = schema::decode_document(self.odm(), self.schema(), hydration.data)?;
        {
            let mut data = self.write();
            data.state.key = hydration.key;
            data.state.cas = hydration.cas;
            data.state.loaded = true;
            data.fields = fields;
        }

        let ref_keys = schema::ref_keys(self)?;
        self.write().state.ref_keys = ref_keys;
        Ok(())
    }

    pub(crate) fn record_saved(&self, cas: Cas, ref_keys: Vec<String>) {
        let mut data = self.write();
        data.state.cas = Some(cas);
        data.state.ref_keys = ref_keys;
    }

    pub(crate) fn record_removed(&self) {
        let mut data = self.write();
        data.state.cas = None;
        data.state.ref_keys.clear();
    }

    /// Identity of the shared instance, for cycle detection.
    pub(crate) fn addr(&self) -> usize {
        Arc::as_ptr(&self.inner) as usize
    }

    pub fn same_instance(&self, other: &ModelInstance) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// `Name(key)` without touching field data.
    pub(crate) fn short_label(&self) -> String {
        match self.key() {
            Some(key) => format!("{}({})", self.schema().name(), key),
            None => format!("{}(unsaved)", self.schema().name()),
        }
    }
}

fn render_id(schema: &Schema, raw: Option<Value>) -> Result<String> {
    match raw {
        Some(Value::String(s)) if !s.is_empty() => Ok(s),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(Value::Null) | None | Some(Value::String(_)) => Err(OdmError::MissingId {
            model: schema.name().to_string(),
            field: schema.id_field().to_string(),
        }),
        Some(other) => Err(OdmError::TypeMismatch {
            field: schema.id_field().to_string(),
            expected: format!("a scalar id, got {}", other.kind()),
        }),
    }
}

/// Two handles are equal when they share the instance, or describe the same
/// stored document (same model and key). Unkeyed instances of the same model
/// compare by field values.
impl PartialEq for ModelInstance {
    fn eq(&self, other: &Self) -> bool {
        if self.same_instance(other) {
            return true;
        }
        if self.schema().name_path() != other.schema().name_path() {
            return false;
        }
        match (self.key(), other.key()) {
            (Some(a), Some(b)) => a == b,
            (None, None) => self.loaded() == other.loaded() && self.fields() == other.fields(),
            _ => false,
        }
    }
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Snapshot first: a field may point back at this instance.
        let (state, fields) = {
            let data = self.read();
            (data.state.clone(), data.fields.clone())
        };
        write!(
            f,
            "Model(`{}`, {}, key:{}, ",
            self.schema().name(),
            if state.loaded { "loaded" } else { "unloaded" },
            state.key.as_deref().unwrap_or("null"),
        )?;
        f.debug_map().entries(fields.iter()).finish()?;
        write!(f, ")")
    }
}
