//! Public encoding - Cycle-safe deep clone of an instance graph for exposure
//! outside the store.

use serde::{Serialize, Serializer};
use serde_json::{Map, Value as Json};

use super::ModelInstance;
use crate::error::Result;
use crate::value::{format_date, Value};

/// Placeholder for an instance that is already being cloned further up.
pub const CIRCULAR: &str = "[Circular]";

/// Placeholder substituted once the depth ceiling is reached.
pub const CIRCULAR_DEPTH_EXCEEDED: &str = "[Circular depth exceeded]";

struct SafeClone<'a> {
    type_key: &'a str,
    force_typing: bool,
    max_depth: usize,
    /// Instances currently being cloned, outermost first.
    ancestors: Vec<usize>,
}

impl ModelInstance {
    /// Public JSON form; `null` for an unloaded instance.
    ///
    /// Nested unloaded instances collapse to `{ $ref, <typeKey> }` stubs. An
    /// instance reached again while it is still being cloned becomes
    /// `"[Circular]"`; the same instance appearing twice side by side is
    /// cloned both times.
    pub fn to_json(&self) -> Result<Json> {
        self.public_json(false)
    }

    /// Like [`to_json`](Self::to_json), with a type tag on every inlined instance.
    pub fn to_json_typed(&self) -> Result<Json> {
        self.public_json(true)
    }

    fn public_json(&self, force_typing: bool) -> Result<Json> {
        if !self.loaded() {
            return Ok(Json::Null);
        }
        let config = self.odm().config();
        let mut cloner = SafeClone {
            type_key: &config.type_key,
            force_typing,
            max_depth: config.max_clone_depth,
            ancestors: Vec::new(),
        };
        cloner.instance(self, 0)
    }
}

impl SafeClone<'_> {
    fn instance(&mut self, instance: &ModelInstance, depth: usize) -> Result<Json> {
        if depth > self.max_depth {
            log::warn!("depth limit exceeded while cloning {}", instance.short_label());
            return Ok(Json::String(CIRCULAR_DEPTH_EXCEEDED.to_string()));
        }
        if self.ancestors.contains(&instance.addr()) {
            return Ok(Json::String(CIRCULAR.to_string()));
        }

        self.ancestors.push(instance.addr());
        let cloned = self.fields(instance, depth);
        self.ancestors.pop();
        let mut out = cloned?;

        let schema = instance.schema();
        if out.is_empty() {
            let mut stub = Map::new();
            stub.insert("$ref".to_string(), Json::String(instance.id()?));
            stub.insert(
                self.type_key.to_string(),
                Json::String(schema.name().to_string()),
            );
            return Ok(Json::Object(stub));
        }
        if self.force_typing {
            out.insert(
                self.type_key.to_string(),
                Json::String(schema.name().to_string()),
            );
        }
        Ok(Json::Object(out))
    }

    fn fields(&mut self, instance: &ModelInstance, depth: usize) -> Result<Map<String, Json>> {
        let mut out = Map::new();
        for (name, value) in instance.fields() {
            out.insert(name, self.value(&value, depth)?);
        }
        Ok(out)
    }

    fn value(&mut self, value: &Value, depth: usize) -> Result<Json> {
        match value {
            Value::Null => Ok(Json::Null),
            Value::Bool(b) => Ok(Json::Bool(*b)),
            Value::Number(n) => Ok(Json::Number(n.clone())),
            Value::String(s) => Ok(Json::String(s.clone())),
            Value::Date(d) => Ok(Json::String(format_date(d))),
            Value::Model(instance) => self.instance(instance, depth + 1),
            Value::Array(items) => {
                if depth + 1 > self.max_depth {
                    return Ok(Json::String(CIRCULAR_DEPTH_EXCEEDED.to_string()));
                }
                items
                    .iter()
                    .map(|item| self.value(item, depth + 1))
                    .collect::<Result<Vec<_>>>()
                    .map(Json::Array)
            }
            Value::Object(map) => {
                if depth + 1 > self.max_depth {
                    return Ok(Json::String(CIRCULAR_DEPTH_EXCEEDED.to_string()));
                }
                let mut out = Map::new();
                for (key, sub) in map {
                    out.insert(key.clone(), self.value(sub, depth + 1)?);
                }
                Ok(Json::Object(out))
            }
        }
    }
}

impl Serialize for ModelInstance {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use serde::ser::Error;
        self.to_json()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}
