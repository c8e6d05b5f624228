//! Reference indexes - Secondary documents that make "find by field" lookups
//! possible in a store that only knows keys.
//!
//! Each index document lives at `<namePath>$<f1>_<f2>|<v1>|<v2>` and holds the
//! key of the instance whose fields produced it.

use crate::error::{OdmError, Result};
use crate::model::ModelInstance;
use crate::value::{format_date, Value};

/// A declared reference index over one or more (dotted) field paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefIndex {
    fields: Vec<String>,
}

impl RefIndex {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RefIndex {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn covers(&self, fields: &[&str]) -> bool {
        self.fields.len() == fields.len() && self.fields.iter().zip(fields).all(|(a, b)| a == b)
    }

    /// Key prefix shared by every document of this index.
    pub fn prefix(&self, name_path: &str) -> String {
        format!("{}${}", name_path, self.fields.join("_"))
    }

    /// Key of the index document for the given field values. `None` when any
    /// component is missing or null.
    pub fn key_for(&self, name_path: &str, values: &[Value]) -> Result<Option<String>> {
        let mut key = self.prefix(name_path);
        for (field, value) in self.fields.iter().zip(values) {
            match render_index_value(field, value)? {
                Some(part) => {
                    key.push('|');
                    key.push_str(&part);
                }
                None => return Ok(None),
            }
        }
        Ok(Some(key))
    }
}

/// Render one index component. References and embedded models index by id.
pub(crate) fn render_index_value(field: &str, value: &Value) -> Result<Option<String>> {
    match value {
        Value::Null => Ok(None),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::String(s) => Ok(Some(s.clone())),
        Value::Date(d) => Ok(Some(format_date(d))),
        Value::Model(instance) => instance.id().map(Some),
        Value::Array(_) | Value::Object(_) => Err(OdmError::TypeMismatch {
            field: field.to_string(),
            expected: "a scalar, date or model to index on".into(),
        }),
    }
}

/// Follow a dotted path through groups and embedded models.
pub(crate) fn lookup_path(instance: &ModelInstance, path: &str) -> Value {
    let mut parts = path.split('.');
    let mut current = match parts.next() {
        Some(first) => instance.get(first).unwrap_or_default(),
        None => return Value::Null,
    };
    for part in parts {
        current = match current {
            Value::Object(mut map) => map.shift_remove(part).unwrap_or_default(),
            Value::Model(inner) => inner.get(part).unwrap_or_default(),
            _ => Value::Null,
        };
    }
    current
}

/// Reference-index keys implied by the instance's current field state.
///
/// Fails with `NotLoaded` when the schema declares indexes but the instance
/// holds no field data.
pub(crate) fn ref_keys(instance: &ModelInstance) -> Result<Vec<String>> {
    let schema = instance.schema();
    if schema.indexes().is_empty() {
        return Ok(Vec::new());
    }
    if !instance.loaded() {
        return Err(OdmError::NotLoaded {
            model: schema.name().to_string(),
        });
    }

    let mut keys = Vec::new();
    for index in schema.indexes() {
        let values: Vec<Value> = index
            .fields()
            .iter()
            .map(|path| lookup_path(instance, path))
            .collect();
        if let Some(key) = index.key_for(schema.name_path(), &values)? {
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
    }
    Ok(keys)
}
