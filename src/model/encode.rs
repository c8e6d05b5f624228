//! Storage encoding - Schema-directed transform of an instance into the
//! document written to the store.

use serde_json::{Map, Value as Json};

use super::ModelInstance;
use crate::error::{OdmError, Result};
use crate::schema::{Field, FieldType, ANY_MODEL};
use crate::value::{coerce_date, format_date, Value};

struct Encoder<'a> {
    type_key: &'a str,
    force_typing: bool,
    max_depth: usize,
    ancestors: Vec<usize>,
}

impl ModelInstance {
    /// The document this instance is stored as. The root always carries a
    /// type tag.
    pub fn to_coo(&self) -> Result<Json> {
        let config = self.odm().config();
        let mut encoder = Encoder {
            type_key: &config.type_key,
            force_typing: false,
            max_depth: config.max_clone_depth,
            ancestors: Vec::new(),
        };
        encoder.instance(self, ANY_MODEL, 0)
    }
}

impl Encoder<'_> {
    /// Encode an instance referenced as `ref_type`. The tag is injected when
    /// the runtime type differs from it or typing is forced.
    fn instance(&mut self, instance: &ModelInstance, ref_type: &str, depth: usize) -> Result<Json> {
        if depth > self.max_depth {
            return Err(OdmError::DepthExceeded {
                limit: self.max_depth,
            });
        }
        if self.ancestors.contains(&instance.addr()) {
            return Err(OdmError::CircularEmbedding {
                model: instance.short_label(),
            });
        }

        self.ancestors.push(instance.addr());
        let encoded = self.fields(instance, ref_type, depth);
        self.ancestors.pop();
        encoded
    }

    fn fields(&mut self, instance: &ModelInstance, ref_type: &str, depth: usize) -> Result<Json> {

        let schema = instance.schema();
        let mut out = Map::new();
        if self.force_typing || schema.name() != ref_type {
            out.insert(
                self.type_key.to_string(),
                Json::String(schema.name_path().to_string()),
            );
        }

        for (name, value) in instance.fields() {
            let field = schema.field(&name).ok_or_else(|| OdmError::UnknownField {
                owner: schema.name().to_string(),
                field: name.clone(),
            })?;
            let encoded = self.value(field, field.ty(), &value, depth)?;
            out.insert(name, encoded);
        }
        Ok(Json::Object(out))
    }

    fn value(&mut self, field: &Field, ty: &FieldType, value: &Value, depth: usize) -> Result<Json> {
        if value.is_null() {
            return Ok(Json::Null);
        }

        match ty {
            FieldType::Model(declared) => match value {
                Value::Model(instance)
                    if declared == ANY_MODEL || instance.schema().name() == declared =>
                {
                    self.instance(instance, declared, depth + 1)
                }
                _ => Err(type_mismatch(field, format!("a `{}`", declared))),
            },
            FieldType::List(inner) => match value {
                Value::Array(items) => items
                    .iter()
                    .map(|item| self.value(field, inner, item, depth))
                    .collect::<Result<Vec<_>>>()
                    .map(Json::Array),
                _ => Err(type_mismatch(field, "an array")),
            },
            FieldType::Group(fields) => {
                let map = match value {
                    Value::Object(map) => map,
                    _ => return Err(type_mismatch(field, "an object")),
                };
                let mut out = Map::new();
                for (key, sub) in map {
                    let sub_field = fields.iter().find(|f| f.name() == key).ok_or_else(|| {
                        OdmError::UnknownField {
                            owner: field.name().to_string(),
                            field: key.clone(),
                        }
                    })?;
                    out.insert(key.clone(), self.value(sub_field, sub_field.ty(), sub, depth)?);
                }
                Ok(Json::Object(out))
            }
            FieldType::Ref(declared) => {
                let target = value
                    .as_model()
                    .ok_or_else(|| type_mismatch(field, "a model instance"))?;
                let actual = target.schema().name();
                if declared != ANY_MODEL && declared != actual {
                    return Err(type_mismatch(
                        field,
                        format!("`{}` (got `{}`)", declared, actual),
                    ));
                }
                let mut out = Map::new();
                out.insert("$ref".to_string(), Json::String(target.id()?));
                out.insert(
                    self.type_key.to_string(),
                    Json::String(target.schema().name_path().to_string()),
                );
                Ok(Json::Object(out))
            }
            FieldType::Date => match coerce_date(value) {
                Some(date) => Ok(Json::String(format_date(&date))),
                None => {
                    log::error!("invalid date {:?} in {}", value, field.name());
                    Ok(Json::Null)
                }
            },
            FieldType::Mixed => self.mixed(field, value, depth),
            FieldType::String | FieldType::Number | FieldType::Integer | FieldType::Boolean => {
                if value.is_object() {
                    return Err(OdmError::UnexpectedObject {
                        field: field.name().to_string(),
                        expected: ty.describe(),
                    });
                }
                Ok(scalar(value))
            }
        }
    }

    /// Runtime dispatch for mixed fields. Models are always tagged, dates are
    /// wrapped as `{ v, <typeKey>: "Date" }`. Plain objects may not use the
    /// type key themselves, since it would read back as a tag.
    fn mixed(&mut self, field: &Field, value: &Value, depth: usize) -> Result<Json> {
        match value {
            Value::Model(instance) => self.instance(instance, ANY_MODEL, depth + 1),
            Value::Date(date) => {
                let mut out = Map::new();
                out.insert("v".to_string(), Json::String(format_date(date)));
                out.insert(self.type_key.to_string(), Json::String("Date".to_string()));
                Ok(Json::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .map(|item| self.mixed(field, item, depth))
                .collect::<Result<Vec<_>>>()
                .map(Json::Array),
            Value::Object(map) => {
                if map.contains_key(self.type_key) {
                    return Err(type_mismatch(
                        field,
                        format!("an object without a `{}` key", self.type_key),
                    ));
                }
                let mut out = Map::new();
                for (key, sub) in map {
                    out.insert(key.clone(), self.mixed(field, sub, depth)?);
                }
                Ok(Json::Object(out))
            }
            other => Ok(scalar(other)),
        }
    }
}

fn scalar(value: &Value) -> Json {
    match value {
        Value::Bool(b) => Json::Bool(*b),
        Value::Number(n) => Json::Number(n.clone()),
        Value::String(s) => Json::String(s.clone()),
        _ => Json::Null,
    }
}

fn type_mismatch(field: &Field, expected: impl Into<String>) -> OdmError {
    OdmError::TypeMismatch {
        field: field.name().to_string(),
        expected: expected.into(),
    }
}
