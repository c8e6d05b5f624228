//! Hydration - Turning stored documents back into field values.

use indexmap::IndexMap;
use serde_json::Value as Json;

use super::field::{find_field, FieldType, ANY_MODEL};
use super::Schema;
use crate::error::{OdmError, Result};
use crate::model::{Model, ModelInstance};
use crate::odm::Odm;
use crate::value::{coerce_date, parse_date, Value};

/// Decode a stored document into the field map of an instance of `schema`.
/// The document's own type tag is dropped; undeclared keys are skipped.
pub(crate) fn decode_document(
    odm: &Odm,
    schema: &Schema,
    data: Json,
) -> Result<IndexMap<String, Value>> {
    let map = match data {
        Json::Object(map) => map,
        other => {
            return Err(OdmError::TypeMismatch {
                field: schema.name().to_string(),
                expected: format!("a stored object, got {}", json_kind(&other)),
            })
        }
    };

    let type_key = odm.type_key();
    let mut fields = IndexMap::with_capacity(map.len());
    for (name, raw) in map {
        if name == type_key {
            continue;
        }
        match schema.field(&name) {
            Some(field) => {
                let value = decode_value(odm, field.ty(), raw, field.name())?;
                fields.insert(name, value);
            }
            None => log::warn!(
                "ignoring undeclared field `{}` in stored {} document",
                name,
                schema.name()
            ),
        }
    }
    Ok(fields)
}

fn decode_value(odm: &Odm, ty: &FieldType, raw: Json, path: &str) -> Result<Value> {
    if raw.is_null() {
        return Ok(Value::Null);
    }

    match ty {
        FieldType::Model(declared) => {
            let obj = expect_object(raw, path, ty)?;
            let model = resolve_model(odm, tag_of(odm, &obj), declared, path)?;
            let instance = ModelInstance::from_data(&model, Json::Object(obj))?;
            Ok(Value::Model(instance))
        }
        FieldType::Ref(declared) => {
            let obj = expect_object(raw, path, ty)?;
            let id = match obj.get("$ref") {
                Some(Json::String(id)) => id.clone(),
                Some(Json::Number(n)) => n.to_string(),
                _ => {
                    return Err(OdmError::TypeMismatch {
                        field: path.to_string(),
                        expected: "a `$ref` id".into(),
                    })
                }
            };
            let model = resolve_model(odm, tag_of(odm, &obj), declared, path)?;
            Ok(Value::Model(model.ref_id(&id)))
        }
        FieldType::List(inner) => match raw {
            Json::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(i, item)| decode_value(odm, inner, item, &format!("{}[{}]", path, i)))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            other => Err(mismatch(path, ty, &other)),
        },
        FieldType::Group(fields) => {
            let obj = expect_object(raw, path, ty)?;
            let mut out = IndexMap::with_capacity(obj.len());
            for (name, sub) in obj {
                match find_field(fields, &name) {
                    Some(field) => {
                        let sub_path = format!("{}.{}", path, name);
                        out.insert(name, decode_value(odm, field.ty(), sub, &sub_path)?);
                    }
                    None => log::warn!("ignoring undeclared group key `{}` in {}", name, path),
                }
            }
            Ok(Value::Object(out))
        }
        FieldType::Date => {
            let value = Value::from_json(raw);
            match coerce_date(&value) {
                Some(date) => Ok(Value::Date(date)),
                None => {
                    log::warn!("invalid stored date {:?} in {}", value, path);
                    Ok(Value::Null)
                }
            }
        }
        FieldType::Mixed => decode_mixed(odm, raw, path),
        FieldType::String | FieldType::Number | FieldType::Integer | FieldType::Boolean => {
            Ok(Value::from_json(raw))
        }
    }
}

/// Mixed values carry their own type tags: `{ v, <typeKey>: "Date" }` for
/// dates and a model name path for embedded instances.
fn decode_mixed(odm: &Odm, raw: Json, path: &str) -> Result<Value> {
    match raw {
        Json::Object(obj) => {
            let tag = tag_of(odm, &obj).map(str::to_string);
            match tag.as_deref() {
                Some("Date") => {
                    let date = obj.get("v").and_then(Json::as_str).and_then(parse_date);
                    if date.is_none() {
                        log::warn!("invalid tagged date in {}", path);
                    }
                    return Ok(date.map(Value::Date).unwrap_or_default());
                }
                Some(tag) => {
                    let model = resolve_model(odm, Some(tag), ANY_MODEL, path)?;
                    return Ok(Value::Model(ModelInstance::from_data(
                        &model,
                        Json::Object(obj),
                    )?));
                }
                None => {}
            }
            let mut out = IndexMap::with_capacity(obj.len());
            for (key, sub) in obj {
                let sub_path = format!("{}.{}", path, key);
                out.insert(key, decode_mixed(odm, sub, &sub_path)?);
            }
            Ok(Value::Object(out))
        }
        Json::Array(items) => items
            .into_iter()
            .enumerate()
            .map(|(i, item)| decode_mixed(odm, item, &format!("{}[{}]", path, i)))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        scalar => Ok(Value::from_json(scalar)),
    }
}

fn tag_of<'a>(odm: &Odm, obj: &'a serde_json::Map<String, Json>) -> Option<&'a str> {
    obj.get(odm.type_key()).and_then(Json::as_str)
}

/// The tag names the concrete model; otherwise the declared type applies.
fn resolve_model(odm: &Odm, tag: Option<&str>, declared: &str, path: &str) -> Result<Model> {
    match tag {
        Some(tag) => odm.model_by_name_path(tag),
        None if declared == ANY_MODEL => Err(OdmError::TypeMismatch {
            field: path.to_string(),
            expected: format!("a `{}` type tag", odm.type_key()),
        }),
        None => odm.get_model(declared),
    }
}

fn expect_object(
    raw: Json,
    path: &str,
    ty: &FieldType,
) -> Result<serde_json::Map<String, Json>> {
    match raw {
        Json::Object(obj) => Ok(obj),
        other => Err(mismatch(path, ty, &other)),
    }
}

fn mismatch(path: &str, ty: &FieldType, raw: &Json) -> OdmError {
    OdmError::TypeMismatch {
        field: path.to_string(),
        expected: format!("stored {}, got {}", ty.describe(), json_kind(raw)),
    }
}

fn json_kind(raw: &Json) -> &'static str {
    match raw {
        Json::Null => "null",
        Json::Bool(_) => "boolean",
        Json::Number(_) => "number",
        Json::String(_) => "string",
        Json::Array(_) => "array",
        Json::Object(_) => "object",
    }
}
