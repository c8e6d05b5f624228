//! Field-level validation run before every save.

use super::field::{find_field, Field, FieldType, ANY_MODEL};
use super::hooks::HookEvent;
use crate::error::{OdmError, Result};
use crate::model::ModelInstance;
use crate::value::{coerce_date, Value};

/// Run `validate` pre hooks, check every declared field, then run `validate`
/// post hooks. The first failure wins.
pub(crate) async fn validate(instance: &ModelInstance) -> Result<()> {
    let schema = instance.schema();
    schema.hooks().run_pre(HookEvent::Validate, instance).await?;

    let fields = instance.fields();
    for field in schema.fields() {
        let value = fields.get(field.name()).cloned().unwrap_or_default();
        check_field(schema.name(), field, &value, field.name())?;
    }
    // Undeclared values can only come from direct state manipulation; they
    // would fail encoding, so reject them here with a clearer error.
    for name in fields.keys() {
        if schema.field(name).is_none() {
            return Err(OdmError::UnknownField {
                owner: schema.name().to_string(),
                field: name.clone(),
            });
        }
    }

    schema.hooks().run_post(HookEvent::Validate, instance).await
}

fn check_field(model: &str, field: &Field, value: &Value, path: &str) -> Result<()> {
    if value.is_null() {
        if field.is_required() {
            return Err(invalid(model, path, "is required"));
        }
        return Ok(());
    }

    check_type(model, field.ty(), value, path)?;

    if let Some(check) = &field.validator {
        check(value).map_err(|message| invalid(model, path, &message))?;
    }
    Ok(())
}

fn check_type(model: &str, ty: &FieldType, value: &Value, path: &str) -> Result<()> {
    let mismatch = || invalid(model, path, &format!("expected {}, got {}", ty.describe(), value.kind()));

    match ty {
        FieldType::String => value.as_str().map(|_| ()).ok_or_else(mismatch),
        FieldType::Number => value.as_f64().map(|_| ()).ok_or_else(mismatch),
        FieldType::Integer => value.as_i64().map(|_| ()).ok_or_else(mismatch),
        FieldType::Boolean => value.as_bool().map(|_| ()).ok_or_else(mismatch),
        FieldType::Date => coerce_date(value).map(|_| ()).ok_or_else(mismatch),
        FieldType::Mixed => Ok(()),
        FieldType::List(inner) => {
            let items = value.as_array().ok_or_else(mismatch)?;
            for (i, item) in items.iter().enumerate() {
                if !item.is_null() {
                    check_type(model, inner, item, &format!("{}[{}]", path, i))?;
                }
            }
            Ok(())
        }
        FieldType::Group(fields) => {
            let map = value.as_object().ok_or_else(mismatch)?;
            for field in fields {
                let sub = map.get(field.name()).cloned().unwrap_or_default();
                check_field(model, field, &sub, &format!("{}.{}", path, field.name()))?;
            }
            for key in map.keys() {
                if find_field(fields, key).is_none() {
                    return Err(OdmError::UnknownField {
                        owner: format!("{}.{}", model, path),
                        field: key.clone(),
                    });
                }
            }
            Ok(())
        }
        FieldType::Model(name) | FieldType::Ref(name) => {
            let instance = value.as_model().ok_or_else(mismatch)?;
            if name != ANY_MODEL && instance.schema().name() != name {
                return Err(mismatch());
            }
            Ok(())
        }
    }
}

fn invalid(model: &str, field: &str, message: &str) -> OdmError {
    OdmError::Validation {
        model: model.to_string(),
        field: field.to_string(),
        message: message.to_string(),
    }
}
