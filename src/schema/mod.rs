//! Schemas - Field layout, identity, indexes and hooks of a model type.
//!
//! ## Example
//!
//! ```ignore
//! use docmodel::{Field, FieldType, Schema};
//!
//! let product = Schema::builder("Product")
//!     .field(Field::new("name", FieldType::String).required())
//!     .field(Field::new("store", FieldType::reference("Store")))
//!     .ref_index(["store"]);
//!
//! let Product = odm.model(product)?;
//! ```

mod decode;
mod field;
mod hooks;
mod index;
mod validate;

use uuid::Uuid;

use crate::config::OdmConfig;
use crate::error::{OdmError, Result};
use crate::value::Value;

pub use field::{DefaultValue, Field, FieldType, Validator, ANY_MODEL};
pub use hooks::{Hook, HookEvent, HookRegistry};
pub use index::RefIndex;

pub(crate) use decode::decode_document;
pub(crate) use index::ref_keys;
pub(crate) use validate::validate;

/// Field name given to the generated id field when a schema names none.
pub const DEFAULT_ID_FIELD: &str = "_id";

/// Immutable description of a model type, shared by all of its instances.
#[derive(Debug)]
pub struct Schema {
    name: String,
    name_path: String,
    id_field: String,
    fields: Vec<Field>,
    indexes: Vec<RefIndex>,
    hooks: HookRegistry,
}

impl Schema {
    pub fn builder(name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Namespaced name; also the key prefix of every stored instance.
    pub fn name_path(&self) -> &str {
        &self.name_path
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        field::find_field(&self.fields, name)
    }

    pub fn indexes(&self) -> &[RefIndex] {
        &self.indexes
    }

    pub fn hooks(&self) -> &HookRegistry {
        &self.hooks
    }

    /// Store key for an instance with the given id.
    pub fn key_for(&self, id: &str) -> String {
        format!("{}|{}", self.name_path, id)
    }

    pub(crate) fn key_prefix(&self) -> String {
        format!("{}|", self.name_path)
    }
}

/// Builder for [`Schema`]; registered through [`Odm::model`](crate::Odm::model).
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    id_field: Option<String>,
    fields: Vec<Field>,
    indexes: Vec<RefIndex>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        SchemaBuilder {
            name: name.into(),
            id_field: None,
            fields: Vec::new(),
            indexes: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Use an existing field as the id. Without this a `_id` field holding a
    /// random UUID is added.
    pub fn id_field(mut self, name: impl Into<String>) -> Self {
        self.id_field = Some(name.into());
        self
    }

    pub fn ref_index<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.push(RefIndex::new(fields));
        self
    }

    pub(crate) fn build(mut self, config: &OdmConfig) -> Result<Schema> {
        for (i, field) in self.fields.iter().enumerate() {
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(OdmError::Config(format!(
                    "field `{}` declared twice on {}",
                    field.name, self.name
                )));
            }
            if field.name == config.type_key {
                return Err(OdmError::Config(format!(
                    "field `{}` on {} collides with the type key",
                    field.name, self.name
                )));
            }
        }

        let id_field = match self.id_field.take() {
            Some(name) => {
                if field::find_field(&self.fields, &name).is_none() {
                    return Err(OdmError::UnknownField {
                        owner: self.name.clone(),
                        field: name,
                    });
                }
                name
            }
            None => {
                if field::find_field(&self.fields, DEFAULT_ID_FIELD).is_none() {
                    self.fields.insert(
                        0,
                        Field::new(DEFAULT_ID_FIELD, FieldType::String)
                            .default_with(|| Value::String(Uuid::new_v4().to_string())),
                    );
                }
                DEFAULT_ID_FIELD.to_string()
            }
        };

        for index in &self.indexes {
            let root = index.fields().first().map(|f| f.split('.').next().unwrap_or(f));
            match root {
                Some(root) if field::find_field(&self.fields, root).is_some() => {}
                _ => {
                    return Err(OdmError::UnknownField {
                        owner: format!("{} ref index", self.name),
                        field: index.fields().join(","),
                    })
                }
            }
        }

        Ok(Schema {
            name_path: config.name_path(&self.name),
            name: self.name,
            id_field,
            fields: self.fields,
            indexes: self.indexes,
            hooks: HookRegistry::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_id_field_when_missing() {
        let schema = Schema::builder("User")
            .field(Field::new("name", FieldType::String))
            .build(&OdmConfig::default())
            .unwrap();
        assert_eq!(schema.id_field(), "_id");
        assert_eq!(schema.fields()[0].name(), "_id");
        let first = schema.fields()[0].initial_value().unwrap();
        let second = schema.fields()[0].initial_value().unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn uses_declared_id_field() {
        let schema = Schema::builder("User")
            .field(Field::new("email", FieldType::String))
            .id_field("email")
            .build(&OdmConfig::default())
            .unwrap();
        assert_eq!(schema.id_field(), "email");
        assert_eq!(schema.fields().len(), 1);
    }

    #[test]
    fn rejects_unknown_id_field() {
        let err = Schema::builder("User")
            .id_field("email")
            .build(&OdmConfig::default())
            .unwrap_err();
        assert!(matches!(err, OdmError::UnknownField { .. }));
    }

    #[test]
    fn namespace_prefixes_keys() {
        let schema = Schema::builder("User")
            .build(&OdmConfig::default().with_namespace("app"))
            .unwrap();
        assert_eq!(schema.name_path(), "app.User");
        assert_eq!(schema.key_for("7"), "app.User|7");
    }

    #[test]
    fn rejects_index_on_unknown_field() {
        let err = Schema::builder("User")
            .ref_index(["email"])
            .build(&OdmConfig::default())
            .unwrap_err();
        assert!(matches!(err, OdmError::UnknownField { .. }));
    }

    #[test]
    fn rejects_duplicate_and_reserved_fields() {
        let dup = Schema::builder("User")
            .field(Field::new("a", FieldType::String))
            .field(Field::new("a", FieldType::Number))
            .build(&OdmConfig::default());
        assert!(matches!(dup, Err(OdmError::Config(_))));

        let reserved = Schema::builder("User")
            .field(Field::new("_type", FieldType::String))
            .build(&OdmConfig::default());
        assert!(matches!(reserved, Err(OdmError::Config(_))));
    }
}
