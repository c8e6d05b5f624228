use std::fmt;
use std::sync::Arc;

use crate::value::Value;

/// Model name that makes a model or reference field accept any model type.
pub const ANY_MODEL: &str = "Mixed";

/// Declared type of a field. Encoding, decoding and validation all dispatch
/// on this enum.
#[derive(Debug, Clone)]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Date,
    /// Anything; the runtime value decides how it is encoded.
    Mixed,
    /// Ordered sequence whose elements all have the inner type.
    List(Box<FieldType>),
    /// Nested object with its own declared sub-fields.
    Group(Vec<Field>),
    /// Another model embedded inline in this document.
    Model(String),
    /// Link to another stored document, encoded as `{ $ref, <typeKey> }`.
    Ref(String),
}

impl FieldType {
    pub fn list(inner: FieldType) -> Self {
        FieldType::List(Box::new(inner))
    }

    pub fn group(fields: Vec<Field>) -> Self {
        FieldType::Group(fields)
    }

    pub fn model(name: impl Into<String>) -> Self {
        FieldType::Model(name.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        FieldType::Ref(name.into())
    }

    /// A reference to a document of any model type.
    pub fn any_ref() -> Self {
        FieldType::Ref(ANY_MODEL.to_string())
    }

    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            FieldType::String | FieldType::Number | FieldType::Integer | FieldType::Boolean
        )
    }

    pub fn describe(&self) -> String {
        match self {
            FieldType::String => "string".into(),
            FieldType::Number => "number".into(),
            FieldType::Integer => "integer".into(),
            FieldType::Boolean => "boolean".into(),
            FieldType::Date => "date".into(),
            FieldType::Mixed => "mixed".into(),
            FieldType::List(inner) => format!("list of {}", inner.describe()),
            FieldType::Group(_) => "field group".into(),
            FieldType::Model(name) => format!("`{}`", name),
            FieldType::Ref(name) => format!("reference to `{}`", name),
        }
    }
}

/// Default assigned to a field of a freshly constructed instance.
#[derive(Clone)]
pub enum DefaultValue {
    Value(Value),
    Generator(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl DefaultValue {
    pub fn produce(&self) -> Value {
        match self {
            DefaultValue::Value(value) => value.clone(),
            DefaultValue::Generator(generate) => generate(),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultValue::Value(value) => f.debug_tuple("Value").field(value).finish(),
            DefaultValue::Generator(_) => write!(f, "Generator(..)"),
        }
    }
}

/// Custom check run during validation; `Err` carries the message.
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// A named, typed slot of a schema or field group.
#[derive(Clone)]
pub struct Field {
    pub(crate) name: String,
    pub(crate) ty: FieldType,
    pub(crate) required: bool,
    pub(crate) default: Option<DefaultValue>,
    pub(crate) validator: Option<Validator>,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: FieldType) -> Self {
        Field {
            name: name.into(),
            ty,
            required: false,
            default: None,
            validator: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(DefaultValue::Value(value.into()));
        self
    }

    pub fn default_with<F>(mut self, generate: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.default = Some(DefaultValue::Generator(Arc::new(generate)));
        self
    }

    pub fn validator<F>(mut self, check: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validator = Some(Arc::new(check));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> &FieldType {
        &self.ty
    }

    pub fn is_required(&self) -> bool {
        self.required
    }

    /// Value this field starts with on a fresh instance. Groups without
    /// their own default collect the defaults of their sub-fields.
    pub(crate) fn initial_value(&self) -> Option<Value> {
        if let Some(default) = &self.default {
            return Some(default.produce());
        }
        match &self.ty {
            FieldType::Group(fields) => {
                let defaults: indexmap::IndexMap<String, Value> = fields
                    .iter()
                    .filter_map(|f| f.initial_value().map(|v| (f.name.clone(), v)))
                    .collect();
                if defaults.is_empty() {
                    None
                } else {
                    Some(Value::Object(defaults))
                }
            }
            _ => None,
        }
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("ty", &self.ty)
            .field("required", &self.required)
            .field("default", &self.default)
            .field("validator", &self.validator.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Look up a field by name in a field list.
pub(crate) fn find_field<'a>(fields: &'a [Field], name: &str) -> Option<&'a Field> {
    fields.iter().find(|f| f.name == name)
}
