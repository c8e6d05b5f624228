//! OdmConfig - Settings shared by every model registered on an [`Odm`](crate::Odm).

use serde::{Deserialize, Serialize};

use crate::error::{OdmError, Result};

/// Field name used for type tags when none is configured.
pub const DEFAULT_TYPE_KEY: &str = "_type";

/// Nesting ceiling for public JSON cloning and embedded-model encoding.
pub const DEFAULT_MAX_CLONE_DEPTH: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OdmConfig {
    /// Field injected into encoded documents to name their model type.
    pub type_key: String,
    /// Optional prefix joined to every model name with a `.` to form its name path.
    pub namespace: Option<String>,
    pub max_clone_depth: usize,
}

impl Default for OdmConfig {
    fn default() -> Self {
        Self {
            type_key: DEFAULT_TYPE_KEY.to_string(),
            namespace: None,
            max_clone_depth: DEFAULT_MAX_CLONE_DEPTH,
        }
    }
}

impl OdmConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document. Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: OdmConfig =
            serde_json::from_str(json).map_err(|e| OdmError::Config(e.to_string()))?;
        if config.type_key.is_empty() {
            return Err(OdmError::Config("type_key must not be empty".into()));
        }
        Ok(config)
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_type_key(mut self, type_key: impl Into<String>) -> Self {
        self.type_key = type_key.into();
        self
    }

    /// Full name of a model: `namespace.name`, or just `name` without a namespace.
    pub fn name_path(&self, name: &str) -> String {
        match &self.namespace {
            Some(ns) if !ns.is_empty() => format!("{}.{}", ns, name),
            _ => name.to_string(),
        }
    }
}
