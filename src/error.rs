use thiserror::Error;

/// Failures reported by a [`DocumentStore`](crate::DocumentStore).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No document is stored under the key.
    #[error("document not found: {key}")]
    NotFound { key: String },
    /// The CAS token passed with a mutation no longer matches the stored version.
    #[error("cas conflict on {key}")]
    CasConflict { key: String },
    /// Any other storage-level failure.
    #[error("store error: {0}")]
    Io(String),
}

/// Error type for every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum OdmError {
    #[error("validation failed for {model}.{field}: {message}")]
    Validation {
        model: String,
        field: String,
        message: String,
    },

    #[error("expected {field} to be {expected}")]
    TypeMismatch { field: String, expected: String },

    #[error("cannot find field data for property `{field}` of {owner}")]
    UnknownField { owner: String, field: String },

    #[error("expected {field} to be a non-object {expected} but got an object")]
    UnexpectedObject { field: String, expected: String },

    #[error("key `{key}` does not start with `{prefix}`")]
    MalformedKey { key: String, prefix: String },

    #[error("key of the object has changed from `{existing}` to `{computed}`")]
    KeyChanged { existing: String, computed: String },

    #[error("tried to load data for `{incoming}` into instance keyed `{existing}`")]
    KeyMismatch { existing: String, incoming: String },

    #[error("{model} has no value in id field `{field}`")]
    MissingId { model: String, field: String },

    #[error("{model} instance is not loaded")]
    NotLoaded { model: String },

    /// More than one failure happened while storing reference documents and
    /// rolling them back. The store may hold orphaned reference documents.
    #[error("critical error while storing reference documents ({} failures)", errors.len())]
    AggregateRollback { errors: Vec<OdmError> },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("unknown model `{name}`")]
    UnknownModel { name: String },

    #[error("model `{name}` is already registered")]
    DuplicateModel { name: String },

    #[error("invalid path `{path}`: {reason}")]
    InvalidPath { path: String, reason: String },

    #[error("hook failed: {0}")]
    Hook(String),

    #[error("no query engine configured")]
    QueryUnsupported,

    #[error("nesting deeper than {limit} levels")]
    DepthExceeded { limit: usize },

    /// An embedded or mixed model contains itself. Only references can
    /// close a cycle in stored form.
    #[error("{model} is embedded inside itself")]
    CircularEmbedding { model: String },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl OdmError {
    /// Build the error a hook returns to stop an operation.
    pub fn hook(message: impl Into<String>) -> Self {
        OdmError::Hook(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OdmError::Store(StoreError::NotFound { .. }))
    }

    pub fn is_cas_conflict(&self) -> bool {
        matches!(self, OdmError::Store(StoreError::CasConflict { .. }))
    }
}

pub type Result<T, E = OdmError> = std::result::Result<T, E>;
