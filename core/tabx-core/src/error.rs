//! Error types for the TABX table engine.
//!
//! All public APIs return `TabxResult<T>`; no panics in library code.

use thiserror::Error;

/// Unified error type for all TABX operations.
#[derive(Debug, Error)]
pub enum TabxError {
    /// Insert on a primary key that is already stored
    #[error("{type_name}: key {key} already exists")]
    AlreadyExists { type_name: String, key: String },

    /// Update on a primary key that is not stored
    #[error("{type_name}: key {key} not found")]
    NotFound { type_name: String, key: String },

    /// Update on an auto-increment table with a zero id
    #[error("primary key invalid on update: auto-increment id must be set")]
    PrimaryKeyInvalidOnUpdate,

    /// Insert on an auto-increment table with a caller-assigned id
    #[error("auto-increment key already set: ids are assigned on insert")]
    AutoIncrementKeyAlreadySet,

    /// Unique secondary index already maps the value to another record
    #[error("unique key violation on {type_name} index '{index}': {key}")]
    UniqueKeyViolation {
        type_name: String,
        index: String,
        key: String,
    },

    /// A value could not be encoded (unset key field, type mismatch)
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Stored bytes could not be decoded (short or corrupt buffer)
    #[error("decoding error: {0}")]
    Decoding(String),

    /// The JSON stream is malformed or a record failed to decode
    #[error("JSON import error: {0}")]
    JsonImport(String),

    /// A decoded record failed validation
    #[error("JSON validation error: {0}")]
    JsonValidation(String),

    /// A JSON record claims an id above the declared sequence high-water mark
    #[error("invalid ID {id}, expected a value <= {max}, the highest sequence number")]
    SequenceOutOfRange { id: u64, max: u64 },

    /// The sequence counter cannot be incremented any further
    #[error("sequence exhausted for {0}")]
    SequenceExhausted(String),

    /// The codec was asked to handle an entry kind it does not own
    #[error("unsupported entry: {0}")]
    UnsupportedEntry(String),

    /// Record descriptor is invalid
    #[error("schema error: {0}")]
    Schema(String),

    /// Requested secondary index does not exist
    #[error("index '{index}' not found on {type_name}")]
    IndexNotFound { type_name: String, index: String },

    /// Table registry routing failure
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// The caller's context carries no backend
    #[error("no backend available in context")]
    NoBackend,

    /// The caller's context was cancelled before a backend was handed out
    #[error("context cancelled")]
    Cancelled,

    /// `write()` called on a writer that already committed or was closed
    #[error("batch writer already committed or closed")]
    WriterClosed,

    /// Invalid configuration value
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage layer error (I/O, corruption, etc.)
    #[error("storage error: {0}")]
    Storage(String),

    /// sled embedded database error
    #[error("sled error: {source}")]
    Sled {
        #[from]
        source: sled::Error,
    },

    /// Standard I/O error
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Coarse classification of a [`TabxError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Key or save-mode conflict; the caller must change mode or key.
    Conflict,
    /// Encoding or decoding failure.
    Codec,
    /// JSON import/validation failure.
    Validation,
    /// Backend, store, configuration or schema failure.
    Resource,
}

impl TabxError {
    /// Which family of failures this error belongs to.
    pub fn class(&self) -> ErrorClass {
        match self {
            TabxError::AlreadyExists { .. }
            | TabxError::NotFound { .. }
            | TabxError::PrimaryKeyInvalidOnUpdate
            | TabxError::AutoIncrementKeyAlreadySet
            | TabxError::UniqueKeyViolation { .. } => ErrorClass::Conflict,
            TabxError::Encoding(_)
            | TabxError::Decoding(_)
            | TabxError::UnsupportedEntry(_)
            | TabxError::Serialization(_) => ErrorClass::Codec,
            TabxError::JsonImport(_)
            | TabxError::JsonValidation(_)
            | TabxError::SequenceOutOfRange { .. } => ErrorClass::Validation,
            _ => ErrorClass::Resource,
        }
    }
}

/// Result type alias for all TABX operations.
pub type TabxResult<T> = Result<T, TabxError>;

impl From<serde_json::Error> for TabxError {
    fn from(err: serde_json::Error) -> Self {
        TabxError::Serialization(err.to_string())
    }
}
