use std::path::PathBuf;

use thiserror::Error;

use crate::diagnostics::Reason;
use crate::validator::OutcomeKind;

/// Main error type for the engine and the batch driver
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema configuration error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File system traversal error: {path} - {reason}")]
    FileSystemTraversal { path: PathBuf, reason: String },

    #[error("Concurrent operation error: {details}")]
    Concurrency { details: String },

    #[error("Document rejected ({kind}): {summary}")]
    Rejected {
        kind: OutcomeKind,
        summary: String,
        reasons: Vec<Reason>,
    },
}

/// Configuration-time schema errors.
///
/// These abort the startup of the component that owns the schema set. The type
/// is `Clone` so a failure can be handed out of the grammar cache to every
/// caller that waited on the same compilation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Schema not found: {system_id}")]
    SourceNotFound { system_id: String },

    #[error("Cannot read schema {system_id}: {details}")]
    Unreadable { system_id: String, details: String },

    #[error("Malformed schema {system_id}: {details}")]
    Malformed { system_id: String, details: String },

    #[error("Unresolved reference in schema {system_id}: {details}")]
    UnresolvedReference { system_id: String, details: String },

    #[error("Invalid pattern '{pattern}' in schema {system_id}: {details}")]
    InvalidPattern {
        system_id: String,
        pattern: String,
        details: String,
    },

    #[error("Unsupported construct in schema {system_id}: {details}")]
    Unsupported { system_id: String, details: String },

    #[error("No schema sources configured for {identity}")]
    NoSources { identity: String },
}

impl SchemaError {
    /// Whether the failure may disappear once other schemas of the set have
    /// been compiled.
    pub fn is_deferrable(&self) -> bool {
        matches!(self, SchemaError::UnresolvedReference { .. })
    }

    pub fn system_id(&self) -> Option<&str> {
        match self {
            SchemaError::SourceNotFound { system_id }
            | SchemaError::Unreadable { system_id, .. }
            | SchemaError::Malformed { system_id, .. }
            | SchemaError::UnresolvedReference { system_id, .. }
            | SchemaError::InvalidPattern { system_id, .. }
            | SchemaError::Unsupported { system_id, .. } => Some(system_id),
            SchemaError::NoSources { .. } => None,
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, ValidationError>;

/// Schema compilation result type alias
pub type SchemaResult<T> = std::result::Result<T, SchemaError>;
