//! Error types for overlay access.

use thiserror::Error;

/// Errors raised while laying out schemas or touching overlaid memory.
#[derive(Debug, Error)]
pub enum OverlayError {
    /// The backing store could not satisfy a read or write.
    #[error("Access violation at {address:#x} (+{length}) in store '{store}': {message}")]
    AccessViolation {
        store: String,
        address: u64,
        length: usize,
        message: String,
    },

    /// A byte length or item count differs from what the schema expects.
    #[error("Size mismatch for {what}: expected {expected}, got {actual}")]
    SizeMismatch {
        what: String,
        expected: usize,
        actual: usize,
    },

    /// Structured access on an element whose type is unknown.
    #[error("Unresolved type: {0}")]
    UnresolvedType(String),

    /// A sentinel-terminated scan ran past its limit.
    #[error("No terminator found within {limit} units starting at {address:#x}")]
    UnboundedScan { address: u64, limit: usize },

    /// A value of the wrong shape was assigned.
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch { expected: String, found: String },

    #[error("Field not found: {field} in type {type_name}")]
    FieldNotFound { type_name: String, field: String },

    #[error("Index {index} out of bounds for array of length {len}")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("Type already defined: {0}")]
    DuplicateType(String),

    #[error("Field {field} declared twice in type {type_name}")]
    DuplicateField { type_name: String, field: String },

    /// Malformed schema document.
    #[error("Schema error: {0}")]
    Schema(String),

    /// Malformed configuration document.
    #[error("Config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl OverlayError {
    pub fn access_violation(
        store: impl Into<String>,
        address: u64,
        length: usize,
        message: impl Into<String>,
    ) -> Self {
        OverlayError::AccessViolation {
            store: store.into(),
            address,
            length,
            message: message.into(),
        }
    }

    pub fn size_mismatch(what: impl Into<String>, expected: usize, actual: usize) -> Self {
        OverlayError::SizeMismatch {
            what: what.into(),
            expected,
            actual,
        }
    }

    pub fn type_mismatch(expected: impl Into<String>, found: impl Into<String>) -> Self {
        OverlayError::TypeMismatch {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn field_not_found(type_name: impl Into<String>, field: impl Into<String>) -> Self {
        OverlayError::FieldNotFound {
            type_name: type_name.into(),
            field: field.into(),
        }
    }

    pub fn unresolved(what: impl Into<String>) -> Self {
        OverlayError::UnresolvedType(what.into())
    }

    /// True for failures reported by the backing store itself.
    pub fn is_access_violation(&self) -> bool {
        matches!(self, OverlayError::AccessViolation { .. })
    }

    pub fn is_size_mismatch(&self) -> bool {
        matches!(self, OverlayError::SizeMismatch { .. })
    }
}

/// Result type for overlay operations.
pub type OverlayResult<T> = Result<T, OverlayError>;
