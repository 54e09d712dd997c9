//! Error types for the form engine
//!
//! Field validation failures are not errors in this sense: they live in the
//! form's error map. `FormError` covers misuse of the engine and failures of
//! its collaborators.

use thiserror::Error;

/// Result type alias for form engine operations
pub type Result<T> = std::result::Result<T, FormError>;

/// Core error type for the form engine
#[derive(Error, Debug)]
pub enum FormError {
    /// Path string could not be parsed
    #[error("Invalid field path: {0:?}")]
    InvalidPath(String),

    /// Path is not registered with the form
    #[error("Unknown field: {0}")]
    UnknownField(String),

    /// Path addresses a list index past its end
    #[error("Index {index} out of bounds for {path} (len {len})")]
    IndexOutOfBounds {
        /// Path of the list
        path: String,
        /// Requested index
        index: usize,
        /// Current list length
        len: usize,
    },

    /// Path walks through a value of the wrong shape
    #[error("Type mismatch at {path}: expected {expected}")]
    TypeMismatch {
        /// Path where the mismatch was found
        path: String,
        /// What the path required at that point
        expected: &'static str,
    },

    /// A pattern rule did not compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    /// Path is not a registered field array
    #[error("Not a field array: {0}")]
    NotAnArray(String),

    /// Values could not be converted to or from the typed shape
    #[error("Payload error: {0}")]
    Payload(#[from] serde_json::Error),

    /// Remote collaborator failed (default values, async validation)
    #[error("Remote error: {0}")]
    Remote(String),

    /// The submit handler returned an error
    #[error("Submit handler failed: {0}")]
    Handler(#[source] anyhow::Error),
}

impl FormError {
    /// Create a remote error
    pub fn remote(msg: impl Into<String>) -> Self {
        Self::Remote(msg.into())
    }

    /// Create a type mismatch error
    pub fn type_mismatch(path: impl ToString, expected: &'static str) -> Self {
        Self::TypeMismatch {
            path: path.to_string(),
            expected,
        }
    }
}
