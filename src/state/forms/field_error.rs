//! Field-scoped validation errors

use indexmap::IndexMap;
use serde::{Serialize, Serializer};

/// Which rule produced an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Required,
    Pattern,
    MinLength,
    MaxLength,
    Min,
    Max,
    /// Named custom predicate (sync or async)
    Validate(String),
    /// Set from outside the rule set
    Manual,
}

impl ErrorKind {
    pub fn name(&self) -> &str {
        match self {
            Self::Required => "required",
            Self::Pattern => "pattern",
            Self::MinLength => "minLength",
            Self::MaxLength => "maxLength",
            Self::Min => "min",
            Self::Max => "max",
            Self::Validate(name) => name,
            Self::Manual => "manual",
        }
    }
}

impl Serialize for ErrorKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Error attached to one field path
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldError {
    #[serde(rename = "type")]
    pub kind: ErrorKind,
    pub message: String,
    /// Every failing rule by name, filled only in `CriteriaMode::All`
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub types: IndexMap<String, String>,
}

impl FieldError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            types: IndexMap::new(),
        }
    }

    pub fn manual(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Manual, message)
    }
}

/// Errors keyed by dotted field path, in field registration order
pub type ErrorMap = IndexMap<String, FieldError>;
