//! Per-field validation rules

use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Custom synchronous predicate: `Err(message)` when the value is rejected
pub type Validator = Arc<dyn Fn(&Value) -> Result<(), String> + Send + Sync>;

/// Custom asynchronous predicate, e.g. a remote uniqueness check
#[async_trait]
pub trait AsyncValidator: Send + Sync {
    async fn validate(&self, value: &Value) -> Result<(), String>;
}

/// A rule threshold with the message shown when it is violated
#[derive(Debug, Clone, PartialEq)]
pub struct Limit<T> {
    pub value: T,
    pub message: String,
}

#[derive(Debug, Clone)]
pub struct PatternRule {
    pub regex: Regex,
    pub message: String,
}

/// Rules attached to a registered field
#[derive(Clone, Default)]
pub struct Rules {
    /// Message shown when the field is empty
    pub required: Option<String>,
    pub pattern: Option<PatternRule>,
    pub min_length: Option<Limit<usize>>,
    pub max_length: Option<Limit<usize>>,
    pub min: Option<Limit<f64>>,
    pub max: Option<Limit<f64>>,
    pub validate: IndexMap<String, Validator>,
    pub validate_async: IndexMap<String, Arc<dyn AsyncValidator>>,
}

impl Rules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, message: impl Into<String>) -> Self {
        self.required = Some(message.into());
        self
    }

    pub fn pattern(mut self, regex: Regex, message: impl Into<String>) -> Self {
        self.pattern = Some(PatternRule {
            regex,
            message: message.into(),
        });
        self
    }

    pub fn min_length(mut self, value: usize, message: impl Into<String>) -> Self {
        self.min_length = Some(Limit {
            value,
            message: message.into(),
        });
        self
    }

    pub fn max_length(mut self, value: usize, message: impl Into<String>) -> Self {
        self.max_length = Some(Limit {
            value,
            message: message.into(),
        });
        self
    }

    pub fn min(mut self, value: f64, message: impl Into<String>) -> Self {
        self.min = Some(Limit {
            value,
            message: message.into(),
        });
        self
    }

    pub fn max(mut self, value: f64, message: impl Into<String>) -> Self {
        self.max = Some(Limit {
            value,
            message: message.into(),
        });
        self
    }

    /// Add a named predicate; predicates run in insertion order
    pub fn validate<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: Fn(&Value) -> Result<(), String> + Send + Sync + 'static,
    {
        self.validate.insert(name.to_string(), Arc::new(predicate));
        self
    }

    pub fn validate_async(mut self, name: &str, validator: Arc<dyn AsyncValidator>) -> Self {
        self.validate_async.insert(name.to_string(), validator);
        self
    }

    pub fn has_async(&self) -> bool {
        !self.validate_async.is_empty()
    }
}

impl fmt::Debug for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rules")
            .field("required", &self.required)
            .field("pattern", &self.pattern.as_ref().map(|p| p.regex.as_str()))
            .field("min_length", &self.min_length)
            .field("max_length", &self.max_length)
            .field("min", &self.min)
            .field("max", &self.max)
            .field("validate", &self.validate.keys().collect::<Vec<_>>())
            .field(
                "validate_async",
                &self.validate_async.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}
