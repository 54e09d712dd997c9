//! Rule evaluation for a single field

use super::field_error::{ErrorKind, FieldError};
use super::mode::CriteriaMode;
use super::rules::Rules;
use super::values::is_empty_value;
use serde_json::Value;

/// Collects failures according to the criteria mode
struct Failures {
    criteria: CriteriaMode,
    first: Option<FieldError>,
}

impl Failures {
    fn new(criteria: CriteriaMode) -> Self {
        Self {
            criteria,
            first: None,
        }
    }

    /// Record a failure; returns true when evaluation should stop
    fn push(&mut self, kind: ErrorKind, message: &str) -> bool {
        match &mut self.first {
            None => {
                let mut error = FieldError::new(kind.clone(), message);
                if self.criteria == CriteriaMode::All {
                    error.types.insert(kind.name().to_string(), message.to_string());
                }
                self.first = Some(error);
            }
            Some(error) => {
                error
                    .types
                    .entry(kind.name().to_string())
                    .or_insert_with(|| message.to_string());
            }
        }
        self.criteria == CriteriaMode::FirstError
    }

    fn finish(self) -> Option<FieldError> {
        self.first
    }
}

/// Run every synchronous rule against `value`
pub fn validate_sync(
    rules: &Rules,
    value: Option<&Value>,
    criteria: CriteriaMode,
) -> Option<FieldError> {
    let mut failures = Failures::new(criteria);
    run_sync(rules, value, &mut failures);
    failures.finish()
}

/// Run the synchronous rules, then the async predicates if the value passed so far
pub async fn validate_field(
    rules: &Rules,
    value: Option<&Value>,
    criteria: CriteriaMode,
) -> Option<FieldError> {
    let mut failures = Failures::new(criteria);
    if run_sync(rules, value, &mut failures) {
        return failures.finish();
    }

    // Async predicates only see values that passed everything else
    if failures.first.is_none() && !is_empty_value(value) {
        let value = value.cloned().unwrap_or(Value::Null);
        for (name, validator) in &rules.validate_async {
            if let Err(message) = validator.validate(&value).await {
                tracing::debug!(rule = %name, "async validation failed: {message}");
                if failures.push(ErrorKind::Validate(name.clone()), &message) {
                    break;
                }
            }
        }
    }

    failures.finish()
}

/// Returns true when evaluation stopped early
fn run_sync(rules: &Rules, value: Option<&Value>, failures: &mut Failures) -> bool {
    let empty = is_empty_value(value);

    if let Some(message) = &rules.required {
        if empty && failures.push(ErrorKind::Required, message) {
            return true;
        }
    }

    if !empty {
        if let Some(text) = value.and_then(Value::as_str) {
            if let Some(pattern) = &rules.pattern {
                if !pattern.regex.is_match(text)
                    && failures.push(ErrorKind::Pattern, &pattern.message)
                {
                    return true;
                }
            }

            let length = text.chars().count();
            if let Some(limit) = &rules.min_length {
                if length < limit.value && failures.push(ErrorKind::MinLength, &limit.message) {
                    return true;
                }
            }
            if let Some(limit) = &rules.max_length {
                if length > limit.value && failures.push(ErrorKind::MaxLength, &limit.message) {
                    return true;
                }
            }
        }

        if let Some(number) = value.and_then(Value::as_f64) {
            if let Some(limit) = &rules.min {
                if number < limit.value && failures.push(ErrorKind::Min, &limit.message) {
                    return true;
                }
            }
            if let Some(limit) = &rules.max {
                if number > limit.value && failures.push(ErrorKind::Max, &limit.message) {
                    return true;
                }
            }
        }
    }

    let null = Value::Null;
    let current = value.unwrap_or(&null);
    for (name, predicate) in &rules.validate {
        if let Err(message) = predicate(current) {
            if failures.push(ErrorKind::Validate(name.clone()), &message) {
                return true;
            }
        }
    }

    false
}
