//! Form domain layer
//!
//! A typed form engine: registered fields addressed by dotted paths, rule
//! based validation with configurable scheduling, field arrays with stable
//! keys, and change subscriptions scoped to paths.

mod array;
mod field;
mod field_error;
mod form_state;
mod mode;
mod path;
mod rules;
mod subscription;
mod validation;
mod values;

pub use array::ItemField;
pub use field::{FieldKind, FieldOptions, FormField};
pub use field_error::FieldError;
pub use form_state::{
    DefaultValuesSource, Form, FormOptions, KeepState, SetValueOptions, SubmitOutcome,
};
pub use mode::{CriteriaMode, ReValidateMode, ValidationMode};
pub use path::FieldPath;
pub use rules::{AsyncValidator, Rules};
pub use subscription::ChangeKind;

#[cfg(test)]
pub use field_error::ErrorKind;
