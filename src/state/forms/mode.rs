//! Validation scheduling modes

use serde::{Deserialize, Serialize};

/// When fields are validated before the first submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValidationMode {
    #[default]
    OnSubmit,
    OnBlur,
    OnChange,
    /// Validate on the first blur, then on every change
    OnTouched,
    All,
}

/// When fields are re-validated after the first submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReValidateMode {
    #[default]
    OnChange,
    OnBlur,
    OnSubmit,
}

/// How many failing rules are recorded per field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CriteriaMode {
    #[default]
    FirstError,
    All,
}

/// Field interaction that may schedule a validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldEvent {
    Change,
    Blur,
}

impl ValidationMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::OnSubmit => "onSubmit",
            Self::OnBlur => "onBlur",
            Self::OnChange => "onChange",
            Self::OnTouched => "onTouched",
            Self::All => "all",
        }
    }
}

/// Decide whether `event` on a field should run its validation
pub fn should_validate(
    mode: ValidationMode,
    re_validate_mode: ReValidateMode,
    event: FieldEvent,
    is_submitted: bool,
    is_touched: bool,
) -> bool {
    let before_submit = match (mode, event) {
        (ValidationMode::All, _) => true,
        (ValidationMode::OnChange, FieldEvent::Change) => true,
        (ValidationMode::OnBlur, FieldEvent::Blur) => true,
        (ValidationMode::OnTouched, FieldEvent::Blur) => true,
        (ValidationMode::OnTouched, FieldEvent::Change) => is_touched,
        _ => false,
    };

    if !is_submitted {
        return before_submit;
    }

    let after_submit = matches!(
        (re_validate_mode, event),
        (ReValidateMode::OnChange, FieldEvent::Change) | (ReValidateMode::OnBlur, FieldEvent::Blur)
    );
    before_submit || after_submit
}
