//! Field registry and input buffers

use super::path::FieldPath;
use super::rules::Rules;
use super::values::display_text;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde_json::Value;

/// How raw input text is turned into a stored value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldKind {
    #[default]
    Text,
    Email,
    /// Stored as a JSON number, `null` when blank or unparsable
    Number,
    /// Stored as `YYYY-MM-DD`, `null` when blank or invalid
    Date,
}

impl FieldKind {
    pub fn coerce(&self, raw: &str) -> Value {
        match self {
            FieldKind::Text | FieldKind::Email => Value::String(raw.to_string()),
            FieldKind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FieldKind::Date => NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
                .unwrap_or(Value::Null),
        }
    }

    /// Whether a typed character may go into the input buffer
    pub fn accepts(&self, c: char) -> bool {
        match self {
            FieldKind::Text | FieldKind::Email => true,
            FieldKind::Number => c.is_ascii_digit() || c == '.' || c == '-',
            FieldKind::Date => c.is_ascii_digit() || c == '-',
        }
    }
}

/// Registration options for a field
#[derive(Debug, Clone, Default)]
pub struct FieldOptions {
    pub label: String,
    pub kind: FieldKind,
    pub rules: Rules,
    pub disabled: bool,
}

impl FieldOptions {
    pub fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Default::default()
        }
    }

    pub fn kind(mut self, kind: FieldKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn rules(mut self, rules: Rules) -> Self {
        self.rules = rules;
        self
    }

    pub fn disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// A registered field with its configuration and the text being edited
#[derive(Debug, Clone)]
pub struct FormField {
    pub path: FieldPath,
    pub label: String,
    pub kind: FieldKind,
    pub rules: Rules,
    pub disabled: bool,
    /// Raw input text; the stored value is derived from it with `FieldKind::coerce`
    pub input: String,
}

impl FormField {
    pub fn new(path: FieldPath, options: FieldOptions) -> Self {
        Self {
            path,
            label: options.label,
            kind: options.kind,
            rules: options.rules,
            disabled: options.disabled,
            input: String::new(),
        }
    }

    /// Replace the input text with the rendering of a stored value
    pub fn sync_input(&mut self, value: Option<&Value>) {
        self.input = display_text(value);
    }

    /// Push a character to the input; returns false when the kind rejects it
    pub fn push_char(&mut self, c: char) -> bool {
        if !self.kind.accepts(c) {
            return false;
        }
        self.input.push(c);
        true
    }

    /// Remove the last character from the input
    pub fn pop_char(&mut self) {
        self.input.pop();
    }

    /// Get the display value for rendering
    pub fn display_value(&self) -> String {
        match self.kind {
            FieldKind::Date if self.input.is_empty() => "YYYY-MM-DD".to_string(),
            _ => self.input.clone(),
        }
    }

    pub fn is_required(&self) -> bool {
        self.rules.required.is_some()
    }
}

/// Registered fields in registration order
#[derive(Debug, Clone, Default)]
pub struct FieldRegistry {
    fields: IndexMap<FieldPath, FormField>,
}

impl FieldRegistry {
    pub fn register(&mut self, path: FieldPath, options: FieldOptions) -> &mut FormField {
        tracing::debug!(path = %path, "register field");
        let field = FormField::new(path.clone(), options);
        match self.fields.entry(path) {
            indexmap::map::Entry::Occupied(mut entry) => {
                // Re-registration keeps the slot and the typed input
                let input = std::mem::take(&mut entry.get_mut().input);
                *entry.get_mut() = FormField { input, ..field };
                entry.into_mut()
            }
            indexmap::map::Entry::Vacant(entry) => entry.insert(field),
        }
    }

    pub fn unregister(&mut self, path: &FieldPath) -> Option<FormField> {
        tracing::debug!(path = %path, "unregister field");
        self.fields.shift_remove(path)
    }

    pub fn get(&self, path: &FieldPath) -> Option<&FormField> {
        self.fields.get(path)
    }

    pub fn get_mut(&mut self, path: &FieldPath) -> Option<&mut FormField> {
        self.fields.get_mut(path)
    }

    pub fn contains(&self, path: &FieldPath) -> bool {
        self.fields.contains_key(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FormField> {
        self.fields.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut FormField> {
        self.fields.values_mut()
    }

    pub fn paths(&self) -> Vec<FieldPath> {
        self.fields.keys().cloned().collect()
    }

    /// Registered paths strictly below `prefix`
    pub fn paths_under(&self, prefix: &FieldPath) -> Vec<FieldPath> {
        self.fields
            .keys()
            .filter(|path| prefix.is_ancestor_of(path))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Index of a path in registration order
    pub fn position(&self, path: &FieldPath) -> Option<usize> {
        self.fields.get_index_of(path)
    }

    /// Insert a field at a given position in registration order
    pub fn insert_at(&mut self, index: usize, field: FormField) {
        let index = index.min(self.fields.len());
        self.fields.shift_insert(index, field.path.clone(), field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(raw: &str) -> FieldPath {
        FieldPath::parse(raw).unwrap()
    }

    mod field_kind {
        use super::*;

        #[test]
        fn test_number_coercion() {
            assert_eq!(FieldKind::Number.coerce("42"), json!(42.0));
            assert_eq!(FieldKind::Number.coerce(" 7.5 "), json!(7.5));
            assert_eq!(FieldKind::Number.coerce(""), Value::Null);
            assert_eq!(FieldKind::Number.coerce("abc"), Value::Null);
        }

        #[test]
        fn test_date_coercion() {
            assert_eq!(FieldKind::Date.coerce("2024-02-29"), json!("2024-02-29"));
            assert_eq!(FieldKind::Date.coerce("2023-02-29"), Value::Null);
            assert_eq!(FieldKind::Date.coerce("2024-1"), Value::Null);
        }

        #[test]
        fn test_text_keeps_raw_input() {
            assert_eq!(FieldKind::Text.coerce(" spaced "), json!(" spaced "));
        }

        #[test]
        fn test_accepts() {
            assert!(FieldKind::Number.accepts('4'));
            assert!(!FieldKind::Number.accepts('x'));
            assert!(FieldKind::Date.accepts('-'));
            assert!(FieldKind::Email.accepts('@'));
        }
    }

    mod form_field {
        use super::*;

        #[test]
        fn test_push_and_pop() {
            let mut field = FormField::new(
                path("age"),
                FieldOptions::new("Age").kind(FieldKind::Number),
            );
            assert!(field.push_char('3'));
            assert!(!field.push_char('a'));
            assert!(field.push_char('0'));
            assert_eq!(field.input, "30");
            assert_eq!(field.kind.coerce(&field.input), json!(30.0));
            field.pop_char();
            field.pop_char();
            assert_eq!(field.input, "");
            assert_eq!(field.kind.coerce(&field.input), Value::Null);
        }

        #[test]
        fn test_sync_input_from_value() {
            let mut field = FormField::new(path("age"), FieldOptions::new("Age"));
            field.sync_input(Some(&json!(12.0)));
            assert_eq!(field.input, "12");
            field.sync_input(None);
            assert_eq!(field.input, "");
        }

        #[test]
        fn test_date_placeholder() {
            let field = FormField::new(
                path("dob"),
                FieldOptions::new("Date of birth").kind(FieldKind::Date),
            );
            assert_eq!(field.display_value(), "YYYY-MM-DD");
        }
    }

    mod registry {
        use super::*;

        #[test]
        fn test_register_keeps_order() {
            let mut registry = FieldRegistry::default();
            registry.register(path("username"), FieldOptions::new("Username"));
            registry.register(path("email"), FieldOptions::new("E-mail"));
            registry.register(path("social.twitter"), FieldOptions::new("Twitter"));

            assert_eq!(
                registry.paths(),
                vec![path("username"), path("email"), path("social.twitter")]
            );
            assert_eq!(registry.position(&path("email")), Some(1));
        }

        #[test]
        fn test_reregister_keeps_slot_and_input() {
            let mut registry = FieldRegistry::default();
            registry.register(path("username"), FieldOptions::new("Username"));
            registry.register(path("email"), FieldOptions::new("E-mail"));
            registry.get_mut(&path("username")).unwrap().input = "Bruce".to_string();

            registry.register(path("username"), FieldOptions::new("User").disabled(true));

            let field = registry.get(&path("username")).unwrap();
            assert_eq!(field.label, "User");
            assert!(field.disabled);
            assert_eq!(field.input, "Bruce");
            assert_eq!(registry.position(&path("username")), Some(0));
        }

        #[test]
        fn test_paths_under() {
            let mut registry = FieldRegistry::default();
            registry.register(path("social.twitter"), FieldOptions::new("Twitter"));
            registry.register(path("social.facebook"), FieldOptions::new("Facebook"));
            registry.register(path("channel"), FieldOptions::new("Channel"));

            assert_eq!(
                registry.paths_under(&path("social")),
                vec![path("social.twitter"), path("social.facebook")]
            );
        }

        #[test]
        fn test_unregister() {
            let mut registry = FieldRegistry::default();
            registry.register(path("channel"), FieldOptions::new("Channel"));
            assert!(registry.unregister(&path("channel")).is_some());
            assert!(registry.is_empty());
            assert!(registry.unregister(&path("channel")).is_none());
        }
    }
}
