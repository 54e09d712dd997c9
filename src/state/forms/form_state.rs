//! Form state engine
//!
//! `Form<T>` owns the value tree for a typed shape `T`, the field registry,
//! the error map, touched/dirty tracking, the submission lifecycle and the
//! field arrays. Every mutation goes through it so that listeners are told
//! about exactly the paths whose value or error changed.

use super::array::{reindex, ArrayEntry, FieldArray, ItemField};
use super::field::{FieldKind, FieldOptions, FieldRegistry, FormField};
use super::field_error::{ErrorMap, FieldError};
use super::mode::{should_validate, CriteriaMode, FieldEvent, ReValidateMode, ValidationMode};
use super::path::FieldPath;
use super::subscription::{ChangeKind, FieldChange, SubscriptionId, Subscriptions};
use super::validation::{validate_field, validate_sync};
use super::values;
use crate::error::{FormError, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::future::Future;
use std::marker::PhantomData;
use uuid::Uuid;

/// Form-wide behaviour
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormOptions {
    pub mode: ValidationMode,
    pub re_validate_mode: ReValidateMode,
    pub criteria_mode: CriteriaMode,
}

/// Side effects of a programmatic `set_value`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetValueOptions {
    pub should_validate: bool,
    pub should_dirty: bool,
    pub should_touch: bool,
}

impl SetValueOptions {
    pub fn all() -> Self {
        Self {
            should_validate: true,
            should_dirty: true,
            should_touch: true,
        }
    }
}

/// Pieces of state a reset leaves alone
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeepState {
    pub keep_errors: bool,
    pub keep_dirty_values: bool,
    pub keep_defaults: bool,
    pub keep_touched: bool,
    pub keep_is_submitted: bool,
    pub keep_submit_count: bool,
}

/// Submission lifecycle flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lifecycle {
    pub is_submitting: bool,
    pub is_submitted: bool,
    pub is_submit_successful: bool,
    pub submit_count: u32,
    pub is_validating: bool,
    pub is_loading: bool,
}

/// Snapshot of everything a view needs
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FormState {
    pub values: Value,
    pub errors: ErrorMap,
    pub is_dirty: bool,
    pub is_valid: bool,
    pub dirty_fields: BTreeSet<String>,
    pub touched_fields: BTreeSet<String>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

/// Result of `handle_submit`
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Validation passed and the handler completed
    Submitted,
    /// Validation failed; the handler was not called
    Invalid(ErrorMap),
}

/// Asynchronous provider of default values
#[async_trait]
pub trait DefaultValuesSource<T>: Send + Sync {
    async fn load(&self) -> Result<T>;
}

pub struct Form<T> {
    options: FormOptions,
    registry: FieldRegistry,
    defaults: Value,
    /// Defaults declared at construction, used when async defaults fail
    fallback_defaults: Value,
    values: Value,
    errors: BTreeMap<FieldPath, FieldError>,
    dirty: BTreeSet<FieldPath>,
    touched: BTreeSet<FieldPath>,
    lifecycle: Lifecycle,
    arrays: Vec<FieldArray>,
    subscriptions: Subscriptions,
    _shape: PhantomData<fn() -> T>,
}

impl<T> std::fmt::Debug for Form<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Form")
            .field("options", &self.options)
            .field("values", &self.values)
            .field("errors", &self.errors)
            .field("lifecycle", &self.lifecycle)
            .field("fields", &self.registry.len())
            .field("subscriptions", &self.subscriptions)
            .finish()
    }
}

impl<T> Form<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a form with static default values
    pub fn new(default_values: T, options: FormOptions) -> Result<Self> {
        let defaults = serde_json::to_value(default_values)?;
        Ok(Self {
            options,
            registry: FieldRegistry::default(),
            fallback_defaults: defaults.clone(),
            values: defaults.clone(),
            defaults,
            errors: BTreeMap::new(),
            dirty: BTreeSet::new(),
            touched: BTreeSet::new(),
            lifecycle: Lifecycle::default(),
            arrays: Vec::new(),
            subscriptions: Subscriptions::default(),
            _shape: PhantomData,
        })
    }

    /// Create a form whose defaults arrive later through `resolve_defaults`.
    /// `fallback` is used until then, and if loading fails.
    pub fn with_loading(fallback: T, options: FormOptions) -> Result<Self> {
        let mut form = Self::new(fallback, options)?;
        form.lifecycle.is_loading = true;
        Ok(form)
    }

    pub fn options(&self) -> FormOptions {
        self.options
    }

    pub fn registry(&self) -> &FieldRegistry {
        &self.registry
    }

    pub fn field(&self, path: &str) -> Option<&FormField> {
        FieldPath::parse(path)
            .ok()
            .and_then(|path| self.registry.get(&path))
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    // ------------------------------------------------------------------
    // Registration
    // ------------------------------------------------------------------

    /// Register a field. Re-registering updates its options in place.
    pub fn register(&mut self, path: &str, options: FieldOptions) -> Result<()> {
        let path = FieldPath::parse(path)?;
        self.register_path(path, options, None)
    }

    fn register_path(
        &mut self,
        path: FieldPath,
        options: FieldOptions,
        position: Option<usize>,
    ) -> Result<()> {
        if values::get(&self.values, &path).is_none() {
            let initial = values::get(&self.defaults, &path)
                .cloned()
                .unwrap_or_else(|| empty_value(options.kind));
            values::set(&mut self.values, &path, initial)?;
        }

        let disabled = options.disabled;
        match position {
            Some(index) => self
                .registry
                .insert_at(index, FormField::new(path.clone(), options)),
            None => {
                self.registry.register(path.clone(), options);
            }
        }
        if let Some(field) = self.registry.get_mut(&path) {
            field.sync_input(values::get(&self.values, &path));
        }
        if disabled {
            self.set_field_error(&path, None);
        }
        Ok(())
    }

    /// Drop a field together with its value, error, touched and dirty state
    pub fn unregister(&mut self, path: &str) -> Result<()> {
        let path = FieldPath::parse(path)?;
        if self.registry.unregister(&path).is_none() {
            return Err(FormError::UnknownField(path.to_string()));
        }
        self.set_field_error(&path, None);
        self.dirty.remove(&path);
        self.touched.remove(&path);
        if values::remove(&mut self.values, &path).is_some() {
            self.subscriptions.notify(&FieldChange {
                path,
                kind: ChangeKind::Value(Value::Null),
            });
        }
        Ok(())
    }

    /// Register a list of records whose entries get stable keys.
    /// Every entry registers `item_fields` under `path.{index}`.
    pub fn register_array(&mut self, path: &str, item_fields: Vec<ItemField>) -> Result<()> {
        let path = FieldPath::parse(path)?;
        let len = match values::get(&self.values, &path) {
            Some(Value::Array(items)) => items.len(),
            None | Some(Value::Null) => {
                values::set(&mut self.values, &path, Value::Array(Vec::new()))?;
                0
            }
            Some(_) => return Err(FormError::type_mismatch(&path, "array")),
        };

        let mut array = FieldArray::new(path.clone(), item_fields, len);
        array.anchor = self.registry.len();
        self.arrays.retain(|a| a.name != path);
        self.arrays.push(array);
        self.rebuild_item_fields(&path);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Values
    // ------------------------------------------------------------------

    pub fn get_value(&self, path: &str) -> Option<&Value> {
        FieldPath::parse(path)
            .ok()
            .and_then(|path| values::get(&self.values, &path))
    }

    pub fn get_values(&self) -> &Value {
        &self.values
    }

    pub fn default_values(&self) -> &Value {
        &self.defaults
    }

    /// Current values deserialized into the typed shape
    pub fn values_as(&self) -> Result<T> {
        Ok(serde_json::from_value(self.values.clone())?)
    }

    /// User input on a field: store it, update dirty state and validate per mode.
    /// Ignored while default values are loading, since they replace the values.
    pub async fn change(&mut self, path: &str, raw: &str) -> Result<()> {
        let path = FieldPath::parse(path)?;
        if self.lifecycle.is_loading {
            tracing::debug!(path = %path, "ignoring input while defaults load");
            return Ok(());
        }
        let field = self
            .registry
            .get(&path)
            .ok_or_else(|| FormError::UnknownField(path.to_string()))?;
        if field.disabled {
            tracing::debug!(path = %path, "ignoring input on disabled field");
            return Ok(());
        }

        let value = field.kind.coerce(raw);
        self.write_value(&path, value)?;
        if let Some(field) = self.registry.get_mut(&path) {
            field.input = raw.to_string();
        }
        self.refresh_dirty(&path);

        if self.should_validate(FieldEvent::Change, &path) {
            self.validate_path(&path).await;
        }
        Ok(())
    }

    /// Focus left a field: mark it touched and validate per mode
    pub async fn blur(&mut self, path: &str) -> Result<()> {
        let path = FieldPath::parse(path)?;
        if !self.registry.contains(&path) {
            return Err(FormError::UnknownField(path.to_string()));
        }
        let was_touched = !self.touched.insert(path.clone());

        let validate = should_validate(
            self.options.mode,
            self.options.re_validate_mode,
            FieldEvent::Blur,
            self.lifecycle.is_submitted,
            was_touched,
        );
        if validate {
            self.validate_path(&path).await;
        }
        Ok(())
    }

    /// Programmatic update of a field, group or field array
    pub async fn set_value(
        &mut self,
        path: &str,
        value: Value,
        options: SetValueOptions,
    ) -> Result<()> {
        let path = FieldPath::parse(path)?;
        let is_array = self.arrays.iter().any(|a| a.name == path);
        let affected: Vec<FieldPath> = self
            .registry
            .paths()
            .into_iter()
            .filter(|p| p == &path || path.is_ancestor_of(p))
            .collect();
        if affected.is_empty() && !is_array {
            return Err(FormError::UnknownField(path.to_string()));
        }

        if is_array {
            let len = value.as_array().map(Vec::len).ok_or_else(|| {
                FormError::type_mismatch(&path, "array")
            })?;
            self.write_value(&path, value)?;
            if let Some(array) = self.arrays.iter_mut().find(|a| a.name == path) {
                array.replace(len);
            }
            self.rebuild_item_fields(&path);
        } else {
            self.write_value(&path, value)?;
        }

        let affected: Vec<FieldPath> = self
            .registry
            .paths()
            .into_iter()
            .filter(|p| p == &path || path.is_ancestor_of(p))
            .collect();
        if options.should_dirty {
            self.refresh_dirty(&path);
        }
        if options.should_touch {
            self.touched.extend(affected.iter().cloned());
        }
        if options.should_validate {
            for p in &affected {
                self.validate_path(p).await;
            }
        }
        Ok(())
    }

    /// Listen for value and error changes at `path`, its parents and children
    pub fn watch(
        &mut self,
        path: &str,
        listener: impl FnMut(&FieldChange) + Send + 'static,
    ) -> Result<SubscriptionId> {
        let path = FieldPath::parse(path)?;
        Ok(self.subscriptions.subscribe(Some(path), listener))
    }

    /// Listen for every value and error change
    pub fn watch_all(&mut self, listener: impl FnMut(&FieldChange) + Send + 'static) -> SubscriptionId {
        self.subscriptions.subscribe(None, listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscriptions.unsubscribe(id)
    }

    // ------------------------------------------------------------------
    // Validation and errors
    // ------------------------------------------------------------------

    /// Validate the given paths (all fields when empty); returns overall validity
    pub async fn trigger(&mut self, paths: &[&str]) -> Result<bool> {
        let targets: Vec<FieldPath> = if paths.is_empty() {
            self.registry.paths()
        } else {
            let mut targets = Vec::new();
            for raw in paths {
                let path = FieldPath::parse(raw)?;
                let matched: Vec<FieldPath> = self
                    .registry
                    .paths()
                    .into_iter()
                    .filter(|p| p == &path || path.is_ancestor_of(p))
                    .collect();
                if matched.is_empty() {
                    return Err(FormError::UnknownField(path.to_string()));
                }
                targets.extend(matched);
            }
            targets
        };

        let mut valid = true;
        for path in &targets {
            valid &= self.validate_path(path).await;
        }
        Ok(valid)
    }

    /// Recorded errors in field registration order
    pub fn errors(&self) -> ErrorMap {
        let mut ordered: ErrorMap = self
            .registry
            .iter()
            .filter_map(|field| {
                self.errors
                    .get(&field.path)
                    .map(|error| (field.path.to_string(), error.clone()))
            })
            .collect();
        for (path, error) in &self.errors {
            ordered
                .entry(path.to_string())
                .or_insert_with(|| error.clone());
        }
        ordered
    }

    pub fn error(&self, path: &str) -> Option<&FieldError> {
        FieldPath::parse(path)
            .ok()
            .and_then(|path| self.errors.get(&path))
    }

    /// Attach an error to a registered field
    pub fn set_error(&mut self, path: &str, error: FieldError) -> Result<()> {
        let path = FieldPath::parse(path)?;
        if !self.registry.contains(&path) {
            return Err(FormError::UnknownField(path.to_string()));
        }
        self.set_field_error(&path, Some(error));
        Ok(())
    }

    /// Clear errors of the given paths and their children (all when empty)
    pub fn clear_errors(&mut self, paths: &[&str]) -> Result<()> {
        let targets: Vec<FieldPath> = if paths.is_empty() {
            self.errors.keys().cloned().collect()
        } else {
            let mut targets = Vec::new();
            for raw in paths {
                let path = FieldPath::parse(raw)?;
                targets.extend(
                    self.errors
                        .keys()
                        .filter(|p| **p == path || path.is_ancestor_of(p))
                        .cloned(),
                );
            }
            targets
        };
        for path in targets {
            self.set_field_error(&path, None);
        }
        Ok(())
    }

    /// Disabled fields keep their value out of the payload and skip validation
    pub fn set_disabled(&mut self, path: &str, disabled: bool) -> Result<()> {
        let path = FieldPath::parse(path)?;
        let field = self
            .registry
            .get_mut(&path)
            .ok_or_else(|| FormError::UnknownField(path.to_string()))?;
        if field.disabled == disabled {
            return Ok(());
        }
        field.disabled = disabled;
        tracing::debug!(path = %path, disabled, "field disabled state changed");
        if disabled {
            self.set_field_error(&path, None);
        }
        Ok(())
    }

    pub fn is_disabled(&self, path: &str) -> bool {
        self.field(path).is_some_and(|f| f.disabled)
    }

    /// All enabled fields pass their sync rules and no error is recorded
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
            && self.registry.iter().filter(|f| !f.disabled).all(|field| {
                validate_sync(
                    &field.rules,
                    values::get(&self.values, &field.path),
                    self.options.criteria_mode,
                )
                .is_none()
            })
    }

    pub fn is_touched(&self, path: &str) -> bool {
        FieldPath::parse(path).is_ok_and(|p| self.touched.contains(&p))
    }

    pub fn is_field_dirty(&self, path: &str) -> bool {
        FieldPath::parse(path).is_ok_and(|p| self.dirty.contains(&p))
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    // ------------------------------------------------------------------
    // Submission and reset
    // ------------------------------------------------------------------

    /// Validate everything and hand the typed payload to `on_valid`.
    ///
    /// Disabled fields are left out of the payload. The lifecycle flags end
    /// with `is_submitted` set and the submit count incremented, whatever the
    /// outcome.
    pub async fn handle_submit<F, Fut>(&mut self, on_valid: F) -> Result<SubmitOutcome>
    where
        F: FnOnce(T) -> Fut,
        Fut: Future<Output = anyhow::Result<()>>,
    {
        self.lifecycle.is_submitting = true;
        self.lifecycle.is_submit_successful = false;

        let mut valid = true;
        for path in self.registry.paths() {
            valid &= self.validate_path(&path).await;
        }

        let outcome = if valid {
            match serde_json::from_value::<T>(self.payload()) {
                Ok(data) => match on_valid(data).await {
                    Ok(()) => {
                        self.lifecycle.is_submit_successful = true;
                        Ok(SubmitOutcome::Submitted)
                    }
                    Err(err) => Err(FormError::Handler(err)),
                },
                Err(err) => Err(err.into()),
            }
        } else {
            Ok(SubmitOutcome::Invalid(self.errors()))
        };

        self.lifecycle.is_submitting = false;
        self.lifecycle.is_submitted = true;
        self.lifecycle.submit_count += 1;

        match &outcome {
            Ok(SubmitOutcome::Submitted) => {
                tracing::info!(count = self.lifecycle.submit_count, "form submitted")
            }
            Ok(SubmitOutcome::Invalid(errors)) => {
                tracing::info!(count = self.lifecycle.submit_count, errors = errors.len(), "form submission blocked")
            }
            Err(err) => tracing::warn!("form submission failed: {err}"),
        }
        outcome
    }

    /// Current values without disabled fields
    pub fn payload(&self) -> Value {
        let mut payload = self.values.clone();
        for field in self.registry.iter().filter(|f| f.disabled) {
            values::remove(&mut payload, &field.path);
        }
        payload
    }

    /// Restore defaults (or `new_values`, which then become the defaults)
    pub fn reset(&mut self, new_values: Option<T>, keep: KeepState) -> Result<()> {
        let mut next = match new_values {
            Some(values) => {
                let values = serde_json::to_value(values)?;
                if !keep.keep_defaults {
                    self.defaults = values.clone();
                }
                values
            }
            None => self.defaults.clone(),
        };

        if keep.keep_dirty_values {
            for path in &self.dirty {
                if let Some(current) = values::get(&self.values, path) {
                    values::set(&mut next, path, current.clone())?;
                }
            }
        }

        let previous = std::mem::replace(&mut self.values, next);

        let array_lens: Vec<(FieldPath, usize)> = self
            .arrays
            .iter()
            .map(|a| {
                let len = values::get(&self.values, &a.name)
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len);
                (a.name.clone(), len)
            })
            .collect();
        for (name, len) in array_lens {
            if let Some(array) = self.arrays.iter_mut().find(|a| a.name == name) {
                array.replace(len);
            }
            self.rebuild_item_fields(&name);
        }

        for field in self.registry.iter_mut() {
            field.sync_input(values::get(&self.values, &field.path));
        }

        let mut changed: Vec<FieldPath> = self
            .registry
            .paths()
            .into_iter()
            .filter(|p| values::get(&previous, p) != values::get(&self.values, p))
            .collect();
        changed.extend(
            self.arrays
                .iter()
                .filter(|a| values::get(&previous, &a.name) != values::get(&self.values, &a.name))
                .map(|a| a.name.clone()),
        );
        for path in changed {
            let value = values::get(&self.values, &path).cloned().unwrap_or(Value::Null);
            self.subscriptions.notify(&FieldChange {
                path,
                kind: ChangeKind::Value(value),
            });
        }

        if !keep.keep_errors {
            self.clear_errors(&[])?;
        }
        if !keep.keep_dirty_values {
            self.dirty.clear();
        }
        if !keep.keep_touched {
            self.touched.clear();
        }

        self.lifecycle = Lifecycle {
            is_submitted: keep.keep_is_submitted && self.lifecycle.is_submitted,
            submit_count: if keep.keep_submit_count {
                self.lifecycle.submit_count
            } else {
                0
            },
            ..Lifecycle::default()
        };
        tracing::debug!("form reset");
        Ok(())
    }

    /// Restore one field to its default and forget its state
    pub fn reset_field(&mut self, path: &str) -> Result<()> {
        let path = FieldPath::parse(path)?;
        let field = self
            .registry
            .get(&path)
            .ok_or_else(|| FormError::UnknownField(path.to_string()))?;
        let default = values::get(&self.defaults, &path)
            .cloned()
            .unwrap_or_else(|| empty_value(field.kind));
        self.write_value(&path, default)?;
        self.dirty.remove(&path);
        self.touched.remove(&path);
        self.set_field_error(&path, None);
        Ok(())
    }

    /// Apply the outcome of an async default-values load.
    ///
    /// On failure the declared fallback defaults are applied and the error is
    /// handed back for logging.
    pub fn resolve_defaults(&mut self, loaded: Result<T>) -> Result<()> {
        match loaded {
            Ok(values) => {
                self.reset(Some(values), KeepState::default())?;
                tracing::info!("default values loaded");
                Ok(())
            }
            Err(err) => {
                tracing::warn!("default values failed to load, using fallback: {err}");
                self.defaults = self.fallback_defaults.clone();
                self.reset(None, KeepState::default())?;
                Err(err)
            }
        }
    }

    /// Load default values from `source`, flagging the form as loading meanwhile
    pub async fn load_defaults<S>(&mut self, source: &S) -> Result<()>
    where
        S: DefaultValuesSource<T> + ?Sized,
    {
        self.lifecycle.is_loading = true;
        let loaded = source.load().await;
        self.resolve_defaults(loaded)
    }

    /// Snapshot for rendering and logging
    pub fn form_state(&self) -> FormState {
        FormState {
            values: self.values.clone(),
            errors: self.errors(),
            is_dirty: self.is_dirty(),
            is_valid: self.is_valid(),
            dirty_fields: self.dirty.iter().map(ToString::to_string).collect(),
            touched_fields: self.touched.iter().map(ToString::to_string).collect(),
            lifecycle: self.lifecycle,
        }
    }

    // ------------------------------------------------------------------
    // Field arrays
    // ------------------------------------------------------------------

    /// Entries of a field array with their stable keys
    pub fn fields(&self, path: &str) -> Result<Vec<ArrayEntry>> {
        let path = FieldPath::parse(path)?;
        let array = self
            .arrays
            .iter()
            .find(|a| a.name == path)
            .ok_or_else(|| FormError::NotAnArray(path.to_string()))?;
        let items = values::get(&self.values, &path)
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        Ok(array
            .keys()
            .iter()
            .zip(items)
            .enumerate()
            .map(|(index, (key, value))| ArrayEntry {
                key: *key,
                index,
                value,
            })
            .collect())
    }

    pub fn append(&mut self, path: &str, value: Value) -> Result<Uuid> {
        self.mutate_array(path, |array, items| {
            items.push(value);
            Ok(array.append())
        })
    }

    pub fn prepend(&mut self, path: &str, value: Value) -> Result<Uuid> {
        self.mutate_array(path, |array, items| {
            items.insert(0, value);
            Ok(array.prepend())
        })
    }

    /// Insert before `index`; an index past the end appends
    pub fn insert(&mut self, path: &str, index: usize, value: Value) -> Result<Uuid> {
        self.mutate_array(path, |array, items| {
            items.insert(index.min(items.len()), value);
            Ok(array.insert(index))
        })
    }

    pub fn remove(&mut self, path: &str, index: usize) -> Result<()> {
        self.mutate_array(path, |array, items| {
            if index >= items.len() {
                return Err(FormError::IndexOutOfBounds {
                    path: array.name.to_string(),
                    index,
                    len: items.len(),
                });
            }
            items.remove(index);
            array.remove(index);
            Ok(())
        })
    }

    pub fn swap(&mut self, path: &str, a: usize, b: usize) -> Result<()> {
        self.mutate_array(path, |array, items| {
            let len = items.len();
            if !array.swap(a, b) {
                return Err(FormError::IndexOutOfBounds {
                    path: array.name.to_string(),
                    index: a.max(b),
                    len,
                });
            }
            items.swap(a, b);
            Ok(())
        })
    }

    pub fn move_item(&mut self, path: &str, from: usize, to: usize) -> Result<()> {
        self.mutate_array(path, |array, items| {
            let len = items.len();
            if !array.move_item(from, to) {
                return Err(FormError::IndexOutOfBounds {
                    path: array.name.to_string(),
                    index: from.max(to),
                    len,
                });
            }
            let item = items.remove(from);
            items.insert(to, item);
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn should_validate(&self, event: FieldEvent, path: &FieldPath) -> bool {
        should_validate(
            self.options.mode,
            self.options.re_validate_mode,
            event,
            self.lifecycle.is_submitted,
            self.touched.contains(path),
        )
    }

    /// Validate one registered field and record the outcome; returns validity
    async fn validate_path(&mut self, path: &FieldPath) -> bool {
        let Some(field) = self.registry.get(path) else {
            return true;
        };
        if field.disabled {
            self.set_field_error(path, None);
            return true;
        }

        let has_async = field.rules.has_async();
        if has_async {
            self.lifecycle.is_validating = true;
        }
        let result = validate_field(
            &field.rules,
            values::get(&self.values, path),
            self.options.criteria_mode,
        )
        .await;
        if has_async {
            self.lifecycle.is_validating = false;
        }

        tracing::debug!(path = %path, valid = result.is_none(), "validated field");
        let valid = result.is_none();
        self.set_field_error(path, result);
        valid
    }

    /// Store or clear an error, notifying listeners when it changed
    fn set_field_error(&mut self, path: &FieldPath, error: Option<FieldError>) {
        if self.errors.get(path) == error.as_ref() {
            return;
        }
        match &error {
            Some(error) => {
                self.errors.insert(path.clone(), error.clone());
            }
            None => {
                self.errors.remove(path);
            }
        }
        self.subscriptions.notify(&FieldChange {
            path: path.clone(),
            kind: ChangeKind::Error(error),
        });
    }

    /// Write a value, re-sync inputs under it and notify when it changed
    fn write_value(&mut self, path: &FieldPath, value: Value) -> Result<()> {
        let changed = values::get(&self.values, path) != Some(&value);
        values::set(&mut self.values, path, value.clone())?;

        for field in self.registry.iter_mut() {
            if field.path.overlaps(path) {
                field.sync_input(values::get(&self.values, &field.path));
            }
        }

        if changed {
            self.subscriptions.notify(&FieldChange {
                path: path.clone(),
                kind: ChangeKind::Value(value),
            });
        }
        Ok(())
    }

    /// Recompute dirty state of registered fields at or below `path`, and of
    /// every field array containing or contained in it
    fn refresh_dirty(&mut self, path: &FieldPath) {
        let fields = self
            .registry
            .iter()
            .map(|field| &field.path)
            .filter(|p| *p == path || path.is_ancestor_of(p));
        let arrays = self
            .arrays
            .iter()
            .map(|array| &array.name)
            .filter(|name| name.overlaps(path));

        for p in fields.chain(arrays) {
            let current = values::get(&self.values, p);
            let default = values::get(&self.defaults, p);
            if current_differs(current, default) {
                self.dirty.insert(p.clone());
            } else {
                self.dirty.remove(p);
            }
        }
    }

    fn mutate_array<R>(
        &mut self,
        path: &str,
        op: impl FnOnce(&mut FieldArray, &mut Vec<Value>) -> Result<R>,
    ) -> Result<R> {
        let path = FieldPath::parse(path)?;
        let array = self
            .arrays
            .iter_mut()
            .find(|a| a.name == path)
            .ok_or_else(|| FormError::NotAnArray(path.to_string()))?;
        let items = values::get_mut(&mut self.values, &path)
            .and_then(Value::as_array_mut)
            .ok_or_else(|| FormError::type_mismatch(&path, "array"))?;

        let old_keys = array.keys().to_vec();
        let result = op(array, items)?;
        let mapping = reindex(&old_keys, array.keys());

        // Errors and touched state follow their entry's key
        let remap = |p: &FieldPath| -> Option<FieldPath> {
            match p.split_under(&path) {
                Some((index, rest)) => mapping
                    .get(index)
                    .copied()
                    .flatten()
                    .map(|new_index| FieldPath::under(&path, new_index, &rest)),
                None => Some(p.clone()),
            }
        };
        let errors = std::mem::take(&mut self.errors);
        self.errors = errors
            .into_iter()
            .filter_map(|(p, e)| remap(&p).map(|np| (np, e)))
            .collect();
        let touched = std::mem::take(&mut self.touched);
        self.touched = touched.iter().filter_map(&remap).collect();

        self.rebuild_item_fields(&path);
        self.refresh_dirty(&path);

        let value = values::get(&self.values, &path).cloned().unwrap_or(Value::Null);
        self.subscriptions.notify(&FieldChange {
            path,
            kind: ChangeKind::Value(value),
        });
        Ok(result)
    }

    /// Re-register the concrete sub-fields of every entry of an array
    fn rebuild_item_fields(&mut self, path: &FieldPath) {
        let Some(array) = self.arrays.iter().find(|a| a.name == *path) else {
            return;
        };
        let item_fields = array.item_fields.clone();
        let len = array.len();
        let anchor = array.anchor;

        let existing = self.registry.paths_under(path);
        let position = existing
            .iter()
            .filter_map(|p| self.registry.position(p))
            .min()
            .unwrap_or(anchor);
        for p in &existing {
            self.registry.unregister(p);
        }

        let mut next = position;
        for index in 0..len {
            for item in &item_fields {
                let concrete = path.index(index).join(&item.name);
                if let Err(err) = self.register_path(concrete, item.options.clone(), Some(next)) {
                    tracing::warn!(path = %path, "failed to register array entry: {err}");
                    continue;
                }
                next += 1;
            }
        }

        let registered: BTreeSet<FieldPath> = self.registry.paths_under(path).into_iter().collect();
        self.errors
            .retain(|p, _| !path.is_ancestor_of(p) || registered.contains(p));
        self.touched
            .retain(|p| !path.is_ancestor_of(p) || registered.contains(p));
        self.dirty
            .retain(|p| !path.is_ancestor_of(p) || registered.contains(p));
    }
}

/// Dirty comparison treating a missing default like an empty one
fn current_differs(current: Option<&Value>, default: Option<&Value>) -> bool {
    match (current, default) {
        (Some(c), Some(d)) => c != d,
        (Some(c), None) | (None, Some(c)) => !values::is_empty_value(Some(c)),
        (None, None) => false,
    }
}

fn empty_value(kind: FieldKind) -> Value {
    match kind {
        FieldKind::Text | FieldKind::Email => Value::String(String::new()),
        FieldKind::Number | FieldKind::Date => Value::Null,
    }
}
