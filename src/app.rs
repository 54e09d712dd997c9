//! Application state and core logic

use crate::config::FormConfig;
use crate::error::FormError;
use crate::remote::{HttpLookupClient, RemoteLookup};
use crate::state::youtube::{self, FormValues, SeedDefaults};
use crate::state::{
    AppState, ChangeKind, DefaultValuesSource, Focus, Form, FormAction, KeepState,
    SetValueOptions, SubmitOutcome,
};
use anyhow::{Context, Result};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::oneshot;

type DefaultsResult = crate::error::Result<FormValues>;

/// Main application struct
pub struct App {
    /// Focus and console state
    pub state: AppState,
    /// The sign-up form
    pub form: Form<FormValues>,
    config: FormConfig,
    /// Set by the channel watcher; twitter availability depends on it
    channel_changed: Arc<AtomicBool>,
    /// Receives the seed default values from the background fetch
    pending_defaults: Option<oneshot::Receiver<DefaultsResult>>,
    /// Whether the app should quit
    quit: bool,
}

impl App {
    /// Create a new App talking to the configured user directory
    pub fn new(config: FormConfig) -> Result<Self> {
        let client = HttpLookupClient::new(&config.api_base_url(), config.request_timeout())?;
        tracing::info!(url = client.base_url(), "using user directory");
        Self::with_lookup(config, Arc::new(client))
    }

    /// Create an App around any lookup implementation.
    ///
    /// Default values are fetched in the background; the form shows its
    /// static defaults with a loading indicator until they arrive.
    pub fn with_lookup(config: FormConfig, lookup: Arc<dyn RemoteLookup>) -> Result<Self> {
        let mut form = youtube::build_form(config.form_options(), Some(lookup.clone()), true)
            .context("Failed to build form")?;

        let channel_changed = Arc::new(AtomicBool::new(false));
        let flag = channel_changed.clone();
        form.watch(youtube::CHANNEL, move |change| {
            if matches!(change.kind, ChangeKind::Value(_)) {
                flag.store(true, Ordering::SeqCst);
            }
        })?;

        let (tx, rx) = oneshot::channel();
        let source = SeedDefaults::new(lookup);
        tokio::spawn(async move {
            // The receiver is gone when the app quit first
            let _ = tx.send(source.load().await);
        });

        Ok(Self {
            state: AppState::default(),
            form,
            config,
            channel_changed,
            pending_defaults: Some(rx),
            quit: false,
        })
    }

    /// Check if app should quit
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    pub fn is_loading(&self) -> bool {
        self.form.lifecycle().is_loading
    }

    /// Registered field paths in focus order
    pub fn field_paths(&self) -> Vec<String> {
        self.form
            .registry()
            .paths()
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    /// Whether the submit button accepts presses
    pub fn submit_enabled(&self) -> bool {
        let lifecycle = self.form.lifecycle();
        self.form.is_dirty() && self.form.is_valid() && !lifecycle.is_submitting
    }

    pub fn action_enabled(&self, action: FormAction) -> bool {
        match action {
            FormAction::Submit => self.submit_enabled(),
            FormAction::RemovePhone => self
                .form
                .fields(youtube::PH_NUMBERS)
                .is_ok_and(|entries| entries.len() > 1),
            _ => true,
        }
    }

    /// Log a line to tracing and the on-screen console
    fn log(&mut self, line: String) {
        tracing::info!("{line}");
        self.state.push_console(line);
    }

    /// Apply the seed default values once the background fetch finished
    pub fn poll_defaults(&mut self) {
        let Some(rx) = self.pending_defaults.as_mut() else {
            return;
        };
        let result = match rx.try_recv() {
            Ok(result) => result,
            Err(oneshot::error::TryRecvError::Empty) => return,
            Err(oneshot::error::TryRecvError::Closed) => {
                Err(FormError::remote("default values task ended without a result"))
            }
        };
        self.pending_defaults = None;

        match self.form.resolve_defaults(result) {
            Ok(()) => self.log("default values loaded".to_string()),
            Err(err) => self.log(format!("default values unavailable: {err}")),
        }
        self.sync_dependent_fields();
    }

    /// Re-derive fields that depend on the watched channel value
    fn sync_dependent_fields(&mut self) {
        if !self.channel_changed.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Err(err) = youtube::sync_dependent_fields(&mut self.form) {
            tracing::warn!("failed to update dependent fields: {err}");
        }
    }

    /// Handle a key event
    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Esc => {
                self.quit = true;
                return Ok(());
            }
            KeyCode::Char('s') if crate::platform::is_submit_modifier(key.modifiers) => {
                if !self.is_loading() {
                    self.submit().await?;
                }
                return Ok(());
            }
            KeyCode::Tab | KeyCode::Down => return self.move_focus(true).await,
            KeyCode::BackTab | KeyCode::Up => return self.move_focus(false).await,
            _ => {}
        }

        // Values are replaced once defaults arrive, so edits wait for them
        if self.is_loading() {
            return Ok(());
        }

        match (self.state.focus.clone(), key.code) {
            (Focus::Action(action), KeyCode::Enter | KeyCode::Char(' ')) => {
                self.run_action(action).await?;
            }
            (Focus::Field(_), KeyCode::Enter) => self.move_focus(true).await?,
            (Focus::Field(path), KeyCode::Char(c))
                if !key.modifiers.contains(KeyModifiers::CONTROL) =>
            {
                self.input_char(&path, c).await?;
            }
            (Focus::Field(path), KeyCode::Backspace) => self.backspace(&path).await?,
            _ => {}
        }
        Ok(())
    }

    /// Move focus, blurring the field being left
    async fn move_focus(&mut self, forward: bool) -> Result<()> {
        if let Some(path) = self.state.focus.field().map(str::to_string) {
            if self.form.field(&path).is_some() {
                self.form.blur(&path).await?;
            }
        }
        let fields = self.field_paths();
        if forward {
            self.state.next_focus(&fields);
        } else {
            self.state.prev_focus(&fields);
        }
        Ok(())
    }

    async fn input_char(&mut self, path: &str, c: char) -> Result<()> {
        let Some(field) = self.form.field(path) else {
            return Ok(());
        };
        if field.disabled {
            return Ok(());
        }
        let mut field = field.clone();
        if field.push_char(c) {
            self.form.change(path, &field.input).await?;
            self.sync_dependent_fields();
        }
        Ok(())
    }

    async fn backspace(&mut self, path: &str) -> Result<()> {
        let Some(field) = self.form.field(path) else {
            return Ok(());
        };
        if field.disabled || field.input.is_empty() {
            return Ok(());
        }
        let mut field = field.clone();
        field.pop_char();
        self.form.change(path, &field.input).await?;
        self.sync_dependent_fields();
        Ok(())
    }

    /// Run an action panel button
    pub async fn run_action(&mut self, action: FormAction) -> Result<()> {
        if !self.action_enabled(action) {
            tracing::debug!(action = action.label(), "action disabled");
            return Ok(());
        }

        match action {
            FormAction::Submit => self.submit().await?,
            FormAction::Reset => {
                self.form.reset(None, KeepState::default())?;
                self.sync_dependent_fields();
                self.log("form reset".to_string());
            }
            FormAction::GetValues => {
                let values = self.form.get_values().to_string();
                self.log(format!("get values {values}"));
            }
            FormAction::SetValue => {
                self.form
                    .set_value(youtube::USERNAME, json!(""), SetValueOptions::all())
                    .await?;
            }
            FormAction::Validate => {
                self.form.trigger(&[youtube::CHANNEL]).await?;
            }
            FormAction::AddPhone => {
                self.form
                    .append(youtube::PH_NUMBERS, json!({ "number": "" }))?;
                let last = self.form.fields(youtube::PH_NUMBERS)?.len() - 1;
                self.state.focus = Focus::Field(format!("{}.{last}.number", youtube::PH_NUMBERS));
            }
            FormAction::RemovePhone => self.remove_phone()?,
        }
        Ok(())
    }

    /// Remove the phone entry holding focus, or the last one
    fn remove_phone(&mut self) -> Result<()> {
        let len = self.form.fields(youtube::PH_NUMBERS)?.len();
        let focused_entry = self
            .state
            .focus
            .field()
            .and_then(|path| path.strip_prefix(&format!("{}.", youtube::PH_NUMBERS)).map(str::to_string))
            .and_then(|rest| rest.split('.').next().and_then(|i| i.parse::<usize>().ok()));
        let index = focused_entry.unwrap_or(len - 1);

        let previous = self.state.focused_field_index(&self.field_paths()).unwrap_or(0);
        self.form.remove(youtube::PH_NUMBERS, index)?;
        self.state.clamp_focus(&self.field_paths(), previous);
        Ok(())
    }

    /// Submit the form, logging the payload or the errors
    pub async fn submit(&mut self) -> Result<()> {
        let mut submitted = None;
        let outcome = self
            .form
            .handle_submit(|values| {
                submitted = Some(values);
                std::future::ready(Ok(()))
            })
            .await;

        match outcome {
            Ok(SubmitOutcome::Submitted) => {
                let payload = serde_json::to_string(&submitted)?;
                self.log(format!("form submitted {payload}"));
                if self.config.reset_on_success() {
                    self.form.reset(
                        None,
                        KeepState {
                            keep_submit_count: true,
                            ..Default::default()
                        },
                    )?;
                    self.sync_dependent_fields();
                }
            }
            Ok(SubmitOutcome::Invalid(errors)) => {
                let errors = serde_json::to_string(&errors)?;
                self.log(format!("form errors {errors}"));
            }
            Err(err) => self.log(format!("submission failed: {err}")),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockRemoteLookup, SeedUser};
    use pretty_assertions::assert_eq;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn seed_user() -> SeedUser {
        SeedUser {
            id: 1,
            name: "Leanne Graham".to_string(),
            username: "Bret".to_string(),
            email: "Sincere@april.biz".to_string(),
        }
    }

    fn mock_lookup() -> MockRemoteLookup {
        let mut mock = MockRemoteLookup::new();
        mock.expect_fetch_seed_user().returning(|| Ok(seed_user()));
        mock.expect_find_users_by_email().returning(|_| Ok(vec![]));
        mock
    }

    /// App with defaults already applied
    async fn app() -> App {
        let mut app = App::with_lookup(FormConfig::default(), Arc::new(mock_lookup())).unwrap();
        for _ in 0..100 {
            app.poll_defaults();
            if !app.is_loading() {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!app.is_loading());
        app
    }

    async fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            app.handle_key(key(KeyCode::Char(c))).await.unwrap();
        }
    }

    async fn focus(app: &mut App, path: &str) {
        app.state.focus = Focus::Field(path.to_string());
    }

    async fn fill_valid(app: &mut App) {
        focus(app, youtube::CHANNEL).await;
        type_text(app, "Gotham").await;
        focus(app, youtube::TWITTER).await;
        type_text(app, "@batman").await;
        focus(app, youtube::AGE).await;
        type_text(app, "35").await;
        focus(app, youtube::DOB).await;
        type_text(app, "1989-02-19").await;
    }

    mod defaults {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_seed_defaults_applied() {
            let app = app().await;
            assert_eq!(app.form.get_value(youtube::EMAIL), Some(&json!("Sincere@april.biz")));
            assert!(app
                .state
                .last_console_line()
                .is_some_and(|l| l.contains("default values loaded")));
        }

        #[tokio::test]
        async fn test_seed_failure_keeps_static_defaults() {
            let mut mock = MockRemoteLookup::new();
            mock.expect_fetch_seed_user()
                .returning(|| Err(anyhow::anyhow!("offline")));
            let mut app = App::with_lookup(FormConfig::default(), Arc::new(mock)).unwrap();
            for _ in 0..100 {
                app.poll_defaults();
                if !app.is_loading() {
                    break;
                }
                tokio::task::yield_now().await;
            }
            assert!(!app.is_loading());
            assert_eq!(app.form.get_value(youtube::USERNAME), Some(&json!("Batman")));
            assert_eq!(app.form.get_value(youtube::EMAIL), Some(&json!("")));
        }

        #[tokio::test]
        async fn test_input_ignored_while_loading() {
            let mut mock = MockRemoteLookup::new();
            mock.expect_fetch_seed_user().returning(|| Ok(seed_user()));
            let mut app = App::with_lookup(FormConfig::default(), Arc::new(mock)).unwrap();
            // The spawned fetch has not run yet on this single-threaded runtime
            app.handle_key(key(KeyCode::Char('x'))).await.unwrap();
            assert_eq!(app.form.get_value(youtube::USERNAME), Some(&json!("Batman")));
        }
    }

    mod editing {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_typing_updates_form() {
            let mut app = app().await;
            type_text(&mut app, "!").await;
            assert_eq!(app.form.get_value(youtube::USERNAME), Some(&json!("Batman!")));
            app.handle_key(key(KeyCode::Backspace)).await.unwrap();
            assert_eq!(app.form.get_value(youtube::USERNAME), Some(&json!("Batman")));
            assert!(!app.form.is_dirty());
        }

        #[tokio::test]
        async fn test_number_field_rejects_letters() {
            let mut app = app().await;
            focus(&mut app, youtube::AGE).await;
            type_text(&mut app, "3x0").await;
            assert_eq!(app.form.get_value(youtube::AGE), Some(&json!(30.0)));
        }

        #[tokio::test]
        async fn test_tab_blurs_and_moves_focus() {
            let mut app = app().await;
            app.handle_key(key(KeyCode::Tab)).await.unwrap();
            assert!(app.form.is_touched(youtube::USERNAME));
            assert_eq!(app.state.focus, Focus::Field(youtube::EMAIL.to_string()));
        }

        #[tokio::test]
        async fn test_channel_enables_twitter() {
            let mut app = app().await;
            assert!(app.form.is_disabled(youtube::TWITTER));
            focus(&mut app, youtube::CHANNEL).await;
            type_text(&mut app, "G").await;
            assert!(!app.form.is_disabled(youtube::TWITTER));
        }
    }

    mod actions {
        use super::*;
        use pretty_assertions::assert_eq;

        #[tokio::test]
        async fn test_submit_disabled_until_dirty_and_valid() {
            let mut app = app().await;
            assert!(!app.submit_enabled());
            fill_valid(&mut app).await;
            assert!(app.submit_enabled());
        }

        #[tokio::test]
        async fn test_submit_resets_on_success_keeping_count() {
            let mut app = app().await;
            fill_valid(&mut app).await;

            app.run_action(FormAction::Submit).await.unwrap();

            assert!(app
                .state
                .console
                .iter()
                .any(|l| l.starts_with("form submitted")));
            assert_eq!(app.form.lifecycle().submit_count, 1);
            assert_eq!(app.form.get_value(youtube::CHANNEL), Some(&json!("")));
            assert_eq!(app.form.get_value(youtube::EMAIL), Some(&json!("Sincere@april.biz")));
            assert!(app.form.is_disabled(youtube::TWITTER));
        }

        #[tokio::test]
        async fn test_reset_on_success_can_be_disabled() {
            let mut app = app().await;
            app.config.reset_on_success = Some(false);
            fill_valid(&mut app).await;
            app.run_action(FormAction::Submit).await.unwrap();
            assert_eq!(app.form.get_value(youtube::CHANNEL), Some(&json!("Gotham")));
        }

        #[tokio::test]
        async fn test_forced_submit_logs_errors() {
            let mut app = app().await;
            let submit = KeyEvent::new(KeyCode::Char('s'), KeyModifiers::CONTROL);
            app.handle_key(submit).await.unwrap();

            let line = app.state.last_console_line().unwrap();
            assert!(line.starts_with("form errors"));
            assert!(line.contains("Channel is required"));
            assert!(app.form.lifecycle().is_submitted);
        }

        #[tokio::test]
        async fn test_set_value_clears_username_with_side_effects() {
            let mut app = app().await;
            app.run_action(FormAction::SetValue).await.unwrap();
            assert_eq!(app.form.get_value(youtube::USERNAME), Some(&json!("")));
            assert!(app.form.is_touched(youtube::USERNAME));
            assert!(app.form.is_field_dirty(youtube::USERNAME));
            assert_eq!(
                app.form.error(youtube::USERNAME).map(|e| e.message.as_str()),
                Some("Username is required")
            );
        }

        #[tokio::test]
        async fn test_validate_triggers_channel_only() {
            let mut app = app().await;
            app.run_action(FormAction::Validate).await.unwrap();
            let errors = app.form.errors();
            assert_eq!(errors.keys().collect::<Vec<_>>(), vec![youtube::CHANNEL]);
        }

        #[tokio::test]
        async fn test_get_values_logs_json() {
            let mut app = app().await;
            app.run_action(FormAction::GetValues).await.unwrap();
            let line = app.state.last_console_line().unwrap();
            assert!(line.starts_with("get values"));
            assert!(line.contains("\"username\":\"Batman\""));
        }

        #[tokio::test]
        async fn test_add_and_remove_phone() {
            let mut app = app().await;
            assert!(!app.action_enabled(FormAction::RemovePhone));

            app.run_action(FormAction::AddPhone).await.unwrap();
            assert_eq!(app.form.fields(youtube::PH_NUMBERS).unwrap().len(), 2);
            assert_eq!(app.state.focus.field(), Some("phNumbers.1.number"));

            type_text(&mut app, "555").await;
            focus(&mut app, "phNumbers.0.number").await;
            app.run_action(FormAction::RemovePhone).await.unwrap();

            let entries = app.form.fields(youtube::PH_NUMBERS).unwrap();
            assert_eq!(entries.len(), 1);
            assert_eq!(entries[0].value, json!({ "number": "555" }));
            assert!(app.form.field(app.state.focus.field().unwrap()).is_some());
        }

        #[tokio::test]
        async fn test_add_phone_makes_form_dirty() {
            let mut app = app().await;
            assert!(!app.form.is_dirty());
            app.run_action(FormAction::AddPhone).await.unwrap();
            assert!(app.form.is_dirty());

            app.run_action(FormAction::RemovePhone).await.unwrap();
            assert!(!app.form.is_dirty());
        }

        #[tokio::test]
        async fn test_escape_quits() {
            let mut app = app().await;
            app.handle_key(key(KeyCode::Esc)).await.unwrap();
            assert!(app.should_quit());
        }
    }
}
