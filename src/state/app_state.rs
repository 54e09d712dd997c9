//! Application state definitions

use std::collections::VecDeque;

/// Number of console lines kept for the status bar and log panel
const CONSOLE_CAPACITY: usize = 50;

/// Buttons of the action panel, in focus order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormAction {
    Submit,
    Reset,
    GetValues,
    SetValue,
    Validate,
    AddPhone,
    RemovePhone,
}

impl FormAction {
    pub const ALL: [FormAction; 7] = [
        Self::Submit,
        Self::Reset,
        Self::GetValues,
        Self::SetValue,
        Self::Validate,
        Self::AddPhone,
        Self::RemovePhone,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Submit => "Submit",
            Self::Reset => "Reset",
            Self::GetValues => "Get values",
            Self::SetValue => "Set value",
            Self::Validate => "Validate",
            Self::AddPhone => "Add phone",
            Self::RemovePhone => "Remove phone",
        }
    }
}

/// What currently has keyboard focus
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Focus {
    /// A registered field, by path
    Field(String),
    Action(FormAction),
}

impl Default for Focus {
    fn default() -> Self {
        Self::Field(crate::state::youtube::USERNAME.to_string())
    }
}

impl Focus {
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Field(path) => Some(path),
            Self::Action(_) => None,
        }
    }

    pub fn action(&self) -> Option<FormAction> {
        match self {
            Self::Field(_) => None,
            Self::Action(action) => Some(*action),
        }
    }
}

/// Main application state
#[derive(Debug, Default)]
pub struct AppState {
    pub focus: Focus,
    /// Lines logged by form actions, oldest first
    pub console: VecDeque<String>,
}

impl AppState {
    /// Position of the focus in the ring of `fields` followed by the actions
    fn focus_index(&self, fields: &[String]) -> usize {
        match &self.focus {
            Focus::Field(path) => fields.iter().position(|p| p == path).unwrap_or(0),
            Focus::Action(action) => {
                fields.len()
                    + FormAction::ALL
                        .iter()
                        .position(|a| a == action)
                        .unwrap_or(0)
            }
        }
    }

    fn focus_at(&mut self, fields: &[String], index: usize) {
        self.focus = match fields.get(index) {
            Some(path) => Focus::Field(path.clone()),
            None => Focus::Action(FormAction::ALL[index - fields.len()]),
        };
    }

    /// Move to next field or button
    pub fn next_focus(&mut self, fields: &[String]) {
        let count = fields.len() + FormAction::ALL.len();
        let index = (self.focus_index(fields) + 1) % count;
        self.focus_at(fields, index);
    }

    /// Move to previous field or button
    pub fn prev_focus(&mut self, fields: &[String]) {
        let count = fields.len() + FormAction::ALL.len();
        let index = self.focus_index(fields);
        let index = if index == 0 { count - 1 } else { index - 1 };
        self.focus_at(fields, index);
    }

    /// Keep the focus on something that still exists after fields changed
    pub fn clamp_focus(&mut self, fields: &[String], previous_index: usize) {
        if let Focus::Field(path) = &self.focus {
            if !fields.contains(path) {
                let index = previous_index.min(fields.len().saturating_sub(1));
                self.focus_at(fields, index);
            }
        }
    }

    pub fn focused_field_index(&self, fields: &[String]) -> Option<usize> {
        self.focus
            .field()
            .and_then(|path| fields.iter().position(|p| p == path))
    }

    /// Append a console line, dropping the oldest beyond capacity
    pub fn push_console(&mut self, line: impl Into<String>) {
        if self.console.len() == CONSOLE_CAPACITY {
            self.console.pop_front();
        }
        self.console.push_back(line.into());
    }

    pub fn last_console_line(&self) -> Option<&str> {
        self.console.back().map(String::as_str)
    }
}
