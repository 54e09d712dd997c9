//! Sign-up form rendering with action panel

use super::field_renderer::{draw_field, scroll_start, FIELD_HEIGHT};
use crate::app::App;
use crate::state::FormAction;
use crate::ui::components::{render_action_button, BUTTON_HEIGHT};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Width of the action panel
const ACTION_PANEL_WIDTH: u16 = 22;

/// Draw the form with the action panel on the right
pub fn draw(frame: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Min(40),                    // Form area
            Constraint::Length(ACTION_PANEL_WIDTH), // Action panel
        ])
        .split(area);

    draw_fields(frame, chunks[0], app);
    draw_action_panel(frame, chunks[1], app);
}

/// Draw the registered fields, scrolled to keep the focused one visible
fn draw_fields(frame: &mut Frame, area: Rect, app: &App) {
    let form_focused = app.state.focus.field().is_some();
    let border_color = if form_focused {
        Color::Cyan
    } else {
        Color::DarkGray
    };

    let title = if app.is_loading() {
        " YouTube Form (loading defaults…) ".to_string()
    } else {
        format!(
            " YouTube Form ({}) ",
            app.form.lifecycle().submit_count
        )
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let paths = app.field_paths();
    let visible = (inner.height / FIELD_HEIGHT) as usize;
    let start = scroll_start(app.state.focused_field_index(&paths), visible);

    let fields: Vec<_> = app.form.registry().iter().skip(start).take(visible).collect();
    if fields.is_empty() {
        return;
    }
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            fields
                .iter()
                .map(|_| Constraint::Length(FIELD_HEIGHT))
                .chain(std::iter::once(Constraint::Min(0)))
                .collect::<Vec<_>>(),
        )
        .split(inner);

    for (row, field) in rows.iter().zip(fields) {
        let path = field.path.to_string();
        let is_active = app.state.focus.field() == Some(path.as_str());
        draw_field(frame, *row, field, app.form.error(&path), is_active);
    }
}

/// Draw the action buttons
fn draw_action_panel(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Actions ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if app.state.focus.action().is_some() {
            Color::Cyan
        } else {
            Color::DarkGray
        }));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            FormAction::ALL
                .iter()
                .map(|_| Constraint::Length(BUTTON_HEIGHT))
                .chain(std::iter::once(Constraint::Min(0)))
                .collect::<Vec<_>>(),
        )
        .split(inner);

    for (row, action) in rows.iter().zip(FormAction::ALL) {
        render_action_button(
            frame,
            *row,
            action.label(),
            app.state.focus.action() == Some(action),
            !app.is_loading() && app.action_enabled(action),
        );
    }

    // Flags summary under the buttons
    let used = BUTTON_HEIGHT * FormAction::ALL.len() as u16;
    if inner.height > used {
        let lifecycle = app.form.lifecycle();
        let summary = format!(
            "dirty: {}\nvalid: {}\nsubmitted: {}\nsuccessful: {}",
            app.form.is_dirty(),
            app.form.is_valid(),
            lifecycle.is_submitted,
            lifecycle.is_submit_successful,
        );
        let summary_area = Rect {
            y: inner.y + used,
            height: inner.height - used,
            ..inner
        };
        frame.render_widget(
            Paragraph::new(summary).style(Style::default().fg(Color::DarkGray)),
            summary_area,
        );
    }
}
