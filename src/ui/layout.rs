//! Layout components (content area, status bar)

use crate::app::App;
use crate::platform::SUBMIT_SHORTCUT;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    text::{Line, Span},
    widgets::Paragraph,
    Frame,
};

/// Split the screen into content and a one-line status bar
pub fn create_layout(area: Rect) -> (Rect, Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Status bar
        ])
        .split(area);

    (chunks[0], chunks[1])
}

/// Draw the status bar: lifecycle flags, last console line, key hints
pub fn draw_status_bar(frame: &mut Frame, area: Rect, app: &App) {
    let lifecycle = app.form.lifecycle();
    let mut spans = vec![];

    let indicator = if app.is_loading() {
        Span::styled(" ◌ ", Style::default().fg(Color::Yellow))
    } else if app.form.is_valid() {
        Span::styled(" ● ", Style::default().fg(Color::Green))
    } else {
        Span::styled(" ● ", Style::default().fg(Color::Red))
    };
    spans.push(indicator);

    spans.push(Span::styled(
        format!(
            "mode:{} submits:{} {}{}",
            app.form.options().mode.label(),
            lifecycle.submit_count,
            if lifecycle.is_submitting { "submitting " } else { "" },
            if lifecycle.is_validating { "validating " } else { "" },
        ),
        Style::default().fg(Color::Gray),
    ));

    spans.push(Span::styled(
        format!("Tab:next  Enter:press  {SUBMIT_SHORTCUT}:submit  Esc:quit"),
        Style::default().fg(Color::DarkGray),
    ));

    if let Some(line) = app.state.last_console_line() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(line, Style::default().fg(Color::Green)));
    }

    let status = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));
    frame.render_widget(status, area);
}
