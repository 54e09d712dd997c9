//! Field rendering utilities for forms

use crate::state::{FieldError, FormField};
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
    Frame,
};

/// Height of one field box
pub const FIELD_HEIGHT: u16 = 3;

/// Draw a registered field with its error as the bottom border title
pub fn draw_field(
    frame: &mut Frame,
    area: Rect,
    field: &FormField,
    error: Option<&FieldError>,
    is_active: bool,
) {
    let border_style = if error.is_some() {
        Style::default().fg(Color::Red)
    } else if is_active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };

    let text_style = if field.disabled {
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::CROSSED_OUT)
    } else if is_active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };

    let display_value = field.display_value();
    let display_str = if field.disabled {
        "(disabled)".to_string()
    } else if field.input.is_empty() && !is_active {
        match display_value.as_str() {
            "" => "(empty)".to_string(),
            placeholder => format!("({placeholder})"),
        }
    } else {
        display_value
    };

    let cursor = if is_active && !field.disabled { "▌" } else { "" };
    let content = Paragraph::new(Line::from(vec![
        Span::styled(display_str, text_style),
        Span::styled(cursor, Style::default().fg(Color::Cyan)),
    ]));

    let title = if field.is_required() {
        format!(" {} * ", field.label)
    } else {
        format!(" {} ", field.label)
    };
    let mut block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);
    if let Some(error) = error {
        block = block.title_bottom(Line::styled(
            format!(" {} ", error.message),
            Style::default().fg(Color::Red),
        ));
    }

    frame.render_widget(content.block(block), area);
}

/// First field index to draw so that `active` stays inside `visible` rows
pub fn scroll_start(active: Option<usize>, visible: usize) -> usize {
    match active {
        Some(index) if visible > 0 && index >= visible => index + 1 - visible,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scroll_keeps_active_visible() {
        assert_eq!(scroll_start(None, 4), 0);
        assert_eq!(scroll_start(Some(2), 4), 0);
        assert_eq!(scroll_start(Some(4), 4), 1);
        assert_eq!(scroll_start(Some(9), 4), 6);
        assert_eq!(scroll_start(Some(3), 0), 0);
    }
}
