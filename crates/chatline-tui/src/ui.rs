//! Rendering routines for the chatline TUI.

use crate::app::{App, Focus};
use ratatui::Frame;
use ratatui::layout::{Constraint, Direction, Layout, Position, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{
    Block, BorderType, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState, Wrap,
};

const PRIMARY: Color = Color::Rgb(236, 91, 43);
const SECONDARY: Color = Color::Rgb(238, 121, 72);
const TEXT: Color = Color::Rgb(238, 238, 238);
const TEXT_MUTED: Color = Color::Rgb(128, 128, 128);
const BORDER: Color = Color::Rgb(60, 60, 60);
const YELLOW: Color = Color::Rgb(229, 192, 123);

const HEADER_HEIGHT: u16 = 4;
const MAX_INPUT_LINES: u16 = 6;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Draw the entire TUI frame.
pub fn draw(frame: &mut Frame<'_>, app: &mut App) {
    let area = frame.area();
    let input_lines = (app.input.split('\n').count() as u16).clamp(1, MAX_INPUT_LINES);

    let root = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(HEADER_HEIGHT),   // header bar
            Constraint::Min(0),                  // chat
            Constraint::Length(input_lines + 2), // input
            Constraint::Length(1),               // status bar
        ])
        .split(area);

    draw_header(frame, app, root[0]);
    draw_chat(frame, app, root[1]);
    draw_input(frame, app, root[2]);
    draw_status_bar(frame, app, root[3]);
}

fn draw_header(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(BORDER));
    let label_style = Style::default().fg(TEXT_MUTED);
    let value_style = Style::default().fg(TEXT);

    let lines = vec![
        Line::from(vec![
            Span::styled(
                " chatline",
                Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  v{VERSION}"), label_style),
        ]),
        Line::from(vec![
            Span::styled(" endpoint ", label_style),
            Span::styled(app.endpoint.as_str(), value_style),
            Span::styled("  storage ", label_style),
            Span::styled(app.storage.as_str(), value_style),
            Span::styled("  messages ", label_style),
            Span::styled(app.messages.len().to_string(), value_style),
        ]),
    ];

    frame.render_widget(Paragraph::new(lines).block(block), area);
}

/// Draw the chat transcript with border and scrollbar.
fn draw_chat(frame: &mut Frame<'_>, app: &mut App, area: Rect) {
    let lines = app.render_lines();
    let focused = app.focus == Focus::Messages;

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(if focused { SECONDARY } else { BORDER }))
        .title(Span::styled(" Chat ", Style::default().fg(TEXT_MUTED)));

    let inner = block.inner(area);
    let content_width = inner.width.saturating_sub(1); // -1 for scrollbar
    let content_height = inner.height as usize;

    let total_lines = Paragraph::new(lines.clone())
        .wrap(Wrap { trim: false })
        .line_count(content_width)
        .max(1);

    let max_scroll = total_lines.saturating_sub(content_height) as u16;
    app.update_scroll_bounds(max_scroll);
    let scroll = app.scroll;

    let chat_inner = Rect {
        width: inner.width.saturating_sub(1),
        ..inner
    };

    let chat = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0));

    frame.render_widget(block, area);
    frame.render_widget(chat, chat_inner);

    if total_lines > content_height {
        let mut scrollbar_state = ScrollbarState::default()
            .content_length(total_lines)
            .position(scroll as usize)
            .viewport_content_length(content_height);
        let scrollbar_area = Rect {
            x: inner.x + inner.width.saturating_sub(1),
            y: inner.y,
            width: 1,
            height: inner.height,
        };
        frame.render_stateful_widget(
            Scrollbar::new(ScrollbarOrientation::VerticalRight)
                .style(Style::default().fg(BORDER))
                .thumb_style(Style::default().fg(TEXT_MUTED)),
            scrollbar_area,
            &mut scrollbar_state,
        );
    }
}

/// Draw the input box; disabled while a request is in flight.
fn draw_input(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let is_active = !app.busy && app.focus == Focus::Input;
    let title = match app.busy_indicator() {
        Some(dots) => format!(" Assistant is typing{dots} "),
        None => " Input ".to_string(),
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(if is_active { SECONDARY } else { BORDER }))
        .title(Span::styled(
            title,
            Style::default().fg(if is_active { SECONDARY } else { PRIMARY }),
        ));

    let inner = block.inner(area);
    let prompt_style = Style::default().fg(PRIMARY).add_modifier(Modifier::BOLD);
    let lines: Vec<Line<'_>> = if app.input.is_empty() {
        vec![Line::from(vec![
            Span::styled(" ", prompt_style),
            Span::styled("Type a message...", Style::default().fg(TEXT_MUTED)),
        ])]
    } else {
        app.input
            .split('\n')
            .map(|line| {
                Line::from(vec![
                    Span::styled(" ", prompt_style),
                    Span::styled(line, Style::default().fg(TEXT)),
                ])
            })
            .collect()
    };

    let visible = inner.height as usize;
    let skip = lines.len().saturating_sub(visible);
    let paragraph = Paragraph::new(lines.into_iter().skip(skip).collect::<Vec<_>>());
    frame.render_widget(block, area);
    frame.render_widget(paragraph, inner);

    if is_active {
        let last_line = app.input.rsplit('\n').next().unwrap_or_default();
        let row = (app.input.split('\n').count().saturating_sub(1 + skip)) as u16;
        frame.set_cursor_position(Position::new(
            inner.x + 1 + last_line.chars().count() as u16,
            inner.y + row,
        ));
    }
}

/// Draw the status bar at the bottom.
fn draw_status_bar(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let status_color = match app.status.as_str() {
        "waiting" | "streaming" => PRIMARY,
        "idle" => TEXT_MUTED,
        _ => YELLOW,
    };

    let shortcuts = vec![
        Span::styled(" Ctrl+C", Style::default().fg(TEXT_MUTED)),
        Span::styled(" quit", Style::default().fg(BORDER)),
        Span::styled("  Enter", Style::default().fg(TEXT_MUTED)),
        Span::styled(" send", Style::default().fg(BORDER)),
        Span::styled("  Alt+Enter", Style::default().fg(TEXT_MUTED)),
        Span::styled(" newline", Style::default().fg(BORDER)),
        Span::styled("  Tab", Style::default().fg(TEXT_MUTED)),
        Span::styled(" select", Style::default().fg(BORDER)),
        Span::styled("  Ctrl+S", Style::default().fg(TEXT_MUTED)),
        Span::styled(" save", Style::default().fg(BORDER)),
    ];

    let right_text = format!(" {} ", app.status);
    let right_len = right_text.chars().count() as u16;
    let left_area = Rect {
        width: area.width.saturating_sub(right_len),
        ..area
    };
    let right_area = Rect {
        x: area.x + area.width.saturating_sub(right_len),
        width: right_len.min(area.width),
        ..area
    };

    let left = Paragraph::new(Line::from(shortcuts));
    let right = Paragraph::new(Line::from(Span::styled(
        right_text,
        Style::default().fg(status_color),
    )));

    frame.render_widget(left, left_area);
    frame.render_widget(right, right_area);
}
