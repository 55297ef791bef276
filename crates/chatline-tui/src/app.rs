//! Application state for the chatline TUI.

use chatline_core::render::render_placeholder;
use chatline_core::{Author, ChatEvent, MessageView, SaveState};
use chatline_protocol::TurnId;
use log::{debug, info, warn};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use std::cmp::min;

const SPINNER: [&str; 4] = ["   ", ".  ", ".. ", "..."];

/// Which pane receives keyboard input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Focus {
    /// Typing into the input box.
    Input,
    /// Selecting messages in the chat view.
    Messages,
}

/// Top-level application state for the TUI.
pub struct App {
    /// Chat endpoint shown in the header.
    pub endpoint: String,
    /// Storage location shown in the header.
    pub storage: String,
    /// Rendered chat view, including notices.
    pub messages: Vec<MessageView>,
    /// Current input buffer.
    pub input: String,
    /// Pane receiving keyboard input.
    pub focus: Focus,
    /// Selected message index while the chat view has focus.
    pub selected: Option<usize>,
    /// True while a request is in flight.
    pub busy: bool,
    /// Status line text.
    pub status: String,
    /// Current scroll offset.
    pub scroll: u16,
    /// Whether to auto-scroll to the bottom.
    pub auto_scroll: bool,
    /// Maximum scroll offset for the chat view.
    pub chat_max_scroll: u16,
    placeholder: Option<(TurnId, usize)>,
    spinner: usize,
}

impl App {
    /// Create application state showing the hydrated transcript.
    pub fn new(endpoint: String, storage: String, messages: Vec<MessageView>) -> Self {
        Self {
            endpoint,
            storage,
            messages,
            input: String::new(),
            focus: Focus::Input,
            selected: None,
            busy: false,
            status: "idle".to_string(),
            scroll: 0,
            auto_scroll: true,
            chat_max_scroll: 0,
            placeholder: None,
            spinner: 0,
        }
    }

    /// Set the status line.
    pub fn push_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }

    /// Apply a controller event to the view.
    pub fn apply_event(&mut self, event: ChatEvent) {
        match event {
            ChatEvent::MessageAppended { view } => {
                self.messages.push(view);
                self.auto_scroll = true;
            }
            ChatEvent::AssistantStarted { turn_id } => {
                debug!("placeholder added (turn_id={})", turn_id);
                self.messages.push(render_placeholder());
                self.placeholder = Some((turn_id, self.messages.len() - 1));
                self.busy = true;
                self.status = "waiting".to_string();
                self.maybe_enable_auto_scroll();
            }
            ChatEvent::AssistantText { turn_id, text } => {
                if let Some(view) = self.placeholder_mut(turn_id) {
                    view.content = text;
                    self.status = "streaming".to_string();
                    self.maybe_enable_auto_scroll();
                }
            }
            ChatEvent::TurnCompleted { turn_id, view, .. } => {
                info!("turn completed (turn_id={})", turn_id);
                if let Some(placeholder) = self.placeholder_mut(turn_id) {
                    *placeholder = view;
                }
                self.placeholder = None;
            }
            ChatEvent::TurnFailed {
                turn_id,
                notice,
                reason,
            } => {
                warn!("turn failed (turn_id={}, reason={})", turn_id, reason);
                match self.placeholder_mut(turn_id) {
                    Some(placeholder) => *placeholder = notice,
                    None => self.messages.push(notice),
                }
                self.placeholder = None;
                self.status = format!("request failed: {reason}");
            }
            ChatEvent::MessageSaved { .. } => {
                self.status = "message saved".to_string();
            }
            ChatEvent::PersistFailed { key, reason } => {
                self.status = format!("storage error ({key}): {reason}");
            }
            ChatEvent::InputReady => {
                self.busy = false;
                self.focus = Focus::Input;
                self.selected = None;
                if self.status == "streaming" || self.status == "waiting" {
                    self.status = "idle".to_string();
                }
            }
        }
    }

    /// Rebuild the view from controller state after events were dropped.
    ///
    /// Notices are not part of the transcript and are lost.
    pub fn resync(&mut self, views: Vec<MessageView>, in_flight: Option<(TurnId, &str)>) {
        info!(
            "resyncing view (messages={}, in_flight={})",
            views.len(),
            in_flight.is_some()
        );
        self.messages = views;
        self.selected = None;
        self.placeholder = None;
        self.busy = in_flight.is_some();
        if let Some((turn_id, text)) = in_flight {
            let mut placeholder = render_placeholder();
            placeholder.content = text.to_string();
            self.messages.push(placeholder);
            self.placeholder = Some((turn_id, self.messages.len() - 1));
            self.status = "streaming".to_string();
        } else {
            self.focus = Focus::Input;
            self.status = "idle".to_string();
        }
        self.auto_scroll = true;
    }

    fn placeholder_mut(&mut self, turn_id: TurnId) -> Option<&mut MessageView> {
        match self.placeholder {
            Some((active, idx)) if active == turn_id => self.messages.get_mut(idx),
            _ => None,
        }
    }

    /// Advance the busy indicator.
    pub fn tick(&mut self) {
        if self.busy {
            self.spinner = (self.spinner + 1) % SPINNER.len();
        }
    }

    /// Busy indicator text shown while a request is in flight.
    pub fn busy_indicator(&self) -> Option<&'static str> {
        self.busy.then_some(SPINNER[self.spinner])
    }

    pub fn insert_char(&mut self, ch: char) {
        if !self.busy {
            self.input.push(ch);
        }
    }

    pub fn insert_newline(&mut self) {
        self.insert_char('\n');
    }

    pub fn backspace(&mut self) {
        if !self.busy {
            self.input.pop();
        }
    }

    /// Move focus to the chat view and select the newest saveable message.
    pub fn focus_messages(&mut self) {
        self.focus = Focus::Messages;
        self.selected = self
            .messages
            .iter()
            .rposition(|view| view.save.is_some());
    }

    pub fn focus_input(&mut self) {
        self.focus = Focus::Input;
        self.selected = None;
    }

    /// Select the previous saveable message.
    pub fn select_prev(&mut self) {
        let Some(current) = self.selected else {
            return;
        };
        if let Some(idx) = self.messages[..current]
            .iter()
            .rposition(|view| view.save.is_some())
        {
            self.selected = Some(idx);
        }
    }

    /// Select the next saveable message.
    pub fn select_next(&mut self) {
        let Some(current) = self.selected else {
            return;
        };
        if let Some(offset) = self.messages[current + 1..]
            .iter()
            .position(|view| view.save.is_some())
        {
            self.selected = Some(current + 1 + offset);
        }
    }

    /// The selected message view, if any.
    pub fn selected_view_mut(&mut self) -> Option<&mut MessageView> {
        self.selected.and_then(|idx| self.messages.get_mut(idx))
    }

    /// Scroll the chat view upward by a number of lines.
    pub fn scroll_up(&mut self, lines: u16) {
        self.auto_scroll = false;
        self.scroll = self.scroll.saturating_sub(lines);
    }

    /// Scroll the chat view downward by a number of lines.
    pub fn scroll_down(&mut self, lines: u16) {
        self.scroll = min(self.scroll.saturating_add(lines), self.chat_max_scroll);
        if self.scroll >= self.chat_max_scroll {
            self.auto_scroll = true;
        }
    }

    /// Scroll to the top of the chat view.
    pub fn scroll_to_top(&mut self) {
        self.auto_scroll = false;
        self.scroll = 0;
    }

    /// Enable auto-scrolling to the bottom.
    pub fn enable_auto_scroll(&mut self) {
        self.auto_scroll = true;
        self.scroll = self.chat_max_scroll;
    }

    /// Update scroll bounds after layout changes.
    ///
    /// Snaps to the new bottom only when auto-scroll is on or the view was
    /// already pinned to the bottom.
    pub fn update_scroll_bounds(&mut self, max_scroll: u16) {
        let was_at_bottom = self.scroll >= self.chat_max_scroll;
        self.chat_max_scroll = max_scroll;
        if self.auto_scroll || was_at_bottom {
            self.scroll = max_scroll;
            self.auto_scroll = true;
        } else {
            self.scroll = self.scroll.min(max_scroll);
        }
    }

    fn maybe_enable_auto_scroll(&mut self) {
        if self.auto_scroll {
            self.scroll = self.chat_max_scroll;
        }
    }

    /// Render chat messages into styled lines for the UI.
    pub fn render_lines(&self) -> Vec<Line<'static>> {
        let mut lines = Vec::new();

        if self.messages.is_empty() {
            lines.push(Line::from(Span::styled(
                " No messages yet. Type a message below to start.",
                Style::default().fg(Color::Rgb(128, 128, 128)),
            )));
            return lines;
        }

        let badge = |bg: Color| {
            Style::default()
                .fg(Color::Rgb(10, 10, 10))
                .bg(bg)
                .add_modifier(Modifier::BOLD)
        };

        for (idx, view) in self.messages.iter().enumerate() {
            let (prefix, prefix_style, content_style) = match view.author {
                Author::User => (
                    " you ",
                    badge(Color::Rgb(107, 161, 230)),
                    Style::default().fg(Color::Rgb(238, 238, 238)),
                ),
                Author::Assistant => (
                    " assistant ",
                    badge(Color::Rgb(238, 121, 72)),
                    Style::default().fg(Color::Rgb(238, 238, 238)),
                ),
                Author::Notice => (
                    " notice ",
                    badge(Color::Rgb(236, 91, 43)),
                    Style::default().fg(Color::Rgb(255, 110, 110)),
                ),
            };
            let selected = self.selected == Some(idx);

            let mut header = Vec::new();
            if selected {
                header.push(Span::styled(
                    "> ",
                    Style::default()
                        .fg(Color::Rgb(238, 121, 72))
                        .add_modifier(Modifier::BOLD),
                ));
            }
            header.push(Span::styled(prefix, prefix_style));
            match view.save {
                Some(SaveState::Saved) => header.push(Span::styled(
                    " saved",
                    Style::default().fg(Color::Rgb(120, 220, 140)),
                )),
                Some(SaveState::Unsaved) if selected => header.push(Span::styled(
                    " ctrl+s to save",
                    Style::default().fg(Color::Rgb(128, 128, 128)),
                )),
                _ => {}
            }
            lines.push(Line::from(header));

            let is_placeholder = matches!(self.placeholder, Some((_, active)) if active == idx);
            if is_placeholder && view.content.is_empty() {
                let dots = self.busy_indicator().unwrap_or("...");
                lines.push(Line::from(Span::styled(
                    format!(" {dots}"),
                    Style::default().fg(Color::Rgb(128, 128, 128)),
                )));
            }
            for line in view.content.lines() {
                lines.push(Line::from(Span::styled(format!(" {line}"), content_style)));
            }

            if idx + 1 < self.messages.len() {
                lines.push(Line::from(Span::raw("")));
            }
        }

        // Trailing padding keeps the last wrapped line reachable.
        lines.push(Line::from(Span::raw("")));

        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::Message;
    use pretty_assertions::assert_eq;

    fn assistant(content: &str, save: SaveState) -> MessageView {
        MessageView {
            author: Author::Assistant,
            content: content.to_string(),
            save: Some(save),
        }
    }

    fn user(content: &str) -> MessageView {
        MessageView {
            author: Author::User,
            content: content.to_string(),
            save: None,
        }
    }

    fn app() -> App {
        App::new(
            "http://127.0.0.1:8787/api/chat".to_string(),
            "memory".to_string(),
            vec![assistant("greeting", SaveState::Unsaved)],
        )
    }

    #[test]
    fn streamed_turn_fills_then_finalizes_placeholder() {
        let mut app = app();
        app.apply_event(ChatEvent::MessageAppended { view: user("Hello") });
        app.apply_event(ChatEvent::AssistantStarted { turn_id: 1 });
        assert!(app.busy);
        assert_eq!(app.messages.last().map(|view| view.save), Some(None));

        app.apply_event(ChatEvent::AssistantText {
            turn_id: 1,
            text: "Hi".to_string(),
        });
        app.apply_event(ChatEvent::AssistantText {
            turn_id: 1,
            text: "Hi there".to_string(),
        });
        assert_eq!(
            app.messages.last().map(|view| view.content.as_str()),
            Some("Hi there")
        );

        let view = assistant("Hi there", SaveState::Unsaved);
        app.apply_event(ChatEvent::TurnCompleted {
            turn_id: 1,
            message: Message::assistant("Hi there"),
            view: view.clone(),
        });
        app.apply_event(ChatEvent::InputReady);
        assert_eq!(app.messages.len(), 3);
        assert_eq!(app.messages.last(), Some(&view));
        assert!(!app.busy);
        assert_eq!(app.focus, Focus::Input);
    }

    #[test]
    fn failure_replaces_placeholder_with_notice() {
        let mut app = app();
        app.apply_event(ChatEvent::AssistantStarted { turn_id: 4 });
        app.apply_event(ChatEvent::AssistantText {
            turn_id: 4,
            text: "part".to_string(),
        });
        let notice = MessageView {
            author: Author::Notice,
            content: "Sorry, there was an error processing your request.".to_string(),
            save: None,
        };
        app.apply_event(ChatEvent::TurnFailed {
            turn_id: 4,
            notice: notice.clone(),
            reason: "endpoint returned status 500".to_string(),
        });
        assert_eq!(app.messages.len(), 2);
        assert_eq!(app.messages.last(), Some(&notice));
    }

    #[test]
    fn text_for_another_turn_is_ignored() {
        let mut app = app();
        app.apply_event(ChatEvent::AssistantStarted { turn_id: 2 });
        app.apply_event(ChatEvent::AssistantText {
            turn_id: 1,
            text: "stale".to_string(),
        });
        assert_eq!(app.messages.last().map(|view| view.content.as_str()), Some(""));
    }

    #[test]
    fn resync_after_dropped_events_unlocks_input() {
        let mut app = app();
        app.apply_event(ChatEvent::MessageAppended { view: user("Hello") });
        app.apply_event(ChatEvent::AssistantStarted { turn_id: 3 });
        assert!(app.busy);

        let views = vec![
            assistant("greeting", SaveState::Unsaved),
            user("Hello"),
            assistant("Hi there", SaveState::Unsaved),
        ];
        app.resync(views.clone(), None);
        assert!(!app.busy);
        assert_eq!(app.focus, Focus::Input);
        assert_eq!(app.messages, views);
        app.insert_char('x');
        assert_eq!(app.input, "x");

        app.apply_event(ChatEvent::AssistantText {
            turn_id: 3,
            text: "late".to_string(),
        });
        assert_eq!(app.messages, views);
    }

    #[test]
    fn resync_mid_turn_keeps_streaming_placeholder() {
        let mut app = app();
        let views = vec![assistant("greeting", SaveState::Unsaved), user("Hello")];
        app.resync(views, Some((5, "Hi")));
        assert!(app.busy);
        assert_eq!(app.messages.len(), 3);
        assert_eq!(app.messages.last().map(|view| view.content.as_str()), Some("Hi"));

        app.apply_event(ChatEvent::AssistantText {
            turn_id: 5,
            text: "Hi there".to_string(),
        });
        assert_eq!(
            app.messages.last().map(|view| view.content.as_str()),
            Some("Hi there")
        );
    }

    #[test]
    fn selection_skips_unsaveable_messages() {
        let mut app = App::new(
            String::new(),
            String::new(),
            vec![
                assistant("a", SaveState::Saved),
                user("q"),
                assistant("b", SaveState::Unsaved),
                user("r"),
            ],
        );
        app.focus_messages();
        assert_eq!(app.selected, Some(2));
        app.select_next();
        assert_eq!(app.selected, Some(2));
        app.select_prev();
        assert_eq!(app.selected, Some(0));
        app.select_prev();
        assert_eq!(app.selected, Some(0));
        app.focus_input();
        assert_eq!(app.selected, None);
    }

    #[test]
    fn input_is_locked_while_busy() {
        let mut app = app();
        app.insert_char('h');
        app.insert_newline();
        assert_eq!(app.input, "h\n");
        app.apply_event(ChatEvent::AssistantStarted { turn_id: 1 });
        app.insert_char('x');
        app.backspace();
        assert_eq!(app.input, "h\n");
        assert!(app.busy_indicator().is_some());
    }
}
