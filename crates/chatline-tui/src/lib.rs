//! Library entry point for the chatline TUI.
//!
//! Provides [`run`], which drives a [`ChatController`] from a Ratatui
//! terminal UI, and [`run_prompt`] for one-shot use from scripts.

mod app;
mod event;
mod event_bus;
mod oneshot;
mod ui;

pub use event_bus::EventBus;
pub use oneshot::{PrintSink, run_prompt};

use anyhow::anyhow;
use app::{App, Focus};
use chatline_core::{ChatController, ChatRequest, ChatTransport, SubmitRejected, turn_updates};
use crossterm::event::{
    DisableMouseCapture, EnableMouseCapture, Event as CrosstermEvent, KeyCode, KeyEvent,
    KeyModifiers, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use event::AppEvent;
use futures_util::StreamExt;
use log::{debug, info, warn};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io::{self, Stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};

/// Display settings for the TUI session.
#[derive(Debug, Clone, Default)]
pub struct TuiConfig {
    /// Chat endpoint shown in the header.
    pub endpoint: String,
    /// Storage location shown in the header.
    pub storage: String,
}

/// Launch the TUI for a controller built with `events` as its sink.
///
/// The caller is responsible for:
/// - Creating the [`ChatController`] with `Arc::new(events.clone())` injected
/// - Initializing logging (e.g. `env_logger`) before calling `run`
///
/// # Errors
/// Returns an error if terminal setup or the event loop fails.
pub async fn run(
    mut controller: ChatController,
    transport: Arc<dyn ChatTransport>,
    events: EventBus,
    config: TuiConfig,
) -> anyhow::Result<()> {
    let mut app = App::new(config.endpoint, config.storage, controller.views());
    info!("starting tui (messages={})", app.messages.len());

    let mut terminal = setup_terminal()?;
    let (tx, mut rx) = mpsc::channel(256);
    spawn_input_handler(tx.clone());
    spawn_tick(tx.clone());
    spawn_event_forwarder(events.subscribe(), tx.clone());

    let result = loop {
        if let Err(err) = terminal.draw(|frame| ui::draw(frame, &mut app)) {
            break Err(err.into());
        }
        let Some(event) = rx.recv().await else {
            break Err(anyhow!("event channel closed unexpectedly"));
        };
        if handle_app_event(event, &mut controller, &transport, &mut app, &tx) {
            break Ok(());
        }
    };

    restore_terminal(&mut terminal)?;
    result
}

/// Dispatch a UI event and return true when the app should exit.
fn handle_app_event(
    event: AppEvent,
    controller: &mut ChatController,
    transport: &Arc<dyn ChatTransport>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) -> bool {
    match event {
        AppEvent::Input(key) => handle_input(key, controller, transport, app, sender),
        AppEvent::Turn(update) => {
            if let Some(outcome) = controller.apply_update(update) {
                debug!("turn finished (outcome={:?})", outcome);
            }
            false
        }
        AppEvent::Chat(event) => {
            app.apply_event(event);
            false
        }
        AppEvent::Scroll(delta) => {
            if delta < 0 {
                app.scroll_up((-delta) as u16);
            } else if delta > 0 {
                app.scroll_down(delta as u16);
            }
            false
        }
        AppEvent::Tick => {
            app.tick();
            false
        }
        AppEvent::Resync => {
            let in_flight = controller
                .active_turn()
                .map(|turn_id| (turn_id, controller.accumulated()));
            app.resync(controller.views(), in_flight);
            false
        }
    }
}

/// Handle keyboard input and dispatch actions.
fn handle_input(
    key: KeyEvent,
    controller: &mut ChatController,
    transport: &Arc<dyn ChatTransport>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return true;
    }
    if key.code == KeyCode::Esc {
        if app.focus == Focus::Messages {
            app.focus_input();
            return false;
        }
        return true;
    }
    if key.code == KeyCode::Tab {
        match app.focus {
            Focus::Input => app.focus_messages(),
            Focus::Messages => app.focus_input(),
        }
        return false;
    }

    match app.focus {
        Focus::Messages => handle_selection_input(key, controller, app),
        Focus::Input => handle_default_input(key, controller, transport, app, sender),
    }
    false
}

/// Handle keyboard input while the chat view has focus.
fn handle_selection_input(key: KeyEvent, controller: &mut ChatController, app: &mut App) {
    match key.code {
        KeyCode::Up => app.select_prev(),
        KeyCode::Down => app.select_next(),
        KeyCode::Char('s') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            let saved = app.selected_view_mut().map(|view| controller.save(view));
            match saved {
                Some(true) => {}
                Some(false) => app.push_status("already saved"),
                None => app.push_status("nothing to save"),
            }
        }
        KeyCode::PageUp => app.scroll_up(5),
        KeyCode::PageDown => app.scroll_down(5),
        _ => {}
    }
}

/// Handle keyboard input in the input box.
fn handle_default_input(
    key: KeyEvent,
    controller: &mut ChatController,
    transport: &Arc<dyn ChatTransport>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) {
    match key.code {
        KeyCode::Enter
            if key
                .modifiers
                .intersects(KeyModifiers::SHIFT | KeyModifiers::ALT) =>
        {
            app.insert_newline();
        }
        KeyCode::Enter => submit(controller, transport, app, sender),
        KeyCode::Char('j') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.insert_newline();
        }
        KeyCode::Backspace => app.backspace(),
        KeyCode::PageUp => app.scroll_up(5),
        KeyCode::PageDown => app.scroll_down(5),
        KeyCode::Up => app.scroll_up(1),
        KeyCode::Down => app.scroll_down(1),
        KeyCode::Home => app.scroll_to_top(),
        KeyCode::End => app.enable_auto_scroll(),
        KeyCode::Char(ch) => {
            if !key.modifiers.contains(KeyModifiers::CONTROL) {
                app.insert_char(ch);
            }
        }
        _ => {}
    }
}

/// Submit the input buffer and start streaming the reply.
fn submit(
    controller: &mut ChatController,
    transport: &Arc<dyn ChatTransport>,
    app: &mut App,
    sender: &mpsc::Sender<AppEvent>,
) {
    match controller.begin_turn(&app.input) {
        Ok(request) => {
            info!("sending message (input_len={})", app.input.len());
            app.input.clear();
            app.enable_auto_scroll();
            spawn_turn(transport.clone(), request, sender.clone());
        }
        Err(SubmitRejected::Busy) => debug!("submit ignored while busy"),
        Err(SubmitRejected::EmptyInput) => app.input.clear(),
    }
}

/// Spawn a task that issues the request and forwards its progress.
fn spawn_turn(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
    sender: mpsc::Sender<AppEvent>,
) {
    tokio::spawn(async move {
        let mut updates = turn_updates(transport, request);
        while let Some(update) = updates.next().await {
            if sender.send(AppEvent::Turn(update)).await.is_err() {
                debug!("ui closed while streaming; dropping response");
                break;
            }
        }
    });
}

/// Spawn a task forwarding controller events into the UI loop.
fn spawn_event_forwarder(
    mut receiver: broadcast::Receiver<chatline_core::ChatEvent>,
    sender: mpsc::Sender<AppEvent>,
) {
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    if sender.send(AppEvent::Chat(event)).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("event forwarder lagged (skipped={})", skipped);
                    if sender.send(AppEvent::Resync).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });
}

/// Spawn a task to poll for input events.
fn spawn_input_handler(sender: mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        const MOUSE_SCROLL_LINES: i16 = 3;
        loop {
            if matches!(crossterm::event::poll(Duration::from_millis(30)), Ok(true)) {
                while matches!(crossterm::event::poll(Duration::from_millis(0)), Ok(true)) {
                    let event = match crossterm::event::read() {
                        Ok(event) => event,
                        Err(_) => break,
                    };
                    match event {
                        CrosstermEvent::Key(key) => {
                            let _ = sender.send(AppEvent::Input(key)).await;
                        }
                        CrosstermEvent::Mouse(mouse) => match mouse.kind {
                            MouseEventKind::ScrollUp => {
                                let _ = sender.send(AppEvent::Scroll(-MOUSE_SCROLL_LINES)).await;
                            }
                            MouseEventKind::ScrollDown => {
                                let _ = sender.send(AppEvent::Scroll(MOUSE_SCROLL_LINES)).await;
                            }
                            _ => {}
                        },
                        _ => {}
                    }
                }
            }
        }
    });
}

/// Spawn a periodic tick event generator.
fn spawn_tick(sender: mpsc::Sender<AppEvent>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(250));
        loop {
            interval.tick().await;
            let _ = sender.send(AppEvent::Tick).await;
        }
    });
}

/// Configure terminal in raw mode with alternate screen.
fn setup_terminal() -> anyhow::Result<Terminal<CrosstermBackend<Stdout>>> {
    debug!("setting up terminal");
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore terminal state on exit.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> anyhow::Result<()> {
    debug!("restoring terminal");
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    Ok(())
}
