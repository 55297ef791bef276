//! TUI event types for input, turn progress and controller events.

use chatline_core::{ChatEvent, TurnUpdate};
use crossterm::event::KeyEvent;

/// Application event emitted by input handlers, the turn task or the bus.
#[derive(Debug)]
pub enum AppEvent {
    /// Keyboard input event.
    Input(KeyEvent),
    /// Periodic tick event.
    Tick,
    /// Progress of the in-flight request.
    Turn(TurnUpdate),
    /// Display event emitted by the controller.
    Chat(ChatEvent),
    /// Scroll event in the chat view.
    Scroll(i16),
    /// Controller events were dropped; rebuild the view from the controller.
    Resync,
}
