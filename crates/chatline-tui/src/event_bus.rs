//! Local event bus connecting the controller to the TUI loop.

use chatline_protocol::{ChatEvent, EventSink};
use log::debug;
use tokio::sync::broadcast;

/// Broadcast-backed event sink for the chat controller.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<ChatEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel buffer size.
    pub fn new(buffer: usize) -> Self {
        let (sender, _) = broadcast::channel(buffer);
        debug!("tui event bus initialized (buffer={})", buffer);
        Self { sender }
    }

    /// Subscribe to the event stream.
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.sender.subscribe()
    }
}

impl EventSink for EventBus {
    fn emit(&self, event: ChatEvent) {
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::EventBus;
    use chatline_protocol::{ChatEvent, EventSink};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn subscribers_receive_events_in_order() {
        let bus = EventBus::new(8);
        let mut receiver = bus.subscribe();
        bus.emit(ChatEvent::AssistantStarted { turn_id: 1 });
        bus.emit(ChatEvent::InputReady);
        assert_eq!(
            receiver.recv().await.expect("event"),
            ChatEvent::AssistantStarted { turn_id: 1 }
        );
        assert_eq!(receiver.recv().await.expect("event"), ChatEvent::InputReady);
    }
}
