use chatline_protocol::{ChatEvent, EventSink};
use parking_lot::Mutex;

/// Event sink that records every emitted event.
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ChatEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().clone()
    }

    /// Every placeholder text update, in order.
    pub fn assistant_texts(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                ChatEvent::AssistantText { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: ChatEvent) {
        self.events.lock().push(event);
    }
}
