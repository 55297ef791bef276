//! Core chat client for chatline.
//!
//! This crate owns the conversation controller, streaming response
//! ingestion, the HTTP transport, message rendering, and client-side
//! persistence used by the terminal UI.

pub mod controller;
pub mod error;
pub mod ingest;
pub mod render;
pub mod saved;
pub mod store;
pub mod transport;

pub use controller::{
    ChatController, ControllerSettings, TurnOutcome, TurnPhase, TurnUpdate, turn_updates,
};
pub use error::{ChatError, StoreError, SubmitRejected};
pub use ingest::{ByteStream, FragmentStream, RecordDecoder, Utf8Decoder, fragments};
/// Display event types shared with presentation layers.
pub use chatline_protocol::{
    Author, ChatEvent, ChatRequest, EventSink, Message, MessageView, Role, SaveState,
};
pub use saved::SavedSet;
pub use store::{FileStore, KeyValueStore, MemoryStore, SessionStore, open_store};
pub use transport::{ChatTransport, HttpTransport};
