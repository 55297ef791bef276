//! Test helpers shared across chatline crates.

pub mod sink;
pub mod store;
pub mod transport;

pub use sink::RecordingSink;
pub use store::FailingStore;
pub use transport::{FailingTransport, ScriptedTransport};
