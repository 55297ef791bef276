//! Wire and display types shared by the chatline crates.
//!
//! The wire half mirrors the chat endpoint: a request carries the whole
//! transcript and the response is a stream of newline-separated records.
//! The display half is what the controller emits to presentation layers.

mod event;

pub use event::{Author, ChatEvent, EventSink, MessageView, SaveState};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Monotonic identifier for a request/response round trip.
pub type TurnId = u64;

/// Speaker role for a transcript message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User-authored message.
    User,
    /// Assistant-authored message.
    Assistant,
}

impl Role {
    /// Return the role as a lowercase string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// Message stored in the transcript and sent to the endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Role that produced the message.
    pub role: Role,
    /// Message content.
    pub content: String,
}

impl Message {
    /// Build a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Build an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body posted to the chat endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRequest {
    /// Full transcript at submission time, including the new user message.
    pub messages: Vec<Message>,
}

/// One decoded record from the response stream.
///
/// Every field other than `response` is ignored, so records carrying usage
/// or metadata only still decode.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct StreamRecord {
    /// Incremental text fragment.
    #[serde(default)]
    pub response: Option<serde_json::Value>,
}

impl StreamRecord {
    /// Return the text fragment, if the record carries a non-empty string.
    pub fn fragment(self) -> Option<String> {
        match self.response {
            Some(serde_json::Value::String(text)) if !text.is_empty() => Some(text),
            _ => None,
        }
    }
}
