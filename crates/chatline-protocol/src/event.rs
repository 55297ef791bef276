//! Display events emitted by the conversation controller.

use crate::{Message, Role, TurnId};
use serde::{Deserialize, Serialize};

/// Who a rendered message is attributed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Author {
    /// User-authored transcript message.
    User,
    /// Assistant-authored transcript message (or the in-progress placeholder).
    Assistant,
    /// Client-generated notice that is never part of the transcript.
    Notice,
}

impl From<Role> for Author {
    fn from(role: Role) -> Self {
        match role {
            Role::User => Author::User,
            Role::Assistant => Author::Assistant,
        }
    }
}

/// State of the save affordance attached to a rendered message.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SaveState {
    /// Save action available.
    Unsaved,
    /// Save action consumed; the view cannot be unsaved.
    Saved,
}

/// Render model for a single message in the chat view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessageView {
    /// Who the message is attributed to.
    pub author: Author,
    /// Displayed text.
    pub content: String,
    /// Save affordance, present only for finalized assistant messages.
    pub save: Option<SaveState>,
}

/// Events emitted while a conversation progresses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type", content = "payload")]
pub enum ChatEvent {
    /// A transcript message should be appended to the view.
    MessageAppended { view: MessageView },
    /// A request was issued; an empty assistant placeholder should appear.
    AssistantStarted { turn_id: TurnId },
    /// Full accumulated assistant text for the placeholder.
    AssistantText { turn_id: TurnId, text: String },
    /// The placeholder was finalized into a transcript message.
    TurnCompleted {
        turn_id: TurnId,
        message: Message,
        view: MessageView,
    },
    /// The turn failed; the placeholder should be replaced by the notice.
    TurnFailed {
        turn_id: TurnId,
        notice: MessageView,
        reason: String,
    },
    /// Content was recorded in the saved set.
    MessageSaved { content: String },
    /// Writing a persisted key failed; the session continues in memory.
    PersistFailed { key: String, reason: String },
    /// No request is in flight; input may be re-enabled and focused.
    InputReady,
}

/// Sink for controller events.
pub trait EventSink: Send + Sync {
    /// Emit an event to downstream listeners.
    fn emit(&self, event: ChatEvent);
}
