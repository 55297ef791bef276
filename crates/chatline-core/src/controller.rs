//! Conversation controller.
//!
//! Owns the transcript and saved set, drives a turn from submission through
//! streaming to finalization, and reports every visible change to an
//! [`EventSink`]. A single turn may be in flight at a time.

use crate::error::{ChatError, SubmitRejected};
use crate::ingest::{FragmentStream, fragments};
use crate::render::{activate_save, render_message, render_notice, render_transcript};
use crate::saved::SavedSet;
use crate::store::SessionStore;
use crate::transport::ChatTransport;
use chatline_config::{ChatlineConfig, DEFAULT_ERROR_NOTICE, DEFAULT_GREETING};
use chatline_protocol::{ChatEvent, ChatRequest, EventSink, Message, MessageView, Role, TurnId};
use futures_util::stream::{self, BoxStream, StreamExt};
use log::{debug, info, warn};
use std::sync::Arc;

/// Lifecycle of the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// No request in flight.
    Idle,
    /// User message recorded; waiting for response headers.
    Sending,
    /// Response accepted; fragments are arriving.
    Streaming,
    /// Body exhausted; the reply is being committed.
    Finalizing,
}

/// Progress of an issued request, applied in order by the controller.
#[derive(Debug)]
pub enum TurnUpdate {
    /// The endpoint answered with a success status.
    Accepted,
    /// Next text fragment of the reply.
    Fragment(String),
    /// The body ended normally.
    Completed,
    /// The request or the body read failed.
    Failed(ChatError),
}

/// How a finished turn ended.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The reply was appended to the transcript.
    Completed(Message),
    /// The turn failed; the transcript holds only the user message.
    Failed(ChatError),
}

/// Display strings used by the controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerSettings {
    /// Transcript used when nothing is persisted.
    pub greeting: String,
    /// Notice shown in place of a failed reply.
    pub error_notice: String,
}

impl Default for ControllerSettings {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            error_notice: DEFAULT_ERROR_NOTICE.to_string(),
        }
    }
}

impl From<&ChatlineConfig> for ControllerSettings {
    fn from(config: &ChatlineConfig) -> Self {
        Self {
            greeting: config.greeting.clone(),
            error_notice: config.error_notice.clone(),
        }
    }
}

/// Stateful owner of a single chat session.
pub struct ChatController {
    transcript: Vec<Message>,
    saved: SavedSet,
    store: SessionStore,
    sink: Arc<dyn EventSink>,
    settings: ControllerSettings,
    phase: TurnPhase,
    accumulator: String,
    last_turn: TurnId,
    active_turn: Option<TurnId>,
}

impl ChatController {
    /// Create a controller hydrated from `store`.
    ///
    /// Falls back to the greeting when no transcript is stored or it fails
    /// to decode; the fallback is not written until the first mutation.
    pub fn new(
        store: SessionStore,
        sink: Arc<dyn EventSink>,
        settings: ControllerSettings,
    ) -> Self {
        let transcript = store
            .load_transcript()
            .unwrap_or_else(|| vec![Message::assistant(settings.greeting.clone())]);
        let saved = store.load_saved();
        info!(
            "chat controller ready (messages={}, saved={})",
            transcript.len(),
            saved.len()
        );
        Self {
            transcript,
            saved,
            store,
            sink,
            settings,
            phase: TurnPhase::Idle,
            accumulator: String::new(),
            last_turn: 0,
            active_turn: None,
        }
    }

    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    pub fn saved(&self) -> &SavedSet {
        &self.saved
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    /// True while a request is in flight.
    pub fn is_busy(&self) -> bool {
        self.phase != TurnPhase::Idle
    }

    /// Turn currently in flight, if any.
    pub fn active_turn(&self) -> Option<TurnId> {
        self.active_turn
    }

    /// Reply text accumulated so far for the active turn.
    pub fn accumulated(&self) -> &str {
        &self.accumulator
    }

    /// Render the current transcript with saved state applied.
    pub fn views(&self) -> Vec<MessageView> {
        render_transcript(&self.transcript, &self.saved)
    }

    /// Record a submission and build the request for it.
    ///
    /// Rejections leave every piece of state untouched.
    pub fn begin_turn(&mut self, input: &str) -> Result<ChatRequest, SubmitRejected> {
        if self.is_busy() {
            debug!("submission rejected while busy (phase={:?})", self.phase);
            return Err(SubmitRejected::Busy);
        }
        let content = input.trim();
        if content.is_empty() {
            return Err(SubmitRejected::EmptyInput);
        }

        self.phase = TurnPhase::Sending;
        self.accumulator.clear();
        self.last_turn += 1;
        let turn_id = self.last_turn;
        self.active_turn = Some(turn_id);

        self.transcript.push(Message::user(content));
        self.sink.emit(ChatEvent::MessageAppended {
            view: render_message(Role::User, content, &self.saved),
        });
        self.persist_transcript();
        self.sink.emit(ChatEvent::AssistantStarted { turn_id });
        info!(
            "turn started (turn_id={}, messages={})",
            turn_id,
            self.transcript.len()
        );
        Ok(ChatRequest {
            messages: self.transcript.clone(),
        })
    }

    /// Apply one update of the active turn.
    ///
    /// Returns the outcome once the turn has ended. Updates arriving with
    /// no turn in flight are ignored.
    pub fn apply_update(&mut self, update: TurnUpdate) -> Option<TurnOutcome> {
        let Some(turn_id) = self.active_turn else {
            debug!("ignoring update with no active turn");
            return None;
        };
        match update {
            TurnUpdate::Accepted => {
                if self.phase == TurnPhase::Sending {
                    self.phase = TurnPhase::Streaming;
                }
                None
            }
            TurnUpdate::Fragment(text) => {
                self.phase = TurnPhase::Streaming;
                self.accumulator.push_str(&text);
                self.sink.emit(ChatEvent::AssistantText {
                    turn_id,
                    text: self.accumulator.clone(),
                });
                None
            }
            TurnUpdate::Completed => Some(self.complete(turn_id)),
            TurnUpdate::Failed(err) => Some(self.fail(turn_id, err)),
        }
    }

    /// Submit `input` and drive the whole turn over `transport`.
    pub async fn send(
        &mut self,
        input: &str,
        transport: Arc<dyn ChatTransport>,
    ) -> Result<TurnOutcome, SubmitRejected> {
        let request = self.begin_turn(input)?;
        let mut updates = turn_updates(transport, request);
        while let Some(update) = updates.next().await {
            if let Some(outcome) = self.apply_update(update) {
                return Ok(outcome);
            }
        }
        // The update stream always ends with Completed or Failed.
        Ok(self.fail(
            self.last_turn,
            ChatError::Read("update stream ended early".to_string()),
        ))
    }

    /// Activate the save action on a rendered message.
    ///
    /// Returns true when the view flipped to saved.
    pub fn save(&mut self, view: &mut MessageView) -> bool {
        if !activate_save(view, &mut self.saved) {
            return false;
        }
        debug!(
            "message saved (len={}, saved={})",
            view.content.len(),
            self.saved.len()
        );
        self.sink.emit(ChatEvent::MessageSaved {
            content: view.content.clone(),
        });
        if let Err(err) = self.store.save_saved(&self.saved) {
            self.persist_failed(self.store.saved_key().to_string(), err.to_string());
        }
        true
    }

    fn complete(&mut self, turn_id: TurnId) -> TurnOutcome {
        self.phase = TurnPhase::Finalizing;
        let content = std::mem::take(&mut self.accumulator);
        let message = Message::assistant(content);
        self.transcript.push(message.clone());
        let view = render_message(Role::Assistant, &message.content, &self.saved);
        self.sink.emit(ChatEvent::TurnCompleted {
            turn_id,
            message: message.clone(),
            view,
        });
        self.persist_transcript();
        info!(
            "turn completed (turn_id={}, reply_len={})",
            turn_id,
            message.content.len()
        );
        self.finish_turn();
        TurnOutcome::Completed(message)
    }

    fn fail(&mut self, turn_id: TurnId, err: ChatError) -> TurnOutcome {
        warn!("turn failed (turn_id={}, err={})", turn_id, err);
        self.accumulator.clear();
        self.sink.emit(ChatEvent::TurnFailed {
            turn_id,
            notice: render_notice(&self.settings.error_notice),
            reason: err.to_string(),
        });
        self.finish_turn();
        TurnOutcome::Failed(err)
    }

    fn finish_turn(&mut self) {
        self.phase = TurnPhase::Idle;
        self.active_turn = None;
        self.sink.emit(ChatEvent::InputReady);
    }

    fn persist_transcript(&self) {
        if let Err(err) = self.store.save_transcript(&self.transcript) {
            self.persist_failed(self.store.history_key().to_string(), err.to_string());
        }
    }

    fn persist_failed(&self, key: String, reason: String) {
        warn!("persistence failed (key={}, err={})", key, reason);
        self.sink.emit(ChatEvent::PersistFailed { key, reason });
    }
}

enum TurnStage {
    Pending(Arc<dyn ChatTransport>, ChatRequest),
    Streaming(FragmentStream),
    Done,
}

/// Issue `request` and report its progress as an ordered update stream.
///
/// The stream yields `Accepted` then any fragments, and always ends with a
/// single `Completed` or `Failed`.
pub fn turn_updates(
    transport: Arc<dyn ChatTransport>,
    request: ChatRequest,
) -> BoxStream<'static, TurnUpdate> {
    stream::unfold(
        TurnStage::Pending(transport, request),
        |stage| async move {
            match stage {
                TurnStage::Pending(transport, request) => match transport.open(&request).await {
                    Ok(body) => Some((TurnUpdate::Accepted, TurnStage::Streaming(fragments(body)))),
                    Err(err) => Some((TurnUpdate::Failed(err), TurnStage::Done)),
                },
                TurnStage::Streaming(mut body) => match body.next().await {
                    Some(Ok(text)) => Some((TurnUpdate::Fragment(text), TurnStage::Streaming(body))),
                    Some(Err(err)) => Some((TurnUpdate::Failed(err), TurnStage::Done)),
                    None => Some((TurnUpdate::Completed, TurnStage::Done)),
                },
                TurnStage::Done => None,
            }
        },
    )
    .boxed()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chatline_protocol::{Author, SaveState};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;

    #[derive(Default)]
    struct Events(Mutex<Vec<ChatEvent>>);

    impl EventSink for Events {
        fn emit(&self, event: ChatEvent) {
            self.0.lock().push(event);
        }
    }

    fn controller() -> (ChatController, Arc<Events>) {
        let events = Arc::new(Events::default());
        let store = SessionStore::with_keys(Arc::new(MemoryStore::new()), "h", "s");
        let controller =
            ChatController::new(store, events.clone(), ControllerSettings::default());
        (controller, events)
    }

    #[test]
    fn starts_from_greeting_when_nothing_is_stored() {
        let (controller, _) = controller();
        assert_eq!(
            controller.transcript(),
            &[Message::assistant(DEFAULT_GREETING)]
        );
        assert_eq!(controller.views()[0].save, Some(SaveState::Unsaved));
    }

    #[test]
    fn phases_follow_the_turn() {
        let (mut controller, events) = controller();
        controller.begin_turn("Hello").expect("begin");
        assert_eq!(controller.phase(), TurnPhase::Sending);
        assert_eq!(controller.active_turn(), Some(1));
        assert!(controller.apply_update(TurnUpdate::Accepted).is_none());
        assert_eq!(controller.phase(), TurnPhase::Streaming);
        controller.apply_update(TurnUpdate::Fragment("Hi".to_string()));
        controller.apply_update(TurnUpdate::Fragment(" there".to_string()));
        assert_eq!(controller.accumulated(), "Hi there");

        let outcome = controller.apply_update(TurnUpdate::Completed);
        assert!(matches!(outcome, Some(TurnOutcome::Completed(ref m)) if m.content == "Hi there"));
        assert_eq!(controller.phase(), TurnPhase::Idle);
        assert_eq!(controller.active_turn(), None);

        let texts: Vec<String> = events
            .0
            .lock()
            .iter()
            .filter_map(|event| match event {
                ChatEvent::AssistantText { text, .. } => Some(text.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(texts, vec!["Hi", "Hi there"]);
        assert_eq!(events.0.lock().last(), Some(&ChatEvent::InputReady));
    }

    #[test]
    fn rejections_have_no_effect() {
        let (mut controller, events) = controller();
        assert_eq!(
            controller.begin_turn("   \n").unwrap_err(),
            SubmitRejected::EmptyInput
        );
        assert!(events.0.lock().is_empty());

        controller.begin_turn("first").expect("begin");
        let len = controller.transcript().len();
        let emitted = events.0.lock().len();
        assert_eq!(
            controller.begin_turn("second").unwrap_err(),
            SubmitRejected::Busy
        );
        assert_eq!(controller.transcript().len(), len);
        assert_eq!(events.0.lock().len(), emitted);
    }

    #[test]
    fn failure_replaces_placeholder_with_notice() {
        let (mut controller, events) = controller();
        controller.begin_turn("Hello").expect("begin");
        controller.apply_update(TurnUpdate::Fragment("partial".to_string()));
        let outcome = controller.apply_update(TurnUpdate::Failed(ChatError::Status(500)));
        assert!(matches!(outcome, Some(TurnOutcome::Failed(ChatError::Status(500)))));
        assert_eq!(controller.transcript().last(), Some(&Message::user("Hello")));
        assert_eq!(controller.accumulated(), "");

        let events = events.0.lock();
        let notice = events.iter().find_map(|event| match event {
            ChatEvent::TurnFailed { notice, .. } => Some(notice.clone()),
            _ => None,
        });
        assert_eq!(
            notice,
            Some(MessageView {
                author: Author::Notice,
                content: DEFAULT_ERROR_NOTICE.to_string(),
                save: None,
            })
        );
    }

    #[test]
    fn updates_without_active_turn_are_ignored() {
        let (mut controller, events) = controller();
        assert!(controller.apply_update(TurnUpdate::Completed).is_none());
        assert!(controller
            .apply_update(TurnUpdate::Fragment("stray".to_string()))
            .is_none());
        assert_eq!(controller.transcript().len(), 1);
        assert!(events.0.lock().is_empty());
    }
}
