//! One-shot mode: send a single prompt and stream the reply to stdout.

use anyhow::{Context, anyhow};
use chatline_core::{ChatController, ChatEvent, ChatTransport, EventSink, TurnOutcome};
use log::{debug, warn};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;

/// Event sink printing reply text as it streams in.
///
/// Only the new suffix of each placeholder update is written, so the
/// output is the reply itself. The failure notice goes to stderr.
pub struct PrintSink<W> {
    state: Mutex<PrintState<W>>,
}

struct PrintState<W> {
    out: W,
    printed: usize,
}

impl PrintSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> PrintSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            state: Mutex::new(PrintState { out, printed: 0 }),
        }
    }

    /// Inspect the underlying writer.
    pub fn with_output<R>(&self, f: impl FnOnce(&W) -> R) -> R {
        f(&self.state.lock().out)
    }
}

impl<W: Write> PrintState<W> {
    fn write_suffix(&mut self, text: &str) {
        let suffix = text.get(self.printed..).unwrap_or_default();
        if suffix.is_empty() {
            return;
        }
        if let Err(err) = self
            .out
            .write_all(suffix.as_bytes())
            .and_then(|()| self.out.flush())
        {
            debug!("failed to write reply text (err={})", err);
        }
        self.printed = text.len();
    }

    fn end_line(&mut self) {
        if let Err(err) = writeln!(self.out).and_then(|()| self.out.flush()) {
            debug!("failed to write reply text (err={})", err);
        }
    }
}

impl<W: Write + Send> EventSink for PrintSink<W> {
    fn emit(&self, event: ChatEvent) {
        let mut state = self.state.lock();
        match event {
            ChatEvent::AssistantStarted { .. } => state.printed = 0,
            ChatEvent::AssistantText { text, .. } => state.write_suffix(&text),
            ChatEvent::TurnCompleted { message, .. } => {
                state.write_suffix(&message.content);
                state.end_line();
            }
            ChatEvent::TurnFailed { notice, .. } => {
                if state.printed > 0 {
                    state.end_line();
                }
                eprintln!("{}", notice.content);
            }
            ChatEvent::PersistFailed { key, reason } => {
                warn!("history not persisted (key={}, err={})", key, reason);
            }
            _ => {}
        }
    }
}

/// Send `prompt` through `controller` and wait for the reply.
///
/// # Errors
/// Returns an error when the prompt is rejected or the turn fails.
pub async fn run_prompt(
    controller: &mut ChatController,
    transport: Arc<dyn ChatTransport>,
    prompt: &str,
) -> anyhow::Result<()> {
    match controller.send(prompt, transport).await {
        Ok(TurnOutcome::Completed(message)) => {
            debug!("prompt completed (reply_len={})", message.content.len());
            Ok(())
        }
        Ok(TurnOutcome::Failed(err)) => Err(err).context("chat request failed"),
        Err(rejected) => Err(anyhow!("prompt not sent: {rejected}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatline_core::{ControllerSettings, MemoryStore, SessionStore};
    use chatline_test_utils::{FailingTransport, ScriptedTransport};
    use pretty_assertions::assert_eq;

    fn controller(sink: Arc<PrintSink<Vec<u8>>>) -> ChatController {
        let store = SessionStore::with_keys(Arc::new(MemoryStore::new()), "h", "s");
        ChatController::new(store, sink, ControllerSettings::default())
    }

    #[tokio::test]
    async fn prints_reply_once_as_it_streams() {
        let sink = Arc::new(PrintSink::new(Vec::new()));
        let mut controller = controller(sink.clone());
        let transport = Arc::new(ScriptedTransport::new([
            "{\"response\":\"Hi\"}\n{\"resp",
            "onse\":\" there\"}\n",
        ]));

        run_prompt(&mut controller, transport, "Hello")
            .await
            .expect("prompt");

        let output = sink.with_output(|out| String::from_utf8_lossy(out).into_owned());
        assert_eq!(output, "Hi there\n");
    }

    #[tokio::test]
    async fn failed_turn_is_an_error() {
        let sink = Arc::new(PrintSink::new(Vec::new()));
        let mut controller = controller(sink.clone());

        let err = run_prompt(&mut controller, Arc::new(FailingTransport::new(502)), "Hello")
            .await
            .unwrap_err();

        assert!(format!("{err:#}").contains("502"));
        assert!(sink.with_output(Vec::is_empty));
    }

    #[tokio::test]
    async fn empty_prompt_is_rejected() {
        let sink = Arc::new(PrintSink::new(Vec::new()));
        let mut controller = controller(sink);
        let transport = Arc::new(ScriptedTransport::new(Vec::<Vec<u8>>::new()));
        let err = run_prompt(&mut controller, transport.clone(), "  ")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("empty"));
        assert!(transport.requests().is_empty());
    }
}
