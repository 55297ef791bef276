use async_trait::async_trait;
use chatline_core::{ByteStream, ChatError, ChatTransport};
use chatline_protocol::ChatRequest;
use futures_util::{StreamExt, stream};
use parking_lot::Mutex;
use std::sync::Arc;

/// Transport that replays a fixed list of body chunks and records requests.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    chunks: Vec<Vec<u8>>,
    read_error_after: Option<usize>,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl ScriptedTransport {
    pub fn new<I, C>(chunks: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: AsRef<[u8]>,
    {
        Self {
            chunks: chunks
                .into_iter()
                .map(|chunk| chunk.as_ref().to_vec())
                .collect(),
            read_error_after: None,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Fail the body read after `count` chunks have been delivered.
    pub fn with_read_error_after(mut self, count: usize) -> Self {
        self.read_error_after = Some(count);
        self
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for ScriptedTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        self.requests.lock().push(request.clone());
        let mut items: Vec<Result<Vec<u8>, ChatError>> =
            self.chunks.iter().cloned().map(Ok).collect();
        if let Some(count) = self.read_error_after {
            items.truncate(count);
            items.push(Err(ChatError::Read("scripted read failure".to_string())));
        }
        Ok(stream::iter(items).boxed())
    }
}

/// Transport whose requests always fail with a status error.
#[derive(Debug, Clone, Default)]
pub struct FailingTransport {
    status: u16,
    requests: Arc<Mutex<Vec<ChatRequest>>>,
}

impl FailingTransport {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ChatTransport for FailingTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        self.requests.lock().push(request.clone());
        Err(ChatError::Status(self.status))
    }
}
