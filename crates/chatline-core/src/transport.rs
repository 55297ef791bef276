//! Transport seam between the controller and the chat endpoint.

use crate::error::ChatError;
use crate::ingest::ByteStream;
use async_trait::async_trait;
use chatline_config::ChatlineConfig;
use chatline_protocol::ChatRequest;
use futures_util::StreamExt;
use log::{debug, info, warn};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::Duration;

/// Issues a chat request and hands back the raw response body.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send `request`; resolves once a success status has been received.
    ///
    /// Non-success statuses and connection failures are errors. Read
    /// failures after this point surface through the returned stream.
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ChatError>;
}

/// HTTP transport posting JSON to the configured endpoint.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpTransport {
    /// Create a transport from the endpoint and `http` config section.
    pub fn from_config(config: &ChatlineConfig) -> Result<Self, ChatError> {
        let mut headers = HeaderMap::new();
        for (name, value) in &config.http.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| ChatError::Config(format!("header name {name}: {err}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| ChatError::Config(format!("header value for {name}: {err}")))?;
            headers.insert(name, value);
        }
        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(secs) = config.http.connect_timeout_secs {
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|err| ChatError::Config(err.to_string()))?;
        info!(
            "http transport ready (endpoint={}, headers={})",
            config.endpoint,
            config.http.headers.len()
        );
        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
        })
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn open(&self, request: &ChatRequest) -> Result<ByteStream, ChatError> {
        debug!(
            "posting chat request (endpoint={}, messages={})",
            self.endpoint,
            request.messages.len()
        );
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|err| ChatError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            warn!(
                "chat endpoint rejected request (endpoint={}, status={})",
                self.endpoint, status
            );
            return Err(ChatError::Status(status.as_u16()));
        }
        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|err| ChatError::Read(err.to_string()))
            })
            .boxed())
    }
}
