//! Configuration schema for chatline.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Default chat endpoint (a local `wrangler dev` worker).
pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8787/api/chat";
/// Greeting used when no transcript has been persisted yet.
pub const DEFAULT_GREETING: &str =
    "Hello! I'm an LLM chat app powered by Cloudflare Workers AI. How can I help you today?";
/// Notice shown in place of the assistant reply when a turn fails.
pub const DEFAULT_ERROR_NOTICE: &str = "Sorry, there was an error processing your request.";
/// Storage key for the persisted transcript.
pub const DEFAULT_HISTORY_KEY: &str = "chatHistory";
/// Storage key for the persisted saved-message set.
pub const DEFAULT_SAVED_KEY: &str = "savedMessages";

/// Root config for the chat client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatlineConfig {
    #[serde(default, rename = "$schema")]
    pub schema: Option<String>,
    /// Chat endpoint receiving `POST { messages }`.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// First-run assistant greeting.
    #[serde(default = "default_greeting")]
    pub greeting: String,
    /// Fixed notice displayed when a turn fails.
    #[serde(default = "default_error_notice")]
    pub error_notice: String,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Default for ChatlineConfig {
    fn default() -> Self {
        Self {
            schema: None,
            endpoint: default_endpoint(),
            greeting: default_greeting(),
            error_notice: default_error_notice(),
            storage: StorageConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl ChatlineConfig {
    /// Start building a config programmatically with defaults applied.
    pub fn builder() -> ChatlineConfigBuilder {
        ChatlineConfigBuilder::new()
    }
}

/// Builder for assembling a `ChatlineConfig` in code.
#[derive(Debug, Default, Clone)]
pub struct ChatlineConfigBuilder {
    config: ChatlineConfig,
}

impl ChatlineConfigBuilder {
    /// Create a new builder seeded with default config values.
    pub fn new() -> Self {
        Self {
            config: ChatlineConfig::default(),
        }
    }

    /// Replace the chat endpoint.
    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.endpoint = endpoint.into();
        self
    }

    /// Replace the HTTP transport configuration.
    pub fn http(mut self, http: HttpConfig) -> Self {
        self.config.http = http;
        self
    }

    /// Finalize and return the built `ChatlineConfig`.
    pub fn build(self) -> ChatlineConfig {
        self.config
    }
}

/// Client-side persistence settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Persist transcript and saved messages to disk.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Storage directory; defaults to the platform data directory.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default = "default_history_key")]
    pub history_key: String,
    #[serde(default = "default_saved_key")]
    pub saved_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: None,
            history_key: default_history_key(),
            saved_key: default_saved_key(),
        }
    }
}

/// Settings for the HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct HttpConfig {
    /// Connect timeout; the transport's own defaults apply when unset.
    #[serde(default)]
    pub connect_timeout_secs: Option<u64>,
    /// Extra headers sent with every chat request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_greeting() -> String {
    DEFAULT_GREETING.to_string()
}

fn default_error_notice() -> String {
    DEFAULT_ERROR_NOTICE.to_string()
}

fn default_history_key() -> String {
    DEFAULT_HISTORY_KEY.to_string()
}

fn default_saved_key() -> String {
    DEFAULT_SAVED_KEY.to_string()
}

fn default_true() -> bool {
    true
}
