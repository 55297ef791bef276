//! Error types for the chat core crate.

use thiserror::Error;

/// Errors that end a turn: transport failures and stream read failures.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The request could not be sent or the connection failed.
    #[error("request failed: {0}")]
    Request(String),
    /// The endpoint answered with a non-success status.
    #[error("endpoint returned status {0}")]
    Status(u16),
    /// Reading the response body failed mid-stream.
    #[error("stream read failed: {0}")]
    Read(String),
    /// Transport configuration was rejected.
    #[error("invalid transport config: {0}")]
    Config(String),
}

/// Errors returned by the persistence adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// Stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// Key cannot be used as a storage name.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    /// No storage directory could be resolved.
    #[error("storage directory unavailable")]
    NoDataDir,
}

/// Reasons a submission is refused without any observable effect.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum SubmitRejected {
    /// Input was empty after trimming.
    #[error("message is empty")]
    EmptyInput,
    /// Another request is still in flight.
    #[error("a request is already in flight")]
    Busy,
}
