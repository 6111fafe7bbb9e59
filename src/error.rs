//! Error types for the streaming-chat library.

use serde_json::Value;
use thiserror::Error;

/// Message carried by every [`ChatError::Provider`] raised from `send_message`.
pub const SEND_MESSAGE_FAILED: &str = "Failed to send message";

/// Unified error type for the chat client.
#[derive(Debug, Error)]
pub enum ChatError {
    /// No service profile is registered under the requested name
    #[error("Unknown service: {0}")]
    UnknownService(String),

    /// The provider answered with a non-success status
    #[error("{message} (status {status}): {cause}")]
    Provider {
        /// Fixed, human readable summary
        message: String,
        /// HTTP status returned by the provider
        status: u16,
        /// Decoded error body, or the raw body text when it was not JSON
        cause: Value,
    },

    /// The transport succeeded but the body lacks the expected fields
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// The key validation endpoint rejected the API key
    #[error("Invalid API key")]
    InvalidApiKey,

    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,

    /// The request was rejected before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Client configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network or HTTP status error from the transport
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error while reading a response stream
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The progress callback failed and stream consumption was aborted
    #[error("Progress callback failed: {0}")]
    Progress(#[source] anyhow::Error),
}

impl ChatError {
    /// Builds the error raised when `send_message` receives a failed response.
    pub fn provider(status: u16, cause: Value) -> Self {
        Self::Provider {
            message: SEND_MESSAGE_FAILED.to_string(),
            status,
            cause,
        }
    }
}

/// Convenience result alias used across the crate.
pub type Result<T> = std::result::Result<T, ChatError>;
