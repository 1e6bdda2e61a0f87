//! Failure taxonomy shared by the transport, the history stores, and the
//! orchestrator.
//!
//! Every failure an end user can observe maps to exactly one variant here, so
//! the orchestrator can turn it into a single human-readable system turn
//! without inspecting backend-specific error text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatError {
    /// The server answered with a non-success status code.
    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The request never reached the server (DNS, connect, TLS, ...).
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete within the configured bound.
    #[error("request timed out")]
    Timeout,

    /// The request was aborted on purpose. Never rendered as a failure.
    #[error("request cancelled")]
    Cancelled,

    /// A history store was asked about a session id it does not know.
    #[error("session not found: {0}")]
    NotFound(String),

    /// The backing store itself is unavailable or corrupt.
    #[error("storage error: {0}")]
    Storage(String),

    /// Another send cycle is already in flight on this conversation.
    #[error("another request is already in flight")]
    Busy,
}

impl ChatError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        ChatError::Api {
            status,
            message: message.into(),
        }
    }

    /// True for failures the user asked for, which must not surface as an
    /// error turn in the transcript.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, ChatError::Cancelled)
    }

    /// Human-readable description used for the synthetic system turn the
    /// orchestrator appends on failure. Status codes get distinct texts so
    /// the user can tell an auth problem from a rate limit.
    pub fn user_message(&self) -> String {
        match self {
            ChatError::Api { status, message } => match status {
                400 => format!("Bad request: {message}"),
                401 => "Authentication failed. Please sign in again.".to_string(),
                403 => "You do not have permission to access this resource.".to_string(),
                404 => "The requested resource was not found.".to_string(),
                429 => "Too many requests. Please try again later.".to_string(),
                500..=599 => "The server encountered an error. Please try again later.".to_string(),
                _ => format!("API call failed with status {status}: {message}"),
            },
            ChatError::Network(_) => {
                "Network error. Please check your connection and try again.".to_string()
            }
            ChatError::Timeout => "Request timed out. Please try again.".to_string(),
            ChatError::Cancelled => "Request was cancelled.".to_string(),
            ChatError::NotFound(id) => format!("Conversation {id} could not be found."),
            ChatError::Storage(_) => {
                "Conversation history is currently unavailable.".to_string()
            }
            ChatError::Busy => "A reply is still being generated. Please wait.".to_string(),
        }
    }
}

impl From<reqwest::Error> for ChatError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ChatError::Timeout
        } else if err.is_connect() || err.is_request() {
            ChatError::Network(err.to_string())
        } else if let Some(status) = err.status() {
            ChatError::api(status.as_u16(), err.to_string())
        } else {
            ChatError::Network(err.to_string())
        }
    }
}
