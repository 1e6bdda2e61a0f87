//! Exchange of turn logs with the chat backend.
//!
//! Implementations normalize the single-reply and multi-agent contracts behind
//! one trait so the orchestrator never cares which backend variant is
//! configured.

use async_trait::async_trait;

use crate::core::message::Turn;
use crate::core::session::ChatMode;
use crate::error::ChatError;

pub mod http;
pub mod mock;
pub mod sse;

pub use http::HttpChatTransport;
pub use mock::MockChatTransport;

/// How multi-agent replies are delivered by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
    /// One SSE event per agent reply.
    Stream,
    /// A single JSON array with all agent replies.
    Batch,
}

impl ResponseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseMode::Stream => "stream",
            ResponseMode::Batch => "batch",
        }
    }
}

impl TryFrom<&str> for ResponseMode {
    type Error = String;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "stream" => Ok(ResponseMode::Stream),
            "batch" => Ok(ResponseMode::Batch),
            _ => Err(format!("invalid response mode: {value}")),
        }
    }
}

/// Transport contract required by the send/receive cycle.
///
/// `send` exchanges the full ordered turn log for the completed reply
/// sequence: exactly one turn in standard mode, one per agent in multi-agent
/// mode, in the order the backend produced them. The transport neither
/// reorders nor deduplicates.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn send(&self, turns: &[Turn], mode: ChatMode) -> Result<Vec<Turn>, ChatError>;

    /// Aborts any in-flight `send`. The aborted call fails with
    /// [`ChatError::Cancelled`], never with a network or server error.
    fn cancel(&self);
}
