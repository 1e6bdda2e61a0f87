//! Durable mapping from session ids to metadata and turn logs, partitioned by
//! mode.
//!
//! Three backings share one contract: an in-memory store (also the mock
//! backend), a file-backed store, and a REST client. The orchestrator never
//! learns which one it is talking to; backing-store failures propagate as
//! [`ChatError::Storage`](crate::error::ChatError::Storage) or
//! [`ChatError::Network`](crate::error::ChatError::Network) without local
//! recovery.

use async_trait::async_trait;

use crate::core::message::Turn;
use crate::core::session::{ChatMode, Session};
use crate::error::ChatError;

pub mod local;
pub mod memory;
pub mod remote;

pub use local::FileHistoryStore;
pub use memory::MemoryHistoryStore;
pub use remote::RestHistoryStore;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Sessions of one mode, most-recently-updated first. An empty collection
    /// is an empty vector, never an error.
    async fn list_sessions(&self, mode: ChatMode) -> Result<Vec<Session>, ChatError>;

    /// The full ordered turn log of a session. Unknown ids fail with
    /// [`ChatError::NotFound`](crate::error::ChatError::NotFound); callers
    /// must not assume ids carry across differently-configured backings.
    async fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>, ChatError>;

    /// Allocates a session with a fresh id at the head of the mode's
    /// collection. The title falls back to a generated placeholder.
    async fn create_session(
        &self,
        mode: ChatMode,
        title: Option<&str>,
    ) -> Result<Session, ChatError>;

    /// Persists a session's turn log and refreshes its preview, count and
    /// timestamp. Fails fast with `NotFound` when the id is unknown to either
    /// mode's collection.
    async fn update_session(&self, session_id: &str, turns: &[Turn])
        -> Result<Session, ChatError>;

    /// Removes a session. Returns whether a record was actually deleted;
    /// missing ids are `false`, not an error.
    async fn delete_session(&self, session_id: &str, mode: ChatMode) -> Result<bool, ChatError>;
}
