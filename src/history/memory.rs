//! In-memory history store. Doubles as the mock backend; optionally seeded
//! with sample conversations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::message::Turn;
use crate::core::session::{sort_sessions, ChatMode, Session};
use crate::error::ChatError;
use crate::history::HistoryStore;

#[derive(Default)]
struct Inner {
    standard: Vec<Session>,
    multi_agent: Vec<Session>,
    turns: HashMap<String, Vec<Turn>>,
}

impl Inner {
    fn collection_mut(&mut self, mode: ChatMode) -> &mut Vec<Session> {
        match mode {
            ChatMode::Standard => &mut self.standard,
            ChatMode::MultiAgent => &mut self.multi_agent,
        }
    }

    fn collection(&self, mode: ChatMode) -> &Vec<Session> {
        match mode {
            ChatMode::Standard => &self.standard,
            ChatMode::MultiAgent => &self.multi_agent,
        }
    }

    fn find_mut(&mut self, session_id: &str) -> Option<&mut Session> {
        self.standard
            .iter_mut()
            .chain(self.multi_agent.iter_mut())
            .find(|session| session.id == session_id)
    }
}

#[derive(Default)]
pub struct MemoryHistoryStore {
    inner: Mutex<Inner>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store pre-populated with a sample conversation per mode, so a fresh
    /// install has something to show.
    pub fn with_sample_data() -> Self {
        let store = Self::new();
        {
            let mut inner = store.inner.lock().unwrap_or_else(|p| p.into_inner());
            for (mode, title, opener, reply) in [
                (
                    ChatMode::Standard,
                    "Welcome chat",
                    "What can you do?",
                    "I can answer questions and help you explore ideas.",
                ),
                (
                    ChatMode::MultiAgent,
                    "Multi-agent demo",
                    "Show me how agents collaborate.",
                    "Each agent contributes its own reply to the conversation.",
                ),
            ] {
                let mut session = Session::new(mode, Some(title), 1);
                let turns = vec![Turn::user(opener), Turn::assistant(reply)];
                session.absorb_turns(&turns);
                inner.turns.insert(session.id.clone(), turns);
                inner.collection_mut(mode).push(session);
            }
        }
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn list_sessions(&self, mode: ChatMode) -> Result<Vec<Session>, ChatError> {
        Ok(self.lock().collection(mode).clone())
    }

    async fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>, ChatError> {
        self.lock()
            .turns
            .get(session_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(session_id.to_string()))
    }

    async fn create_session(
        &self,
        mode: ChatMode,
        title: Option<&str>,
    ) -> Result<Session, ChatError> {
        let mut inner = self.lock();
        let collection = inner.collection_mut(mode);
        let session = Session::new(mode, title, collection.len() + 1);
        collection.insert(0, session.clone());
        inner.turns.insert(session.id.clone(), Vec::new());
        Ok(session)
    }

    async fn update_session(
        &self,
        session_id: &str,
        turns: &[Turn],
    ) -> Result<Session, ChatError> {
        let mut inner = self.lock();
        let updated = {
            let session = inner
                .find_mut(session_id)
                .ok_or_else(|| ChatError::NotFound(session_id.to_string()))?;
            session.absorb_turns(turns);
            session.clone()
        };
        inner.turns.insert(session_id.to_string(), turns.to_vec());
        sort_sessions(inner.collection_mut(updated.mode));
        Ok(updated)
    }

    async fn delete_session(&self, session_id: &str, mode: ChatMode) -> Result<bool, ChatError> {
        let mut inner = self.lock();
        let collection = inner.collection_mut(mode);
        let before = collection.len();
        collection.retain(|session| session.id != session_id);
        let removed = collection.len() != before;
        if removed {
            inner.turns.remove(session_id);
        }
        Ok(removed)
    }
}
