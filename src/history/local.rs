//! File-backed history store.
//!
//! Layout mirrors the per-mode partitioning: one JSON document per mode
//! holding that mode's session list, plus one `messages-<id>.json` document
//! per session holding its turn log. Documents are small and rewritten whole;
//! any I/O or decode failure surfaces as a storage error.

use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::core::message::Turn;
use crate::core::session::{sort_sessions, ChatMode, Session};
use crate::error::ChatError;
use crate::history::HistoryStore;

pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    /// Opens (and creates if needed) the store rooted at `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, ChatError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|err| ChatError::Storage(format!("cannot create {}: {err}", dir.display())))?;
        Ok(Self { dir })
    }

    fn sessions_path(&self, mode: ChatMode) -> PathBuf {
        let name = match mode {
            ChatMode::Standard => "standard-sessions.json",
            ChatMode::MultiAgent => "multi-agent-sessions.json",
        };
        self.dir.join(name)
    }

    fn turns_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("messages-{session_id}.json"))
    }

    fn read_sessions(&self, mode: ChatMode) -> Result<Vec<Session>, ChatError> {
        read_json_or_default(&self.sessions_path(mode))
    }

    fn write_sessions(&self, mode: ChatMode, sessions: &[Session]) -> Result<(), ChatError> {
        write_json(&self.sessions_path(mode), sessions)
    }
}

fn read_json_or_default<T: serde::de::DeserializeOwned + Default>(
    path: &Path,
) -> Result<T, ChatError> {
    if !path.exists() {
        return Ok(T::default());
    }
    let contents = fs::read_to_string(path)
        .map_err(|err| ChatError::Storage(format!("cannot read {}: {err}", path.display())))?;
    serde_json::from_str(&contents)
        .map_err(|err| ChatError::Storage(format!("corrupt document {}: {err}", path.display())))
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ChatError> {
    let contents = serde_json::to_string(value)
        .map_err(|err| ChatError::Storage(format!("cannot encode {}: {err}", path.display())))?;
    fs::write(path, contents)
        .map_err(|err| ChatError::Storage(format!("cannot write {}: {err}", path.display())))
}

#[async_trait]
impl HistoryStore for FileHistoryStore {
    async fn list_sessions(&self, mode: ChatMode) -> Result<Vec<Session>, ChatError> {
        let mut sessions = self.read_sessions(mode)?;
        sort_sessions(&mut sessions);
        Ok(sessions)
    }

    async fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>, ChatError> {
        let path = self.turns_path(session_id);
        if !path.exists() {
            return Err(ChatError::NotFound(session_id.to_string()));
        }
        read_json_or_default(&path)
    }

    async fn create_session(
        &self,
        mode: ChatMode,
        title: Option<&str>,
    ) -> Result<Session, ChatError> {
        let mut sessions = self.read_sessions(mode)?;
        let session = Session::new(mode, title, sessions.len() + 1);
        sessions.insert(0, session.clone());
        self.write_sessions(mode, &sessions)?;
        write_json::<Vec<Turn>>(&self.turns_path(&session.id), &Vec::new())?;
        Ok(session)
    }

    async fn update_session(
        &self,
        session_id: &str,
        turns: &[Turn],
    ) -> Result<Session, ChatError> {
        // The caller passes no mode; look the id up in both collections.
        for mode in [ChatMode::Standard, ChatMode::MultiAgent] {
            let mut sessions = self.read_sessions(mode)?;
            if let Some(session) = sessions.iter_mut().find(|s| s.id == session_id) {
                session.absorb_turns(turns);
                let updated = session.clone();
                write_json(&self.turns_path(session_id), &turns)?;
                sort_sessions(&mut sessions);
                self.write_sessions(mode, &sessions)?;
                return Ok(updated);
            }
        }
        Err(ChatError::NotFound(session_id.to_string()))
    }

    async fn delete_session(&self, session_id: &str, mode: ChatMode) -> Result<bool, ChatError> {
        let mut sessions = self.read_sessions(mode)?;
        let before = sessions.len();
        sessions.retain(|session| session.id != session_id);
        let removed = sessions.len() != before;
        self.write_sessions(mode, &sessions)?;
        if removed {
            // Best effort; a leftover turn log is unreachable anyway.
            let _ = fs::remove_file(self.turns_path(session_id));
        }
        Ok(removed)
    }
}
