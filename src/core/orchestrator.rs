//! The conversation orchestrator: the single writer to conversation state.
//!
//! It owns the active session id, the mode, the pending flag and the
//! transcript, and drives the send → receive → persist cycle against the
//! transport and the history store. Mutual exclusion needs no lock: the
//! pending flag rejects a second send cycle, so reply ordering within a
//! session is total by construction.

use std::sync::Arc;

use crate::core::factory::Services;
use crate::core::message::Turn;
use crate::core::session::{ChatMode, Session};
use crate::core::transcript::TranscriptLog;
use crate::error::ChatError;
use crate::history::HistoryStore;
use crate::transport::ChatTransport;

/// How a send cycle settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Replies were appended; persistence was attempted.
    Sent { replies: usize },
    /// Rejected: another send cycle is still pending.
    Busy,
    /// Aborted by the user; the transcript is as if the send never happened.
    Cancelled,
    /// The cycle failed; one system turn describes the failure.
    Failed,
}

/// Cheap cloneable handle for aborting an in-flight send from outside the
/// orchestrator's exclusive borrow (e.g. a UI event handler).
#[derive(Clone)]
pub struct CancelHandle {
    transport: Arc<dyn ChatTransport>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.transport.cancel();
    }
}

pub struct Orchestrator {
    transport: Arc<dyn ChatTransport>,
    history: Arc<dyn HistoryStore>,
    transcript: TranscriptLog,
    sessions: Vec<Session>,
    active_session_id: Option<String>,
    mode: ChatMode,
    pending: bool,
}

impl Orchestrator {
    pub fn new(transport: Arc<dyn ChatTransport>, history: Arc<dyn HistoryStore>) -> Self {
        Self {
            transport,
            history,
            transcript: TranscriptLog::new(),
            sessions: Vec::new(),
            active_session_id: None,
            mode: ChatMode::Standard,
            pending: false,
        }
    }

    pub fn from_services(services: Services) -> Self {
        Self::new(services.transport, services.history)
    }

    pub fn transcript(&self) -> &TranscriptLog {
        &self.transcript
    }

    pub fn sessions(&self) -> &[Session] {
        &self.sessions
    }

    pub fn active_session_id(&self) -> Option<&str> {
        self.active_session_id.as_deref()
    }

    pub fn mode(&self) -> ChatMode {
        self.mode
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            transport: Arc::clone(&self.transport),
        }
    }

    /// Reloads the cached session list for the current mode.
    pub async fn refresh_sessions(&mut self) -> Result<&[Session], ChatError> {
        self.sessions = self.history.list_sessions(self.mode).await?;
        Ok(&self.sessions)
    }

    /// Runs one full send cycle: lazily create a session, append the user
    /// turn optimistically, exchange the log for replies, persist, refresh
    /// the session list. Exactly one cycle may be in flight.
    pub async fn send_message(&mut self, content: &str) -> SendOutcome {
        if self.pending {
            return SendOutcome::Busy;
        }

        if self.active_session_id.is_none() {
            match self.history.create_session(self.mode, None).await {
                Ok(session) => {
                    self.active_session_id = Some(session.id.clone());
                    self.transcript.clear();
                    self.sessions.insert(0, session);
                }
                Err(err) => {
                    tracing::error!(error = %err, "failed to create session");
                    self.transcript.append(Turn::system(err.user_message()));
                    return SendOutcome::Failed;
                }
            }
        }

        self.transcript.append_provisional(Turn::user(content));
        self.pending = true;
        let result = self
            .transport
            .send(self.transcript.turns(), self.mode)
            .await;
        self.pending = false;

        match result {
            Ok(replies) => {
                self.transcript.commit_provisional();
                let count = replies.len();
                for reply in replies {
                    self.transcript.append(reply);
                }
                self.persist_active_session().await;
                SendOutcome::Sent { replies: count }
            }
            Err(err) if err.is_cancellation() => {
                // User-initiated abort: suppress any visible trace of the
                // attempt instead of rendering it as a failure.
                self.transcript.roll_back_provisional();
                SendOutcome::Cancelled
            }
            Err(err) => {
                tracing::error!(error = %err, mode = %self.mode, "send cycle failed");
                self.transcript.commit_provisional();
                self.transcript.append(Turn::system(err.user_message()));
                SendOutcome::Failed
            }
        }
    }

    /// Write-then-read-back after a successful reply cycle. A failed write
    /// keeps the in-memory turns visible; they simply are not durable until
    /// a later cycle succeeds.
    async fn persist_active_session(&mut self) {
        let Some(session_id) = self.active_session_id.clone() else {
            return;
        };
        if let Err(err) = self
            .history
            .update_session(&session_id, self.transcript.turns())
            .await
        {
            tracing::error!(error = %err, session = %session_id, "failed to persist turns");
            return;
        }
        match self.history.list_sessions(self.mode).await {
            Ok(sessions) => self.sessions = sessions,
            Err(err) => {
                tracing::warn!(error = %err, "failed to refresh session list")
            }
        }
    }

    /// Binds a session and loads its turn log. Selecting the already-active
    /// session is a no-op.
    pub async fn select_session(&mut self, session_id: &str) -> Result<(), ChatError> {
        if self.pending {
            return Err(ChatError::Busy);
        }
        if self.active_session_id.as_deref() == Some(session_id) {
            return Ok(());
        }
        let turns = self.history.load_turns(session_id).await?;
        self.transcript.replace_all(turns);
        self.active_session_id = Some(session_id.to_string());
        Ok(())
    }

    /// Deletes a session. When the active session goes away, the most
    /// recently updated remaining session takes over; with none left the
    /// conversation returns to idle.
    pub async fn delete_session(&mut self, session_id: &str) -> Result<(), ChatError> {
        if self.pending {
            return Err(ChatError::Busy);
        }
        self.history.delete_session(session_id, self.mode).await?;
        self.sessions.retain(|session| session.id != session_id);

        if self.active_session_id.as_deref() == Some(session_id) {
            self.active_session_id = None;
            self.transcript.clear();
            if let Some(next_id) = self.sessions.first().map(|s| s.id.clone()) {
                self.select_session(&next_id).await?;
            }
        }
        Ok(())
    }

    /// Switches conversation type. Sessions are partitioned by mode, so the
    /// active session, transcript and cached list are all dropped; the list
    /// is reloaded lazily via [`refresh_sessions`](Self::refresh_sessions).
    pub fn set_mode(&mut self, mode: ChatMode) {
        self.mode = mode;
        self.active_session_id = None;
        self.transcript.clear();
        self.sessions.clear();
    }

    /// Starts over without deleting anything persisted. The next send lazily
    /// creates a fresh session.
    pub fn new_conversation(&mut self) {
        self.active_session_id = None;
        self.transcript.clear();
    }

    /// Aborts the in-flight send, if any. The pending cycle observes the
    /// cancellation and settles as [`SendOutcome::Cancelled`].
    pub fn cancel(&self) {
        if self.pending {
            self.transport.cancel();
        }
    }

    #[cfg(test)]
    fn force_pending_for_test(&mut self) {
        self.pending = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::core::message::Role;
    use crate::history::MemoryHistoryStore;
    use crate::transport::MockChatTransport;

    /// Transport double that settles each send with the next scripted result.
    struct ScriptedTransport {
        script: Mutex<VecDeque<Result<Vec<Turn>, ChatError>>>,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Result<Vec<Turn>, ChatError>>) -> Arc<Self> {
            Arc::new(Self {
                script: Mutex::new(script.into()),
            })
        }
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, _turns: &[Turn], _mode: ChatMode) -> Result<Vec<Turn>, ChatError> {
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .expect("transport called more times than scripted")
        }

        fn cancel(&self) {}
    }

    /// History store wrapper that counts update calls.
    struct RecordingStore {
        inner: MemoryHistoryStore,
        updates: AtomicUsize,
    }

    impl RecordingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryHistoryStore::new(),
                updates: AtomicUsize::new(0),
            })
        }

        fn update_count(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HistoryStore for RecordingStore {
        async fn list_sessions(&self, mode: ChatMode) -> Result<Vec<Session>, ChatError> {
            self.inner.list_sessions(mode).await
        }

        async fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>, ChatError> {
            self.inner.load_turns(session_id).await
        }

        async fn create_session(
            &self,
            mode: ChatMode,
            title: Option<&str>,
        ) -> Result<Session, ChatError> {
            self.inner.create_session(mode, title).await
        }

        async fn update_session(
            &self,
            session_id: &str,
            turns: &[Turn],
        ) -> Result<Session, ChatError> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.inner.update_session(session_id, turns).await
        }

        async fn delete_session(
            &self,
            session_id: &str,
            mode: ChatMode,
        ) -> Result<bool, ChatError> {
            self.inner.delete_session(session_id, mode).await
        }
    }

    fn orchestrator_with(
        script: Vec<Result<Vec<Turn>, ChatError>>,
    ) -> (Orchestrator, Arc<RecordingStore>) {
        let store = RecordingStore::new();
        let orchestrator = Orchestrator::new(ScriptedTransport::new(script), store.clone());
        (orchestrator, store)
    }

    fn roles_and_contents(orchestrator: &Orchestrator) -> Vec<(Role, String)> {
        orchestrator
            .transcript()
            .iter()
            .map(|turn| (turn.role, turn.content.clone()))
            .collect()
    }

    #[tokio::test]
    async fn first_send_creates_a_session_and_appends_the_reply() {
        let (mut orchestrator, store) =
            orchestrator_with(vec![Ok(vec![Turn::assistant("Hi there")])]);

        let outcome = orchestrator.send_message("Hello").await;
        assert_eq!(outcome, SendOutcome::Sent { replies: 1 });

        assert_eq!(
            roles_and_contents(&orchestrator),
            vec![
                (Role::User, "Hello".to_string()),
                (Role::Assistant, "Hi there".to_string()),
            ]
        );

        let sessions = store.list_sessions(ChatMode::Standard).await.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].turn_count, 2);
        assert_eq!(
            orchestrator.active_session_id(),
            Some(sessions[0].id.as_str())
        );
        assert!(!orchestrator.is_pending());
    }

    #[tokio::test]
    async fn sequential_sends_interleave_user_and_reply_turns_in_order() {
        let (mut orchestrator, _store) = orchestrator_with(vec![
            Ok(vec![Turn::assistant("one")]),
            Ok(vec![Turn::assistant("two")]),
        ]);

        orchestrator.send_message("first").await;
        orchestrator.send_message("second").await;

        let contents: Vec<String> = roles_and_contents(&orchestrator)
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        assert_eq!(contents, ["first", "one", "second", "two"]);
    }

    #[tokio::test]
    async fn multi_agent_replies_are_appended_in_backend_order() {
        let (mut orchestrator, _store) = orchestrator_with(vec![Ok(vec![
            Turn::agent("AgentA", "foo"),
            Turn::agent("AgentB", "bar"),
        ])]);
        orchestrator.set_mode(ChatMode::MultiAgent);

        let outcome = orchestrator.send_message("go").await;
        assert_eq!(outcome, SendOutcome::Sent { replies: 2 });

        let turns = orchestrator.transcript().turns();
        assert_eq!(turns.len(), 3);
        assert_eq!(turns[1].source_agent.as_deref(), Some("AgentA"));
        assert_eq!(turns[1].content, "foo");
        assert_eq!(turns[2].source_agent.as_deref(), Some("AgentB"));
        assert_eq!(turns[2].content, "bar");
    }

    #[tokio::test]
    async fn server_errors_append_one_system_turn_and_skip_persistence() {
        let (mut orchestrator, store) =
            orchestrator_with(vec![Err(ChatError::api(500, "boom"))]);

        let outcome = orchestrator.send_message("Hello").await;
        assert_eq!(outcome, SendOutcome::Failed);
        assert!(!orchestrator.is_pending());

        let turns = roles_and_contents(&orchestrator);
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0], (Role::User, "Hello".to_string()));
        assert_eq!(turns[1].0, Role::System);
        assert!(turns[1].1.contains("server encountered an error"));

        assert_eq!(store.update_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_leaves_no_trace_in_the_transcript() {
        let (mut orchestrator, store) = orchestrator_with(vec![
            Err(ChatError::Cancelled),
            Ok(vec![Turn::assistant("later")]),
        ]);

        let outcome = orchestrator.send_message("never mind").await;
        assert_eq!(outcome, SendOutcome::Cancelled);
        assert!(orchestrator.transcript().is_empty());
        assert!(!orchestrator.is_pending());
        assert_eq!(store.update_count(), 0);

        // The next cycle proceeds normally in the same session.
        let outcome = orchestrator.send_message("actually, hello").await;
        assert_eq!(outcome, SendOutcome::Sent { replies: 1 });
        assert_eq!(orchestrator.transcript().len(), 2);
    }

    #[tokio::test]
    async fn cancel_handle_aborts_a_slow_send_and_rolls_back() {
        let transport = Arc::new(
            MockChatTransport::new().with_delays(Duration::from_secs(60), Duration::from_secs(60)),
        );
        let mut orchestrator = Orchestrator::new(transport, Arc::new(MemoryHistoryStore::new()));
        let handle = orchestrator.cancel_handle();

        let outcome = {
            let send = orchestrator.send_message("never mind");
            tokio::pin!(send);

            // Let the send arm its cancellation token before aborting it.
            tokio::select! {
                biased;
                _ = &mut send => panic!("send should still be pending"),
                _ = tokio::task::yield_now() => {}
            }
            handle.cancel();

            send.await
        };
        assert_eq!(outcome, SendOutcome::Cancelled);
        assert!(orchestrator.transcript().is_empty());
        assert!(!orchestrator.is_pending());
    }

    #[tokio::test]
    async fn a_second_send_while_pending_is_rejected() {
        let (mut orchestrator, _store) =
            orchestrator_with(vec![Ok(vec![Turn::assistant("unused")])]);
        orchestrator.force_pending_for_test();

        let before = orchestrator.transcript().len();
        let outcome = orchestrator.send_message("rejected").await;
        assert_eq!(outcome, SendOutcome::Busy);
        assert_eq!(orchestrator.transcript().len(), before);
    }

    #[tokio::test]
    async fn selecting_the_active_session_is_a_no_op() {
        let (mut orchestrator, _store) =
            orchestrator_with(vec![Ok(vec![Turn::assistant("hi")])]);
        orchestrator.send_message("hello").await;

        let active = orchestrator.active_session_id().unwrap().to_string();
        let before = orchestrator.transcript().len();
        orchestrator.select_session(&active).await.unwrap();

        assert_eq!(orchestrator.active_session_id(), Some(active.as_str()));
        assert_eq!(orchestrator.transcript().len(), before);
    }

    #[tokio::test]
    async fn selecting_another_session_replaces_the_transcript() {
        let (mut orchestrator, store) = orchestrator_with(vec![
            Ok(vec![Turn::assistant("first reply")]),
            Ok(vec![Turn::assistant("second reply")]),
        ]);

        orchestrator.send_message("first chat").await;
        let first_id = orchestrator.active_session_id().unwrap().to_string();

        orchestrator.new_conversation();
        orchestrator.send_message("second chat").await;
        assert_ne!(orchestrator.active_session_id(), Some(first_id.as_str()));

        orchestrator.select_session(&first_id).await.unwrap();
        let contents: Vec<String> = roles_and_contents(&orchestrator)
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        assert_eq!(contents, ["first chat", "first reply"]);

        assert_eq!(store.list_sessions(ChatMode::Standard).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn selecting_an_unknown_session_is_not_found() {
        let (mut orchestrator, _store) = orchestrator_with(vec![]);
        assert!(matches!(
            orchestrator.select_session("ghost").await,
            Err(ChatError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn mode_switch_clears_all_conversation_state() {
        let (mut orchestrator, _store) =
            orchestrator_with(vec![Ok(vec![Turn::assistant("hi")])]);
        orchestrator.send_message("hello").await;

        orchestrator.set_mode(ChatMode::MultiAgent);
        assert_eq!(orchestrator.mode(), ChatMode::MultiAgent);
        assert!(orchestrator.active_session_id().is_none());
        assert!(orchestrator.transcript().is_empty());
        assert!(orchestrator.sessions().is_empty());

        // Lazily reloaded; the other mode's sessions stay invisible.
        orchestrator.refresh_sessions().await.unwrap();
        assert!(orchestrator.sessions().is_empty());
    }

    #[tokio::test]
    async fn deleting_the_only_session_returns_to_idle() {
        let (mut orchestrator, _store) =
            orchestrator_with(vec![Ok(vec![Turn::assistant("hi")])]);
        orchestrator.send_message("hello").await;
        let active = orchestrator.active_session_id().unwrap().to_string();

        orchestrator.delete_session(&active).await.unwrap();
        assert!(orchestrator.active_session_id().is_none());
        assert!(orchestrator.transcript().is_empty());
        assert!(orchestrator.sessions().is_empty());
    }

    #[tokio::test]
    async fn deleting_the_active_session_falls_back_to_the_most_recent() {
        let (mut orchestrator, _store) = orchestrator_with(vec![
            Ok(vec![Turn::assistant("reply a")]),
            Ok(vec![Turn::assistant("reply b")]),
        ]);

        orchestrator.send_message("chat a").await;
        let first_id = orchestrator.active_session_id().unwrap().to_string();
        orchestrator.new_conversation();
        orchestrator.send_message("chat b").await;
        let second_id = orchestrator.active_session_id().unwrap().to_string();

        orchestrator.delete_session(&second_id).await.unwrap();
        assert_eq!(orchestrator.active_session_id(), Some(first_id.as_str()));
        let contents: Vec<String> = roles_and_contents(&orchestrator)
            .into_iter()
            .map(|(_, c)| c)
            .collect();
        assert_eq!(contents, ["chat a", "reply a"]);
    }

    #[tokio::test]
    async fn deleting_an_inactive_session_keeps_the_current_transcript() {
        let (mut orchestrator, _store) = orchestrator_with(vec![
            Ok(vec![Turn::assistant("reply a")]),
            Ok(vec![Turn::assistant("reply b")]),
        ]);

        orchestrator.send_message("chat a").await;
        let first_id = orchestrator.active_session_id().unwrap().to_string();
        orchestrator.new_conversation();
        orchestrator.send_message("chat b").await;
        let second_id = orchestrator.active_session_id().unwrap().to_string();

        orchestrator.delete_session(&first_id).await.unwrap();
        assert_eq!(orchestrator.active_session_id(), Some(second_id.as_str()));
        assert_eq!(orchestrator.transcript().len(), 2);
    }

    #[tokio::test]
    async fn new_conversation_keeps_persisted_sessions() {
        let (mut orchestrator, store) =
            orchestrator_with(vec![Ok(vec![Turn::assistant("hi")])]);
        orchestrator.send_message("hello").await;

        orchestrator.new_conversation();
        assert!(orchestrator.active_session_id().is_none());
        assert!(orchestrator.transcript().is_empty());
        assert_eq!(store.list_sessions(ChatMode::Standard).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_persistence_keeps_turns_visible() {
        // The store knows nothing about the session the orchestrator thinks
        // is active, so update_session fails while the transport succeeds.
        let (mut orchestrator, store) =
            orchestrator_with(vec![Ok(vec![Turn::assistant("hi")])]);
        orchestrator.send_message("hello").await;
        let active = orchestrator.active_session_id().unwrap().to_string();
        store
            .inner
            .delete_session(&active, ChatMode::Standard)
            .await
            .unwrap();

        // Force a second cycle against the now-missing session.
        let transport = ScriptedTransport::new(vec![Ok(vec![Turn::assistant("again")])]);
        orchestrator.transport = transport;
        let outcome = orchestrator.send_message("still here?").await;

        assert_eq!(outcome, SendOutcome::Sent { replies: 1 });
        assert_eq!(orchestrator.transcript().len(), 4);
    }
}
