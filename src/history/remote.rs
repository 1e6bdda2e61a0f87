//! REST-backed history store.
//!
//! Speaks a small CRUD surface rooted at the configured history URL:
//! `GET /sessions?mode=`, `POST /sessions`, `PUT /sessions/{id}`,
//! `DELETE /sessions/{id}` and `GET /sessions/{id}/messages`. A 404 from the
//! server becomes `NotFound`; other non-success statuses are storage errors.

use async_trait::async_trait;
use serde::Serialize;

use crate::core::message::Turn;
use crate::core::session::{ChatMode, Session};
use crate::error::ChatError;
use crate::history::HistoryStore;
use crate::utils::url::endpoint_url;

pub struct RestHistoryStore {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct CreateSessionBody<'a> {
    mode: ChatMode,
    title: &'a str,
}

impl RestHistoryStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    fn sessions_url(&self) -> String {
        endpoint_url(&self.base_url, "sessions")
    }

    fn session_url(&self, session_id: &str) -> String {
        endpoint_url(&self.base_url, &format!("sessions/{session_id}"))
    }

    async fn check(
        response: reqwest::Response,
        session_id: Option<&str>,
    ) -> Result<reqwest::Response, ChatError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.as_u16() == 404 {
            if let Some(id) = session_id {
                return Err(ChatError::NotFound(id.to_string()));
            }
        }
        let body = response.text().await.unwrap_or_default();
        Err(ChatError::Storage(format!(
            "history API responded with status {status}: {body}"
        )))
    }
}

#[async_trait]
impl HistoryStore for RestHistoryStore {
    async fn list_sessions(&self, mode: ChatMode) -> Result<Vec<Session>, ChatError> {
        let response = self
            .client
            .get(self.sessions_url())
            .query(&[("mode", mode.as_str())])
            .send()
            .await?;
        let response = Self::check(response, None).await?;
        response
            .json()
            .await
            .map_err(|err| ChatError::Storage(format!("malformed session list: {err}")))
    }

    async fn load_turns(&self, session_id: &str) -> Result<Vec<Turn>, ChatError> {
        let url = endpoint_url(&self.base_url, &format!("sessions/{session_id}/messages"));
        let response = self.client.get(url).send().await?;
        let response = Self::check(response, Some(session_id)).await?;
        response
            .json()
            .await
            .map_err(|err| ChatError::Storage(format!("malformed turn log: {err}")))
    }

    async fn create_session(
        &self,
        mode: ChatMode,
        title: Option<&str>,
    ) -> Result<Session, ChatError> {
        let body = CreateSessionBody {
            mode,
            title: title.unwrap_or("New Chat"),
        };
        let response = self
            .client
            .post(self.sessions_url())
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, None).await?;
        response
            .json()
            .await
            .map_err(|err| ChatError::Storage(format!("malformed session: {err}")))
    }

    async fn update_session(
        &self,
        session_id: &str,
        turns: &[Turn],
    ) -> Result<Session, ChatError> {
        let response = self
            .client
            .put(self.session_url(session_id))
            .json(&turns)
            .send()
            .await?;
        let response = Self::check(response, Some(session_id)).await?;
        response
            .json()
            .await
            .map_err(|err| ChatError::Storage(format!("malformed session: {err}")))
    }

    async fn delete_session(&self, session_id: &str, mode: ChatMode) -> Result<bool, ChatError> {
        let response = self
            .client
            .delete(self.session_url(session_id))
            .query(&[("mode", mode.as_str())])
            .send()
            .await?;
        if response.status().as_u16() == 404 {
            return Ok(false);
        }
        Self::check(response, None).await?;
        Ok(true)
    }
}
