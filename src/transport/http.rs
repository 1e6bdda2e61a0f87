//! HTTP transport over reqwest.
//!
//! Each send races the request against a cancellation token and a timeout
//! timer; whichever settles first wins and the losers' effects are dropped
//! with the future.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::api::{decode_batch_replies, decode_single_reply, ChatRequest};
use crate::core::message::Turn;
use crate::core::session::ChatMode;
use crate::error::ChatError;
use crate::transport::sse::SseAccumulator;
use crate::transport::{ChatTransport, ResponseMode};
use crate::utils::url::endpoint_url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HttpChatTransport {
    client: reqwest::Client,
    standard_url: String,
    multi_agent_url: String,
    response_mode: ResponseMode,
    timeout: Duration,
    cancel_token: Mutex<CancellationToken>,
}

impl HttpChatTransport {
    pub fn new(
        standard_url: impl Into<String>,
        multi_agent_url: impl Into<String>,
        response_mode: ResponseMode,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            standard_url: standard_url.into(),
            multi_agent_url: multi_agent_url.into(),
            response_mode,
            timeout: DEFAULT_TIMEOUT,
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Replaces the stored token so a stale `cancel` cannot abort the next
    /// request, and returns the fresh token for this send.
    fn arm_cancellation(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut guard = self
            .cancel_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = token.clone();
        token
    }

    async fn dispatch(&self, turns: &[Turn], mode: ChatMode) -> Result<Vec<Turn>, ChatError> {
        let request = ChatRequest::from_turns(turns);
        match (mode, self.response_mode) {
            (ChatMode::Standard, _) => self.send_standard(&request).await,
            (ChatMode::MultiAgent, ResponseMode::Batch) => self.send_multi_batch(&request).await,
            (ChatMode::MultiAgent, ResponseMode::Stream) => self.send_multi_stream(&request).await,
        }
    }

    async fn send_standard(&self, request: &ChatRequest) -> Result<Vec<Turn>, ChatError> {
        let response = self
            .client
            .post(self.standard_url.as_str())
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let body = read_success_body(response).await?;
        Ok(vec![decode_single_reply(&body)?])
    }

    async fn send_multi_batch(&self, request: &ChatRequest) -> Result<Vec<Turn>, ChatError> {
        let url = endpoint_url(&self.multi_agent_url, "batch");
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(request)
            .send()
            .await?;

        let body = read_success_body(response).await?;
        decode_batch_replies(&body)
    }

    async fn send_multi_stream(&self, request: &ChatRequest) -> Result<Vec<Turn>, ChatError> {
        let url = endpoint_url(&self.multi_agent_url, "stream");
        let response = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "No error details available".to_string());
            return Err(ChatError::api(status.as_u16(), body));
        }

        let mut accumulator = SseAccumulator::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            match chunk {
                Ok(bytes) => accumulator.push_chunk(&bytes),
                Err(err) => {
                    // Abnormal termination: surface what was already received
                    // rather than discarding completed agent replies.
                    if accumulator.reply_count() > 0 {
                        tracing::warn!(
                            error = %err,
                            replies = accumulator.reply_count(),
                            "event stream ended abnormally, keeping accumulated replies"
                        );
                        return Ok(accumulator.into_replies());
                    }
                    return Err(ChatError::api(
                        0,
                        format!("event stream failed before any reply arrived: {err}"),
                    ));
                }
            }
        }

        Ok(accumulator.into_replies())
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn send(&self, turns: &[Turn], mode: ChatMode) -> Result<Vec<Turn>, ChatError> {
        let token = self.arm_cancellation();

        tokio::select! {
            result = self.dispatch(turns, mode) => result,
            _ = token.cancelled() => Err(ChatError::Cancelled),
            _ = tokio::time::sleep(self.timeout) => Err(ChatError::Timeout),
        }
    }

    fn cancel(&self) {
        let guard = self
            .cancel_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.cancel();
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String, ChatError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "No error details available".to_string());
    if !status.is_success() {
        return Err(ChatError::api(status.as_u16(), body));
    }
    Ok(body)
}
