//! Offline transport with canned replies, used when no chat backend is
//! configured. Simulates network latency and honors cancellation so the
//! orchestrator behaves exactly as it would against the real thing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::message::Turn;
use crate::core::session::ChatMode;
use crate::error::ChatError;
use crate::transport::ChatTransport;

const STANDARD_REPLIES: [&str; 5] = [
    "Thank you for your message: \"{input}\". I'll help you with that.",
    "I understand you're asking about \"{input}\". Here's my response...",
    "Regarding \"{input}\", I'd suggest the following approach...",
    "I've processed your request about \"{input}\" and here's what I found...",
    "Based on your message about \"{input}\", I can provide these insights...",
];

const MULTI_AGENT_SCRIPTS: [[(&str, &str); 3]; 3] = [
    [
        ("Research Agent", "I've analyzed \"{input}\" and found several relevant sources."),
        ("Code Agent", "Based on this research, here's an implementation approach..."),
        ("Planning Agent", "Let me integrate these insights into a cohesive strategy for you."),
    ],
    [
        ("Technical Agent", "Regarding \"{input}\", the technical considerations are..."),
        ("UX Agent", "From a user experience perspective, we should consider..."),
        ("Project Agent", "Combining these insights, I recommend..."),
    ],
    [
        ("Analysis Agent", "Your question about \"{input}\" can be broken down into..."),
        ("Solution Agent", "Here are multiple approaches to address this..."),
        ("Evaluation Agent", "After evaluating all options, I recommend..."),
    ],
];

pub struct MockChatTransport {
    standard_delay: Duration,
    multi_agent_delay: Duration,
    next_reply: AtomicUsize,
    cancel_token: Mutex<CancellationToken>,
}

impl Default for MockChatTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatTransport {
    pub fn new() -> Self {
        Self {
            standard_delay: Duration::from_millis(1000),
            multi_agent_delay: Duration::from_millis(2000),
            next_reply: AtomicUsize::new(0),
            cancel_token: Mutex::new(CancellationToken::new()),
        }
    }

    /// Overrides the simulated latency; tests use zero.
    pub fn with_delays(mut self, standard: Duration, multi_agent: Duration) -> Self {
        self.standard_delay = standard;
        self.multi_agent_delay = multi_agent;
        self
    }

    fn arm_cancellation(&self) -> CancellationToken {
        let token = CancellationToken::new();
        let mut guard = self
            .cancel_token
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *guard = token.clone();
        token
    }

    fn build_replies(&self, turns: &[Turn], mode: ChatMode) -> Vec<Turn> {
        let input = turns
            .iter()
            .rev()
            .find(|turn| turn.is_user())
            .map(|turn| turn.content.as_str())
            .unwrap_or_default();
        let pick = self.next_reply.fetch_add(1, Ordering::Relaxed);

        match mode {
            ChatMode::Standard => {
                let template = STANDARD_REPLIES[pick % STANDARD_REPLIES.len()];
                vec![Turn::assistant(template.replace("{input}", input))]
            }
            ChatMode::MultiAgent => {
                let script = &MULTI_AGENT_SCRIPTS[pick % MULTI_AGENT_SCRIPTS.len()];
                script
                    .iter()
                    .map(|(agent, template)| Turn::agent(*agent, template.replace("{input}", input)))
                    .collect()
            }
        }
    }
}

#[async_trait]
impl ChatTransport for MockChatTransport {
    async fn send(&self, turns: &[Turn], mode: ChatMode) -> Result<Vec<Turn>, ChatError> {
        let token = self.arm_cancellation();
        let delay = match mode {
            ChatMode::Standard => self.standard_delay,
            ChatMode::MultiAgent => self.multi_agent_delay,
        };

        tokio::select! {
            _ = tokio::time::sleep(delay) => Ok(self.build_replies(turns, mode)),
            _ = token.cancelled() => Err(ChatError::Cancelled),
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
