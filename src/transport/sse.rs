//! Incremental parser for multi-agent `text/event-stream` responses.
//!
//! Each `data:` line carries one agent's complete reply envelope, or the
//! `[HEARTBEAT]` keep-alive sentinel. Malformed events are skipped so a bad
//! payload from one agent cannot sink the replies of the others.

use memchr::memchr;

use crate::api::ReplyEnvelope;
use crate::core::message::Turn;

const HEARTBEAT: &str = "[HEARTBEAT]";

#[derive(Default)]
pub struct SseAccumulator {
    buffer: Vec<u8>,
    replies: Vec<Turn>,
    skipped: usize,
}

impl SseAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes from the network. Lines may arrive split across any
    /// number of chunks; only complete lines are processed.
    pub fn push_chunk(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);

        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            let line = match std::str::from_utf8(&self.buffer[..newline_pos]) {
                Ok(line) => Some(line.trim().to_string()),
                Err(err) => {
                    tracing::warn!(error = %err, "invalid UTF-8 in event stream, skipping line");
                    self.skipped += 1;
                    None
                }
            };
            self.buffer.drain(..=newline_pos);
            if let Some(line) = line {
                self.process_line(&line);
            }
        }
    }

    fn process_line(&mut self, line: &str) {
        let Some(payload) = extract_data_payload(line) else {
            return;
        };
        if payload.is_empty() || payload == HEARTBEAT {
            return;
        }

        match serde_json::from_str::<ReplyEnvelope>(payload) {
            Ok(envelope) => {
                let turn = envelope.into_turn();
                if !turn.content.trim().is_empty() {
                    self.replies.push(turn);
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "skipping malformed event payload");
                self.skipped += 1;
            }
        }
    }

    pub fn reply_count(&self) -> usize {
        self.replies.len()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped
    }

    /// Replies accumulated so far, in the order the backend produced them.
    pub fn into_replies(self) -> Vec<Turn> {
        self.replies
    }
}

fn extract_data_payload(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim_start)
}
