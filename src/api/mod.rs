//! Wire payloads exchanged with the chat backend.
//!
//! Requests carry the full conversation as `{role, content}` pairs. Replies
//! arrive as envelopes with a role label, a list of content items, and
//! metadata; multi-agent envelopes additionally name their author. Shapes are
//! decoded strictly; anything unrecognized is rejected at this boundary.

use serde::{Deserialize, Serialize};

use crate::core::message::{Role, Turn};
use crate::error::ChatError;

#[derive(Serialize, Clone)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Serialize)]
pub struct ChatRequest {
    pub messages: Vec<WireMessage>,
}

impl ChatRequest {
    /// Maps a turn log to the transport-neutral message shape. System and
    /// tool turns authored locally never leave the client.
    pub fn from_turns(turns: &[Turn]) -> Self {
        Self {
            messages: turns
                .iter()
                .filter(|turn| turn.is_user() || turn.is_assistant())
                .map(|turn| WireMessage {
                    role: turn.role.as_str().to_string(),
                    content: turn.content.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ReplyItem {
    #[serde(rename = "$type", default)]
    pub kind: Option<String>,
    #[serde(rename = "Text", default)]
    pub text: Option<String>,
}

impl ReplyItem {
    fn is_text(&self) -> bool {
        match self.kind.as_deref() {
            None | Some("TextContent") => true,
            Some(_) => false,
        }
    }
}

#[derive(Deserialize, Debug)]
pub struct ReplyRole {
    #[serde(rename = "Label")]
    pub label: String,
}

#[derive(Deserialize, Debug, Default)]
pub struct ReplyMetadata {
    #[serde(rename = "Id", default)]
    pub id: Option<String>,
}

/// One agent's complete reply as sent by the backend, in batch bodies and in
/// SSE `data:` payloads alike.
#[derive(Deserialize, Debug)]
pub struct ReplyEnvelope {
    #[serde(rename = "AuthorName", default)]
    pub author_name: Option<String>,
    #[serde(rename = "Role", default)]
    pub role: Option<ReplyRole>,
    #[serde(rename = "Items")]
    pub items: Vec<ReplyItem>,
    #[serde(rename = "Metadata", default)]
    pub metadata: Option<ReplyMetadata>,
}

impl ReplyEnvelope {
    /// Concatenated text content, one line per text item.
    pub fn text(&self) -> String {
        self.items
            .iter()
            .filter(|item| item.is_text())
            .filter_map(|item| item.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Converts the envelope into an assistant turn, keeping the backend's
    /// metadata id when present so retransmissions stay identifiable.
    pub fn into_turn(self) -> Turn {
        let content = self.text();
        let mut turn = match self.author_name {
            Some(name) => Turn::agent(name, content),
            None => Turn::new(Role::Assistant, content),
        };
        if let Some(id) = self.metadata.and_then(|m| m.id) {
            turn.id = id;
        }
        turn
    }
}

/// Decodes a single-mode response body: a JSON array with one envelope.
pub fn decode_single_reply(body: &str) -> Result<Turn, ChatError> {
    let mut envelopes: Vec<ReplyEnvelope> = serde_json::from_str(body)
        .map_err(|err| ChatError::api(0, format!("unrecognized response shape: {err}")))?;
    if envelopes.is_empty() {
        return Err(ChatError::api(0, "response contained no reply"));
    }
    Ok(envelopes.remove(0).into_turn())
}

/// Decodes a multi-agent batch body: a JSON array with one envelope per agent.
pub fn decode_batch_replies(body: &str) -> Result<Vec<Turn>, ChatError> {
    let envelopes: Vec<ReplyEnvelope> = serde_json::from_str(body)
        .map_err(|err| ChatError::api(0, format!("unrecognized response shape: {err}")))?;
    if envelopes.is_empty() {
        return Err(ChatError::api(0, "response contained no replies"));
    }
    Ok(envelopes.into_iter().map(ReplyEnvelope::into_turn).collect())
}
