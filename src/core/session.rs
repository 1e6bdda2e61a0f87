use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::message::Turn;

/// Preview text is capped at this many characters, ellipsis included.
pub const PREVIEW_MAX_CHARS: usize = 50;

/// Conversation type. Sessions are partitioned by mode and never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChatMode {
    #[serde(rename = "standard")]
    Standard,
    #[serde(rename = "multiAgent")]
    MultiAgent,
}

impl ChatMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ChatMode::Standard => "standard",
            ChatMode::MultiAgent => "multiAgent",
        }
    }

    pub fn is_multi_agent(self) -> bool {
        self == ChatMode::MultiAgent
    }
}

impl std::fmt::Display for ChatMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A persisted conversation: metadata only, the turn log lives separately.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub last_turn_preview: String,
    pub updated_at: DateTime<Utc>,
    pub turn_count: usize,
    pub mode: ChatMode,
}

impl Session {
    /// A fresh, empty session. `position` feeds the placeholder title when no
    /// explicit title is given ("Chat 3" for the third session of a mode).
    pub fn new(mode: ChatMode, title: Option<&str>, position: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title
                .map(str::to_string)
                .unwrap_or_else(|| format!("Chat {position}")),
            last_turn_preview: String::new(),
            updated_at: Utc::now(),
            turn_count: 0,
            mode,
        }
    }

    /// Refreshes the mutable metadata from a session's full turn log.
    pub fn absorb_turns(&mut self, turns: &[Turn]) {
        self.last_turn_preview = turns
            .last()
            .map(|turn| truncate_preview(&turn.content))
            .unwrap_or_default();
        self.turn_count = turns.len();
        self.updated_at = Utc::now();
    }
}

/// Sorts a mode's collection most-recently-updated first.
pub fn sort_sessions(sessions: &mut [Session]) {
    sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// Truncates preview text to [`PREVIEW_MAX_CHARS`], marking the cut with an
/// ellipsis. Operates on characters, not bytes, so multibyte content is safe.
pub fn truncate_preview(content: &str) -> String {
    if content.chars().count() <= PREVIEW_MAX_CHARS {
        return content.to_string();
    }
    let kept: String = content.chars().take(PREVIEW_MAX_CHARS - 3).collect();
    format!("{kept}...")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn short_previews_are_untouched() {
        assert_eq!(truncate_preview("short"), "short");
    }

    #[test]
    fn long_previews_are_capped_with_ellipsis() {
        let long = "x".repeat(80);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
        assert!(preview.ends_with("..."));
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "é".repeat(60);
        let preview = truncate_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
    }

    #[test]
    fn default_titles_are_positional() {
        let session = Session::new(ChatMode::Standard, None, 4);
        assert_eq!(session.title, "Chat 4");

        let named = Session::new(ChatMode::Standard, Some("Budget"), 4);
        assert_eq!(named.title, "Budget");
    }

    #[test]
    fn absorb_turns_refreshes_metadata() {
        let mut session = Session::new(ChatMode::Standard, None, 1);
        let turns = vec![Turn::user("hi"), Turn::assistant("hello there")];

        session.absorb_turns(&turns);
        assert_eq!(session.turn_count, 2);
        assert_eq!(session.last_turn_preview, "hello there");
    }

    #[test]
    fn sessions_sort_most_recent_first() {
        let mut old = Session::new(ChatMode::Standard, Some("old"), 1);
        old.updated_at = Utc::now() - Duration::hours(2);
        let new = Session::new(ChatMode::Standard, Some("new"), 2);

        let mut sessions = vec![old, new];
        sort_sessions(&mut sessions);
        assert_eq!(sessions[0].title, "new");
    }
}
