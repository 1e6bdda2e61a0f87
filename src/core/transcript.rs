//! In-memory ordered turn log for the active session.
//!
//! The log supports the optimistic-send pattern as an explicit two-phase
//! commit: the user turn goes in as *provisional*, and the marker is either
//! committed or the turn rolled back once the send settles. At most one
//! provisional turn can exist because at most one send is in flight.

use crate::core::message::Turn;

#[derive(Debug, Default)]
pub struct TranscriptLog {
    turns: Vec<Turn>,
    provisional: Option<String>,
}

impl TranscriptLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a settled turn to the end of the log.
    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Appends a turn that has not been confirmed by a completed send cycle.
    /// Replaces any previous provisional marker.
    pub fn append_provisional(&mut self, turn: Turn) {
        self.provisional = Some(turn.id.clone());
        self.turns.push(turn);
    }

    /// Marks the provisional turn (if any) as settled.
    pub fn commit_provisional(&mut self) {
        self.provisional = None;
    }

    /// Removes the provisional turn from the log entirely.
    pub fn roll_back_provisional(&mut self) {
        if let Some(id) = self.provisional.take() {
            self.turns.retain(|turn| turn.id != id);
        }
    }

    pub fn has_provisional(&self) -> bool {
        self.provisional.is_some()
    }

    /// Replaces the whole log, e.g. when a session's history is loaded.
    pub fn replace_all(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
        self.provisional = None;
    }

    pub fn clear(&mut self) {
        self.turns.clear();
        self.provisional = None;
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_preserves_insertion_order() {
        let mut log = TranscriptLog::new();
        log.append(Turn::user("first"));
        log.append(Turn::assistant("second"));
        log.append(Turn::user("third"));

        let contents: Vec<&str> = log.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(contents, ["first", "second", "third"]);
    }

    #[test]
    fn committed_provisional_turns_stay() {
        let mut log = TranscriptLog::new();
        log.append_provisional(Turn::user("hello"));
        assert!(log.has_provisional());

        log.commit_provisional();
        assert!(!log.has_provisional());
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn rolled_back_provisional_turns_disappear() {
        let mut log = TranscriptLog::new();
        log.append(Turn::user("kept"));
        log.append_provisional(Turn::user("doomed"));

        log.roll_back_provisional();
        assert_eq!(log.len(), 1);
        assert_eq!(log.turns()[0].content, "kept");

        // A second rollback is a no-op.
        log.roll_back_provisional();
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn replace_all_drops_the_provisional_marker() {
        let mut log = TranscriptLog::new();
        log.append_provisional(Turn::user("pending"));

        log.replace_all(vec![Turn::user("a"), Turn::assistant("b")]);
        assert!(!log.has_provisional());
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn clear_empties_the_log() {
        let mut log = TranscriptLog::new();
        log.append(Turn::user("one"));
        log.clear();
        assert!(log.is_empty());
    }
}
