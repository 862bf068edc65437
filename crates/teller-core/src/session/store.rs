//! In-memory session store

use super::types::Turn;
use dashmap::DashMap;
use tracing::debug;

/// Per-session conversation history, bounded to `max_turns` each
#[derive(Debug)]
pub struct SessionStore {
    sessions: DashMap<String, Vec<Turn>>,
    max_turns: usize,
}

impl SessionStore {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns: max_turns.max(1),
        }
    }

    /// Snapshot of a session's turns, oldest first
    pub fn history(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .get(session_id)
            .map(|turns| turns.clone())
            .unwrap_or_default()
    }

    /// Append a turn, dropping the oldest turns beyond the bound
    pub fn append(&self, session_id: &str, turn: Turn) {
        let mut turns = self.sessions.entry(session_id.to_string()).or_default();
        turns.push(turn);
        if turns.len() > self.max_turns {
            let excess = turns.len() - self.max_turns;
            turns.drain(..excess);
            debug!(session_id, dropped = excess, "trimmed session history");
        }
    }

    pub fn clear(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Number of sessions with at least one turn
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
