//! Per-session conversation memory
//!
//! Keeps the last few user/assistant turns for each opaque session id so a
//! follow-up request can see what was said before. Bounded per session;
//! safe to share across concurrent runs.

use dashmap::DashMap;
use llm::Message;
use std::collections::VecDeque;

/// One prior exchange.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub user: String,
    pub assistant: String,
}

/// Session id → most recent turns, oldest first.
#[derive(Debug)]
pub struct SessionHistory {
    sessions: DashMap<String, VecDeque<Turn>>,
    max_turns: usize,
}

impl SessionHistory {
    pub fn new(max_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns,
        }
    }

    /// Prior turns as chat messages, oldest first.
    pub fn messages(&self, session_id: &str) -> Vec<Message> {
        self.sessions
            .get(session_id)
            .map(|turns| {
                turns
                    .iter()
                    .flat_map(|t| [Message::human(&t.user), Message::assistant(&t.assistant)])
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn turns(&self, session_id: &str) -> Vec<Turn> {
        self.sessions
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Append a turn, dropping the oldest beyond the cap.
    pub fn record(&self, session_id: &str, user: impl Into<String>, assistant: impl Into<String>) {
        if self.max_turns == 0 {
            return;
        }

        let mut turns = self.sessions.entry(session_id.to_string()).or_default();
        turns.push_back(Turn {
            user: user.into(),
            assistant: assistant.into(),
        });
        while turns.len() > self.max_turns {
            turns.pop_front();
        }
    }

    pub fn clear(&self, session_id: &str) {
        self.sessions.remove(session_id);
    }

    /// Number of sessions with history.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new(10)
    }
}
