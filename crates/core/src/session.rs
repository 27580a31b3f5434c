//! Per-user conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::i18n::Language;
use crate::message::{Role, Turn, UserId};

/// Mutable state kept for one user for the lifetime of the process.
///
/// Invariant: `active_backend < backend_count` for the pool the session was
/// created against. Only [`UserSession::advance_backend`] and
/// [`UserSession::reset`] change the index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub user_id: UserId,
    pub language: Language,
    pub active_backend: usize,
    /// Chronological; insertion order is conversational order.
    pub history: Vec<Turn>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserSession {
    /// A fresh session: empty history, first backend.
    pub fn new(user_id: UserId, language: Language) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            language,
            active_backend: 0,
            history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a turn at the end of the history.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.updated_at = Utc::now();
        self.history.push(Turn::new(role, content));
    }

    /// Move to the next backend, wrapping around. Returns the new index.
    pub fn advance_backend(&mut self, backend_count: usize) -> usize {
        self.updated_at = Utc::now();
        self.active_backend = if backend_count == 0 {
            0
        } else {
            (self.active_backend + 1) % backend_count
        };
        self.active_backend
    }

    pub fn set_language(&mut self, language: Language) {
        self.updated_at = Utc::now();
        self.language = language;
    }

    /// Clear history and return to the first backend. The language is only
    /// replaced when `language` is `Some`.
    pub fn reset(&mut self, language: Option<Language>) {
        self.updated_at = Utc::now();
        self.history.clear();
        self.active_backend = 0;
        if let Some(language) = language {
            self.language = language;
        }
    }

    /// Index of the most recent user turn, if any.
    pub fn last_user_turn(&self) -> Option<usize> {
        self.history.iter().rposition(|t| t.role == Role::User)
    }

    /// Replace the content of the most recent user turn in place.
    /// Returns `false` when there is no user turn.
    pub fn replace_last_user_turn(&mut self, content: impl Into<String>) -> bool {
        match self.last_user_turn() {
            Some(idx) => {
                self.history[idx].content = content.into();
                self.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }

    /// Total characters across the whole (untrimmed) history.
    pub fn history_chars(&self) -> usize {
        self.history.iter().map(Turn::char_len).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> UserSession {
        UserSession::new(UserId::from("u1"), Language::En)
    }

    #[test]
    fn new_session_is_empty() {
        let s = session();
        assert!(s.history.is_empty());
        assert_eq!(s.active_backend, 0);
        assert_eq!(s.language, Language::En);
    }

    #[test]
    fn advance_wraps_around() {
        let mut s = session();
        assert_eq!(s.advance_backend(3), 1);
        assert_eq!(s.advance_backend(3), 2);
        assert_eq!(s.advance_backend(3), 0);
    }

    #[test]
    fn single_backend_stays_at_zero() {
        let mut s = session();
        assert_eq!(s.advance_backend(1), 0);
    }

    #[test]
    fn reset_clears_history_and_index() {
        let mut s = session();
        s.append(Role::User, "hi");
        s.advance_backend(2);
        s.language = Language::Ar;

        s.reset(None);
        assert!(s.history.is_empty());
        assert_eq!(s.active_backend, 0);
        assert_eq!(s.language, Language::Ar);

        s.reset(Some(Language::En));
        assert_eq!(s.language, Language::En);
    }

    #[test]
    fn replace_last_user_turn_in_place() {
        let mut s = session();
        s.append(Role::User, "first");
        s.append(Role::Assistant, "answer");
        s.append(Role::User, "second");
        s.append(Role::Assistant, "another");

        assert!(s.replace_last_user_turn("second, rephrased"));
        assert_eq!(s.history.len(), 4);
        assert_eq!(s.history[2].content, "second, rephrased");
        assert_eq!(s.history[0].content, "first");
    }

    #[test]
    fn replace_without_user_turn_fails() {
        let mut s = session();
        s.append(Role::Assistant, "hello");
        assert!(!s.replace_last_user_turn("x"));
    }
}
