//! Session store — per-user state with per-user serialization.
//!
//! The map lock is only held to look up or insert a session handle; work on
//! a session happens under that session's own mutex. Requests for one user
//! therefore run one at a time in arrival order (tokio's mutex is FIFO),
//! while different users proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chatrelay_config::AppConfig;
use chatrelay_core::{Language, Role, UserId, UserSession};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::debug;

/// Shared handle to one user's session.
pub type SessionHandle = Arc<Mutex<UserSession>>;

pub struct SessionStore {
    sessions: RwLock<HashMap<UserId, SessionHandle>>,
    backend_count: usize,
    default_language: Language,
    reset_language: bool,
}

impl SessionStore {
    pub fn new(backend_count: usize, default_language: Language) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            backend_count,
            default_language,
            reset_language: false,
        }
    }

    /// Make [`SessionStore::reset`] also restore the default language.
    pub fn with_reset_language(mut self, reset_language: bool) -> Self {
        self.reset_language = reset_language;
        self
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.backends.len(), config.default_language)
            .with_reset_language(config.session.reset_language)
    }

    pub fn backend_count(&self) -> usize {
        self.backend_count
    }

    pub fn default_language(&self) -> Language {
        self.default_language
    }

    /// Handle to the user's session, created on first contact.
    pub async fn handle(&self, user_id: &UserId) -> SessionHandle {
        if let Some(handle) = self.sessions.read().await.get(user_id) {
            return handle.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(user_id.clone())
            .or_insert_with(|| {
                debug!(user_id = %user_id, language = self.default_language.code(), "Creating session");
                Arc::new(Mutex::new(UserSession::new(
                    user_id.clone(),
                    self.default_language,
                )))
            })
            .clone()
    }

    /// Lock the user's session. Waiters are served in arrival order.
    pub async fn lock(&self, user_id: &UserId) -> OwnedMutexGuard<UserSession> {
        self.handle(user_id).await.lock_owned().await
    }

    /// Snapshot of the user's session, creating it if needed.
    pub async fn get(&self, user_id: &UserId) -> UserSession {
        self.lock(user_id).await.clone()
    }

    /// Whether a session exists without creating one.
    pub async fn contains(&self, user_id: &UserId) -> bool {
        self.sessions.read().await.contains_key(user_id)
    }

    pub async fn append_turn(&self, user_id: &UserId, role: Role, content: impl Into<String>) {
        self.lock(user_id).await.append(role, content);
    }

    /// Clear history and return to the first backend. Returns the session
    /// language after the reset.
    pub async fn reset(&self, user_id: &UserId) -> Language {
        let mut session = self.lock(user_id).await;
        session.reset(self.reset_language.then_some(self.default_language));
        session.language
    }

    pub async fn set_language(&self, user_id: &UserId, language: Language) {
        self.lock(user_id).await.set_language(language);
    }

    /// Rotate the user to the next backend. Returns the new index.
    pub async fn advance_backend(&self, user_id: &UserId) -> usize {
        let backend_count = self.backend_count;
        self.lock(user_id).await.advance_backend(backend_count)
    }

    /// Number of known users.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
