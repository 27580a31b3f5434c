//! Relay orchestrator — composes access control, moderation, sessions,
//! trimming, prompt building and execution for every incoming request.
//!
//! Callers only ever receive a [`Reply`]: either generated text or a
//! localized catalog message. No backend detail leaks to the user.

use std::sync::Arc;

use chatrelay_config::AppConfig;
use chatrelay_core::{
    Language, MessageCatalog, MessageId, RelayError, Role, StaticCatalog, Turn, UserId,
    UserSession,
};
use chatrelay_providers::{BackendPool, build_from_config};
use chatrelay_security::{
    AccessControl, AccessDecision, AuditEvent, AuditLogger, AuditOutcome, AuditSink,
    ModerationFilter, ModerationPolicy, TracingSink, Verdict,
};
use serde::{Deserialize, Serialize};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::context::{ContextTrimmer, PromptBuilder};
use crate::executor::{Executor, RetryPolicy};
use crate::session::SessionStore;

/// An incoming question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    pub user_id: UserId,
    pub text: String,
    /// Language the user picked with this message, as a code or label.
    #[serde(default)]
    pub language: Option<String>,
}

impl Query {
    pub fn new(user_id: impl Into<UserId>, text: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            text: text.into(),
            language: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }
}

/// What goes back to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub user_id: UserId,
    pub text: String,
    /// Catalog message this reply was rendered from; `None` for generated text.
    pub code: Option<MessageId>,
}

impl Reply {
    fn generated(user_id: &UserId, text: String) -> Self {
        Self {
            user_id: user_id.clone(),
            text,
            code: None,
        }
    }

    pub fn is_generated(&self) -> bool {
        self.code.is_none()
    }
}

pub struct Relay {
    access: AccessControl,
    moderation: ModerationFilter,
    sessions: SessionStore,
    trimmer: ContextTrimmer,
    prompts: PromptBuilder,
    executor: Executor,
    catalog: Arc<dyn MessageCatalog>,
    audit: Arc<AuditLogger>,
}

impl Relay {
    /// Build a relay with real HTTP backends from configuration.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::with_pool(config, build_from_config(config))
    }

    /// Build a relay from configuration around an existing backend pool.
    ///
    /// The session store is sized to the pool, not to `config.backends`.
    pub fn with_pool(config: &AppConfig, pool: BackendPool) -> Self {
        let sessions = SessionStore::new(pool.len(), config.default_language)
            .with_reset_language(config.session.reset_language);
        let catalog = StaticCatalog::new().with_overrides(&config.messages);
        let sinks: Vec<Box<dyn AuditSink>> = vec![Box::new(TracingSink)];
        let audit = AuditLogger::with_sinks(config.audit.max_entries, sinks);

        info!(
            backends = pool.len(),
            allowed_users = config.allowed_users.len(),
            max_attempts = config.retry.max_attempts,
            max_chars = config.context.max_chars,
            "Relay initialized"
        );

        Self {
            access: AccessControl::from_config(config),
            moderation: ModerationFilter::new(ModerationPolicy::from_config(&config.moderation)),
            sessions,
            trimmer: ContextTrimmer::from_config(&config.context),
            prompts: PromptBuilder::from_config(&config.prompt),
            executor: Executor::new(Arc::new(pool), RetryPolicy::from(&config.retry)),
            catalog: Arc::new(catalog),
            audit: Arc::new(audit),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn MessageCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn audit(&self) -> &AuditLogger {
        &self.audit
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Snapshot of a user's session.
    pub async fn session(&self, user_id: &UserId) -> UserSession {
        self.sessions.get(user_id).await
    }

    /// Health of every backend, in pool order.
    pub async fn health(&self) -> Vec<(String, bool)> {
        self.executor.pool().health().await
    }

    /// Answer one question.
    pub async fn handle(&self, query: Query) -> Reply {
        let span = info_span!("relay.query", request_id = %Uuid::new_v4(), user_id = %query.user_id);
        self.handle_query(query).instrument(span).await
    }

    async fn handle_query(&self, query: Query) -> Reply {
        let Query {
            user_id,
            text,
            language,
        } = query;

        let requested = language.as_deref().map(Language::parse);

        if !self.authorize(&user_id) {
            let language = requested.flatten().unwrap_or(self.sessions.default_language());
            return self.message(&user_id, MessageId::Blocked, language);
        }

        // Held until the reply is appended so one user's requests run in order.
        let mut session = self.sessions.lock(&user_id).await;

        let requested = match requested {
            None => None,
            Some(Some(language)) => Some(language),
            Some(None) => {
                debug!(requested = ?language, "Unsupported language requested");
                return self.message(&user_id, MessageId::InvalidLanguage, session.language);
            }
        };
        let reply_language = requested.unwrap_or(session.language);

        if let Verdict::Rejected(reason) = self.moderation.check(&text) {
            info!(reason = %reason, "Message rejected by moderation");
            self.audit.log(
                AuditEvent::MessageRejected { reason },
                user_id.as_str(),
                AuditOutcome::Denied,
                None,
            );
            return self.message(&user_id, MessageId::Rejected, reply_language);
        }

        if let Some(language) = requested {
            if language != session.language {
                session.set_language(language);
                self.audit.log(
                    AuditEvent::LanguageChanged {
                        language: language.code().into(),
                    },
                    user_id.as_str(),
                    AuditOutcome::Success,
                    None,
                );
            }
        }

        session.append(Role::User, text.clone());
        self.bound(&mut session);

        let prompt = self.prompts.build(&session.history, session.language);
        let backend = session.active_backend;

        match self.executor.execute(&mut session, &prompt).await {
            Ok(answer) => {
                session.append(Role::Assistant, answer.clone());
                self.bound(&mut session);
                self.audit.log(
                    AuditEvent::Answered {
                        backend,
                        language: session.language.code().into(),
                        question: text,
                        answer: answer.clone(),
                    },
                    user_id.as_str(),
                    AuditOutcome::Success,
                    None,
                );
                Reply::generated(&user_id, answer)
            }
            Err(e) => {
                let language = session.language;
                self.failure(&user_id, e, language)
            }
        }
    }

    /// Ask the user's current backend to rephrase their most recent question,
    /// replacing it in history on success.
    pub async fn rephrase(&self, user_id: &UserId) -> Reply {
        let span = info_span!("relay.rephrase", request_id = %Uuid::new_v4(), user_id = %user_id);
        self.rephrase_last(user_id).instrument(span).await
    }

    async fn rephrase_last(&self, user_id: &UserId) -> Reply {
        if !self.authorize(user_id) {
            return self.message(user_id, MessageId::Blocked, self.sessions.default_language());
        }

        let mut session = self.sessions.lock(user_id).await;

        let Some(question) = session
            .last_user_turn()
            .map(|idx| session.history[idx].content.clone())
        else {
            debug!("Nothing to rephrase");
            return self.message(user_id, MessageId::Error, session.language);
        };

        // Only the question is trimmed; the instruction is added after.
        let bounded = self.trimmer.apply(&[Turn::user(question.clone())]);
        let prompt = self.prompts.rephrase(&bounded, session.language);
        let backend = session.active_backend;

        match self.executor.execute(&mut session, &prompt).await {
            Ok(rephrased) => {
                session.replace_last_user_turn(rephrased.clone());
                self.bound(&mut session);
                self.audit.log(
                    AuditEvent::Rephrased {
                        backend,
                        language: session.language.code().into(),
                        question,
                        answer: rephrased.clone(),
                    },
                    user_id.as_str(),
                    AuditOutcome::Success,
                    None,
                );
                Reply::generated(user_id, rephrased)
            }
            Err(e) => {
                let language = session.language;
                self.failure(user_id, e, language)
            }
        }
    }

    /// Clear the user's history and return them to the first backend.
    pub async fn reset(&self, user_id: &UserId) -> Reply {
        if !self.authorize(user_id) {
            return self.message(user_id, MessageId::Blocked, self.sessions.default_language());
        }

        let language = self.sessions.reset(user_id).await;
        info!(user_id = %user_id, "Session reset");
        self.audit.log(AuditEvent::SessionReset, user_id.as_str(), AuditOutcome::Success, None);
        self.message(user_id, MessageId::Ready, language)
    }

    /// Change the user's language from a code or keyboard label.
    pub async fn set_language(&self, user_id: &UserId, code: &str) -> Reply {
        let requested = Language::parse(code);

        if !self.authorize(user_id) {
            let language = requested.unwrap_or(self.sessions.default_language());
            return self.message(user_id, MessageId::Blocked, language);
        }

        let Some(language) = requested else {
            let current = self.sessions.get(user_id).await.language;
            return self.message(user_id, MessageId::InvalidLanguage, current);
        };

        self.sessions.set_language(user_id, language).await;
        self.audit.log(
            AuditEvent::LanguageChanged {
                language: language.code().into(),
            },
            user_id.as_str(),
            AuditOutcome::Success,
            None,
        );
        self.message(user_id, MessageId::Ready, language)
    }

    /// Trim the stored history in place so it never outgrows the budget.
    fn bound(&self, session: &mut UserSession) {
        let before = session.history.len();
        session.history = self.trimmer.apply(&session.history);
        debug!(
            dropped = before - session.history.len(),
            turns = session.history.len(),
            history_chars = session.history_chars(),
            "History bounded"
        );
    }

    fn authorize(&self, user_id: &UserId) -> bool {
        match self.access.check(user_id) {
            AccessDecision::Allowed => true,
            AccessDecision::Denied { reason, .. } => {
                warn!(user_id = %user_id, reason = %reason, "Unauthorized user blocked");
                self.audit.log(
                    AuditEvent::UserBlocked,
                    user_id.as_str(),
                    AuditOutcome::Denied,
                    Some(reason),
                );
                false
            }
        }
    }

    fn failure(&self, user_id: &UserId, error: RelayError, language: Language) -> Reply {
        let details = Some(error.to_string());
        match error {
            RelayError::Permanent { backend, .. } => {
                self.audit.log(
                    AuditEvent::BackendFailed { backend },
                    user_id.as_str(),
                    AuditOutcome::Failure,
                    details,
                );
                self.message(user_id, MessageId::Error, language)
            }
            RelayError::Exhausted {
                backend,
                next_backend,
                ..
            } => {
                self.audit.log(
                    AuditEvent::BackendExhausted {
                        backend,
                        next_backend,
                    },
                    user_id.as_str(),
                    AuditOutcome::Failure,
                    details,
                );
                self.message(user_id, MessageId::Timeout, language)
            }
        }
    }

    fn message(&self, user_id: &UserId, id: MessageId, language: Language) -> Reply {
        Reply {
            user_id: user_id.clone(),
            text: self.catalog.lookup(id, language),
            code: Some(id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chatrelay_core::{Backend, BackendError};
    use std::sync::Mutex;

    struct ScriptedBackend {
        replies: Mutex<Vec<Result<String, BackendError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into_iter().rev().collect()),
                prompts: Mutex::new(Vec::new()),
            })
        }

        fn prompts(&self) -> Vec<String> {
            self.prompts.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Backend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, prompt: &str) -> Result<String, BackendError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.replies
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Err(BackendError::Transient("script exhausted".into())))
        }
    }

    fn config() -> AppConfig {
        let mut config = AppConfig::default();
        config.allowed_users = vec!["alice".into()];
        config.retry.max_attempts = 1;
        config
    }

    fn relay(backend: Arc<ScriptedBackend>) -> Relay {
        Relay::with_pool(&config(), BackendPool::new().add(backend))
    }

    fn echo_script(n: usize) -> Vec<Result<String, BackendError>> {
        (0..n).map(|i| Ok(format!("{:0>40}", i))).collect()
    }

    #[tokio::test]
    async fn answer_is_appended_to_history() {
        let backend = ScriptedBackend::new(vec![Ok("An empty transform.".into())]);
        let relay = relay(backend.clone());

        let reply = relay.handle(Query::new("alice", "What is a null object?")).await;
        assert!(reply.is_generated());
        assert_eq!(reply.text, "An empty transform.");
        assert_eq!(backend.prompts(), vec!["User: What is a null object?\nAssistant: "]);

        let session = relay.session(&UserId::from("alice")).await;
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[1].role, Role::Assistant);
    }

    #[tokio::test]
    async fn invalid_language_stops_before_any_mutation() {
        let backend = ScriptedBackend::new(vec![]);
        let relay = relay(backend.clone());

        let reply = relay
            .handle(Query::new("alice", "hello").with_language("klingon"))
            .await;
        assert_eq!(reply.code, Some(MessageId::InvalidLanguage));
        assert!(backend.prompts().is_empty());
        assert!(relay.session(&UserId::from("alice")).await.history.is_empty());
    }

    #[tokio::test]
    async fn rejected_message_is_localized_in_requested_language() {
        let backend = ScriptedBackend::new(vec![]);
        let relay = relay(backend);

        let long = "x".repeat(501);
        let reply = relay.handle(Query::new("alice", long).with_language("ar")).await;
        assert_eq!(reply.code, Some(MessageId::Rejected));
        assert_eq!(reply.text, StaticCatalog::new().lookup(MessageId::Rejected, Language::Ar));

        // Not applied: moderation failed.
        let session = relay.session(&UserId::from("alice")).await;
        assert_eq!(session.language, Language::En);
    }

    #[tokio::test]
    async fn requested_language_applied_after_moderation() {
        let backend = ScriptedBackend::new(vec![Ok("نعم".into())]);
        let relay = relay(backend);

        relay.handle(Query::new("alice", "hi").with_language("🇸🇦 العربية")).await;
        assert_eq!(relay.session(&UserId::from("alice")).await.language, Language::Ar);
    }

    #[tokio::test]
    async fn permanent_failure_replies_error_and_keeps_backend() {
        let backend = ScriptedBackend::new(vec![Err(BackendError::Permanent("401".into()))]);
        let relay = relay(backend);

        let reply = relay.handle(Query::new("alice", "q")).await;
        assert_eq!(reply.code, Some(MessageId::Error));
        let session = relay.session(&UserId::from("alice")).await;
        assert_eq!(session.active_backend, 0);
        assert_eq!(session.history.len(), 1);
    }

    #[tokio::test]
    async fn rephrase_without_question_is_error() {
        let backend = ScriptedBackend::new(vec![]);
        let relay = relay(backend.clone());

        let reply = relay.rephrase(&UserId::from("alice")).await;
        assert_eq!(reply.code, Some(MessageId::Error));
        assert!(backend.prompts().is_empty());
    }

    #[tokio::test]
    async fn rephrase_replaces_last_question_in_place() {
        let backend = ScriptedBackend::new(vec![
            Ok("Use a Null.".into()),
            Ok("How do I create a null object?".into()),
        ]);
        let relay = relay(backend.clone());
        let alice = UserId::from("alice");

        relay.handle(Query::new("alice", "null obj how")).await;
        let reply = relay.rephrase(&alice).await;
        assert_eq!(reply.text, "How do I create a null object?");

        let prompts = backend.prompts();
        assert!(prompts[1].contains("null obj how"));
        assert!(!prompts[1].contains("Use a Null."));

        let session = relay.session(&alice).await;
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].content, "How do I create a null object?");
        assert_eq!(session.history[1].content, "Use a Null.");
    }

    #[tokio::test]
    async fn stored_history_stays_within_budget() {
        let mut config = config();
        config.context.max_chars = 100;
        let backend = ScriptedBackend::new(echo_script(50));
        let relay = Relay::with_pool(&config, BackendPool::new().add(backend));
        let alice = UserId::from("alice");

        for i in 0..50 {
            let reply = relay.handle(Query::new("alice", format!("{:x>40}", i))).await;
            assert!(reply.is_generated());
            let session = relay.session(&alice).await;
            assert!(session.history_chars() <= 100, "exchange {i}: {}", session.history_chars());
        }

        let session = relay.session(&alice).await;
        assert_eq!(session.history.len(), 2);
        assert_eq!(session.history[0].content, format!("{:x>40}", 49));
        assert_eq!(session.history[1].content, format!("{:0>40}", 49));
    }

    #[tokio::test]
    async fn rephrase_under_truncate_keeps_the_question() {
        let mut config = config();
        config.context.max_chars = 60;
        config.context.oversize_turn = chatrelay_config::OversizePolicy::Truncate;
        let backend = ScriptedBackend::new(vec![
            Ok("Use a Null.".into()),
            Ok("How do I create a null object?".into()),
        ]);
        let relay = Relay::with_pool(&config, BackendPool::new().add(backend.clone()));
        let alice = UserId::from("alice");

        relay.handle(Query::new("alice", "null obj how")).await;
        relay.rephrase(&alice).await;

        let prompt = &backend.prompts()[1];
        assert!(prompt.contains("User: null obj how\n"), "{prompt}");
        assert!(prompt.contains(crate::context::prompt::REPHRASE_INSTRUCTION));
    }

    #[tokio::test]
    async fn audit_records_question_answer_and_language() {
        let backend = ScriptedBackend::new(vec![
            Ok("كائن فارغ".into()),
            Ok("ما هو الكائن الفارغ؟".into()),
        ]);
        let relay = relay(backend);
        let alice = UserId::from("alice");

        relay.handle(Query::new("alice", "null?").with_language("ar")).await;
        relay.rephrase(&alice).await;

        let events: Vec<AuditEvent> = relay
            .audit()
            .entries_for("alice")
            .into_iter()
            .map(|e| e.event)
            .collect();
        assert!(events.contains(&AuditEvent::Answered {
            backend: 0,
            language: "ar".into(),
            question: "null?".into(),
            answer: "كائن فارغ".into(),
        }));
        assert!(events.contains(&AuditEvent::Rephrased {
            backend: 0,
            language: "ar".into(),
            question: "null?".into(),
            answer: "ما هو الكائن الفارغ؟".into(),
        }));
    }

    #[tokio::test]
    async fn reset_replies_ready_and_clears() {
        let backend = ScriptedBackend::new(vec![Ok("a".into())]);
        let relay = relay(backend);
        let alice = UserId::from("alice");

        relay.handle(Query::new("alice", "q")).await;
        let reply = relay.reset(&alice).await;
        assert_eq!(reply.code, Some(MessageId::Ready));
        assert!(relay.session(&alice).await.history.is_empty());
    }

    #[tokio::test]
    async fn set_language_validates_code() {
        let relay = relay(ScriptedBackend::new(vec![]));
        let alice = UserId::from("alice");

        let bad = relay.set_language(&alice, "xx").await;
        assert_eq!(bad.code, Some(MessageId::InvalidLanguage));

        let good = relay.set_language(&alice, "AR").await;
        assert_eq!(good.code, Some(MessageId::Ready));
        assert_eq!(good.text, StaticCatalog::new().lookup(MessageId::Ready, Language::Ar));
        assert_eq!(relay.session(&alice).await.language, Language::Ar);
    }

    #[tokio::test]
    async fn every_operation_is_authorized() {
        let relay = relay(ScriptedBackend::new(vec![]));
        let mallory = UserId::from("mallory");

        assert_eq!(relay.reset(&mallory).await.code, Some(MessageId::Blocked));
        assert_eq!(relay.rephrase(&mallory).await.code, Some(MessageId::Blocked));
        assert_eq!(relay.set_language(&mallory, "ar").await.code, Some(MessageId::Blocked));
        assert!(!relay.sessions().contains(&mallory).await);
        assert_eq!(relay.audit().entries_by_outcome(&AuditOutcome::Denied).len(), 3);
    }

    #[tokio::test]
    async fn custom_catalog_is_used() {
        let catalog = StaticCatalog::new().with_override(Language::En, MessageId::Blocked, "Go away.");
        let relay = relay(ScriptedBackend::new(vec![])).with_catalog(Arc::new(catalog));
        let reply = relay.handle(Query::new("mallory", "hi")).await;
        assert_eq!(reply.text, "Go away.");
    }
}
