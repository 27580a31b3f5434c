//! Retry and failover executor.
//!
//! Runs one prompt against the session's active backend:
//!
//! - success returns the text immediately
//! - a permanent failure stops at once, no retry, no rotation
//! - a transient failure (including a per-attempt timeout) sleeps
//!   `base_delay * backoff_factor^(attempt - 1)` and tries again, up to
//!   `max_attempts`
//! - once attempts are exhausted the session is advanced to the next
//!   backend and the query fails; the next query starts on the new backend
//!
//! The executor only ever touches the session it is handed, so the caller's
//! per-user lock covers the whole run.

use std::sync::Arc;
use std::time::Duration;

use chatrelay_config::RetryConfig;
use chatrelay_core::{BackendError, RelayError, UserSession};
use chatrelay_providers::BackendPool;
use tracing::{debug, info, warn};

/// Upper bound on a single backoff sleep.
pub const MAX_DELAY: Duration = Duration::from_secs(300);

/// Attempt budget and timing for one execution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub per_attempt_timeout: Duration,
}

impl RetryPolicy {
    /// Delay slept after failed attempt `attempt` (1-based), capped at
    /// [`MAX_DELAY`].
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let secs = self.base_delay.as_secs_f64() * self.backoff_factor.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(MAX_DELAY)
            .min(MAX_DELAY)
    }

    /// Every delay a fully exhausted run sleeps, in order.
    pub fn delays(&self) -> Vec<Duration> {
        (1..self.max_attempts).map(|a| self.delay_for(a)).collect()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: config.base_delay(),
            backoff_factor: config.backoff_factor,
            per_attempt_timeout: config.per_attempt_timeout(),
        }
    }
}

pub struct Executor {
    pool: Arc<BackendPool>,
    policy: RetryPolicy,
}

impl Executor {
    pub fn new(pool: Arc<BackendPool>, policy: RetryPolicy) -> Self {
        Self { pool, policy }
    }

    pub fn pool(&self) -> &BackendPool {
        &self.pool
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `prompt` against the session's active backend.
    ///
    /// On exhaustion `session.active_backend` has already been advanced when
    /// this returns. Nothing else in the session is modified.
    pub async fn execute(&self, session: &mut UserSession, prompt: &str) -> Result<String, RelayError> {
        let backend = session.active_backend;
        let backend_name = self.pool.name(backend).unwrap_or("<none>").to_string();
        let max_attempts = self.policy.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            debug!(
                user_id = %session.user_id,
                backend = %backend_name,
                index = backend,
                attempt,
                max_attempts,
                "Backend attempt"
            );

            match self
                .pool
                .invoke(backend, prompt, self.policy.per_attempt_timeout)
                .await
            {
                Ok(text) => {
                    info!(
                        user_id = %session.user_id,
                        backend = %backend_name,
                        attempt,
                        reply_chars = text.chars().count(),
                        "Backend answered"
                    );
                    return Ok(text);
                }
                Err(BackendError::Permanent(reason)) => {
                    warn!(
                        user_id = %session.user_id,
                        backend = %backend_name,
                        attempt,
                        reason = %reason,
                        "Permanent backend failure, not retrying"
                    );
                    return Err(RelayError::Permanent { backend, reason });
                }
                Err(BackendError::Transient(reason)) => {
                    if attempt < max_attempts {
                        let delay = self.policy.delay_for(attempt);
                        warn!(
                            user_id = %session.user_id,
                            backend = %backend_name,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            reason = %reason,
                            "Transient backend failure, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(
                            user_id = %session.user_id,
                            backend = %backend_name,
                            attempt,
                            reason = %reason,
                            "Transient backend failure, attempts exhausted"
                        );
                    }
                }
            }
        }

        let next_backend = session.advance_backend(self.pool.len());
        warn!(
            user_id = %session.user_id,
            from = backend,
            to = next_backend,
            "Failing over to next backend"
        );

        Err(RelayError::Exhausted {
            backend,
            attempts: max_attempts,
            next_backend,
        })
    }
}
