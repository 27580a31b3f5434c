//! Error types for the ChatRelay domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Backend failures are classified once, at the backend boundary, and
//! normalized into [`RelayError`] by the retry executor. Nothing above the
//! executor sees a raw network error.

use thiserror::Error;

/// Outcome of a single failed backend call.
///
/// `Transient` covers timeouts and server-side or availability failures.
/// `Permanent` covers authentication and configuration failures that
/// retrying cannot fix.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("transient backend failure: {0}")]
    Transient(String),

    #[error("permanent backend failure: {0}")]
    Permanent(String),
}

impl BackendError {
    /// Build the error reported when an attempt exceeds its time budget.
    pub fn timed_out(backend: &str, timeout: std::time::Duration) -> Self {
        Self::Transient(format!(
            "backend '{backend}' timed out after {}ms",
            timeout.as_millis()
        ))
    }

    /// Classify an HTTP status code returned by a backend.
    ///
    /// 408, 429 and every 5xx are transient; remaining 4xx codes mean the
    /// request or its credentials are wrong, which retrying will not fix.
    pub fn from_status(backend: &str, status: u16, body: &str) -> Self {
        let message = format!("backend '{backend}' returned HTTP {status}: {body}");
        match status {
            408 | 429 | 500..=599 => Self::Transient(message),
            400..=499 => Self::Permanent(message),
            _ => Self::Transient(message),
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Failure of a whole retry/failover run, as seen by the orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Every attempt against the active backend failed transiently.
    /// `next_backend` is the index the session was advanced to.
    #[error("backend {backend} exhausted after {attempts} attempts (next: {next_backend})")]
    Exhausted {
        backend: usize,
        attempts: u32,
        next_backend: usize,
    },

    /// The active backend reported a failure retrying cannot fix.
    #[error("backend {backend} failed permanently: {reason}")]
    Permanent { backend: usize, reason: String },
}
