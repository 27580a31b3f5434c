//! Shared HTTP plumbing: client construction and failure classification.

use chatrelay_core::BackendError;
use tracing::warn;

/// Build the HTTP client shared by a backend.
///
/// No client-level timeout: the pool bounds every attempt itself.
pub(crate) fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Classify an error raised before a response arrived.
pub(crate) fn send_error(backend: &str, err: reqwest::Error) -> BackendError {
    if err.is_builder() {
        BackendError::Permanent(format!("backend '{backend}' request is invalid: {err}"))
    } else {
        BackendError::Transient(format!("backend '{backend}' unreachable: {err}"))
    }
}

/// Pass successful responses through; classify everything else by status.
pub(crate) async fn check_status(
    backend: &str,
    response: reqwest::Response,
) -> Result<reqwest::Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    warn!(backend, status = status.as_u16(), body = %body, "Backend returned error");
    Err(BackendError::from_status(backend, status.as_u16(), &body))
}

/// Undecodable bodies are treated as a flaky server, not a config error.
pub(crate) fn decode_error(backend: &str, err: impl std::fmt::Display) -> BackendError {
    BackendError::Transient(format!("backend '{backend}' sent an unreadable response: {err}"))
}
