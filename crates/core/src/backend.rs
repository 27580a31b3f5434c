//! Backend trait — the abstraction over text generation endpoints.
//!
//! A Backend turns one prompt into one continuation. It performs exactly one
//! attempt and classifies any failure as transient or permanent; retrying,
//! timeouts and failover are the caller's concern.
//!
//! Implementations: OpenAI-compatible chat endpoints, Hugging Face inference.

use async_trait::async_trait;

use crate::error::BackendError;

/// The core Backend trait.
///
/// The relay calls `generate()` without knowing which endpoint sits behind
/// it. Implementations must be cancel-safe: the pool drops the future when
/// the per-attempt timeout elapses.
#[async_trait]
pub trait Backend: Send + Sync {
    /// A human-readable name for this backend (e.g., "mixtral", "openrouter").
    fn name(&self) -> &str;

    /// Generate continuation text for `prompt`.
    async fn generate(&self, prompt: &str) -> std::result::Result<String, BackendError>;

    /// Health check — can we reach the backend?
    async fn health_check(&self) -> std::result::Result<bool, BackendError> {
        Ok(true)
    }
}
