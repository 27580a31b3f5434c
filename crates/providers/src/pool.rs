//! Backend pool — ordered, index-addressed backends with per-call timeouts.
//!
//! The pool performs exactly one attempt per `invoke()` and classifies the
//! outcome. It never retries and never picks a different backend: the
//! executor decides both.

use std::sync::Arc;
use std::time::Duration;

use chatrelay_config::{AppConfig, BackendKind};
use chatrelay_core::{Backend, BackendError};
use tracing::{debug, info, warn};

use crate::huggingface::HuggingFaceBackend;
use crate::openai_compat::OpenAiCompatBackend;

/// Ordered collection of interchangeable backends.
#[derive(Default)]
pub struct BackendPool {
    backends: Vec<Arc<dyn Backend>>,
}

impl BackendPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a backend; its index is the pool length before the call.
    pub fn add(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Number of backends in the pool.
    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Name of the backend at `index`, if any.
    pub fn name(&self, index: usize) -> Option<&str> {
        self.backends.get(index).map(|b| b.name())
    }

    /// Make one attempt against backend `index`, bounded by `timeout`.
    ///
    /// An elapsed timeout drops the in-flight request locally; the remote
    /// side may still finish. It is reported as a transient failure.
    pub async fn invoke(
        &self,
        index: usize,
        prompt: &str,
        timeout: Duration,
    ) -> Result<String, BackendError> {
        let Some(backend) = self.backends.get(index) else {
            return Err(BackendError::Permanent(format!(
                "backend index {index} out of range (pool size {})",
                self.backends.len()
            )));
        };

        debug!(backend = %backend.name(), index, timeout_ms = timeout.as_millis() as u64, "Invoking backend");

        match tokio::time::timeout(timeout, backend.generate(prompt)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => {
                warn!(backend = %backend.name(), index, error = %e, "Backend call failed");
                Err(e)
            }
            Err(_) => {
                warn!(
                    backend = %backend.name(),
                    index,
                    timeout_ms = timeout.as_millis() as u64,
                    "Backend call timed out"
                );
                Err(BackendError::timed_out(backend.name(), timeout))
            }
        }
    }

    /// Health of every backend, in pool order.
    pub async fn health(&self) -> Vec<(String, bool)> {
        let mut report = Vec::with_capacity(self.backends.len());
        for backend in &self.backends {
            let healthy = matches!(backend.health_check().await, Ok(true));
            report.push((backend.name().to_string(), healthy));
        }
        report
    }
}

/// Build the pool from configuration, preserving the configured order.
pub fn build_from_config(config: &AppConfig) -> BackendPool {
    let mut pool = BackendPool::new();

    for backend_config in &config.backends {
        let api_key = backend_config.api_key.clone().unwrap_or_default();
        if api_key.is_empty() {
            warn!(backend = %backend_config.name, "Backend has no API key configured");
        }

        let backend: Arc<dyn Backend> = match backend_config.kind {
            BackendKind::Huggingface => Arc::new(
                HuggingFaceBackend::new(
                    &backend_config.name,
                    &backend_config.api_url,
                    api_key,
                    &backend_config.model,
                )
                .with_max_new_tokens(backend_config.max_new_tokens),
            ),
            BackendKind::OpenaiCompat => Arc::new(
                OpenAiCompatBackend::new(
                    &backend_config.name,
                    &backend_config.api_url,
                    api_key,
                    &backend_config.model,
                )
                .with_max_tokens(backend_config.max_new_tokens),
            ),
        };

        info!(
            backend = %backend_config.name,
            kind = ?backend_config.kind,
            index = pool.len(),
            "Registered backend"
        );
        pool = pool.add(backend);
    }

    pool
}
