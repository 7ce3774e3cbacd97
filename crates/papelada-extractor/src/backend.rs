//! Shared access to the inference backend
//!
//! Every request from every document goes through one [`BackendClient`], so
//! the semaphore it holds is the batch-wide concurrency budget. A permit
//! travels with the blocking call and is dropped only when the backend
//! returns. A timed-out or cancelled caller stops waiting, but the call it
//! abandoned keeps its permit until it finishes, so the budget always bounds
//! the calls actually in flight and a retry never overlaps its predecessor
//! when the budget is one.

use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use papelada_domain::traits::InferenceBackend;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tracing::debug;

/// Rate-limited, timed access to an [`InferenceBackend`]
pub struct BackendClient<L> {
    backend: Arc<L>,
    permits: Arc<Semaphore>,
    request_timeout: Duration,
}

impl<L> Clone for BackendClient<L> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            permits: Arc::clone(&self.permits),
            request_timeout: self.request_timeout,
        }
    }
}

impl<L> BackendClient<L>
where
    L: InferenceBackend + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    /// Wrap a backend using the limits from `config`
    pub fn new(backend: L, config: &ExtractorConfig) -> Self {
        Self::from_shared(
            Arc::new(backend),
            config.max_concurrent_requests,
            config.request_timeout(),
        )
    }

    /// Wrap an already shared backend
    pub fn from_shared(backend: Arc<L>, max_concurrent: usize, request_timeout: Duration) -> Self {
        Self {
            backend,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            request_timeout,
        }
    }

    /// Name of the underlying model
    pub fn model_name(&self) -> &str {
        self.backend.model_name()
    }

    /// Permits currently free
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }

    /// Run one prompt through the backend
    ///
    /// Waiting for a permit does not count towards the timeout; the call
    /// itself does.
    pub async fn infer(&self, prompt: &str) -> Result<String, ExtractorError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|e| ExtractorError::Backend(format!("Request budget closed: {}", e)))?;

        debug!("Prompt length: {} chars", prompt.len());

        let backend = Arc::clone(&self.backend);
        let prompt = prompt.to_string();

        // Backends are synchronous; keep them off the async workers
        let call = tokio::task::spawn_blocking(move || {
            let result = backend
                .infer(&prompt)
                .map_err(|e| ExtractorError::Backend(e.to_string()));
            drop(permit);
            result
        });

        let response = timeout(self.request_timeout, call)
            .await
            .map_err(|_| ExtractorError::Timeout(self.request_timeout.as_millis() as u64))?
            .map_err(|e| ExtractorError::Backend(format!("Task join error: {}", e)))??;

        debug!("Response length: {} chars", response.len());
        Ok(response)
    }
}
