//! Ollama Backend Implementation
//!
//! Runs prompts against a local Ollama instance.
//!
//! # Features
//!
//! - Async HTTP communication with the Ollama API
//! - JSON output mode (`"format": "json"`), since every prompt asks for one object
//! - Retry logic with exponential backoff on transport failures
//! - Timeout handling
//!
//! # Examples
//!
//! ```no_run
//! use papelada_llm::OllamaBackend;
//!
//! let backend = OllamaBackend::new("http://localhost:11434", "llama3.1")
//!     .expect("valid client")
//!     .with_max_retries(2);
//! ```

use crate::{block_on, LlmError};
use papelada_domain::traits::InferenceBackend;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default bound for one call, transport retries included (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of transport attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Ollama API backend for local inference
pub struct OllamaBackend {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    max_retries: u32,
    timeout: Duration,
}

/// Request body for the Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'a str,
}

/// Response from the Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

impl OllamaBackend {
    /// Create a new Ollama backend
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3.1", "qwen2.5")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Create a new Ollama backend on `http://localhost:11434`
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the maximum number of transport attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Bound one [`infer`](InferenceBackend::infer) call, retries included
    ///
    /// Also caps each HTTP request. Set it no longer than the caller's own
    /// request timeout so nothing outlives the caller's wait.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Generate text using the Ollama API
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Ollama is not running
    /// - Model is not available
    /// - Network communication fails
    /// - Response envelope is invalid
    pub async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);

        let request_body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: "json",
        };

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            match self.client.post(&url).timeout(self.timeout).json(&request_body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.json::<OllamaGenerateResponse>().await.map_err(|e| {
                            LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                        })?;
                        debug!("Ollama response length: {} chars", body.response.len());
                        return Ok(body.response);
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(self.model.clone()));
                    } else {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        last_error = Some(LlmError::Communication(format!(
                            "HTTP {}: {}",
                            status, error_text
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                warn!("Ollama request failed (attempt {}), retrying in {:?}", attempts, delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}

impl InferenceBackend for OllamaBackend {
    type Error = LlmError;

    fn infer(&self, prompt: &str) -> Result<String, Self::Error> {
        block_on(tokio::time::timeout(self.timeout, self.generate(prompt)))?.map_err(|_| {
            LlmError::Communication(format!("No response within {:?}", self.timeout))
        })?
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_backend_creation() {
        let backend = OllamaBackend::new("http://localhost:11434/", "llama3.1").unwrap();
        assert_eq!(backend.endpoint, "http://localhost:11434");
        assert_eq!(backend.model, "llama3.1");
        assert_eq!(backend.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_ollama_backend_default_endpoint() {
        let backend = OllamaBackend::default_endpoint("mistral").unwrap();
        assert_eq!(backend.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(backend.model_name(), "mistral");
    }

    #[test]
    fn test_ollama_backend_with_max_retries() {
        let backend = OllamaBackend::new("http://localhost:11434", "llama3.1")
            .unwrap()
            .with_max_retries(0);
        assert_eq!(backend.max_retries, 1);
    }

    #[tokio::test]
    async fn test_ollama_error_handling() {
        // Nothing listens on port 9; the request must fail, not hang
        let backend = OllamaBackend::new("http://127.0.0.1:9", "llama3.1")
            .unwrap()
            .with_max_retries(1);

        let result = backend.generate("test").await;
        assert!(matches!(result, Err(LlmError::Communication(_))));
    }

    #[test]
    fn test_timeout_bounds_retry_window() {
        // Three attempts would back off 1s + 2s without the bound
        let backend = OllamaBackend::new("http://127.0.0.1:9", "llama3.1")
            .unwrap()
            .with_max_retries(3)
            .with_timeout(Duration::from_millis(300));

        let start = std::time::Instant::now();
        let result = backend.infer("test");
        assert!(matches!(result, Err(LlmError::Communication(_))));
        assert!(start.elapsed() < Duration::from_secs(1));
    }
}
