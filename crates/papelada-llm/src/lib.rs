//! Papelada Inference Backends
//!
//! Implementations of the `InferenceBackend` trait from `papelada-domain`.
//!
//! # Architecture
//!
//! The extraction core only ever calls `infer(prompt) -> text`. Transport
//! retries (rate limits, 5xx) happen here; semantic retries (malformed JSON,
//! failed validation) happen in the core.
//!
//! # Backends
//!
//! - `MockBackend`: Deterministic scripted backend for testing
//! - `OllamaBackend`: Local Ollama API integration
//! - `OpenAiBackend`: OpenAI-compatible chat completions in JSON mode
//!
//! # Examples
//!
//! ```
//! use papelada_llm::MockBackend;
//! use papelada_domain::traits::InferenceBackend;
//!
//! let backend = MockBackend::new("{}");
//! backend.add_response("pattern", r#"{"nome": {"pattern": "Nome:\\s*(\\w+)"}}"#);
//!
//! assert_eq!(backend.infer("direct request").unwrap(), "{}");
//! assert!(backend.infer("pattern request").unwrap().contains("Nome"));
//! ```

#![warn(missing_docs)]

pub mod ollama;
pub mod openai;

use papelada_domain::traits::InferenceBackend;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;

pub use ollama::OllamaBackend;
pub use openai::OpenAiBackend;

/// Errors that can occur during backend operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response envelope from the backend
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded
    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Backend misconfiguration (missing key, bad URL)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// Drive an async transport call from the synchronous `infer` entry point
///
/// Inside a tokio runtime this must run on a blocking-pool thread
/// (`spawn_blocking`), which is how the extraction core calls backends.
pub(crate) fn block_on<F: Future>(fut: F) -> Result<F::Output, LlmError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => Ok(handle.block_on(fut)),
        Err(_) => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|e| LlmError::Other(format!("Failed to start runtime: {}", e)))?;
            Ok(runtime.block_on(fut))
        }
    }
}

/// Scripted reply of the mock backend
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    /// Return this text
    Text(String),
    /// Fail with this message
    Error(String),
    /// Sleep, then return this text (exercises timeouts)
    Delayed(Duration, String),
}

#[derive(Debug)]
struct MockRule {
    needle: String,
    replies: VecDeque<MockReply>,
}

/// Mock backend for deterministic testing
///
/// Replies are selected by the first registered needle contained in the
/// prompt. Registering several replies for the same needle plays them in
/// order; the last one repeats. Prompts matching no needle get the default
/// reply.
///
/// # Examples
///
/// ```
/// use papelada_llm::MockBackend;
/// use papelada_domain::traits::InferenceBackend;
///
/// let backend = MockBackend::new("default");
/// backend.add_response("alpha", "first");
/// backend.add_response("alpha", "second");
///
/// assert_eq!(backend.infer("alpha?").unwrap(), "first");
/// assert_eq!(backend.infer("alpha?").unwrap(), "second");
/// assert_eq!(backend.infer("alpha?").unwrap(), "second");
/// assert_eq!(backend.infer("other").unwrap(), "default");
/// assert_eq!(backend.call_count(), 4);
/// ```
#[derive(Debug, Clone)]
pub struct MockBackend {
    default_reply: MockReply,
    rules: Arc<Mutex<Vec<MockRule>>>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl MockBackend {
    /// Create a MockBackend with a fixed response for unmatched prompts
    pub fn new(response: impl Into<String>) -> Self {
        Self::with_default(MockReply::Text(response.into()))
    }

    /// Create a MockBackend that fails every unmatched prompt
    pub fn failing(message: impl Into<String>) -> Self {
        Self::with_default(MockReply::Error(message.into()))
    }

    fn with_default(default_reply: MockReply) -> Self {
        Self {
            default_reply,
            rules: Arc::new(Mutex::new(Vec::new())),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Queue a reply for prompts containing `needle`
    pub fn add_reply(&self, needle: impl Into<String>, reply: MockReply) {
        let needle = needle.into();
        let mut rules = lock(&self.rules);
        match rules.iter_mut().find(|r| r.needle == needle) {
            Some(rule) => rule.replies.push_back(reply),
            None => rules.push(MockRule {
                needle,
                replies: VecDeque::from([reply]),
            }),
        }
    }

    /// Queue a text response for prompts containing `needle`
    pub fn add_response(&self, needle: impl Into<String>, response: impl Into<String>) {
        self.add_reply(needle, MockReply::Text(response.into()));
    }

    /// Queue an error for prompts containing `needle`
    pub fn add_error(&self, needle: impl Into<String>) {
        self.add_reply(needle, MockReply::Error("Mock error".to_string()));
    }

    /// Queue a delayed response for prompts containing `needle`
    pub fn add_delayed(&self, needle: impl Into<String>, delay: Duration, response: impl Into<String>) {
        self.add_reply(needle, MockReply::Delayed(delay, response.into()));
    }

    /// Number of `infer` calls so far
    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    /// Number of calls whose prompt contained `needle`
    pub fn calls_matching(&self, needle: &str) -> usize {
        lock(&self.prompts)
            .iter()
            .filter(|p| p.contains(needle))
            .count()
    }

    /// Every prompt received, in call order
    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    /// Forget recorded prompts
    pub fn reset_call_count(&self) {
        lock(&self.prompts).clear();
    }

    fn next_reply(&self, prompt: &str) -> MockReply {
        let mut rules = lock(&self.rules);
        match rules.iter_mut().find(|r| prompt.contains(&r.needle)) {
            Some(rule) if rule.replies.len() > 1 => rule
                .replies
                .pop_front()
                .unwrap_or_else(|| self.default_reply.clone()),
            Some(rule) => rule
                .replies
                .front()
                .cloned()
                .unwrap_or_else(|| self.default_reply.clone()),
            None => self.default_reply.clone(),
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new("{}")
    }
}

impl InferenceBackend for MockBackend {
    type Error = LlmError;

    fn infer(&self, prompt: &str) -> Result<String, Self::Error> {
        lock(&self.prompts).push(prompt.to_string());

        match self.next_reply(prompt) {
            MockReply::Text(text) => Ok(text),
            MockReply::Error(message) => Err(LlmError::Other(message)),
            MockReply::Delayed(delay, text) => {
                std::thread::sleep(delay);
                Ok(text)
            }
        }
    }

    fn model_name(&self) -> &str {
        "mock"
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_backend_default() {
        let backend = MockBackend::new("Test response");
        assert_eq!(backend.infer("any prompt").unwrap(), "Test response");
    }

    #[test]
    fn test_mock_backend_needle_responses() {
        let backend = MockBackend::default();
        backend.add_response("hello", "world");
        backend.add_response("foo", "bar");

        assert_eq!(backend.infer("say hello").unwrap(), "world");
        assert_eq!(backend.infer("foo!").unwrap(), "bar");
        assert_eq!(backend.infer("unknown").unwrap(), "{}");
    }

    #[test]
    fn test_mock_backend_sequence_then_sticky() {
        let backend = MockBackend::default();
        backend.add_response("x", "1");
        backend.add_error("x");
        backend.add_response("x", "3");

        assert_eq!(backend.infer("x").unwrap(), "1");
        assert!(backend.infer("x").is_err());
        assert_eq!(backend.infer("x").unwrap(), "3");
        assert_eq!(backend.infer("x").unwrap(), "3");
    }

    #[test]
    fn test_mock_backend_call_count() {
        let backend = MockBackend::new("test");
        assert_eq!(backend.call_count(), 0);

        backend.infer("prompt1").unwrap();
        backend.infer("prompt2").unwrap();
        assert_eq!(backend.call_count(), 2);
        assert_eq!(backend.calls_matching("prompt1"), 1);

        backend.reset_call_count();
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_mock_backend_failing_default() {
        let backend = MockBackend::failing("down");
        let result = backend.infer("anything");
        assert!(matches!(result, Err(LlmError::Other(msg)) if msg == "down"));
    }

    #[test]
    fn test_mock_backend_clone_shares_state() {
        let backend1 = MockBackend::new("test");
        let backend2 = backend1.clone();

        backend1.infer("test").unwrap();

        assert_eq!(backend1.call_count(), 1);
        assert_eq!(backend2.call_count(), 1);
    }

    #[test]
    fn test_block_on_outside_runtime() {
        let value = block_on(async { 41 + 1 }).unwrap();
        assert_eq!(value, 42);
    }
}
