//! Error types for the extraction clients

use thiserror::Error;

/// Errors that can occur during a backend round trip
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExtractorError {
    /// Inference backend error (transport exhausted, model missing, ...)
    #[error("Backend error: {0}")]
    Backend(String),

    /// Backend call exceeded the configured timeout
    #[error("Backend call timed out after {0} ms")]
    Timeout(u64),

    /// Response parsed, but not into the expected shape
    #[error("Invalid response format: {0}")]
    InvalidFormat(String),

    /// Response is not JSON
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ExtractorError {
    /// Whether the backend never produced a response (as opposed to a bad one)
    pub fn is_backend_failure(&self) -> bool {
        matches!(self, ExtractorError::Backend(_) | ExtractorError::Timeout(_))
    }

    /// Whether the call timed out
    pub fn is_timeout(&self) -> bool {
        matches!(self, ExtractorError::Timeout(_))
    }
}

impl From<serde_json::Error> for ExtractorError {
    fn from(e: serde_json::Error) -> Self {
        ExtractorError::JsonParse(e.to_string())
    }
}
