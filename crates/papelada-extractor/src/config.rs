//! Configuration for the extraction clients

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration shared by the direct extractor and the pattern synthesizer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Document text longer than this (characters) is clipped in prompts
    pub max_text_length: usize,

    /// Maximum time for a single backend call (milliseconds)
    pub request_timeout_ms: u64,

    /// Attempts for the direct request (the first call plus retries)
    pub direct_attempts: u32,

    /// Backend requests allowed in flight across the whole batch
    pub max_concurrent_requests: usize,
}

impl ExtractorConfig {
    /// Get the request timeout as a Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_text_length == 0 {
            return Err("max_text_length must be greater than 0".to_string());
        }
        if self.request_timeout_ms == 0 {
            return Err("request_timeout_ms must be greater than 0".to_string());
        }
        if self.direct_attempts == 0 {
            return Err("direct_attempts must be at least 1".to_string());
        }
        if self.max_concurrent_requests == 0 {
            return Err("max_concurrent_requests must be greater than 0".to_string());
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            max_text_length: 50_000,
            request_timeout_ms: 20_000,
            direct_attempts: 2,
            max_concurrent_requests: 4,
        }
    }
}

impl ExtractorConfig {
    /// Aggressive preset: short timeouts, no direct retry, more parallel calls
    pub fn aggressive() -> Self {
        Self {
            max_text_length: 20_000,
            request_timeout_ms: 10_000,
            direct_attempts: 1,
            max_concurrent_requests: 8,
        }
    }

    /// Lenient preset: long timeouts for slow local models
    pub fn lenient() -> Self {
        Self {
            max_text_length: 100_000,
            request_timeout_ms: 120_000,
            direct_attempts: 2,
            max_concurrent_requests: 2,
        }
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
