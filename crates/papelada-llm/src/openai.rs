//! OpenAI-compatible Backend
//!
//! Sends each prompt as a single user message to a `/chat/completions`
//! endpoint with `response_format = json_object`. Works with the OpenAI API
//! and compatible gateways via [`OpenAiBackend::with_base_url`].

use crate::{block_on, LlmError};
use papelada_domain::traits::InferenceBackend;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default bound for one call, transport retries included (60 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Default number of transport attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Chat-completions backend
pub struct OpenAiBackend {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    max_retries: u32,
    timeout: Duration,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

impl OpenAiBackend {
    /// Create a backend for `model` authenticated with `api_key`
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(LlmError::Config("API key must not be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| LlmError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key,
            model: model.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Create from the `OPENAI_API_KEY` environment variable
    pub fn from_env(model: impl Into<String>) -> Result<Self, LlmError> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::Config("OPENAI_API_KEY not set".to_string()))?;
        Self::new(api_key, model)
    }

    /// Point at a compatible gateway
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
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

    /// Run one chat completion and return the message content
    pub async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            match self
                .client
                .post(&url)
                .timeout(self.timeout)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await
            {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let parsed = response.json::<ChatResponse>().await.map_err(|e| {
                            LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                        })?;
                        let content = parsed
                            .choices
                            .into_iter()
                            .next()
                            .and_then(|c| c.message.content)
                            .ok_or_else(|| {
                                LlmError::InvalidResponse("Response has no message content".to_string())
                            })?;
                        debug!("Chat completion length: {} chars", content.len());
                        return Ok(content);
                    } else if status == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(self.model.clone()));
                    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        last_error = Some(LlmError::RateLimitExceeded);
                    } else if status.is_client_error() {
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        return Err(LlmError::Communication(format!(
                            "HTTP {}: {}",
                            status, error_text
                        )));
                    } else {
                        last_error = Some(LlmError::Communication(format!("HTTP {}", status)));
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                warn!("Chat completion failed (attempt {}), retrying in {:?}", attempts, delay);
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }
}

impl InferenceBackend for OpenAiBackend {
    type Error = LlmError;

    fn infer(&self, prompt: &str) -> Result<String, Self::Error> {
        block_on(tokio::time::timeout(self.timeout, self.complete(prompt)))?.map_err(|_| {
            LlmError::Communication(format!("No response within {:?}", self.timeout))
        })?
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
