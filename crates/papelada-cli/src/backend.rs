//! Inference backend selection.

use crate::config::{BackendKind, BackendSettings};
use crate::error::Result;
use papelada_domain::traits::InferenceBackend;
use papelada_llm::{LlmError, OllamaBackend, OpenAiBackend};
use std::time::Duration;

/// Backend chosen at runtime from configuration.
pub enum AnyBackend {
    /// Local Ollama server
    Ollama(OllamaBackend),
    /// OpenAI-compatible API
    OpenAi(OpenAiBackend),
}

impl AnyBackend {
    /// Build the configured backend.
    ///
    /// `request_timeout` bounds each call, transport retries included, so a
    /// request the pipeline stopped waiting for does not keep running. The
    /// OpenAI backend reads its key from `OPENAI_API_KEY`.
    pub fn from_settings(settings: &BackendSettings, request_timeout: Duration) -> Result<Self> {
        let backend = match settings.kind {
            BackendKind::Ollama => {
                let backend = match &settings.url {
                    Some(url) => OllamaBackend::new(url, &settings.model)?,
                    None => OllamaBackend::default_endpoint(&settings.model)?,
                };
                AnyBackend::Ollama(
                    backend
                        .with_max_retries(settings.max_retries)
                        .with_timeout(request_timeout),
                )
            }
            BackendKind::Openai => {
                let mut backend = OpenAiBackend::from_env(&settings.model)?
                    .with_max_retries(settings.max_retries)
                    .with_timeout(request_timeout);
                if let Some(url) = &settings.url {
                    backend = backend.with_base_url(url);
                }
                AnyBackend::OpenAi(backend)
            }
        };
        Ok(backend)
    }
}

impl InferenceBackend for AnyBackend {
    type Error = LlmError;

    fn infer(&self, prompt: &str) -> std::result::Result<String, Self::Error> {
        match self {
            AnyBackend::Ollama(backend) => backend.infer(prompt),
            AnyBackend::OpenAi(backend) => backend.infer(prompt),
        }
    }

    fn model_name(&self) -> &str {
        match self {
            AnyBackend::Ollama(backend) => backend.model_name(),
            AnyBackend::OpenAi(backend) => backend.model_name(),
        }
    }
}
