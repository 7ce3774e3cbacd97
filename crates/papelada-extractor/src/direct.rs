//! Direct value extraction

use crate::backend::BackendClient;
use crate::config::ExtractorConfig;
use crate::parser::parse_direct_response;
use crate::prompt::DirectPromptBuilder;
use crate::types::DirectOutcome;
use papelada_domain::traits::InferenceBackend;
use papelada_domain::{DocumentText, ExtractionCandidate, FieldSpec};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Asks the backend for every field's value in one request
pub struct DirectExtractor<L> {
    client: BackendClient<L>,
    config: ExtractorConfig,
}

impl<L> DirectExtractor<L>
where
    L: InferenceBackend + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    /// Create a new direct extractor
    pub fn new(client: BackendClient<L>, config: ExtractorConfig) -> Self {
        Self { client, config }
    }

    /// Extract `fields` from `document`
    ///
    /// Never fails: a malformed, timed-out or failed call is retried up to
    /// the configured attempt budget with the same prompt, after which every
    /// field comes back absent with low confidence.
    pub async fn extract(&self, fields: &[&FieldSpec], document: &DocumentText) -> DirectOutcome {
        if fields.is_empty() {
            return DirectOutcome::empty();
        }

        let start = Instant::now();
        let prompt = DirectPromptBuilder::new(document.raw_text())
            .with_fields(fields.iter().copied())
            .with_max_text_length(self.config.max_text_length)
            .build();

        let mut outcome = DirectOutcome::empty();
        let mut all_backend_failures = true;

        while outcome.attempts < self.config.direct_attempts {
            outcome.attempts += 1;

            let result = match self.client.infer(&prompt).await {
                Ok(response) => {
                    all_backend_failures = false;
                    parse_direct_response(&response, fields)
                }
                Err(e) => {
                    if e.is_timeout() {
                        outcome.timeouts += 1;
                    }
                    Err(e)
                }
            };

            match result {
                Ok(candidates) => {
                    debug!(
                        "Direct extraction for '{}': {} of {} fields with a value",
                        document.id(),
                        candidates.iter().filter(|c| c.has_value()).count(),
                        candidates.len()
                    );
                    outcome.candidates = candidates;
                    outcome.elapsed_ms = start.elapsed().as_millis() as u64;
                    return outcome;
                }
                Err(e) => {
                    warn!(
                        "Direct extraction attempt {} for '{}' failed: {}",
                        outcome.attempts,
                        document.id(),
                        e
                    );
                    outcome.failures.push(e.to_string());
                }
            }
        }

        info!(
            "Direct extraction for '{}' gave up after {} attempts",
            document.id(),
            outcome.attempts
        );
        outcome.candidates = fields
            .iter()
            .map(|f| ExtractionCandidate::absent(&f.name))
            .collect();
        outcome.backend_failed = all_backend_failures;
        outcome.elapsed_ms = start.elapsed().as_millis() as u64;
        outcome
    }
}
