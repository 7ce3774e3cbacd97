//! Pattern synthesis requests

use crate::backend::BackendClient;
use crate::config::ExtractorConfig;
use crate::error::ExtractorError;
use crate::parser::parse_pattern_response;
use crate::prompt::PatternPromptBuilder;
use crate::types::PatternTarget;
use papelada_domain::traits::InferenceBackend;
use papelada_domain::{DocumentText, PatternCandidate};
use std::collections::HashMap;
use tracing::debug;

/// Asks the backend for one extraction pattern per target field
///
/// Makes exactly one call per invocation. Retries and validation belong to
/// the caller, which knows the per-field attempt budget.
pub struct PatternSynthesizer<L> {
    client: BackendClient<L>,
    config: ExtractorConfig,
}

impl<L> PatternSynthesizer<L>
where
    L: InferenceBackend + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    /// Create a new synthesizer
    pub fn new(client: BackendClient<L>, config: ExtractorConfig) -> Self {
        Self { client, config }
    }

    /// Request patterns for `targets` on `document`
    ///
    /// Targets missing from the response are absent from the returned map.
    pub async fn synthesize(
        &self,
        targets: &[PatternTarget],
        document: &DocumentText,
    ) -> Result<HashMap<String, PatternCandidate>, ExtractorError> {
        if targets.is_empty() {
            return Ok(HashMap::new());
        }

        let prompt = PatternPromptBuilder::new(document.raw_text(), targets)
            .with_max_text_length(self.config.max_text_length)
            .build();

        let response = self.client.infer(&prompt).await?;
        let candidates = parse_pattern_response(&response, targets)?;

        debug!(
            "Synthesized {} of {} patterns for '{}'",
            candidates.len(),
            targets.len(),
            document.id()
        );
        Ok(candidates)
    }
}
