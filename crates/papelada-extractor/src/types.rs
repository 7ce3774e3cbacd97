//! Request and response types for the extraction clients

use papelada_domain::{ExtractionCandidate, FieldSpec, RejectedPattern};
use serde::{Deserialize, Serialize};

/// Result of the direct strategy for one document
///
/// Always carries one candidate per requested field, in request order, even
/// when every attempt failed.
#[derive(Debug, Clone, PartialEq)]
pub struct DirectOutcome {
    /// One candidate per requested field
    pub candidates: Vec<ExtractionCandidate>,

    /// Backend calls made (first call plus retries)
    pub attempts: u32,

    /// Calls that timed out
    pub timeouts: u32,

    /// One message per failed attempt
    pub failures: Vec<String>,

    /// Every attempt failed without the backend producing a response
    pub backend_failed: bool,

    /// Wall time spent, including retries (milliseconds)
    pub elapsed_ms: u64,
}

impl DirectOutcome {
    /// Outcome for an empty request: no call was made
    pub fn empty() -> Self {
        Self {
            candidates: Vec::new(),
            attempts: 0,
            timeouts: 0,
            failures: Vec::new(),
            backend_failed: false,
            elapsed_ms: 0,
        }
    }

    /// Whether the last attempt produced a parseable response
    pub fn succeeded(&self) -> bool {
        self.attempts > 0 && (self.failures.len() as u32) < self.attempts
    }

    /// Candidate for `field_name`
    pub fn candidate(&self, field_name: &str) -> Option<&ExtractionCandidate> {
        self.candidates.iter().find(|c| c.field_name == field_name)
    }
}

/// One field to synthesize a pattern for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternTarget {
    /// Field name
    pub field_name: String,

    /// Field description from the schema
    pub description: String,

    /// Value the pattern must reproduce on the document
    pub reference: String,

    /// Earlier attempts that failed validation, fed back to the backend
    #[serde(default)]
    pub feedback: Vec<RejectedPattern>,
}

impl PatternTarget {
    /// Target for a schema field carrying a reference value
    pub fn from_field(field: &FieldSpec) -> Option<Self> {
        field
            .reference()
            .map(|reference| Self::new(&field.name, &field.description, reference))
    }

    /// Target with an explicit reference value
    pub fn new(
        field_name: impl Into<String>,
        description: impl Into<String>,
        reference: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            description: description.into(),
            reference: reference.into(),
            feedback: Vec::new(),
        }
    }

    /// Attach rejected patterns as feedback
    pub fn with_feedback(mut self, feedback: Vec<RejectedPattern>) -> Self {
        self.feedback = feedback;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_requires_reference() {
        let plain = FieldSpec::new("nome", "Nome completo");
        assert!(PatternTarget::from_field(&plain).is_none());

        let referenced = FieldSpec::new("inscricao", "Número de inscrição").with_reference("101943");
        let target = PatternTarget::from_field(&referenced).unwrap();
        assert_eq!(target.reference, "101943");
        assert!(target.feedback.is_empty());
    }

    #[test]
    fn test_outcome_success_flag() {
        let mut outcome = DirectOutcome::empty();
        assert!(!outcome.succeeded());

        outcome.attempts = 2;
        outcome.failures.push("malformed".to_string());
        assert!(outcome.succeeded());

        outcome.failures.push("malformed".to_string());
        assert!(!outcome.succeeded());
    }
}
