//! Candidates produced by the two extraction strategies
//!
//! Candidates are transient: the orchestrator owns them for the duration of
//! one document and only the reconciled [`FieldResult`](crate::FieldResult)
//! survives.

use crate::Confidence;
use serde::{Deserialize, Serialize};

/// Value proposed by the direct extraction strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionCandidate {
    /// Field this candidate belongs to
    pub field_name: String,

    /// Extracted value, `None` when the backend reported absence
    pub value: Option<String>,

    /// Backend-reported confidence, translated to the canonical scale
    pub confidence: Confidence,
}

impl ExtractionCandidate {
    /// Candidate with a value
    pub fn new(field_name: impl Into<String>, value: Option<String>, confidence: Confidence) -> Self {
        let value = value.filter(|v| !v.trim().is_empty());
        Self {
            field_name: field_name.into(),
            value,
            confidence,
        }
    }

    /// `{value: null, confidence: low}` placeholder for missing or failed fields
    pub fn absent(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: None,
            confidence: Confidence::Low,
        }
    }

    /// Whether a non-blank value was extracted
    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.trim().is_empty())
    }
}

/// Extraction pattern proposed by the pattern synthesis strategy
///
/// Nothing in here is trusted until a validator has re-run `pattern` against
/// the source text and reproduced `ref_value`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternCandidate {
    /// Field this pattern extracts
    pub field_name: String,

    /// Regular expression; group 1 (or the whole match) is the value
    pub pattern: String,

    /// Value the pattern must reproduce on its source text
    pub ref_value: String,

    /// Backend's own confidence in the pattern
    pub confidence: Confidence,

    /// One-sentence justification, kept for audit only
    pub reasoning: String,
}

/// Where a validated pattern came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternOrigin {
    /// Synthesized for this document and proven against its reference value
    Synthesized,
    /// Previously learned for the same layout and re-applied
    Memory,
}

/// A pattern that produced exactly one match on the document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatedPattern {
    /// The candidate that passed
    pub candidate: PatternCandidate,

    /// Captured text as it appears in the document (trimmed)
    pub value: String,

    /// Synthesized now or recalled from memory
    pub origin: PatternOrigin,
}

impl ValidatedPattern {
    /// Field name shortcut
    pub fn field_name(&self) -> &str {
        &self.candidate.field_name
    }

    /// Confidence carried by the pattern
    pub fn confidence(&self) -> Confidence {
        self.candidate.confidence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_value_is_absent() {
        let candidate = ExtractionCandidate::new("nome", Some("   ".to_string()), Confidence::High);
        assert!(!candidate.has_value());
        assert_eq!(candidate.value, None);
    }

    #[test]
    fn test_absent_placeholder() {
        let candidate = ExtractionCandidate::absent("nome");
        assert_eq!(candidate.confidence, Confidence::Low);
        assert!(!candidate.has_value());
    }
}
