//! Confidence reconciliation
//!
//! The one place where the direct and pattern strategies meet. Neither
//! strategy overrides the other anywhere else.
//!
//! | direct | pattern | result |
//! |--------|---------|--------|
//! | value  | none    | direct value, direct confidence, `direct` |
//! | none   | value   | pattern value, pattern confidence, `pattern` |
//! | value  | same    | pattern value, higher confidence, `reconciled` |
//! | value  | other   | pattern value, `low`, `pattern`, flagged for review |
//! | none   | none    | null, `low`, `reconciled-null` |

use papelada_domain::{Confidence, ExtractionCandidate, FieldResult, ResultSource, ValidatedPattern};
use papelada_gatekeeper::Normalizer;

/// Merges the two strategies' outputs for one field
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    normalizer: Normalizer,
}

impl Reconciler {
    /// Create a reconciler comparing values with `normalizer`
    pub fn new(normalizer: Normalizer) -> Self {
        Self { normalizer }
    }

    /// Reconcile one field
    ///
    /// `pattern` must be a validated pattern; unvalidated candidates never
    /// reach this point.
    pub fn reconcile(
        &self,
        field_name: &str,
        direct: Option<&ExtractionCandidate>,
        pattern: Option<&ValidatedPattern>,
    ) -> FieldResult {
        let direct = direct.filter(|c| c.has_value());
        let pattern = pattern.filter(|p| !p.value.trim().is_empty());

        match (direct, pattern) {
            (None, None) => FieldResult::null(field_name),

            (Some(direct), None) => FieldResult {
                field_name: field_name.to_string(),
                value: direct.value.clone(),
                confidence: direct.confidence,
                source: ResultSource::Direct,
                supporting_pattern: None,
                needs_review: false,
                alternate_value: None,
            },

            (None, Some(pattern)) => FieldResult {
                field_name: field_name.to_string(),
                value: Some(pattern.value.clone()),
                confidence: pattern.confidence(),
                source: ResultSource::Pattern,
                supporting_pattern: Some(pattern.candidate.pattern.clone()),
                needs_review: false,
                alternate_value: None,
            },

            (Some(direct), Some(pattern)) => {
                let direct_value = direct.value.as_deref().unwrap_or_default();
                if self.normalizer.equivalent(direct_value, &pattern.value) {
                    FieldResult {
                        field_name: field_name.to_string(),
                        value: Some(pattern.value.clone()),
                        confidence: direct.confidence.max(pattern.confidence()),
                        source: ResultSource::Reconciled,
                        supporting_pattern: Some(pattern.candidate.pattern.clone()),
                        needs_review: false,
                        alternate_value: None,
                    }
                } else {
                    FieldResult {
                        field_name: field_name.to_string(),
                        value: Some(pattern.value.clone()),
                        confidence: Confidence::Low,
                        source: ResultSource::Pattern,
                        supporting_pattern: Some(pattern.candidate.pattern.clone()),
                        needs_review: true,
                        alternate_value: Some(direct_value.to_string()),
                    }
                }
            }
        }
    }
}
