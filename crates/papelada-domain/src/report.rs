//! Per-document extraction report

use crate::{Confidence, Schema};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Which strategy a final value came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResultSource {
    /// Only the direct strategy produced a value
    Direct,
    /// A validated pattern produced the value
    Pattern,
    /// Both strategies produced the same value
    Reconciled,
    /// Neither strategy produced a value
    ReconciledNull,
}

/// Final, reconciled outcome for one (document, field) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldResult {
    /// Field name
    pub field_name: String,

    /// Final value, `None` when unresolved
    pub value: Option<String>,

    /// Final confidence
    pub confidence: Confidence,

    /// Strategy that produced the value
    pub source: ResultSource,

    /// Pattern backing the value, when a validated pattern took part
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supporting_pattern: Option<String>,

    /// Set when the strategies disagreed; the losing value is kept in `alternate_value`
    #[serde(default)]
    pub needs_review: bool,

    /// Direct-strategy value that disagreed with the pattern value
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_value: Option<String>,
}

impl FieldResult {
    /// `{value: null, confidence: low, source: reconciled-null}`
    pub fn null(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            value: None,
            confidence: Confidence::Low,
            source: ResultSource::ReconciledNull,
            supporting_pattern: None,
            needs_review: false,
            alternate_value: None,
        }
    }

    /// Whether a value was resolved
    pub fn is_resolved(&self) -> bool {
        self.value.is_some()
    }
}

/// Terminal state of one document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentStatus {
    /// Processing completed (fields may still be null)
    Done,
    /// The document could not be processed
    DocumentFailed,
}

/// Why a document failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocumentFailure {
    /// Every backend call for the document failed after retries
    BackendUnavailable,
    /// The batch was cancelled before the document finished
    Cancelled,
}

impl DocumentFailure {
    /// Stable reason code
    pub fn code(&self) -> &'static str {
        match self {
            DocumentFailure::BackendUnavailable => "BACKEND_UNAVAILABLE",
            DocumentFailure::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for DocumentFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Document-level error attached to a failed report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentError {
    /// Reason code
    pub reason: DocumentFailure,

    /// Human-readable detail
    pub message: String,
}

/// A pattern validated on this document, to be remembered for its layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LearnedPattern {
    /// Field name
    pub field_name: String,
    /// Validated pattern
    pub pattern: String,
    /// Confidence reported when it was synthesized
    pub confidence: Confidence,
}

/// A synthesized pattern the validator rejected
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RejectedPattern {
    /// Field name
    pub field_name: String,
    /// Rejected pattern text
    pub pattern: String,
    /// Reason code (`NO_MATCH`, `MULTIPLE_MATCHES`, ...)
    pub reason: String,
    /// Human-readable detail fed back into later synthesis prompts
    pub detail: String,
}

/// A field for which no pattern could be validated within the attempt budget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedPattern {
    /// Field name
    pub field_name: String,
    /// Reason code of the last failed attempt
    pub reason: String,
    /// Attempts spent
    pub attempts: u32,
}

/// Backend usage and validation counters for one document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetrics {
    /// Direct-extraction requests issued (including retries)
    pub direct_calls: usize,
    /// Pattern-synthesis requests issued (including retries)
    pub synthesis_calls: usize,
    /// Requests that failed at transport/parse level
    pub backend_failures: usize,
    /// Requests that timed out (also counted in `backend_failures`)
    pub timeouts: usize,
    /// Fields resolved from remembered patterns
    pub memory_hits: usize,
    /// Validator rejections by reason code
    pub rejections: BTreeMap<String, usize>,
    /// Wall time spent in direct extraction (ms)
    pub direct_ms: u64,
    /// Wall time spent in synthesis + validation (ms)
    pub synthesis_ms: u64,
}

impl DocumentMetrics {
    /// Record one validator rejection
    pub fn record_rejection(&mut self, code: &str) {
        *self.rejections.entry(code.to_string()).or_insert(0) += 1;
    }

    /// Total backend requests issued
    pub fn total_calls(&self) -> usize {
        self.direct_calls + self.synthesis_calls
    }

    /// Total validator rejections
    pub fn total_rejections(&self) -> usize {
        self.rejections.values().sum()
    }
}

/// Reconciled results for one document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionReport {
    /// Document identifier
    pub document_id: String,

    /// Terminal state
    pub status: DocumentStatus,

    /// Document-level error, set when `status` is `DocumentFailed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<DocumentError>,

    /// One result per schema field, in schema order
    pub fields: Vec<FieldResult>,

    /// Names of fields whose value is null
    pub unresolved_fields: Vec<String>,

    /// Fields that exhausted their pattern attempts
    #[serde(default)]
    pub unresolved_by_pattern: Vec<UnresolvedPattern>,

    /// Patterns validated on this document
    #[serde(default)]
    pub learned_patterns: Vec<LearnedPattern>,

    /// Patterns rejected on this document
    #[serde(default)]
    pub rejected_patterns: Vec<RejectedPattern>,

    /// Non-fatal backend errors encountered while processing
    #[serde(default)]
    pub warnings: Vec<String>,

    /// Usage counters
    #[serde(default)]
    pub metrics: DocumentMetrics,
}

impl ExtractionReport {
    /// Report for a document that completed processing
    pub fn completed(document_id: impl Into<String>, fields: Vec<FieldResult>) -> Self {
        let unresolved_fields = unresolved(&fields);
        Self {
            document_id: document_id.into(),
            status: DocumentStatus::Done,
            error: None,
            fields,
            unresolved_fields,
            unresolved_by_pattern: Vec::new(),
            learned_patterns: Vec::new(),
            rejected_patterns: Vec::new(),
            warnings: Vec::new(),
            metrics: DocumentMetrics::default(),
        }
    }

    /// Report for a failed document: every schema field null and low
    pub fn failed(
        document_id: impl Into<String>,
        schema: &Schema,
        reason: DocumentFailure,
        message: impl Into<String>,
    ) -> Self {
        let fields: Vec<FieldResult> = schema.field_names().map(FieldResult::null).collect();
        let mut report = Self::completed(document_id, fields);
        report.status = DocumentStatus::DocumentFailed;
        report.error = Some(DocumentError {
            reason,
            message: message.into(),
        });
        report
    }

    /// Result for a field
    pub fn field(&self, name: &str) -> Option<&FieldResult> {
        self.fields.iter().find(|f| f.field_name == name)
    }

    /// Final value of a field
    pub fn value(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|f| f.value.as_deref())
    }

    /// Fields flagged for manual review
    pub fn review_fields(&self) -> impl Iterator<Item = &FieldResult> {
        self.fields.iter().filter(|f| f.needs_review)
    }

    /// Whether the document finished normally
    pub fn is_done(&self) -> bool {
        self.status == DocumentStatus::Done
    }
}

fn unresolved(fields: &[FieldResult]) -> Vec<String> {
    fields
        .iter()
        .filter(|f| !f.is_resolved())
        .map(|f| f.field_name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FieldSpec;

    #[test]
    fn test_failed_report_has_every_field() {
        let schema = Schema::new(vec![FieldSpec::new("a", ""), FieldSpec::new("b", "")]).unwrap();
        let report =
            ExtractionReport::failed("doc1", &schema, DocumentFailure::Cancelled, "batch cancelled");

        assert_eq!(report.status, DocumentStatus::DocumentFailed);
        assert_eq!(report.fields.len(), 2);
        assert_eq!(report.unresolved_fields, vec!["a", "b"]);
        assert!(report.fields.iter().all(|f| f.source == ResultSource::ReconciledNull));
        assert_eq!(report.error.as_ref().unwrap().reason.code(), "CANCELLED");
    }

    #[test]
    fn test_completed_tracks_unresolved() {
        let mut resolved = FieldResult::null("a");
        resolved.value = Some("x".to_string());
        resolved.source = ResultSource::Direct;
        let report = ExtractionReport::completed("doc1", vec![resolved, FieldResult::null("b")]);

        assert!(report.is_done());
        assert_eq!(report.value("a"), Some("x"));
        assert_eq!(report.unresolved_fields, vec!["b"]);
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&DocumentStatus::DocumentFailed).unwrap();
        assert_eq!(json, "\"DOCUMENT_FAILED\"");
        let json = serde_json::to_string(&ResultSource::ReconciledNull).unwrap();
        assert_eq!(json, "\"reconciled-null\"");
    }

    #[test]
    fn test_metrics_rejections() {
        let mut metrics = DocumentMetrics::default();
        metrics.record_rejection("NO_MATCH");
        metrics.record_rejection("NO_MATCH");
        metrics.record_rejection("LEAKAGE_DETECTED");
        assert_eq!(metrics.total_rejections(), 3);
        assert_eq!(metrics.rejections["NO_MATCH"], 2);
    }
}
