//! Metrics aggregated over a batch

use papelada_domain::{DocumentFailure, ExtractionReport, ResultSource};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Counters aggregated from every report in a batch
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchMetrics {
    /// Documents in the batch
    pub documents: usize,
    /// Documents that finished normally
    pub done: usize,
    /// Documents that failed because the backend was unavailable
    pub failed: usize,
    /// Documents cancelled before finishing
    pub cancelled: usize,

    /// Direct-extraction requests
    pub direct_calls: usize,
    /// Pattern-synthesis requests
    pub synthesis_calls: usize,
    /// Requests that failed
    pub backend_failures: usize,
    /// Requests that timed out
    pub timeouts: usize,
    /// Fields resolved from remembered patterns
    pub memory_hits: usize,
    /// Validator rejections by reason code
    pub rejections: BTreeMap<String, usize>,

    /// Fields across all documents
    pub fields_total: usize,
    /// Fields with a value
    pub fields_resolved: usize,
    /// Final values per source (`direct`, `pattern`, ...)
    pub sources: BTreeMap<String, usize>,
    /// Fields flagged for manual review
    pub needs_review: usize,

    /// Time spent in direct extraction, summed over documents (ms)
    pub direct_ms: u64,
    /// Time spent in synthesis and validation, summed over documents (ms)
    pub synthesis_ms: u64,
}

impl BatchMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregate the reports of a batch
    pub fn from_reports(reports: &[ExtractionReport]) -> Self {
        let mut metrics = Self::new();
        for report in reports {
            metrics.record(report);
        }
        metrics
    }

    /// Add one report
    pub fn record(&mut self, report: &ExtractionReport) {
        self.documents += 1;
        match report.error.as_ref().map(|e| e.reason) {
            None => self.done += 1,
            Some(DocumentFailure::BackendUnavailable) => self.failed += 1,
            Some(DocumentFailure::Cancelled) => self.cancelled += 1,
        }

        let m = &report.metrics;
        self.direct_calls += m.direct_calls;
        self.synthesis_calls += m.synthesis_calls;
        self.backend_failures += m.backend_failures;
        self.timeouts += m.timeouts;
        self.memory_hits += m.memory_hits;
        self.direct_ms += m.direct_ms;
        self.synthesis_ms += m.synthesis_ms;
        for (code, count) in &m.rejections {
            *self.rejections.entry(code.clone()).or_insert(0) += count;
        }

        for field in &report.fields {
            self.fields_total += 1;
            if field.is_resolved() {
                self.fields_resolved += 1;
            }
            if field.needs_review {
                self.needs_review += 1;
            }
            *self.sources.entry(source_label(field.source).to_string()).or_insert(0) += 1;
        }
    }

    /// Backend requests issued
    pub fn total_calls(&self) -> usize {
        self.direct_calls + self.synthesis_calls
    }

    /// Validator rejections
    pub fn total_rejections(&self) -> usize {
        self.rejections.values().sum()
    }

    /// Share of fields with a value (0.0-1.0)
    pub fn resolution_rate(&self) -> f64 {
        if self.fields_total == 0 {
            0.0
        } else {
            self.fields_resolved as f64 / self.fields_total as f64
        }
    }

    /// Generate a summary report of metrics
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Extraction Metrics Summary".to_string(),
            "==========================".to_string(),
            format!(
                "Documents: {} ({} done, {} failed, {} cancelled)",
                self.documents, self.done, self.failed, self.cancelled
            ),
            format!(
                "Fields resolved: {}/{} ({:.1}%)",
                self.fields_resolved,
                self.fields_total,
                self.resolution_rate() * 100.0
            ),
            format!("Needs review: {}", self.needs_review),
            String::new(),
            format!(
                "Backend calls: {} ({} direct, {} synthesis)",
                self.total_calls(),
                self.direct_calls,
                self.synthesis_calls
            ),
            format!("Backend failures: {} ({} timeouts)", self.backend_failures, self.timeouts),
            format!("Memory hits: {}", self.memory_hits),
            format!("Direct time: {}ms", self.direct_ms),
            format!("Synthesis time: {}ms", self.synthesis_ms),
        ];

        if !self.sources.is_empty() {
            lines.push(String::new());
            lines.push("Values by source:".to_string());
            for (source, count) in &self.sources {
                lines.push(format!("  {}: {}", source, count));
            }
        }

        if !self.rejections.is_empty() {
            lines.push(String::new());
            lines.push("Rejections by reason:".to_string());
            for (code, count) in &self.rejections {
                lines.push(format!("  {}: {}", code, count));
            }
            lines.push(format!("  Total: {}", self.total_rejections()));
        }

        lines.join("\n")
    }
}

fn source_label(source: ResultSource) -> &'static str {
    match source {
        ResultSource::Direct => "direct",
        ResultSource::Pattern => "pattern",
        ResultSource::Reconciled => "reconciled",
        ResultSource::ReconciledNull => "reconciled-null",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papelada_domain::{Confidence, FieldResult, FieldSpec, Schema};

    fn resolved(name: &str, source: ResultSource) -> FieldResult {
        FieldResult {
            field_name: name.to_string(),
            value: Some("x".to_string()),
            confidence: Confidence::High,
            source,
            supporting_pattern: None,
            needs_review: false,
            alternate_value: None,
        }
    }

    #[test]
    fn test_metrics_creation() {
        let metrics = BatchMetrics::new();
        assert_eq!(metrics.total_calls(), 0);
        assert_eq!(metrics.resolution_rate(), 0.0);
    }

    #[test]
    fn test_from_reports() {
        let schema = Schema::new(vec![FieldSpec::new("a", ""), FieldSpec::new("b", "")]).unwrap();

        let mut done = ExtractionReport::completed(
            "d1",
            vec![resolved("a", ResultSource::Direct), FieldResult::null("b")],
        );
        done.metrics.direct_calls = 1;
        done.metrics.synthesis_calls = 2;
        done.metrics.record_rejection("NO_MATCH");

        let mut failed =
            ExtractionReport::failed("d2", &schema, DocumentFailure::BackendUnavailable, "down");
        failed.metrics.direct_calls = 2;
        failed.metrics.backend_failures = 2;
        failed.metrics.timeouts = 1;

        let cancelled = ExtractionReport::failed("d3", &schema, DocumentFailure::Cancelled, "stop");

        let metrics = BatchMetrics::from_reports(&[done, failed, cancelled]);

        assert_eq!(metrics.documents, 3);
        assert_eq!((metrics.done, metrics.failed, metrics.cancelled), (1, 1, 1));
        assert_eq!(metrics.total_calls(), 5);
        assert_eq!(metrics.backend_failures, 2);
        assert_eq!(metrics.fields_total, 6);
        assert_eq!(metrics.fields_resolved, 1);
        assert_eq!(metrics.sources["reconciled-null"], 5);
        assert_eq!(metrics.rejections["NO_MATCH"], 1);
    }

    #[test]
    fn test_summary() {
        let mut report = ExtractionReport::completed("d1", vec![resolved("a", ResultSource::Pattern)]);
        report.metrics.record_rejection("MULTIPLE_MATCHES");
        report.metrics.synthesis_calls = 2;

        let summary = BatchMetrics::from_reports(&[report]).summary();
        assert!(summary.contains("Documents: 1 (1 done, 0 failed, 0 cancelled)"));
        assert!(summary.contains("Fields resolved: 1/1 (100.0%)"));
        assert!(summary.contains("MULTIPLE_MATCHES: 1"));
        assert!(summary.contains("pattern: 1"));
    }
}
