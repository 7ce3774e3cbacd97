//! Accuracy evaluation against ground truth

use crate::metrics::BatchMetrics;
use papelada_domain::ExtractionReport;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Expected values: document id → field → value (`None` when absent)
pub type GroundTruth = BTreeMap<String, BTreeMap<String, Option<String>>>;

/// Comparison of one (document, field) pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldEvaluation {
    /// Document identifier
    pub document_id: String,
    /// Field name
    pub field_name: String,
    /// Expected value
    pub expected: Option<String>,
    /// Predicted value
    pub predicted: Option<String>,
    /// Whether they match after normalization
    pub correct: bool,
}

/// Correct / total counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    /// Matching fields
    pub correct: usize,
    /// Compared fields
    pub total: usize,
}

impl Tally {
    /// Share of correct fields (0.0-1.0)
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    fn add(&mut self, correct: bool) {
        self.total += 1;
        if correct {
            self.correct += 1;
        }
    }
}

/// Result of [`evaluate`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Totals over every compared field
    pub overall: Tally,
    /// Totals per field name
    pub per_field: BTreeMap<String, Tally>,
    /// Every comparison, in report order
    pub comparisons: Vec<FieldEvaluation>,
    /// Reports without ground truth
    pub skipped_documents: Vec<String>,
    /// Backend usage of the evaluated reports
    pub metrics: BatchMetrics,
}

impl EvaluationReport {
    /// Overall accuracy (0.0-1.0)
    pub fn accuracy(&self) -> f64 {
        self.overall.accuracy()
    }

    /// Comparisons that did not match
    pub fn mistakes(&self) -> impl Iterator<Item = &FieldEvaluation> {
        self.comparisons.iter().filter(|c| !c.correct)
    }

    /// Generate a human-readable summary
    pub fn summary(&self) -> String {
        let evaluated = self.metrics.documents;
        let mut lines = vec![
            "Evaluation Summary".to_string(),
            "==================".to_string(),
            format!(
                "Overall accuracy: {:.2}% ({}/{})",
                self.accuracy() * 100.0,
                self.overall.correct,
                self.overall.total
            ),
            format!("Documents evaluated: {}", evaluated),
        ];
        if !self.skipped_documents.is_empty() {
            lines.push(format!("Documents skipped: {}", self.skipped_documents.len()));
        }
        if evaluated > 0 {
            lines.push(format!(
                "Backend calls: {} ({:.2} per document)",
                self.metrics.total_calls(),
                self.metrics.total_calls() as f64 / evaluated as f64
            ));
        }

        lines.push(String::new());
        lines.push("Accuracy by field:".to_string());
        for (field, tally) in &self.per_field {
            lines.push(format!(
                "  {}: {:.2}% ({}/{})",
                field,
                tally.accuracy() * 100.0,
                tally.correct,
                tally.total
            ));
        }

        let mistakes: Vec<_> = self.mistakes().collect();
        if !mistakes.is_empty() {
            lines.push(String::new());
            lines.push("Mismatches:".to_string());
            for m in mistakes {
                lines.push(format!(
                    "  {} / {}: expected {}, got {}",
                    m.document_id,
                    m.field_name,
                    display(&m.expected),
                    display(&m.predicted)
                ));
            }
        }

        lines.join("\n")
    }
}

/// Compare reports to ground truth
///
/// Fields are taken from the ground truth entry of each document; values
/// are compared trimmed and lowercased, with a missing value read as the
/// string `null`. Reports with no ground truth entry are skipped.
pub fn evaluate(reports: &[ExtractionReport], ground_truth: &GroundTruth) -> EvaluationReport {
    let mut overall = Tally::default();
    let mut per_field: BTreeMap<String, Tally> = BTreeMap::new();
    let mut comparisons = Vec::new();
    let mut skipped_documents = Vec::new();
    let mut evaluated = Vec::new();

    for report in reports {
        let Some(expected_fields) = ground_truth.get(&report.document_id) else {
            warn!(
                "Document '{}' has no ground truth entry, skipping",
                report.document_id
            );
            skipped_documents.push(report.document_id.clone());
            continue;
        };

        for (field_name, expected) in expected_fields {
            let predicted = report.value(field_name).map(str::to_string);
            let correct = normalize(expected.as_deref()) == normalize(predicted.as_deref());

            overall.add(correct);
            per_field.entry(field_name.clone()).or_default().add(correct);
            comparisons.push(FieldEvaluation {
                document_id: report.document_id.clone(),
                field_name: field_name.clone(),
                expected: expected.clone(),
                predicted,
                correct,
            });
        }
        evaluated.push(report.clone());
    }

    EvaluationReport {
        overall,
        per_field,
        comparisons,
        skipped_documents,
        metrics: BatchMetrics::from_reports(&evaluated),
    }
}

fn normalize(value: Option<&str>) -> String {
    value.unwrap_or("null").trim().to_lowercase()
}

fn display(value: &Option<String>) -> String {
    match value {
        Some(v) => format!("'{}'", v),
        None => "null".to_string(),
    }
}
