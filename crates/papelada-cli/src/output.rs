//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use papelada_domain::{DocumentStatus, ExtractionReport, FieldResult, ResultSource};
use papelada_orchestrator::{EvaluationReport, PatternMemory};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

const NULL: &str = "-";

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format extraction reports.
    pub fn format_reports(&self, reports: &[ExtractionReport]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(reports)?),
            OutputFormat::Table => Ok(self.format_reports_table(reports)),
            OutputFormat::Quiet => Ok(format_reports_quiet(reports)),
        }
    }

    /// Reports as one table row per (document, field).
    fn format_reports_table(&self, reports: &[ExtractionReport]) -> String {
        if reports.is_empty() {
            return self.colorize("No documents processed.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["Document", "Field", "Value", "Confidence", "Source", "Review"]);

        for report in reports {
            if report.status == DocumentStatus::DocumentFailed {
                let reason = report
                    .error
                    .as_ref()
                    .map(|e| format!("FAILED: {}", e.reason))
                    .unwrap_or_else(|| "FAILED".to_string());
                builder.push_record([report.document_id.as_str(), "*", reason.as_str(), "", "", ""]);
                continue;
            }
            for field in &report.fields {
                builder.push_record(field_row(&report.document_id, field));
            }
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        let mut output = table.to_string();
        for report in reports {
            for warning in &report.warnings {
                output.push('\n');
                output.push_str(&self.warning(&format!("{}: {}", report.document_id, warning)));
            }
        }
        output
    }

    /// Format an evaluation report.
    pub fn format_evaluation(&self, report: &EvaluationReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => Ok(format!("{:.4}", report.accuracy())),
            OutputFormat::Table => Ok(self.format_evaluation_table(report)),
        }
    }

    fn format_evaluation_table(&self, report: &EvaluationReport) -> String {
        let mut builder = Builder::default();
        builder.push_record(["Field", "Correct", "Total", "Accuracy"]);
        for (field, tally) in &report.per_field {
            builder.push_record([
                field.clone(),
                tally.correct.to_string(),
                tally.total.to_string(),
                format!("{:.1}%", tally.accuracy() * 100.0),
            ]);
        }
        builder.push_record([
            "overall".to_string(),
            report.overall.correct.to_string(),
            report.overall.total.to_string(),
            format!("{:.1}%", report.accuracy() * 100.0),
        ]);

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        let mut output = table.to_string();
        let mistakes: Vec<_> = report.mistakes().collect();
        if !mistakes.is_empty() {
            let mut builder = Builder::default();
            builder.push_record(["Document", "Field", "Expected", "Predicted"]);
            for mistake in mistakes {
                builder.push_record([
                    mistake.document_id.as_str(),
                    mistake.field_name.as_str(),
                    mistake.expected.as_deref().unwrap_or(NULL),
                    mistake.predicted.as_deref().unwrap_or(NULL),
                ]);
            }
            let mut table = builder.build();
            table.with(Style::rounded());
            output.push_str("\n\n");
            output.push_str(&self.colorize("Mismatches:", "red"));
            output.push('\n');
            output.push_str(&table.to_string());
        }
        output
    }

    /// Format pattern memory.
    pub fn format_memory(&self, memory: &PatternMemory) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(memory)?),
            OutputFormat::Quiet => Ok(memory.summary()),
            OutputFormat::Table => Ok(self.format_memory_table(memory)),
        }
    }

    fn format_memory_table(&self, memory: &PatternMemory) -> String {
        if memory.is_empty() {
            return self.colorize("No patterns remembered.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["Layout", "Field", "Pattern", "Confidence"]);
        for label in memory.labels() {
            let Some(layout) = memory.layout(label) else {
                continue;
            };
            for (field, patterns) in &layout.patterns {
                for remembered in patterns {
                    builder.push_record([
                        label,
                        field.as_str(),
                        remembered.pattern.as_str(),
                        remembered.confidence.as_str(),
                    ]);
                }
            }
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        format!("{}\n{}", table, memory.summary())
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            _ => text.to_string(),
        }
    }
}

fn field_row(document_id: &str, field: &FieldResult) -> [String; 6] {
    let value = match (&field.value, &field.alternate_value) {
        (Some(value), Some(alternate)) => format!("{} (direct: {})", value, alternate),
        (Some(value), None) => value.clone(),
        (None, _) => NULL.to_string(),
    };
    [
        document_id.to_string(),
        field.field_name.clone(),
        value,
        field.confidence.as_str().to_string(),
        source_label(field.source).to_string(),
        if field.needs_review { "yes" } else { "" }.to_string(),
    ]
}

/// `document<TAB>status<TAB>resolved/total` per document.
fn format_reports_quiet(reports: &[ExtractionReport]) -> String {
    reports
        .iter()
        .map(|report| {
            let status = match report.status {
                DocumentStatus::Done => "done".to_string(),
                DocumentStatus::DocumentFailed => report
                    .error
                    .as_ref()
                    .map(|e| e.reason.code().to_lowercase())
                    .unwrap_or_else(|| "failed".to_string()),
            };
            let resolved = report.fields.len() - report.unresolved_fields.len();
            format!(
                "{}\t{}\t{}/{}",
                report.document_id,
                status,
                resolved,
                report.fields.len()
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn source_label(source: ResultSource) -> &'static str {
    match source {
        ResultSource::Direct => "direct",
        ResultSource::Pattern => "pattern",
        ResultSource::Reconciled => "reconciled",
        ResultSource::ReconciledNull => "none",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papelada_domain::{Confidence, DocumentFailure, FieldSpec, Schema};

    fn create_test_report() -> ExtractionReport {
        let mut nome = FieldResult::null("nome");
        nome.value = Some("JOANA D'ARC".to_string());
        nome.confidence = Confidence::High;
        nome.source = ResultSource::Reconciled;

        ExtractionReport::completed("oab_1.txt", vec![nome, FieldResult::null("cpf")])
    }

    fn schema() -> Schema {
        Schema::new(vec![FieldSpec::new("nome", "Nome"), FieldSpec::new("cpf", "CPF")]).unwrap()
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_reports(&[create_test_report()]).unwrap();
        assert!(output.contains("Confidence"));
        assert!(output.contains("JOANA D'ARC"));
        assert!(output.contains("reconciled"));
    }

    #[test]
    fn test_failed_document_row() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let failed = ExtractionReport::failed(
            "oab_2.txt",
            &schema(),
            DocumentFailure::BackendUnavailable,
            "backend down",
        );
        let output = formatter.format_reports(&[failed]).unwrap();
        assert!(output.contains("FAILED: BACKEND_UNAVAILABLE"));
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let output = formatter.format_reports(&[create_test_report()]).unwrap();
        let parsed: Vec<ExtractionReport> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed[0].document_id, "oab_1.txt");
    }

    #[test]
    fn test_quiet_format() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let output = formatter.format_reports(&[create_test_report()]).unwrap();
        assert_eq!(output, "oab_1.txt\tdone\t1/2");
    }

    #[test]
    fn test_empty_reports() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_reports(&[]).unwrap();
        assert!(output.contains("No documents processed"));
    }

    #[test]
    fn test_empty_memory() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_memory(&PatternMemory::new()).unwrap();
        assert!(output.contains("No patterns remembered"));
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
    }
}
