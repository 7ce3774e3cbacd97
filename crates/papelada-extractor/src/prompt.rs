//! Prompt construction for the two extraction strategies

use crate::types::PatternTarget;
use papelada_domain::FieldSpec;
use serde_json::{json, Map, Value};

/// First line of every direct-extraction prompt
pub const DIRECT_TASK_TAG: &str = "TASK: direct-value-extraction";

/// First line of every pattern-synthesis prompt
pub const PATTERN_TASK_TAG: &str = "TASK: pattern-synthesis";

/// Builds the direct value-extraction prompt
pub struct DirectPromptBuilder<'a> {
    text: &'a str,
    fields: Vec<&'a FieldSpec>,
    max_text_length: usize,
}

impl<'a> DirectPromptBuilder<'a> {
    /// Create a new prompt builder over the document text
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            fields: Vec::new(),
            max_text_length: usize::MAX,
        }
    }

    /// Fields to request
    pub fn with_fields(mut self, fields: impl IntoIterator<Item = &'a FieldSpec>) -> Self {
        self.fields = fields.into_iter().collect();
        self
    }

    /// Clip the document text in the prompt to this many characters
    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Build the complete prompt
    pub fn build(&self) -> String {
        let schema: Map<String, Value> = self
            .fields
            .iter()
            .map(|f| (f.name.clone(), Value::String(f.description.clone())))
            .collect();

        let mut prompt = String::new();
        prompt.push_str(DIRECT_TASK_TAG);
        prompt.push_str("\n\n");
        prompt.push_str(DIRECT_INSTRUCTIONS);
        prompt.push_str("\n\nFields (name: description):\n");
        prompt.push_str(&pretty(&Value::Object(schema)));
        prompt.push_str("\n\nDocument text:\n---\n");
        prompt.push_str(clip(self.text, self.max_text_length));
        prompt.push_str("\n---\n\n");
        prompt.push_str(DIRECT_OUTPUT_FORMAT);
        prompt
    }
}

/// Builds the pattern-synthesis prompt
pub struct PatternPromptBuilder<'a> {
    text: &'a str,
    targets: &'a [PatternTarget],
    max_text_length: usize,
}

impl<'a> PatternPromptBuilder<'a> {
    /// Create a new prompt builder over the document text
    pub fn new(text: &'a str, targets: &'a [PatternTarget]) -> Self {
        Self {
            text,
            targets,
            max_text_length: usize::MAX,
        }
    }

    /// Clip the document text in the prompt to this many characters
    pub fn with_max_text_length(mut self, max: usize) -> Self {
        self.max_text_length = max;
        self
    }

    /// Build the complete prompt
    pub fn build(&self) -> String {
        let schema: Map<String, Value> = self
            .targets
            .iter()
            .map(|t| {
                (
                    t.field_name.clone(),
                    json!({ "description": t.description, "value_in_text": t.reference }),
                )
            })
            .collect();

        let mut prompt = String::new();
        prompt.push_str(PATTERN_TASK_TAG);
        prompt.push_str("\n\n");
        prompt.push_str(PATTERN_INSTRUCTIONS);
        prompt.push_str("\n\nFields (with the value each pattern must capture in this text):\n");
        prompt.push_str(&pretty(&Value::Object(schema)));
        prompt.push_str("\n\n");

        let rejected: Vec<_> = self.targets.iter().flat_map(|t| &t.feedback).collect();
        if !rejected.is_empty() {
            prompt.push_str("Patterns already tried for these fields (do not repeat them):\n");
            for entry in rejected {
                prompt.push_str(&format!(
                    "- {}: `{}` failed with {}: {}\n",
                    entry.field_name, entry.pattern, entry.reason, entry.detail
                ));
            }
            prompt.push('\n');
        }

        prompt.push_str("Document text:\n---\n");
        prompt.push_str(clip(self.text, self.max_text_length));
        prompt.push_str("\n---\n\n");
        prompt.push_str(PATTERN_OUTPUT_FORMAT);
        prompt
    }
}

/// Longest prefix of `text` with at most `max` characters
fn clip(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

const DIRECT_INSTRUCTIONS: &str = r#"Extract the value of each field below from the document text.

Rules:
- The label of a field and its value are not necessarily adjacent; the value may be on another line or further along the text
- Labels may be abbreviated, reordered or missing; use the field description to recognize the value
- Copy the value exactly as written in the text; do not translate, reformat or complete it
- Use null only when you are certain the value is not in the text
- Confidence is one of "high", "medium" or "low"; use "low" when guessing"#;

const DIRECT_OUTPUT_FORMAT: &str = r#"Output format (a single JSON object keyed by field name, no additional text):
{
  "field_name": {"value": "text copied from the document or null", "confidence": "high|medium|low"}
}

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations."#;

const PATTERN_INSTRUCTIONS: &str = r#"Write one regular expression per field that extracts the field's value from documents with this layout.

Rules:
- Use Rust regex syntax: no lookahead, no lookbehind, no backreferences
- Anchor on label text that appears literally in the document (for example "Inscrição", "CPF:"), never on the value itself
- The first capture group must describe the shape of the value (digit runs, letter runs, date-like runs), never the literal value; the value shown for each field must not appear anywhere in the pattern
- The gap between label and value may vary, including across lines: use a non-greedy gap such as .*? or \s+
- Bound the capture with an end anchor (the next label, a line break) so it does not run into other text
- The pattern must match exactly once in the document
- Labels may lose their accents in other documents; prefer classes like [çc] and [ãa] for accented letters"#;

const PATTERN_OUTPUT_FORMAT: &str = r#"Output format (a single JSON object keyed by field name, no additional text):
{
  "field_name": {"pattern": "Label:\\s*(\\d+)", "confidence": "high|medium|low", "reasoning": "one sentence"}
}

Remember: Return ONLY valid JSON, no markdown code blocks, no explanations. Escape backslashes as JSON requires."#;
