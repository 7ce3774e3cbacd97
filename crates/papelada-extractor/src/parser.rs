//! Parse backend output into candidates
//!
//! Backend output is untrusted text. Only the top-level shape is enforced
//! (a single JSON object); everything below it is read leniently and
//! anything unusable degrades to an absent value.

use crate::error::ExtractorError;
use crate::types::PatternTarget;
use papelada_domain::{Confidence, ExtractionCandidate, FieldSpec, PatternCandidate};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{debug, warn};

const VALUE_KEYS: &[&str] = &["value", "dado", "valor"];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "confiança", "confianca", "confidence_level"];
const PATTERN_KEYS: &[&str] = &["pattern", "regex"];
const REASONING_KEYS: &[&str] = &["reasoning", "justification", "justificativa"];

/// Parse a direct-extraction response
///
/// Returns one candidate per requested field, in request order. Fields the
/// response does not mention come back absent with low confidence.
pub fn parse_direct_response(
    response: &str,
    fields: &[&FieldSpec],
) -> Result<Vec<ExtractionCandidate>, ExtractorError> {
    let object = parse_object(response)?;

    for key in object.keys() {
        if !fields.iter().any(|f| &f.name == key) {
            debug!("Ignoring unrequested key '{}' in direct response", key);
        }
    }

    Ok(fields
        .iter()
        .map(|field| match object.get(&field.name) {
            Some(entry) => parse_direct_entry(&field.name, entry),
            None => {
                debug!("Field '{}' missing from direct response", field.name);
                ExtractionCandidate::absent(&field.name)
            }
        })
        .collect())
}

/// Parse a pattern-synthesis response
///
/// Only requested fields are read. A field with no usable pattern is left
/// out of the map; the caller decides what a missing candidate means.
pub fn parse_pattern_response(
    response: &str,
    targets: &[PatternTarget],
) -> Result<HashMap<String, PatternCandidate>, ExtractorError> {
    let object = parse_object(response)?;
    let mut candidates = HashMap::new();

    for target in targets {
        let Some(entry) = object.get(&target.field_name) else {
            continue;
        };
        match parse_pattern_entry(target, entry) {
            Ok(candidate) => {
                candidates.insert(target.field_name.clone(), candidate);
            }
            Err(e) => warn!("Failed to parse pattern for '{}': {}", target.field_name, e),
        }
    }

    Ok(candidates)
}

/// Extract JSON from response, handling markdown code blocks and chatter
pub fn extract_json(response: &str) -> Result<&str, ExtractorError> {
    let trimmed = response.trim();
    if trimmed.is_empty() {
        return Err(ExtractorError::InvalidFormat("Empty response".to_string()));
    }

    // Fenced block: ```json ... ``` (language tag optional, may be one line)
    let unfenced = match trimmed.strip_prefix("```") {
        Some(rest) => rest
            .trim_end_matches("```")
            .trim_start_matches(|c: char| c.is_ascii_alphanumeric())
            .trim(),
        None => trimmed,
    };

    if unfenced.starts_with('{') {
        return Ok(unfenced);
    }

    // Prose around the object
    match (unfenced.find('{'), unfenced.rfind('}')) {
        (Some(start), Some(end)) if start < end => Ok(&unfenced[start..=end]),
        _ => Err(ExtractorError::InvalidFormat(
            "No JSON object in response".to_string(),
        )),
    }
}

fn parse_object(response: &str) -> Result<Map<String, Value>, ExtractorError> {
    let json_str = extract_json(response)?;
    match serde_json::from_str::<Value>(json_str)? {
        Value::Object(map) => Ok(map),
        other => Err(ExtractorError::InvalidFormat(format!(
            "Expected JSON object, got {}",
            json_kind(&other)
        ))),
    }
}

/// Read one field entry: object, `[value, confidence]` pair, bare scalar or null
fn parse_direct_entry(field_name: &str, entry: &Value) -> ExtractionCandidate {
    match entry {
        Value::Object(obj) => {
            let value = first_key(obj, VALUE_KEYS).and_then(scalar_text);
            let confidence = first_key(obj, CONFIDENCE_KEYS)
                .and_then(Value::as_str)
                .map(Confidence::parse_lenient)
                .unwrap_or_default();
            ExtractionCandidate::new(field_name, value, confidence)
        }
        Value::Array(items) => {
            let value = items.first().and_then(scalar_text);
            let confidence = items
                .get(1)
                .and_then(Value::as_str)
                .map(Confidence::parse_lenient)
                .unwrap_or_default();
            ExtractionCandidate::new(field_name, value, confidence)
        }
        scalar => ExtractionCandidate::new(field_name, scalar_text(scalar), Confidence::Low),
    }
}

fn parse_pattern_entry(target: &PatternTarget, entry: &Value) -> Result<PatternCandidate, String> {
    let (pattern, confidence, reasoning) = match entry {
        Value::Object(obj) => {
            let pattern = first_key(obj, PATTERN_KEYS)
                .and_then(Value::as_str)
                .ok_or_else(|| "Missing or invalid 'pattern'".to_string())?;
            let confidence = first_key(obj, CONFIDENCE_KEYS)
                .and_then(Value::as_str)
                .map(Confidence::parse_lenient)
                .unwrap_or_default();
            let reasoning = first_key(obj, REASONING_KEYS)
                .and_then(Value::as_str)
                .unwrap_or_default();
            (pattern, confidence, reasoning)
        }
        Value::String(pattern) => (pattern.as_str(), Confidence::Low, ""),
        other => return Err(format!("Expected object or string, got {}", json_kind(other))),
    };

    if pattern.trim().is_empty() {
        return Err("Empty pattern".to_string());
    }

    Ok(PatternCandidate {
        field_name: target.field_name.clone(),
        pattern: pattern.to_string(),
        ref_value: target.reference.clone(),
        confidence,
        reasoning: reasoning.to_string(),
    })
}

fn first_key<'v>(obj: &'v Map<String, Value>, keys: &[&str]) -> Option<&'v Value> {
    keys.iter().find_map(|k| obj.get(*k))
}

/// Text of a scalar value; `null`, `"null"` and blank strings are absent
fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(text)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
