//! Reading schemas, documents and ground truth from disk.

use crate::error::{CliError, Result};
use papelada_domain::{DocumentText, ExtractionReport, FieldSpec, Schema};
use papelada_extractor::text;
use papelada_orchestrator::GroundTruth;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

const DOCUMENT_EXTENSION: &str = "txt";

/// Parse a schema from JSON.
///
/// Accepted shapes:
/// - `{"label": "...", "fields": {"name": {"description": "...", "reference": "..."}}}`
/// - the same with `fields` as a list of `{"name", "description", "reference_value"}`
/// - the shorthand `{"name": "description", ...}`
///
/// `extraction_schema` is accepted for `fields` and `ref` for `reference`.
pub fn parse_schema(json: &str) -> Result<Schema> {
    let root: Map<String, Value> = match serde_json::from_str(json)? {
        Value::Object(map) => map,
        _ => return Err(CliError::InvalidInput("Schema must be a JSON object".into())),
    };

    let fields_value = root.get("fields").or_else(|| root.get("extraction_schema"));
    let (label, fields) = match fields_value {
        Some(Value::Array(list)) => (
            root.get("label").and_then(Value::as_str),
            serde_json::from_value::<Vec<FieldSpec>>(Value::Array(list.clone()))?,
        ),
        Some(Value::Object(fields)) => (
            root.get("label").and_then(Value::as_str),
            parse_field_map(fields)?,
        ),
        Some(_) => {
            return Err(CliError::InvalidInput(
                "Schema 'fields' must be an object or a list".into(),
            ))
        }
        None => (None, parse_field_map(&root)?),
    };

    let schema = Schema::new(fields).map_err(|e| CliError::InvalidInput(e.to_string()))?;
    Ok(match label {
        Some(label) => schema.with_label(label),
        None => schema,
    })
}

fn parse_field_map(fields: &Map<String, Value>) -> Result<Vec<FieldSpec>> {
    fields
        .iter()
        .map(|(name, entry)| match entry {
            Value::String(description) => Ok(FieldSpec::new(name, description)),
            Value::Object(obj) => {
                let description = obj
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                let field = FieldSpec::new(name, description);
                Ok(match reference_of(obj) {
                    Some(reference) => field.with_reference(reference),
                    None => field,
                })
            }
            other => Err(CliError::InvalidInput(format!(
                "Field '{}' must be a description string or an object, got {}",
                name, other
            ))),
        })
        .collect()
}

fn reference_of(obj: &Map<String, Value>) -> Option<String> {
    ["reference", "reference_value", "ref"]
        .iter()
        .find_map(|key| obj.get(*key))
        .and_then(|value| match value {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

/// Read a schema file.
pub fn load_schema(path: &Path) -> Result<Schema> {
    let json = fs::read_to_string(path)?;
    parse_schema(&json)
}

/// Read documents from files and directories.
///
/// Directories contribute their `.txt` files (not recursive), sorted by
/// name. The document id is the file name. Text is cleaned before use.
pub fn load_documents(paths: &[PathBuf]) -> Result<Vec<DocumentText>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = fs::read_dir(path)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && is_document(p))
                .collect();
            entries.sort();
            files.extend(entries);
        } else if path.is_file() {
            if !is_document(path) {
                warn!("{} is not a .{} file, reading it as text", path.display(), DOCUMENT_EXTENSION);
            }
            files.push(path.clone());
        } else {
            return Err(CliError::InvalidInput(format!(
                "No such file or directory: {}",
                path.display()
            )));
        }
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let id = file
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| CliError::InvalidInput(format!("Invalid path: {}", file.display())))?;
        let raw = fs::read_to_string(&file)?;
        debug!("Read {} ({} bytes)", id, raw.len());
        documents.push(DocumentText::new(id, text::clean(&raw)));
    }
    Ok(documents)
}

fn is_document(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(DOCUMENT_EXTENSION))
}

/// Read reports written by `extract --output`.
pub fn load_reports(path: &Path) -> Result<Vec<ExtractionReport>> {
    let json = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Read ground truth: `{document id: {field: value or null}}`.
///
/// Non-string scalars are stringified.
pub fn load_ground_truth(path: &Path) -> Result<GroundTruth> {
    let json = fs::read_to_string(path)?;
    let raw: Map<String, Value> = match serde_json::from_str(&json)? {
        Value::Object(map) => map,
        _ => return Err(CliError::InvalidInput("Ground truth must be a JSON object".into())),
    };

    let mut ground_truth = GroundTruth::new();
    for (document_id, fields) in raw {
        let Value::Object(fields) = fields else {
            return Err(CliError::InvalidInput(format!(
                "Ground truth for '{}' must be an object",
                document_id
            )));
        };
        let expected = fields
            .into_iter()
            .map(|(field, value)| {
                let value = match value {
                    Value::Null => None,
                    Value::String(s) => Some(s),
                    other => Some(other.to_string()),
                };
                (field, value)
            })
            .collect();
        ground_truth.insert(document_id, expected);
    }
    Ok(ground_truth)
}
