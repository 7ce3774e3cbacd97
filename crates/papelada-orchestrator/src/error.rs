//! Error types for batch orchestration

use papelada_domain::SchemaError;
use thiserror::Error;

/// Errors that abort a whole batch (or a memory operation)
///
/// Per-document and per-field failures never surface here; they are
/// recorded in the affected report.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The schema itself is invalid
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Two documents in one batch share an identifier
    #[error("Duplicate document id: {0}")]
    DuplicateDocument(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pattern memory could not be read or written
    #[error("Memory error: {0}")]
    Memory(String),
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(e: serde_json::Error) -> Self {
        OrchestratorError::Memory(format!("Invalid memory JSON: {}", e))
    }
}

impl From<std::io::Error> for OrchestratorError {
    fn from(e: std::io::Error) -> Self {
        OrchestratorError::Memory(e.to_string())
    }
}
