//! Document text as produced by the (external) text-extraction step

use serde::{Deserialize, Serialize};

/// Text of one document, immutable once constructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentText {
    id: String,
    raw_text: String,
}

impl DocumentText {
    /// Wrap converted text under a document identifier
    pub fn new(id: impl Into<String>, raw_text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            raw_text: raw_text.into(),
        }
    }

    /// Document identifier
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Full text
    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    /// Length of the text in bytes
    pub fn len(&self) -> usize {
        self.raw_text.len()
    }

    /// Whether the document has no text
    pub fn is_empty(&self) -> bool {
        self.raw_text.trim().is_empty()
    }
}
