//! Extraction schema
//!
//! A [`Schema`] is validated once at construction and is read-only
//! afterwards: every in-flight request of a batch sees the same fields.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Errors raised while building a schema
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// A field was declared with an empty (or whitespace-only) name
    #[error("Field name must not be empty (position {0})")]
    EmptyName(usize),

    /// The same field name was declared twice
    #[error("Duplicate field name: {0}")]
    DuplicateName(String),

    /// The schema declares no fields at all
    #[error("Schema must declare at least one field")]
    NoFields,
}

/// One field to extract from every document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, unique within its schema
    pub name: String,

    /// Free-text description handed to the inference backend
    pub description: String,

    /// Known value of this field in the document(s) used for pattern synthesis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference_value: Option<String>,
}

impl FieldSpec {
    /// Create a field without a reference value
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            reference_value: None,
        }
    }

    /// Attach a reference value
    ///
    /// A blank reference is treated as no reference at all.
    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        let reference = reference.into();
        self.reference_value = if reference.trim().is_empty() {
            None
        } else {
            Some(reference)
        };
        self
    }

    /// Reference value, if one is set and non-blank
    pub fn reference(&self) -> Option<&str> {
        self.reference_value
            .as_deref()
            .filter(|r| !r.trim().is_empty())
    }
}

/// Ordered set of fields with unique, non-empty names
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Schema {
    label: Option<String>,
    fields: Vec<FieldSpec>,
}

impl Schema {
    /// Build a schema, enforcing non-empty and unique field names
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, SchemaError> {
        if fields.is_empty() {
            return Err(SchemaError::NoFields);
        }

        let mut seen = HashSet::with_capacity(fields.len());
        for (idx, field) in fields.iter().enumerate() {
            if field.name.trim().is_empty() {
                return Err(SchemaError::EmptyName(idx));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateName(field.name.clone()));
            }
        }

        Ok(Self {
            label: None,
            fields,
        })
    }

    /// Tag the schema with a document layout label
    ///
    /// Learned patterns are remembered per label.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = if label.trim().is_empty() { None } else { Some(label) };
        self
    }

    /// Layout label, if any
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Look up a field by name
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Field names in declaration order
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Fields that carry a reference value
    pub fn referenced_fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().filter(|f| f.reference().is_some())
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Always false for a constructed schema
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<'de> Deserialize<'de> for Schema {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct Raw {
            #[serde(default)]
            label: Option<String>,
            fields: Vec<FieldSpec>,
        }

        let raw = Raw::deserialize(deserializer)?;
        let schema = Schema::new(raw.fields).map_err(serde::de::Error::custom)?;
        Ok(match raw.label {
            Some(label) => schema.with_label(label),
            None => schema,
        })
    }
}
