//! Papelada Domain Layer
//!
//! Core types shared by every other crate: the extraction schema, the
//! immutable document text, the candidates produced by the two extraction
//! strategies, and the per-document report.
//!
//! ## Key Concepts
//!
//! - **Schema**: ordered, uniquely named fields to extract, optionally with a
//!   reference value used to prove synthesized patterns
//! - **Confidence**: canonical `low < medium < high` scale; external
//!   vocabularies are translated at the parsing boundary
//! - **Candidates**: untrusted output of the direct and pattern strategies
//! - **Report**: one reconciled `FieldResult` per (document, field)
//!
//! ## Architecture
//!
//! - Pure data and invariants only, no I/O
//! - Trait definitions for the inference backend live in [`traits`]
//! - Infrastructure implementations live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod candidate;
pub mod confidence;
pub mod document;
pub mod report;
pub mod schema;
pub mod traits;

// Re-exports for convenience
pub use candidate::{ExtractionCandidate, PatternCandidate, PatternOrigin, ValidatedPattern};
pub use confidence::Confidence;
pub use document::DocumentText;
pub use report::{
    DocumentError, DocumentFailure, DocumentMetrics, DocumentStatus, ExtractionReport,
    FieldResult, LearnedPattern, RejectedPattern, ResultSource, UnresolvedPattern,
};
pub use schema::{FieldSpec, Schema, SchemaError};
