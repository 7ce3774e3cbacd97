//! Papelada Extractor
//!
//! Clients for the two extraction strategies that talk to the inference
//! backend.
//!
//! # Overview
//!
//! - **Direct extraction** asks the backend for every field's value and a
//!   confidence level in one request.
//! - **Pattern synthesis** asks the backend for a regular expression per
//!   field, anchored on label text, that reproduces a known reference value.
//!   The patterns are untrusted until the gatekeeper has validated them.
//!
//! Both go through a shared [`BackendClient`], which enforces the request
//! timeout and the batch-wide limit on concurrent backend calls.
//!
//! # Architecture
//!
//! ```text
//! Schema + DocumentText → prompt → BackendClient → InferenceBackend
//!                                        ↓
//!                      ExtractionCandidate / PatternCandidate
//! ```
//!
//! # Example Usage
//!
//! ```no_run
//! use papelada_extractor::{BackendClient, DirectExtractor, ExtractorConfig};
//! use papelada_domain::{DocumentText, FieldSpec};
//! use papelada_llm::MockBackend;
//!
//! # async fn example() {
//! let config = ExtractorConfig::default();
//! let backend = MockBackend::new(r#"{"nome": {"value": "JOANA D'ARC", "confidence": "high"}}"#);
//! let extractor = DirectExtractor::new(BackendClient::new(backend, &config), config);
//!
//! let nome = FieldSpec::new("nome", "Nome do profissional");
//! let document = DocumentText::new("oab_1", "JOANA D'ARC\nInscrição 101943");
//! let outcome = extractor.extract(&[&nome], &document).await;
//!
//! assert_eq!(outcome.candidates[0].value.as_deref(), Some("JOANA D'ARC"));
//! # }
//! ```

#![warn(missing_docs)]

mod backend;
mod config;
mod direct;
mod error;
mod parser;
mod prompt;
mod synthesizer;
pub mod text;
mod types;


pub use backend::BackendClient;
pub use config::ExtractorConfig;
pub use direct::DirectExtractor;
pub use error::ExtractorError;
pub use parser::{extract_json, parse_direct_response, parse_pattern_response};
pub use prompt::{DirectPromptBuilder, PatternPromptBuilder, DIRECT_TASK_TAG, PATTERN_TASK_TAG};
pub use synthesizer::PatternSynthesizer;
pub use types::{DirectOutcome, PatternTarget};
