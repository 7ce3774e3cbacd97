//! Papelada Gatekeeper
//!
//! Proves synthesized extraction patterns before anything trusts them.
//!
//! The Gatekeeper provides:
//! - Pattern validation: exactly one match on the source text, capture equal
//!   to the reference value after normalization
//! - Leakage detection: the reference value must not be spelled out in the
//!   pattern, only its generalized shape
//! - Accent- and whitespace-insensitive value comparison
//!
//! # Examples
//!
//! ```
//! use papelada_gatekeeper::{PatternValidator, RejectionReason};
//! use papelada_domain::{Confidence, DocumentText, PatternCandidate};
//!
//! let validator = PatternValidator::default_config();
//! let document = DocumentText::new("doc1", "Inscrição   101943\nSeccional PR");
//! let candidate = PatternCandidate {
//!     field_name: "inscricao".to_string(),
//!     pattern: r"Inscri[çc][ãa]o\s+(\d+)".to_string(),
//!     ref_value: "101943".to_string(),
//!     confidence: Confidence::High,
//!     reasoning: "number after the label".to_string(),
//! };
//!
//! let validated = validator.validate(&candidate, &document).unwrap();
//! assert_eq!(validated.value, "101943");
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod normalize;
mod validator;

pub use config::ValidationConfig;
pub use error::GatekeeperError;
pub use normalize::{fold_accents, literal_view, Normalizer};
pub use validator::{LeakageLocation, PatternApplication, PatternValidator, RejectionReason};
