//! Confidence levels
//!
//! One canonical scale is used internally. Inference backends answer in
//! whatever vocabulary their prompt nudged them towards (English or
//! Portuguese in practice), so [`Confidence::parse_lenient`] translates at
//! the boundary.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Confidence attached to an extracted value, ordered `Low < Medium < High`
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Weak or unverifiable
    #[default]
    Low,
    /// Plausible
    Medium,
    /// Strong
    High,
}

impl Confidence {
    /// Parse an external confidence label
    ///
    /// Accepts English and Portuguese labels regardless of case or accents.
    /// Anything unrecognized is `Low`: the backend's output is untrusted.
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "high" | "alta" | "alto" | "alta confiança" | "alta confianca" => Confidence::High,
            "medium" | "med" | "media" | "média" | "medio" | "médio" => Confidence::Medium,
            _ => Confidence::Low,
        }
    }

    /// Canonical lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
