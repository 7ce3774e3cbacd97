//! Gatekeeper configuration

use serde::{Deserialize, Serialize};

/// Configuration for pattern validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Compare captured and reference values ignoring case
    pub case_insensitive: bool,

    /// Reject patterns that spell out the reference value
    pub check_leakage: bool,

    /// Also look for the reference value in the pattern with escapes removed
    /// (`10\.5` spells `10.5`)
    pub check_escaped_leakage: bool,

    /// Upper bound on compiled pattern size (bytes)
    pub regex_size_limit: usize,

    /// Longest pattern text accepted from the backend (chars)
    pub max_pattern_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            case_insensitive: false,
            check_leakage: true,
            check_escaped_leakage: true,
            regex_size_limit: 1 << 20,
            max_pattern_length: 2_000,
        }
    }
}

impl ValidationConfig {
    /// Create a permissive configuration (case-insensitive comparison)
    pub fn permissive() -> Self {
        Self {
            case_insensitive: true,
            ..Self::default()
        }
    }

    /// Create a strict configuration (tight resource limits)
    pub fn strict() -> Self {
        Self {
            case_insensitive: false,
            check_leakage: true,
            check_escaped_leakage: true,
            regex_size_limit: 1 << 18,
            max_pattern_length: 500,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.regex_size_limit == 0 {
            return Err("regex_size_limit must be greater than 0".to_string());
        }
        if self.max_pattern_length == 0 {
            return Err("max_pattern_length must be greater than 0".to_string());
        }
        Ok(())
    }
}
