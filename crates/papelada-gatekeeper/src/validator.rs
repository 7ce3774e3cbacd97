//! Pattern validation logic

use crate::normalize::{literal_view, Normalizer};
use crate::{GatekeeperError, ValidationConfig};
use papelada_domain::{DocumentText, PatternCandidate, PatternOrigin, RejectedPattern, ValidatedPattern};
use regex::{Regex, RegexBuilder};
use std::fmt;

/// Outcome of running a pattern over a text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternApplication {
    /// Number of non-overlapping matches
    pub match_count: usize,

    /// Trimmed capture of the first match (group 1, or the whole match when
    /// the pattern has no group); `None` if there was no match or group 1
    /// did not participate
    pub captured: Option<String>,
}

impl PatternApplication {
    /// Exactly one match with a non-blank capture
    pub fn is_unique_hit(&self) -> bool {
        self.match_count == 1 && self.captured.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// Where a leaked reference value was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeakageLocation {
    /// Verbatim in the pattern text
    Pattern,
    /// In the pattern once regex escapes are read as literals
    EscapedLiteral,
}

/// Reasons for rejection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Pattern does not compile (or exceeds the configured limits)
    InvalidPattern(String),

    /// Pattern matched nowhere in the source text
    NoMatch,

    /// Pattern matched more than once; ambiguous, never guessed
    MultipleMatches {
        /// Number of matches found
        count: usize,
    },

    /// Single match, but its capture differs from the reference value
    ValueMismatch {
        /// Reference value
        expected: String,
        /// Captured text (`None` if the group did not participate)
        captured: Option<String>,
    },

    /// Pattern spells out the reference value
    LeakageDetected {
        /// Where the value was found
        location: LeakageLocation,
    },
}

impl RejectionReason {
    /// Stable reason code
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::InvalidPattern(_) => "INVALID_PATTERN",
            RejectionReason::NoMatch => "NO_MATCH",
            RejectionReason::MultipleMatches { .. } => "MULTIPLE_MATCHES",
            RejectionReason::ValueMismatch { .. } => "VALUE_MISMATCH",
            RejectionReason::LeakageDetected { .. } => "LEAKAGE_DETECTED",
        }
    }

    /// Record this rejection against the candidate that caused it
    pub fn record(&self, candidate: &PatternCandidate) -> RejectedPattern {
        RejectedPattern {
            field_name: candidate.field_name.clone(),
            pattern: candidate.pattern.clone(),
            reason: self.code().to_string(),
            detail: self.to_string(),
        }
    }
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::InvalidPattern(msg) => write!(f, "pattern is not a valid regex: {}", msg),
            RejectionReason::NoMatch => f.write_str("pattern matched nothing in the document"),
            RejectionReason::MultipleMatches { count } => write!(
                f,
                "pattern matched {} times; it must match exactly once",
                count
            ),
            RejectionReason::ValueMismatch { expected, captured } => match captured {
                Some(captured) => write!(f, "captured '{}' instead of '{}'", captured, expected),
                None => write!(f, "capture group did not participate; expected '{}'", expected),
            },
            RejectionReason::LeakageDetected { location } => match location {
                LeakageLocation::Pattern => {
                    f.write_str("pattern contains the reference value itself")
                }
                LeakageLocation::EscapedLiteral => {
                    f.write_str("pattern spells the reference value through escapes")
                }
            },
        }
    }
}

/// Validates synthesized patterns against their source document
pub struct PatternValidator {
    config: ValidationConfig,
    normalizer: Normalizer,
}

impl PatternValidator {
    /// Create a new validator with the given configuration
    pub fn new(config: ValidationConfig) -> Result<Self, GatekeeperError> {
        config.validate().map_err(GatekeeperError::Config)?;
        Ok(Self {
            normalizer: Normalizer::new(config.case_insensitive),
            config,
        })
    }

    /// Create a validator with default configuration
    pub fn default_config() -> Self {
        let config = ValidationConfig::default();
        Self {
            normalizer: Normalizer::new(config.case_insensitive),
            config,
        }
    }

    /// Active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Value normalizer used for comparisons
    pub fn normalizer(&self) -> &Normalizer {
        &self.normalizer
    }

    /// Compile a pattern with multi-line and dot-matches-newline semantics
    pub fn compile(&self, pattern: &str) -> Result<Regex, GatekeeperError> {
        if pattern.trim().is_empty() {
            return Err(GatekeeperError::InvalidPattern("empty pattern".to_string()));
        }
        if pattern.chars().count() > self.config.max_pattern_length {
            return Err(GatekeeperError::InvalidPattern(format!(
                "pattern longer than {} characters",
                self.config.max_pattern_length
            )));
        }

        RegexBuilder::new(pattern)
            .multi_line(true)
            .dot_matches_new_line(true)
            .size_limit(self.config.regex_size_limit)
            .build()
            .map_err(|e| GatekeeperError::InvalidPattern(e.to_string()))
    }

    /// Run a pattern over `text`, counting matches and capturing the first
    pub fn apply(&self, pattern: &str, text: &str) -> Result<PatternApplication, GatekeeperError> {
        let regex = self.compile(pattern)?;
        Ok(Self::run(&regex, text))
    }

    fn run(regex: &Regex, text: &str) -> PatternApplication {
        let group = if regex.captures_len() > 1 { 1 } else { 0 };
        let mut match_count = 0;
        let mut captured = None;

        for caps in regex.captures_iter(text) {
            if match_count == 0 {
                captured = caps.get(group).map(|m| m.as_str().trim().to_string());
            }
            match_count += 1;
        }

        PatternApplication {
            match_count,
            captured,
        }
    }

    /// Whether `pattern` embeds `reference`
    ///
    /// Both sides go through the value normalizer, so accents never hide a
    /// leak and case is folded only when values are compared ignoring case.
    /// An anchor word that merely contains the reference's letters in another
    /// case ("Seccional" for "SE") is not a leak.
    pub fn detect_leakage(&self, pattern: &str, reference: &str) -> Option<LeakageLocation> {
        if !self.config.check_leakage {
            return None;
        }

        let needle = self.normalizer.normalize(reference);
        if needle.is_empty() {
            return None;
        }

        if self.normalizer.normalize(pattern).contains(&needle) {
            return Some(LeakageLocation::Pattern);
        }

        if self.config.check_escaped_leakage
            && self
                .normalizer
                .normalize(&literal_view(pattern))
                .contains(&needle)
        {
            return Some(LeakageLocation::EscapedLiteral);
        }

        None
    }

    /// Whether two values are equal after normalization
    pub fn values_match(&self, captured: &str, expected: &str) -> bool {
        self.normalizer.equivalent(captured, expected)
    }

    /// Validate a candidate against the document it was synthesized from
    ///
    /// Checks run in order: compilation, leakage, match count, capture.
    pub fn validate(
        &self,
        candidate: &PatternCandidate,
        document: &DocumentText,
    ) -> Result<ValidatedPattern, RejectionReason> {
        let regex = self
            .compile(&candidate.pattern)
            .map_err(|e| match e {
                GatekeeperError::InvalidPattern(msg) => RejectionReason::InvalidPattern(msg),
                other => RejectionReason::InvalidPattern(other.to_string()),
            })?;

        if let Some(location) = self.detect_leakage(&candidate.pattern, &candidate.ref_value) {
            return Err(RejectionReason::LeakageDetected { location });
        }

        let application = Self::run(&regex, document.raw_text());
        match application.match_count {
            0 => return Err(RejectionReason::NoMatch),
            1 => {}
            count => return Err(RejectionReason::MultipleMatches { count }),
        }

        match application.captured {
            Some(value) if self.values_match(&value, &candidate.ref_value) => Ok(ValidatedPattern {
                candidate: candidate.clone(),
                value,
                origin: PatternOrigin::Synthesized,
            }),
            captured => Err(RejectionReason::ValueMismatch {
                expected: candidate.ref_value.clone(),
                captured,
            }),
        }
    }
}

impl Default for PatternValidator {
    fn default() -> Self {
        Self::default_config()
    }
}
