//! Pattern memory
//!
//! Patterns validated on one document are remembered per layout label and
//! re-applied to later documents of the same layout, which then need no
//! backend call for those fields. Rejected patterns are remembered too and
//! fed back into synthesis prompts so they are not proposed again.
//!
//! During a batch the memory is a read-only snapshot. Reports carry what
//! each document learned; [`PatternMemory::absorb`] merges them afterwards.

use crate::OrchestratorError;
use papelada_domain::{Confidence, ExtractionReport, LearnedPattern, RejectedPattern};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

/// Validated patterns kept per field; older entries are dropped first
pub const MAX_PATTERNS_PER_FIELD: usize = 8;

/// Rejected patterns kept per field; older entries are dropped first
pub const MAX_REJECTED_PER_FIELD: usize = 20;

/// A validated pattern kept for reuse
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedPattern {
    /// Pattern text
    pub pattern: String,
    /// Confidence reported when it was synthesized
    pub confidence: Confidence,
}

/// Everything remembered for one layout label
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutMemory {
    /// Validated patterns per field, in the order they were learned
    #[serde(default)]
    pub patterns: BTreeMap<String, Vec<RememberedPattern>>,

    /// Rejected patterns per field
    #[serde(default)]
    pub rejected: BTreeMap<String, Vec<RejectedPattern>>,
}

/// Learned patterns for every layout, persisted as JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMemory {
    #[serde(default)]
    layouts: BTreeMap<String, LayoutMemory>,
}

impl PatternMemory {
    /// Empty memory
    pub fn new() -> Self {
        Self::default()
    }

    /// Load memory from a JSON file
    ///
    /// A missing or empty file is empty memory; unreadable or invalid JSON
    /// is an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OrchestratorError> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No memory file at {}, starting empty", path.display());
            return Ok(Self::new());
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Memory(format!("Failed to read {}: {}", path.display(), e))
        })?;
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let memory: Self = serde_json::from_str(&content)?;
        info!(
            "Loaded {} patterns for {} layouts from {}",
            memory.pattern_count(),
            memory.layouts.len(),
            path.display()
        );
        Ok(memory)
    }

    /// Write memory to a JSON file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), OrchestratorError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| {
            OrchestratorError::Memory(format!("Failed to write {}: {}", path.display(), e))
        })
    }

    /// Remembered patterns for a field of a layout
    pub fn patterns(&self, label: &str, field: &str) -> &[RememberedPattern] {
        self.layouts
            .get(label)
            .and_then(|l| l.patterns.get(field))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Rejected patterns for a field of a layout
    pub fn rejected(&self, label: &str, field: &str) -> &[RejectedPattern] {
        self.layouts
            .get(label)
            .and_then(|l| l.rejected.get(field))
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Everything remembered for a layout
    pub fn layout(&self, label: &str) -> Option<&LayoutMemory> {
        self.layouts.get(label)
    }

    /// Known layout labels
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.layouts.keys().map(String::as_str)
    }

    /// Remember a validated pattern; returns false if it was already known
    ///
    /// At most [`MAX_PATTERNS_PER_FIELD`] are kept per field.
    pub fn remember(&mut self, label: &str, learned: &LearnedPattern) -> bool {
        let layout = self.layouts.entry(label.to_string()).or_default();
        let patterns = layout.patterns.entry(learned.field_name.clone()).or_default();
        if patterns.iter().any(|p| p.pattern == learned.pattern) {
            return false;
        }
        patterns.push(RememberedPattern {
            pattern: learned.pattern.clone(),
            confidence: learned.confidence,
        });
        if patterns.len() > MAX_PATTERNS_PER_FIELD {
            let excess = patterns.len() - MAX_PATTERNS_PER_FIELD;
            patterns.drain(..excess);
        }
        true
    }

    /// Remember a rejected pattern; returns false if it was already known
    pub fn reject(&mut self, label: &str, rejected: &RejectedPattern) -> bool {
        let layout = self.layouts.entry(label.to_string()).or_default();
        let entries = layout.rejected.entry(rejected.field_name.clone()).or_default();
        if entries
            .iter()
            .any(|r| r.pattern == rejected.pattern && r.reason == rejected.reason)
        {
            return false;
        }
        entries.push(rejected.clone());
        if entries.len() > MAX_REJECTED_PER_FIELD {
            let excess = entries.len() - MAX_REJECTED_PER_FIELD;
            entries.drain(..excess);
        }
        true
    }

    /// Merge what a finished batch learned, in report order
    ///
    /// Returns the number of newly remembered patterns.
    pub fn absorb(&mut self, label: &str, reports: &[ExtractionReport]) -> usize {
        let mut learned = 0;
        for report in reports {
            for rejected in &report.rejected_patterns {
                self.reject(label, rejected);
            }
            for pattern in &report.learned_patterns {
                if self.remember(label, pattern) {
                    learned += 1;
                }
            }
        }
        if learned > 0 {
            info!("Remembered {} new patterns for layout '{}'", learned, label);
        }
        learned
    }

    /// Forget one layout; returns whether it existed
    pub fn forget(&mut self, label: &str) -> bool {
        self.layouts.remove(label).is_some()
    }

    /// Forget everything
    pub fn clear(&mut self) {
        self.layouts.clear();
    }

    /// Total remembered (validated) patterns
    pub fn pattern_count(&self) -> usize {
        self.layouts
            .values()
            .flat_map(|l| l.patterns.values())
            .map(Vec::len)
            .sum()
    }

    /// Total remembered rejections
    pub fn rejected_count(&self) -> usize {
        self.layouts
            .values()
            .flat_map(|l| l.rejected.values())
            .map(Vec::len)
            .sum()
    }

    /// Whether nothing is remembered
    pub fn is_empty(&self) -> bool {
        self.layouts.is_empty()
    }

    /// Human-readable overview
    pub fn summary(&self) -> String {
        let mut lines = vec![
            "Pattern Memory".to_string(),
            "==============".to_string(),
            format!("Layouts: {}", self.layouts.len()),
            format!("Patterns: {}", self.pattern_count()),
            format!("Rejected: {}", self.rejected_count()),
        ];

        for (label, layout) in &self.layouts {
            lines.push(String::new());
            lines.push(format!("[{}]", label));
            for (field, patterns) in &layout.patterns {
                for p in patterns {
                    lines.push(format!("  {} ({}): {}", field, p.confidence, p.pattern));
                }
            }
            for (field, rejected) in &layout.rejected {
                lines.push(format!("  {}: {} rejected", field, rejected.len()));
            }
        }

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use papelada_domain::{FieldResult, Schema};

    fn learned(field: &str, pattern: &str) -> LearnedPattern {
        LearnedPattern {
            field_name: field.to_string(),
            pattern: pattern.to_string(),
            confidence: Confidence::High,
        }
    }

    fn rejected(field: &str, pattern: &str) -> RejectedPattern {
        RejectedPattern {
            field_name: field.to_string(),
            pattern: pattern.to_string(),
            reason: "NO_MATCH".to_string(),
            detail: "pattern matched nothing in the document".to_string(),
        }
    }

    #[test]
    fn test_remember_deduplicates() {
        let mut memory = PatternMemory::new();
        assert!(memory.remember("oab", &learned("inscricao", r"Inscri..o\s+(\d+)")));
        assert!(!memory.remember("oab", &learned("inscricao", r"Inscri..o\s+(\d+)")));
        assert!(memory.remember("oab", &learned("inscricao", r"N[ºo]\s*(\d+)")));

        assert_eq!(memory.patterns("oab", "inscricao").len(), 2);
        assert!(memory.patterns("oab", "nome").is_empty());
        assert!(memory.patterns("other", "inscricao").is_empty());
    }

    #[test]
    fn test_patterns_are_capped() {
        let mut memory = PatternMemory::new();
        for i in 0..(MAX_PATTERNS_PER_FIELD + 3) {
            memory.remember("oab", &learned("inscricao", &format!(r"Campo{}\s+(\d+)", i)));
        }
        let kept = memory.patterns("oab", "inscricao");
        assert_eq!(kept.len(), MAX_PATTERNS_PER_FIELD);
        assert_eq!(kept[0].pattern, r"Campo3\s+(\d+)");
    }

    #[test]
    fn test_rejections_are_capped() {
        let mut memory = PatternMemory::new();
        for i in 0..(MAX_REJECTED_PER_FIELD + 5) {
            memory.reject("oab", &rejected("nome", &format!("p{}", i)));
        }
        let kept = memory.rejected("oab", "nome");
        assert_eq!(kept.len(), MAX_REJECTED_PER_FIELD);
        assert_eq!(kept[0].pattern, "p5");
    }

    #[test]
    fn test_absorb_reports_in_order() {
        let schema = Schema::new(vec![papelada_domain::FieldSpec::new("inscricao", "")]).unwrap();
        let mut first = ExtractionReport::completed("a", vec![FieldResult::null("inscricao")]);
        first.learned_patterns.push(learned("inscricao", "p1"));
        first.rejected_patterns.push(rejected("inscricao", "bad"));
        let mut second = ExtractionReport::completed("b", vec![FieldResult::null("inscricao")]);
        second.learned_patterns.push(learned("inscricao", "p1"));
        second.learned_patterns.push(learned("inscricao", "p2"));
        let failed = ExtractionReport::failed(
            "c",
            &schema,
            papelada_domain::DocumentFailure::Cancelled,
            "cancelled",
        );

        let mut memory = PatternMemory::new();
        let added = memory.absorb("oab", &[first, second, failed]);

        assert_eq!(added, 2);
        let patterns: Vec<_> = memory
            .patterns("oab", "inscricao")
            .iter()
            .map(|p| p.pattern.as_str())
            .collect();
        assert_eq!(patterns, vec!["p1", "p2"]);
        assert_eq!(memory.rejected_count(), 1);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("memory.json");

        let mut memory = PatternMemory::new();
        memory.remember("oab", &learned("inscricao", r"(\d{6})"));
        memory.reject("oab", &rejected("nome", "x"));
        memory.save(&path).unwrap();

        let loaded = PatternMemory::load(&path).unwrap();
        assert_eq!(loaded, memory);
    }

    #[test]
    fn test_load_missing_or_empty() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.json");
        assert!(PatternMemory::load(&missing).unwrap().is_empty());

        let empty = dir.path().join("empty.json");
        std::fs::write(&empty, "  \n").unwrap();
        assert!(PatternMemory::load(&empty).unwrap().is_empty());
    }

    #[test]
    fn test_load_corrupt_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memory.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            PatternMemory::load(&path),
            Err(OrchestratorError::Memory(_))
        ));
    }

    #[test]
    fn test_forget_and_clear() {
        let mut memory = PatternMemory::new();
        memory.remember("a", &learned("f", "p"));
        memory.remember("b", &learned("f", "p"));

        assert!(memory.forget("a"));
        assert!(!memory.forget("a"));
        assert_eq!(memory.labels().collect::<Vec<_>>(), vec!["b"]);

        memory.clear();
        assert!(memory.is_empty());
        assert!(memory.summary().contains("Layouts: 0"));
    }
}
