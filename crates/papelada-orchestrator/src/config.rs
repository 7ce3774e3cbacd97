//! Configuration for batch orchestration

use papelada_extractor::ExtractorConfig;
use papelada_gatekeeper::ValidationConfig;
use serde::{Deserialize, Serialize};

/// Which strategies run for each document
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMode {
    /// Direct extraction only; nothing is synthesized or learned
    Direct,
    /// Direct extraction plus validated pattern synthesis
    #[default]
    Hybrid,
}

/// Configuration for the orchestrator
///
/// # Examples
///
/// ```
/// use papelada_orchestrator::{ExtractionMode, OrchestratorConfig};
///
/// let config = OrchestratorConfig::default();
/// assert_eq!(config.pattern_attempts, 2);
/// assert_eq!(config.mode, ExtractionMode::Hybrid);
///
/// let config = OrchestratorConfig::aggressive();
/// assert_eq!(config.pattern_attempts, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Documents processed at the same time
    pub max_concurrent_documents: usize,

    /// Synthesis attempts per field (the batch request plus retries)
    pub pattern_attempts: u32,

    /// Strategies to run
    pub mode: ExtractionMode,

    /// Synthesize patterns for fields without a reference value, using a
    /// confident direct value as the reference
    pub learn_from_direct: bool,

    /// Apply remembered patterns before calling the backend
    pub use_memory: bool,
}

impl Default for OrchestratorConfig {
    /// Default configuration: hybrid mode, two pattern attempts
    fn default() -> Self {
        Self {
            max_concurrent_documents: 4,
            pattern_attempts: 2,
            mode: ExtractionMode::Hybrid,
            learn_from_direct: false,
            use_memory: true,
        }
    }
}

impl OrchestratorConfig {
    /// Aggressive preset: more documents in flight, a single pattern attempt
    pub fn aggressive() -> Self {
        Self {
            max_concurrent_documents: 16,
            pattern_attempts: 1,
            ..Self::default()
        }
    }

    /// Lenient preset: one document at a time, extra pattern attempts, learn
    /// from direct values
    pub fn lenient() -> Self {
        Self {
            max_concurrent_documents: 1,
            pattern_attempts: 3,
            learn_from_direct: true,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_concurrent_documents == 0 {
            return Err("max_concurrent_documents must be greater than 0".to_string());
        }
        if self.pattern_attempts == 0 {
            return Err("pattern_attempts must be at least 1".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}

/// Every knob of the pipeline, as read from one TOML document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Backend request settings
    pub extractor: ExtractorConfig,
    /// Pattern validation settings
    pub validation: ValidationConfig,
    /// Batch settings
    pub orchestrator: OrchestratorConfig,
}

impl PipelineConfig {
    /// Validate every section
    pub fn validate(&self) -> Result<(), String> {
        self.extractor
            .validate()
            .map_err(|e| format!("[extractor] {}", e))?;
        self.validation
            .validate()
            .map_err(|e| format!("[validation] {}", e))?;
        self.orchestrator
            .validate()
            .map_err(|e| format!("[orchestrator] {}", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = OrchestratorConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.learn_from_direct);
        assert!(config.use_memory);
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(OrchestratorConfig::aggressive().validate().is_ok());
        assert!(OrchestratorConfig::lenient().validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let mut config = OrchestratorConfig::default();
        config.pattern_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = OrchestratorConfig::default();
        config.max_concurrent_documents = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = OrchestratorConfig::lenient();
        let parsed = OrchestratorConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_mode_from_toml() {
        let config = OrchestratorConfig::from_toml("mode = \"direct\"").unwrap();
        assert_eq!(config.mode, ExtractionMode::Direct);
        assert_eq!(config.pattern_attempts, 2);
    }

    #[test]
    fn test_pipeline_sections() {
        let config: PipelineConfig = toml::from_str(
            r#"
            [extractor]
            request_timeout_ms = 5000

            [validation]
            case_insensitive = true

            [orchestrator]
            max_concurrent_documents = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.extractor.request_timeout_ms, 5000);
        assert!(config.validation.case_insensitive);
        assert_eq!(config.orchestrator.max_concurrent_documents, 2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pipeline_reports_section() {
        let mut config = PipelineConfig::default();
        config.extractor.direct_attempts = 0;
        let err = config.validate().unwrap_err();
        assert!(err.starts_with("[extractor]"));
    }
}
