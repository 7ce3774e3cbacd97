//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use papelada_extractor::ExtractorConfig;
use papelada_gatekeeper::ValidationConfig;
use papelada_orchestrator::{OrchestratorConfig, PipelineConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// CLI configuration.
///
/// Pipeline sections use the same names and keys as the library configs:
///
/// ```toml
/// [settings]
/// format = "table"
///
/// [backend]
/// kind = "openai"
/// model = "gpt-4o-mini"
///
/// [extractor]
/// request_timeout_ms = 30000
///
/// [validation]
/// case_insensitive = true
///
/// [orchestrator]
/// max_concurrent_documents = 8
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Inference backend
    #[serde(default)]
    pub backend: BackendSettings,

    /// Backend request settings
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Pattern validation settings
    #[serde(default)]
    pub validation: ValidationConfig,

    /// Batch settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// Pattern memory file used when `--memory` is not given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<PathBuf>,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Table format
    Table,
    /// JSON format
    Json,
    /// Quiet (minimal) format
    Quiet,
}

/// Which inference backend to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Local Ollama server
    #[default]
    Ollama,
    /// OpenAI-compatible chat completions (key from `OPENAI_API_KEY`)
    Openai,
}

/// Inference backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    /// Backend kind
    #[serde(default)]
    pub kind: BackendKind,

    /// Model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Base URL (backend default if omitted)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Transport attempts per request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Config {
    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        let dir = dirs::config_dir()
            .ok_or_else(|| CliError::Config("Could not find config directory".into()))?;
        Ok(dir.join("papelada").join("config.toml"))
    }

    /// Load configuration.
    ///
    /// An explicit path must exist. Without one, the default path is used if
    /// present, otherwise defaults apply.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = Self::path()?;
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };

        let contents = fs::read_to_string(&path).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config = Self::from_toml(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Pipeline configuration for the orchestrator.
    pub fn pipeline(&self) -> PipelineConfig {
        PipelineConfig {
            extractor: self.extractor.clone(),
            validation: self.validation.clone(),
            orchestrator: self.orchestrator.clone(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<()> {
        if self.backend.model.trim().is_empty() {
            return Err(CliError::Config("[backend] model must not be empty".into()));
        }
        self.pipeline().validate().map_err(CliError::Config)
    }

    /// Memory file: the explicit path, the configured one, or the default.
    pub fn memory_path(&self, explicit: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = explicit.or_else(|| self.settings.memory.clone()) {
            return Ok(path);
        }
        let dir = dirs::data_dir()
            .ok_or_else(|| CliError::Config("Could not find data directory".into()))?;
        Ok(dir.join("papelada").join("memory.json"))
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Json,
            memory: None,
        }
    }
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            kind: BackendKind::Ollama,
            model: default_model(),
            url: None,
            max_retries: default_max_retries(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Json
}

fn default_model() -> String {
    "llama3.1:8b".to_string()
}

fn default_max_retries() -> u32 {
    3
}
