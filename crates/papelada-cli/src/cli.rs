//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Papelada - Extract fields from documents with validated patterns.
#[derive(Debug, Parser)]
#[command(name = "papelada")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "PAPELADA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log more (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Table format
    Table,
    /// JSON format (default)
    Json,
    /// Quiet format (one line per document)
    Quiet,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Extract schema fields from documents
    Extract(ExtractArgs),

    /// Score saved predictions against ground truth
    Evaluate(EvaluateArgs),

    /// Inspect or clear pattern memory
    Memory(MemoryArgs),
}

/// Arguments for the extract command.
#[derive(Debug, Parser)]
pub struct ExtractArgs {
    /// Schema JSON file
    #[arg(short, long)]
    pub schema: PathBuf,

    /// Text files, or directories of .txt files
    #[arg(short, long, num_args = 1.., required = true)]
    pub docs: Vec<PathBuf>,

    /// Pattern memory file (read before, updated after the batch)
    #[arg(short, long)]
    pub memory: Option<PathBuf>,

    /// Do not write learned patterns back to the memory file
    #[arg(long)]
    pub no_save_memory: bool,

    /// Write reports as JSON to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Extraction mode
    #[arg(long, value_enum)]
    pub mode: Option<ModeArg>,

    /// Inference backend
    #[arg(short, long, value_enum)]
    pub backend: Option<BackendArg>,

    /// Model name
    #[arg(long, env = "PAPELADA_MODEL")]
    pub model: Option<String>,

    /// Backend base URL
    #[arg(long, env = "PAPELADA_BACKEND_URL")]
    pub url: Option<String>,
}

/// Arguments for the evaluate command.
#[derive(Debug, Parser)]
pub struct EvaluateArgs {
    /// Reports JSON written by `extract --output`
    #[arg(short, long)]
    pub predictions: PathBuf,

    /// Ground truth JSON: {document id: {field: value or null}}
    #[arg(short, long)]
    pub ground_truth: PathBuf,
}

/// Arguments for memory management.
#[derive(Debug, Parser)]
pub struct MemoryArgs {
    /// Pattern memory file
    #[arg(short, long, global = true)]
    pub memory: Option<PathBuf>,

    #[command(subcommand)]
    pub action: MemoryAction,
}

/// Memory management actions.
#[derive(Debug, Subcommand)]
pub enum MemoryAction {
    /// Show remembered patterns
    Show,

    /// Forget one layout, or everything
    Clear {
        /// Layout label to forget (all layouts if omitted)
        #[arg(short, long)]
        label: Option<String>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

/// Extraction mode argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum ModeArg {
    /// Direct extraction only
    Direct,
    /// Direct extraction plus validated patterns
    Hybrid,
}

/// Backend argument.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum BackendArg {
    /// Local Ollama server
    Ollama,
    /// OpenAI-compatible API
    Openai,
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Table => crate::config::OutputFormat::Table,
            CliFormat::Json => crate::config::OutputFormat::Json,
            CliFormat::Quiet => crate::config::OutputFormat::Quiet,
        }
    }
}

impl From<ModeArg> for papelada_orchestrator::ExtractionMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Direct => papelada_orchestrator::ExtractionMode::Direct,
            ModeArg::Hybrid => papelada_orchestrator::ExtractionMode::Hybrid,
        }
    }
}

impl From<BackendArg> for crate::config::BackendKind {
    fn from(backend: BackendArg) -> Self {
        match backend {
            BackendArg::Ollama => crate::config::BackendKind::Ollama,
            BackendArg::Openai => crate::config::BackendKind::Openai,
        }
    }
}
