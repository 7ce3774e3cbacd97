//! Extract command implementation.

use crate::backend::AnyBackend;
use crate::cli::ExtractArgs;
use crate::config::{Config, OutputFormat};
use crate::error::{CliError, Result};
use crate::input;
use crate::output::Formatter;
use papelada_orchestrator::{BatchMetrics, Orchestrator, PatternMemory};
use std::fs;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Execute the extract command.
pub async fn execute_extract(
    args: ExtractArgs,
    config: &Config,
    formatter: &Formatter,
) -> Result<()> {
    let config = apply_overrides(config, &args)?;

    let schema = input::load_schema(&args.schema)?;
    let documents = input::load_documents(&args.docs)?;
    if documents.is_empty() {
        return Err(CliError::InvalidInput("No documents found".to_string()));
    }

    let memory_path = config.memory_path(args.memory.clone())?;
    let memory = PatternMemory::load(&memory_path)?;

    let backend = AnyBackend::from_settings(&config.backend, config.extractor.request_timeout())?;
    let mut orchestrator = Orchestrator::new(backend, config.pipeline())?.with_memory(memory);

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted, cancelling remaining documents");
                cancel.cancel();
            }
        }
    });

    let reports = orchestrator
        .extract_with_cancel(&schema, &documents, cancel)
        .await;
    watcher.abort();
    let reports = reports?;

    println!("{}", formatter.format_reports(&reports)?);

    if let Some(output) = &args.output {
        fs::write(output, serde_json::to_string_pretty(&reports)?)?;
        info!("Reports written to {}", output.display());
    }

    if schema.label().is_some() && !args.no_save_memory {
        let learned = orchestrator.absorb(&schema, &reports);
        orchestrator.memory().save(&memory_path)?;
        info!(
            "{} new pattern(s) saved to {}",
            learned,
            memory_path.display()
        );
    }

    let metrics = BatchMetrics::from_reports(&reports);
    match formatter.format() {
        OutputFormat::Table => {
            println!();
            println!("{}", metrics.summary());
        }
        // Keep stdout machine-readable
        OutputFormat::Json | OutputFormat::Quiet => eprintln!("{}", metrics.summary()),
    }
    if metrics.failed > 0 {
        eprintln!(
            "{}",
            formatter.warning(&format!("{} document(s) failed", metrics.failed))
        );
    }

    Ok(())
}

/// Command-line flags take precedence over the configuration file.
fn apply_overrides(config: &Config, args: &ExtractArgs) -> Result<Config> {
    let mut config = config.clone();
    if let Some(mode) = args.mode {
        config.orchestrator.mode = mode.into();
    }
    if let Some(backend) = args.backend {
        config.backend.kind = backend.into();
    }
    if let Some(model) = &args.model {
        config.backend.model = model.clone();
    }
    if let Some(url) = &args.url {
        config.backend.url = Some(url.clone());
    }
    config.validate()?;
    Ok(config)
}
