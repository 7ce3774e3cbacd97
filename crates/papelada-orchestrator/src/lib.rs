//! Papelada Orchestrator
//!
//! Runs the extraction pipeline over batches of documents and reconciles the
//! two strategies into one trusted result per field.
//!
//! # Overview
//!
//! For each document the orchestrator:
//! - applies patterns remembered for the schema's layout label
//! - asks the backend for every remaining value (direct extraction)
//! - at the same time asks for a regex per referenced field (synthesis)
//! - validates each regex against the document, retrying with feedback
//! - reconciles direct values and validated patterns per field
//!
//! A document never aborts the batch. Backend outages and cancellation are
//! recorded in that document's report and the batch carries on.
//!
//! # Document lifecycle
//!
//! | Stage | Meaning |
//! |-------|---------|
//! | `Pending` | Not started |
//! | `Extracting` | Direct and synthesis requests in flight |
//! | `Validating` | Pattern retries in flight |
//! | `Reconciling` | Merging strategy outputs |
//! | `Done` | Finished normally |
//! | `Failed` | Backend unavailable, or the batch was cancelled |
//!
//! # Usage
//!
//! ```no_run
//! use papelada_orchestrator::{Orchestrator, PatternMemory, PipelineConfig};
//! use papelada_domain::{DocumentText, FieldSpec, Schema};
//! use papelada_llm::OllamaBackend;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let schema = Schema::new(vec![
//!     FieldSpec::new("nome", "Nome do profissional"),
//!     FieldSpec::new("inscricao", "Número de inscrição").with_reference("101943"),
//! ])?
//! .with_label("carteira_oab");
//!
//! let backend = OllamaBackend::new("http://localhost:11434", "llama3.1:8b")?;
//! let mut orchestrator = Orchestrator::new(backend, PipelineConfig::default())?
//!     .with_memory(PatternMemory::load("memory.json")?);
//!
//! let documents = vec![DocumentText::new("oab_1.txt", "JOANA D'ARC\nInscrição 101943")];
//! let reports = orchestrator.extract(&schema, &documents).await?;
//!
//! orchestrator.absorb(&schema, &reports);
//! orchestrator.memory().save("memory.json")?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Configuration Presets
//!
//! ```
//! use papelada_orchestrator::OrchestratorConfig;
//!
//! // Default: hybrid mode, 4 documents at a time, 2 pattern attempts
//! let config = OrchestratorConfig::default();
//!
//! // Aggressive: 16 documents at a time, a single pattern attempt
//! let config = OrchestratorConfig::aggressive();
//!
//! // Lenient: one document at a time, 3 pattern attempts, learn from direct values
//! let config = OrchestratorConfig::lenient();
//! ```

#![warn(missing_docs)]

mod config;
mod error;
pub mod evaluation;
pub mod memory;
mod metrics;
mod orchestrator;
mod reconciler;
pub mod state;

pub use config::{ExtractionMode, OrchestratorConfig, PipelineConfig};
pub use error::OrchestratorError;
pub use evaluation::{evaluate, EvaluationReport, FieldEvaluation, GroundTruth, Tally};
pub use memory::{LayoutMemory, PatternMemory, RememberedPattern};
pub use metrics::BatchMetrics;
pub use orchestrator::Orchestrator;
pub use reconciler::Reconciler;
pub use state::{DocumentStage, FieldPipeline, PatternState};
