//! Batch orchestration

use crate::config::{ExtractionMode, OrchestratorConfig, PipelineConfig};
use crate::memory::PatternMemory;
use crate::metrics::BatchMetrics;
use crate::reconciler::Reconciler;
use crate::state::{DocumentStage, FieldPipeline};
use crate::OrchestratorError;
use futures::future::join_all;
use futures::stream::{self, StreamExt};
use papelada_domain::traits::InferenceBackend;
use papelada_domain::{
    Confidence, DocumentFailure, DocumentMetrics, DocumentText, ExtractionReport, FieldSpec,
    LearnedPattern, PatternCandidate, PatternOrigin, RejectedPattern, Schema, ValidatedPattern,
};
use papelada_extractor::{
    BackendClient, DirectExtractor, DirectOutcome, ExtractorError, PatternSynthesizer,
    PatternTarget,
};
use papelada_gatekeeper::PatternValidator;
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

type SynthesisResult = Result<HashMap<String, PatternCandidate>, ExtractorError>;

/// Runs the extraction pipeline over batches of documents
///
/// One orchestrator owns one backend connection budget; every request of
/// every document in a batch draws from it.
///
/// # Examples
///
/// ```no_run
/// use papelada_orchestrator::{Orchestrator, PipelineConfig};
/// use papelada_domain::{DocumentText, FieldSpec, Schema};
/// use papelada_llm::MockBackend;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let schema = Schema::new(vec![
///     FieldSpec::new("inscricao", "Número de inscrição").with_reference("101943"),
/// ])?;
/// let orchestrator = Orchestrator::new(MockBackend::default(), PipelineConfig::default())?;
///
/// let documents = vec![DocumentText::new("oab_1", "Inscrição 101943")];
/// let reports = orchestrator.extract(&schema, &documents).await?;
/// assert_eq!(reports.len(), 1);
/// # Ok(())
/// # }
/// ```
pub struct Orchestrator<L> {
    direct: DirectExtractor<L>,
    synthesizer: PatternSynthesizer<L>,
    validator: PatternValidator,
    reconciler: Reconciler,
    memory: PatternMemory,
    config: OrchestratorConfig,
}

/// Synthesis bookkeeping for one document
#[derive(Debug, Default)]
struct SynthesisTally {
    calls: usize,
    failures: usize,
    transport_failures: usize,
    timeouts: usize,
    rejected: Vec<RejectedPattern>,
    elapsed_ms: u64,
}

impl SynthesisTally {
    fn record_call(&mut self, result: &SynthesisResult) {
        self.calls += 1;
        if let Err(e) = result {
            self.failures += 1;
            if e.is_backend_failure() {
                self.transport_failures += 1;
            }
            if e.is_timeout() {
                self.timeouts += 1;
            }
        }
    }

    fn merge(&mut self, other: SynthesisTally) {
        self.calls += other.calls;
        self.failures += other.failures;
        self.transport_failures += other.transport_failures;
        self.timeouts += other.timeouts;
        self.rejected.extend(other.rejected);
    }

    /// No call reached the backend (vacuously true with no calls)
    fn all_unreachable(&self) -> bool {
        self.transport_failures == self.calls
    }
}

impl<L> Orchestrator<L>
where
    L: InferenceBackend + Send + Sync + 'static,
    L::Error: std::fmt::Display,
{
    /// Create an orchestrator over `backend`
    pub fn new(backend: L, config: PipelineConfig) -> Result<Self, OrchestratorError> {
        config.validate().map_err(OrchestratorError::Config)?;

        let client = BackendClient::new(backend, &config.extractor);
        let validator = PatternValidator::new(config.validation)
            .map_err(|e| OrchestratorError::Config(e.to_string()))?;

        Ok(Self {
            direct: DirectExtractor::new(client.clone(), config.extractor.clone()),
            synthesizer: PatternSynthesizer::new(client, config.extractor),
            reconciler: Reconciler::new(*validator.normalizer()),
            validator,
            memory: PatternMemory::new(),
            config: config.orchestrator,
        })
    }

    /// Create an orchestrator with default configuration
    pub fn default_config(backend: L) -> Result<Self, OrchestratorError> {
        Self::new(backend, PipelineConfig::default())
    }

    /// Use `memory` as the pattern memory snapshot
    pub fn with_memory(mut self, memory: PatternMemory) -> Self {
        self.memory = memory;
        self
    }

    /// Current pattern memory
    pub fn memory(&self) -> &PatternMemory {
        &self.memory
    }

    /// Consume the orchestrator, returning its memory
    pub fn into_memory(self) -> PatternMemory {
        self.memory
    }

    /// Batch configuration
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Merge what a finished batch learned into memory
    ///
    /// Only schemas with a layout label are remembered. Returns the number of
    /// newly remembered patterns.
    pub fn absorb(&mut self, schema: &Schema, reports: &[ExtractionReport]) -> usize {
        match schema.label() {
            Some(label) => self.memory.absorb(label, reports),
            None => 0,
        }
    }

    /// Extract every schema field from every document
    ///
    /// Reports come back in input order, one per document. Per-document
    /// failures are recorded in the report; only invalid input fails the
    /// whole call.
    pub async fn extract(
        &self,
        schema: &Schema,
        documents: &[DocumentText],
    ) -> Result<Vec<ExtractionReport>, OrchestratorError> {
        self.extract_with_cancel(schema, documents, CancellationToken::new())
            .await
    }

    /// Like [`extract`](Self::extract), stopping early when `cancel` fires
    ///
    /// Documents not finished at cancellation are reported as failed with
    /// reason `CANCELLED`; finished reports are kept as they are.
    pub async fn extract_with_cancel(
        &self,
        schema: &Schema,
        documents: &[DocumentText],
        cancel: CancellationToken,
    ) -> Result<Vec<ExtractionReport>, OrchestratorError> {
        check_unique_ids(documents)?;

        let batch_id = Uuid::now_v7();
        info!(
            "Batch {} started: {} documents, {} fields, mode {:?}",
            batch_id,
            documents.len(),
            schema.len(),
            self.config.mode
        );

        let cancel = &cancel;
        let reports: Vec<ExtractionReport> = stream::iter(documents)
            .map(|document| {
                let span = info_span!("document", %batch_id, document_id = %document.id());
                async move {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => {
                            debug!("Document '{}' cancelled", document.id());
                            ExtractionReport::failed(
                                document.id(),
                                schema,
                                DocumentFailure::Cancelled,
                                "batch cancelled",
                            )
                        }
                        report = self.process_document(schema, document).instrument(span) => report,
                    }
                }
            })
            .buffered(self.config.max_concurrent_documents)
            .collect()
            .await;

        let metrics = BatchMetrics::from_reports(&reports);
        info!(
            "Batch {} finished: {} done, {} failed, {} cancelled, {}/{} fields resolved",
            batch_id,
            metrics.done,
            metrics.failed,
            metrics.cancelled,
            metrics.fields_resolved,
            metrics.fields_total
        );
        Ok(reports)
    }

    async fn process_document(&self, schema: &Schema, document: &DocumentText) -> ExtractionReport {
        let mut metrics = DocumentMetrics::default();
        let mut warnings = Vec::new();
        let label = schema.label().filter(|_| self.config.use_memory);

        enter(DocumentStage::Pending, document);
        if document.is_empty() {
            warnings.push("document text is empty".to_string());
        }

        let mut resolved: HashMap<String, ValidatedPattern> = HashMap::new();
        if let Some(label) = label {
            for field in schema.fields() {
                if let Some(hit) = self.recall(label, field, document) {
                    resolved.insert(field.name.clone(), hit);
                }
            }
            metrics.memory_hits = resolved.len();
        }

        let pending: Vec<&FieldSpec> = schema
            .fields()
            .iter()
            .filter(|f| !resolved.contains_key(&f.name))
            .collect();

        let mut pipelines: Vec<FieldPipeline> = match self.config.mode {
            ExtractionMode::Hybrid => pending
                .iter()
                .filter_map(|field| PatternTarget::from_field(field).map(|t| (field, t)))
                .map(|(field, target)| self.pipeline(label, field, target))
                .collect(),
            ExtractionMode::Direct => Vec::new(),
        };

        enter(DocumentStage::Extracting, document);
        let (direct, tally) = if pending.is_empty() {
            debug!("Every field resolved from memory, no backend call needed");
            (DirectOutcome::empty(), SynthesisTally::default())
        } else if self.learns_from_direct() {
            let direct = self.direct.extract(&pending, document).await;
            pipelines.extend(self.direct_targets(label, &pending, &direct));
            let tally = self.synthesize_fields(&mut pipelines, document).await;
            (direct, tally)
        } else {
            tokio::join!(
                self.direct.extract(&pending, document),
                self.synthesize_fields(&mut pipelines, document)
            )
        };

        metrics.direct_calls = direct.attempts as usize;
        metrics.synthesis_calls = tally.calls;
        metrics.backend_failures = direct.failures.len() + tally.failures;
        metrics.timeouts = direct.timeouts as usize + tally.timeouts;
        metrics.direct_ms = direct.elapsed_ms;
        metrics.synthesis_ms = tally.elapsed_ms;
        for rejected in &tally.rejected {
            metrics.record_rejection(&rejected.reason);
        }

        if !direct.failures.is_empty() && !direct.succeeded() {
            warnings.push(format!(
                "direct extraction failed after {} attempts: {}",
                direct.attempts,
                direct.failures.join("; ")
            ));
        }

        if direct.backend_failed && tally.all_unreachable() && metrics.memory_hits == 0 {
            enter(DocumentStage::Failed, document);
            let message = format!(
                "inference backend unavailable: {}",
                direct.failures.last().map(String::as_str).unwrap_or("no response")
            );
            error!("Document '{}' failed: {}", document.id(), message);
            let mut report = ExtractionReport::failed(
                document.id(),
                schema,
                DocumentFailure::BackendUnavailable,
                message,
            );
            report.rejected_patterns = tally.rejected;
            report.warnings = warnings;
            report.metrics = metrics;
            return report;
        }

        enter(DocumentStage::Reconciling, document);
        let mut learned_patterns = Vec::new();
        let mut unresolved_by_pattern = Vec::new();
        for pipeline in pipelines {
            if let Some(unresolved) = pipeline.unresolved() {
                warnings.push(format!(
                    "no pattern for '{}' after {} attempts ({})",
                    unresolved.field_name, unresolved.attempts, unresolved.reason
                ));
                unresolved_by_pattern.push(unresolved);
            }
            if let Some(validated) = pipeline.into_validated() {
                if validated.origin == PatternOrigin::Synthesized {
                    learned_patterns.push(LearnedPattern {
                        field_name: validated.field_name().to_string(),
                        pattern: validated.candidate.pattern.clone(),
                        confidence: validated.confidence(),
                    });
                }
                resolved.insert(validated.field_name().to_string(), validated);
            }
        }

        let fields: Vec<_> = schema
            .fields()
            .iter()
            .map(|field| {
                self.reconciler.reconcile(
                    &field.name,
                    direct.candidate(&field.name),
                    resolved.get(&field.name),
                )
            })
            .collect();

        for field in fields.iter().filter(|f| f.needs_review) {
            warnings.push(format!(
                "'{}': direct value '{}' disagrees with pattern value '{}'",
                field.field_name,
                field.alternate_value.as_deref().unwrap_or_default(),
                field.value.as_deref().unwrap_or_default()
            ));
        }

        let mut report = ExtractionReport::completed(document.id(), fields);
        report.unresolved_by_pattern = unresolved_by_pattern;
        report.learned_patterns = learned_patterns;
        report.rejected_patterns = tally.rejected;
        report.warnings = warnings;
        report.metrics = metrics;

        enter(DocumentStage::Done, document);
        info!(
            "Document '{}' done: {}/{} fields resolved, {} backend calls",
            document.id(),
            report.fields.len() - report.unresolved_fields.len(),
            report.fields.len(),
            report.metrics.total_calls()
        );
        report
    }

    fn learns_from_direct(&self) -> bool {
        self.config.mode == ExtractionMode::Hybrid && self.config.learn_from_direct
    }

    /// Apply remembered patterns; the first with exactly one match wins
    fn recall(&self, label: &str, field: &FieldSpec, document: &DocumentText) -> Option<ValidatedPattern> {
        for remembered in self.memory.patterns(label, &field.name) {
            let application = match self.validator.apply(&remembered.pattern, document.raw_text()) {
                Ok(application) => application,
                Err(e) => {
                    debug!("Skipping remembered pattern for '{}': {}", field.name, e);
                    continue;
                }
            };
            if !application.is_unique_hit() {
                continue;
            }
            let value = application.captured.unwrap_or_default();
            debug!("Memory hit for '{}' in '{}'", field.name, document.id());
            return Some(ValidatedPattern {
                candidate: PatternCandidate {
                    field_name: field.name.clone(),
                    pattern: remembered.pattern.clone(),
                    ref_value: value.clone(),
                    confidence: remembered.confidence,
                    reasoning: "remembered pattern".to_string(),
                },
                value,
                origin: PatternOrigin::Memory,
            });
        }
        None
    }

    fn pipeline(&self, label: Option<&str>, field: &FieldSpec, target: PatternTarget) -> FieldPipeline {
        let feedback = label
            .map(|label| self.memory.rejected(label, &field.name).to_vec())
            .unwrap_or_default();
        FieldPipeline::new(target.with_feedback(feedback), self.config.pattern_attempts)
    }

    /// Targets for unreferenced fields, using confident direct values
    fn direct_targets(
        &self,
        label: Option<&str>,
        pending: &[&FieldSpec],
        direct: &DirectOutcome,
    ) -> Vec<FieldPipeline> {
        pending
            .iter()
            .filter(|field| field.reference().is_none())
            .filter_map(|field| {
                let candidate = direct.candidate(&field.name)?;
                let value = candidate.value.as_deref()?;
                if candidate.confidence == Confidence::Low {
                    return None;
                }
                let target = PatternTarget::new(&field.name, &field.description, value);
                Some(self.pipeline(label, field, target))
            })
            .collect()
    }

    /// Drive every field's pattern state machine to a terminal state
    ///
    /// The first attempt is one request covering every field. Retries are
    /// one request per field: concurrent across fields, never more than one
    /// in flight for the same field.
    async fn synthesize_fields(
        &self,
        pipelines: &mut [FieldPipeline],
        document: &DocumentText,
    ) -> SynthesisTally {
        let mut tally = SynthesisTally::default();
        if pipelines.is_empty() {
            return tally;
        }
        let started = Instant::now();

        for pipeline in pipelines.iter_mut() {
            pipeline.begin_attempt();
        }
        let targets: Vec<PatternTarget> = pipelines.iter().map(|p| p.target().clone()).collect();
        let result = self.synthesizer.synthesize(&targets, document).await;
        tally.record_call(&result);
        log_failure(&result, document, "batch");
        for pipeline in pipelines.iter_mut() {
            self.settle(pipeline, &result, document, &mut tally);
        }

        while pipelines.iter().any(FieldPipeline::wants_request) {
            enter(DocumentStage::Validating, document);
            let retries = pipelines
                .iter_mut()
                .filter(|p| p.wants_request())
                .map(|p| self.retry_field(p, document));
            for retry in join_all(retries).await {
                tally.merge(retry);
            }
        }

        tally.elapsed_ms = started.elapsed().as_millis() as u64;
        tally
    }

    async fn retry_field(&self, pipeline: &mut FieldPipeline, document: &DocumentText) -> SynthesisTally {
        let mut tally = SynthesisTally::default();
        pipeline.begin_attempt();
        debug!(
            "Retrying pattern for '{}' (attempt {})",
            pipeline.field_name(),
            pipeline.attempts()
        );

        let result = self
            .synthesizer
            .synthesize(std::slice::from_ref(pipeline.target()), document)
            .await;
        tally.record_call(&result);
        log_failure(&result, document, pipeline.field_name());
        self.settle(pipeline, &result, document, &mut tally);
        tally
    }

    /// Apply one synthesis result to one field
    fn settle(
        &self,
        pipeline: &mut FieldPipeline,
        result: &SynthesisResult,
        document: &DocumentText,
        tally: &mut SynthesisTally,
    ) {
        let candidates = match result {
            Ok(candidates) => candidates,
            Err(_) => {
                pipeline.backend_failed();
                return;
            }
        };

        let Some(candidate) = candidates.get(pipeline.field_name()) else {
            debug!("No pattern returned for '{}'", pipeline.field_name());
            pipeline.missing();
            return;
        };

        match self.validator.validate(candidate, document) {
            Ok(validated) => {
                debug!(
                    "Pattern for '{}' validated: {}",
                    pipeline.field_name(),
                    candidate.pattern
                );
                pipeline.validated(validated);
            }
            Err(reason) => {
                warn!(
                    "Pattern for '{}' rejected ({}): {}",
                    pipeline.field_name(),
                    reason.code(),
                    reason
                );
                let rejected = reason.record(candidate);
                tally.rejected.push(rejected.clone());
                pipeline.rejected(rejected);
            }
        }
    }
}

fn enter(stage: DocumentStage, document: &DocumentText) {
    debug!("Document '{}' -> {:?}", document.id(), stage);
}

fn log_failure(result: &SynthesisResult, document: &DocumentText, scope: &str) {
    if let Err(e) = result {
        warn!(
            "Pattern synthesis ({}) for '{}' failed: {}",
            scope,
            document.id(),
            e
        );
    }
}

fn check_unique_ids(documents: &[DocumentText]) -> Result<(), OrchestratorError> {
    let mut seen = HashSet::with_capacity(documents.len());
    for document in documents {
        if !seen.insert(document.id()) {
            return Err(OrchestratorError::DuplicateDocument(document.id().to_string()));
        }
    }
    Ok(())
}
