//! End-to-end tests for batch extraction against a scripted backend

use papelada_domain::{
    Confidence, DocumentFailure, DocumentStatus, DocumentText, FieldSpec, LearnedPattern,
    ResultSource, Schema,
};
use papelada_extractor::{DIRECT_TASK_TAG, PATTERN_TASK_TAG};
use papelada_llm::MockBackend;
use papelada_orchestrator::{
    evaluate, ExtractionMode, GroundTruth, Orchestrator, OrchestratorError, PatternMemory,
    PipelineConfig,
};
use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const OAB_TEXT: &str = "ORDEM DOS ADVOGADOS DO BRASIL\nJOANA D'ARC\nInscrição   101943\nSeccional PR\nSubseção CURITIBA";

fn inscricao_schema() -> Schema {
    Schema::new(vec![
        FieldSpec::new("inscricao", "Número de inscrição").with_reference("101943"),
    ])
    .unwrap()
}

fn orchestrator(backend: &MockBackend) -> Orchestrator<MockBackend> {
    Orchestrator::default_config(backend.clone()).unwrap()
}

fn orchestrator_with(
    backend: &MockBackend,
    configure: impl FnOnce(&mut PipelineConfig),
) -> Orchestrator<MockBackend> {
    let mut config = PipelineConfig::default();
    configure(&mut config);
    Orchestrator::new(backend.clone(), config).unwrap()
}

#[tokio::test]
async fn test_anchored_pattern_validates_and_reconciles() {
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101943", "confidence": "medium"}}"#,
    );
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"inscricao": {"pattern": "Inscri[çc][ãa]o\\s+(\\d+)", "confidence": "high"}}"#,
    );

    let reports = orchestrator(&backend)
        .extract(&inscricao_schema(), &[DocumentText::new("oab_1", OAB_TEXT)])
        .await
        .unwrap();

    let report = &reports[0];
    assert_eq!(report.status, DocumentStatus::Done);
    let field = report.field("inscricao").unwrap();
    assert_eq!(field.value.as_deref(), Some("101943"));
    assert_eq!(field.source, ResultSource::Reconciled);
    assert!(field.confidence >= Confidence::Medium);
    assert_eq!(field.supporting_pattern.as_deref(), Some(r"Inscri[çc][ãa]o\s+(\d+)"));

    assert_eq!(
        report.learned_patterns,
        vec![LearnedPattern {
            field_name: "inscricao".to_string(),
            pattern: r"Inscri[çc][ãa]o\s+(\d+)".to_string(),
            confidence: Confidence::High,
        }]
    );
    assert_eq!(report.metrics.direct_calls, 1);
    assert_eq!(report.metrics.synthesis_calls, 1);
    assert!(report.warnings.is_empty());
}

#[tokio::test]
async fn test_ambiguous_pattern_falls_back_to_direct() {
    let text = "Inscrição 101943\nProtocolo 101943";
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101943", "confidence": "high"}}"#,
    );
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"inscricao": {"pattern": "(\\d{6})", "confidence": "high"}}"#,
    );

    let reports = orchestrator(&backend)
        .extract(&inscricao_schema(), &[DocumentText::new("dup", text)])
        .await
        .unwrap();

    let report = &reports[0];
    let field = report.field("inscricao").unwrap();
    assert_eq!(field.value.as_deref(), Some("101943"));
    assert_eq!(field.source, ResultSource::Direct);
    assert!(field.supporting_pattern.is_none());

    assert_eq!(report.unresolved_by_pattern.len(), 1);
    assert_eq!(report.unresolved_by_pattern[0].reason, "MULTIPLE_MATCHES");
    assert_eq!(report.unresolved_by_pattern[0].attempts, 2);
    assert_eq!(report.metrics.rejections["MULTIPLE_MATCHES"], 2);
    assert!(report.learned_patterns.is_empty());
    assert_eq!(backend.calls_matching(PATTERN_TASK_TAG), 2);
}

/// Log sink shared with a test subscriber
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[tokio::test]
async fn test_rejections_logged_as_warnings() {
    let logs = CapturedLogs::default();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .with_writer({
            let logs = logs.clone();
            move || logs.clone()
        })
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101943", "confidence": "high"}}"#,
    );
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"inscricao": {"pattern": "(\\d{6})", "confidence": "high"}}"#,
    );

    orchestrator_with(&backend, |config| config.orchestrator.pattern_attempts = 1)
        .extract(
            &inscricao_schema(),
            &[DocumentText::new("dup", "Inscrição 101943\nProtocolo 101943")],
        )
        .await
        .unwrap();

    let output = logs.contents();
    assert!(output.contains("WARN"));
    assert!(output.contains("rejected (MULTIPLE_MATCHES)"));
}

#[tokio::test]
async fn test_retry_carries_feedback() {
    let text = "Inscrição 101943\nProtocolo 101943";
    let backend = MockBackend::default();
    backend.add_response(DIRECT_TASK_TAG, r#"{"inscricao": null}"#);
    backend.add_response(PATTERN_TASK_TAG, r#"{"inscricao": {"pattern": "(\\d{6})"}}"#);
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"inscricao": {"pattern": "Inscri..o\\s+(\\d+)$", "confidence": "medium"}}"#,
    );

    let reports = orchestrator(&backend)
        .extract(&inscricao_schema(), &[DocumentText::new("dup", text)])
        .await
        .unwrap();

    let field = reports[0].field("inscricao").unwrap();
    assert_eq!(field.value.as_deref(), Some("101943"));
    assert_eq!(field.source, ResultSource::Pattern);
    assert_eq!(field.confidence, Confidence::Medium);

    let synthesis_prompts: Vec<String> = backend
        .prompts()
        .into_iter()
        .filter(|p| p.contains(PATTERN_TASK_TAG))
        .collect();
    assert_eq!(synthesis_prompts.len(), 2);
    assert!(!synthesis_prompts[0].contains("Patterns already tried"));
    assert!(synthesis_prompts[1].contains("`(\\d{6})` failed with MULTIPLE_MATCHES"));
    assert_eq!(reports[0].rejected_patterns.len(), 1);
}

#[tokio::test]
async fn test_accented_reference_matches_plain_text() {
    let schema = Schema::new(vec![
        FieldSpec::new("cidade", "Cidade").with_reference("São Paulo"),
    ])
    .unwrap();
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"cidade": {"value": "Sao Paulo", "confidence": "baixa"}}"#,
    );
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"cidade": {"pattern": "Cidade:\\s*([^\\n]+)", "confiança": "alta"}}"#,
    );

    let reports = orchestrator(&backend)
        .extract(&schema, &[DocumentText::new("d", "Nome: X\nCidade: Sao Paulo\n")])
        .await
        .unwrap();

    let field = reports[0].field("cidade").unwrap();
    assert_eq!(field.value.as_deref(), Some("Sao Paulo"));
    assert_eq!(field.source, ResultSource::Reconciled);
    assert_eq!(field.confidence, Confidence::High);
}

#[tokio::test]
async fn test_disagreement_is_flagged_for_review() {
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101934", "confidence": "high"}}"#,
    );
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"inscricao": {"pattern": "Inscri..o\\s+(\\d+)", "confidence": "high"}}"#,
    );

    let reports = orchestrator(&backend)
        .extract(&inscricao_schema(), &[DocumentText::new("oab_1", OAB_TEXT)])
        .await
        .unwrap();

    let field = reports[0].field("inscricao").unwrap();
    assert_eq!(field.value.as_deref(), Some("101943"));
    assert_eq!(field.confidence, Confidence::Low);
    assert!(field.needs_review);
    assert_eq!(field.alternate_value.as_deref(), Some("101934"));
    assert_eq!(reports[0].review_fields().count(), 1);
    assert!(reports[0].warnings.iter().any(|w| w.contains("disagrees")));
}

#[tokio::test]
async fn test_missing_candidate_consumes_attempts() {
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101943", "confidence": "medium"}}"#,
    );
    backend.add_response(PATTERN_TASK_TAG, r#"{"other": {"pattern": "x"}}"#);

    let reports = orchestrator(&backend)
        .extract(&inscricao_schema(), &[DocumentText::new("oab_1", OAB_TEXT)])
        .await
        .unwrap();

    let report = &reports[0];
    assert_eq!(report.unresolved_by_pattern[0].reason, "MISSING_CANDIDATE");
    assert_eq!(report.metrics.synthesis_calls, 2);
    assert_eq!(report.field("inscricao").unwrap().source, ResultSource::Direct);
}

#[tokio::test]
async fn test_backend_outage_fails_only_that_document() {
    let backend = MockBackend::default();
    backend.add_error("OFFLINE-7731");
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101943", "confidence": "high"}}"#,
    );
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"inscricao": {"pattern": "Inscri..o\\s+(\\d+)"}}"#,
    );

    let documents = vec![
        DocumentText::new("down", "OFFLINE-7731\nInscrição 101943"),
        DocumentText::new("up", OAB_TEXT),
    ];
    let reports = orchestrator(&backend)
        .extract(&inscricao_schema(), &documents)
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    let down = &reports[0];
    assert_eq!(down.status, DocumentStatus::DocumentFailed);
    assert_eq!(
        down.error.as_ref().unwrap().reason,
        DocumentFailure::BackendUnavailable
    );
    assert_eq!(down.fields.len(), 1);
    assert_eq!(down.fields[0].source, ResultSource::ReconciledNull);
    assert_eq!(down.metrics.direct_calls, 2);
    assert_eq!(down.metrics.backend_failures, 4);

    assert!(reports[1].is_done());
    assert_eq!(reports[1].value("inscricao"), Some("101943"));
}

#[tokio::test]
async fn test_malformed_responses_are_not_an_outage() {
    let backend = MockBackend::new("sorry, I cannot help with that");

    let reports = orchestrator(&backend)
        .extract(&inscricao_schema(), &[DocumentText::new("d", OAB_TEXT)])
        .await
        .unwrap();

    let report = &reports[0];
    assert!(report.is_done());
    assert_eq!(report.unresolved_fields, vec!["inscricao"]);
    assert_eq!(report.unresolved_by_pattern[0].reason, "BACKEND_FAILURE");
    assert!(!report.warnings.is_empty());
}

#[tokio::test]
async fn test_timeout_counts_as_failure() {
    let backend = MockBackend::failing("connection refused");
    backend.add_delayed(DIRECT_TASK_TAG, Duration::from_millis(300), "{}");

    let orchestrator = orchestrator_with(&backend, |config| {
        config.extractor.request_timeout_ms = 50;
        config.extractor.direct_attempts = 1;
        config.orchestrator.pattern_attempts = 1;
    });
    let reports = orchestrator
        .extract(&inscricao_schema(), &[DocumentText::new("slow", OAB_TEXT)])
        .await
        .unwrap();

    let report = &reports[0];
    assert_eq!(report.status, DocumentStatus::DocumentFailed);
    assert_eq!(report.metrics.timeouts, 1);
}

#[tokio::test]
async fn test_duplicate_document_ids_rejected() {
    let backend = MockBackend::default();
    let documents = vec![
        DocumentText::new("same", "a"),
        DocumentText::new("same", "b"),
    ];

    let result = orchestrator(&backend)
        .extract(&inscricao_schema(), &documents)
        .await;

    assert!(matches!(result, Err(OrchestratorError::DuplicateDocument(id)) if id == "same"));
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_report_order_matches_input() {
    let backend = MockBackend::new(r#"{"inscricao": {"value": "1", "confidence": "low"}}"#);
    backend.add_delayed("SLOW-DOC", Duration::from_millis(80), "{}");

    let documents: Vec<DocumentText> = (0..6)
        .map(|i| {
            let text = if i % 2 == 0 { "SLOW-DOC" } else { "fast" };
            DocumentText::new(format!("doc_{}", i), text)
        })
        .collect();

    let orchestrator = orchestrator_with(&backend, |config| {
        config.orchestrator.max_concurrent_documents = 3;
        config.orchestrator.mode = ExtractionMode::Direct;
    });
    let reports = orchestrator
        .extract(&inscricao_schema(), &documents)
        .await
        .unwrap();

    let ids: Vec<&str> = reports.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["doc_0", "doc_1", "doc_2", "doc_3", "doc_4", "doc_5"]);
}

#[tokio::test]
async fn test_direct_mode_skips_synthesis() {
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101943", "confidence": "high"}}"#,
    );

    let orchestrator = orchestrator_with(&backend, |config| {
        config.orchestrator.mode = ExtractionMode::Direct;
    });
    let reports = orchestrator
        .extract(&inscricao_schema(), &[DocumentText::new("oab_1", OAB_TEXT)])
        .await
        .unwrap();

    assert_eq!(backend.calls_matching(PATTERN_TASK_TAG), 0);
    let field = reports[0].field("inscricao").unwrap();
    assert_eq!(field.source, ResultSource::Direct);
    assert_eq!(field.confidence, Confidence::High);
}

#[tokio::test]
async fn test_learn_from_direct_value() {
    let schema = Schema::new(vec![FieldSpec::new("nome", "Nome do profissional")]).unwrap();
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"nome": {"value": "JOANA D'ARC", "confidence": "high"}}"#,
    );
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"nome": {"pattern": "BRASIL\\n([^\\n]+)", "confidence": "medium"}}"#,
    );

    let orchestrator = orchestrator_with(&backend, |config| {
        config.orchestrator.learn_from_direct = true;
    });
    let reports = orchestrator
        .extract(&schema, &[DocumentText::new("oab_1", OAB_TEXT)])
        .await
        .unwrap();

    let prompts = backend.prompts();
    assert!(prompts[0].contains(DIRECT_TASK_TAG));
    assert!(prompts[1].contains(PATTERN_TASK_TAG));

    let report = &reports[0];
    assert_eq!(report.field("nome").unwrap().source, ResultSource::Reconciled);
    assert_eq!(report.learned_patterns.len(), 1);
}

#[tokio::test]
async fn test_low_confidence_direct_value_is_not_learned() {
    let schema = Schema::new(vec![FieldSpec::new("nome", "Nome do profissional")]).unwrap();
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"nome": {"value": "JOANA D'ARC", "confidence": "low"}}"#,
    );

    let orchestrator = orchestrator_with(&backend, |config| {
        config.orchestrator.learn_from_direct = true;
    });
    orchestrator
        .extract(&schema, &[DocumentText::new("oab_1", OAB_TEXT)])
        .await
        .unwrap();

    assert_eq!(backend.calls_matching(PATTERN_TASK_TAG), 0);
}

#[tokio::test]
async fn test_memory_resolves_without_backend_calls() {
    let schema = inscricao_schema().with_label("carteira_oab");

    // First batch learns the pattern
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101943", "confidence": "high"}}"#,
    );
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"inscricao": {"pattern": "Inscri..o\\s+(\\d+)", "confidence": "high"}}"#,
    );
    let mut first = orchestrator(&backend);
    let reports = first
        .extract(&schema, &[DocumentText::new("oab_1", OAB_TEXT)])
        .await
        .unwrap();
    assert_eq!(first.absorb(&schema, &reports), 1);
    let memory = first.into_memory();

    // Second batch on another document of the same layout, backend down
    let offline = MockBackend::failing("connection refused");
    let second = orchestrator(&offline).with_memory(memory);
    let reports = second
        .extract(
            &schema,
            &[DocumentText::new("oab_2", "JOSE\nInscrição 204512\nSeccional SP")],
        )
        .await
        .unwrap();

    let report = &reports[0];
    assert!(report.is_done());
    assert_eq!(report.value("inscricao"), Some("204512"));
    assert_eq!(report.field("inscricao").unwrap().source, ResultSource::Pattern);
    assert_eq!(report.metrics.memory_hits, 1);
    assert!(report.learned_patterns.is_empty());
    assert_eq!(offline.call_count(), 0);
}

#[tokio::test]
async fn test_memory_ignored_without_label() {
    let mut memory = PatternMemory::new();
    memory.remember(
        "carteira_oab",
        &LearnedPattern {
            field_name: "inscricao".to_string(),
            pattern: r"Inscri..o\s+(\d+)".to_string(),
            confidence: Confidence::High,
        },
    );
    let backend = MockBackend::default();

    let orchestrator = orchestrator(&backend).with_memory(memory);
    let reports = orchestrator
        .extract(&inscricao_schema(), &[DocumentText::new("oab_1", OAB_TEXT)])
        .await
        .unwrap();

    assert_eq!(reports[0].metrics.memory_hits, 0);
    assert!(backend.call_count() > 0);
}

#[tokio::test]
async fn test_cancelled_before_start() {
    let backend = MockBackend::default();
    let token = CancellationToken::new();
    token.cancel();

    let documents = vec![DocumentText::new("a", OAB_TEXT), DocumentText::new("b", OAB_TEXT)];
    let reports = orchestrator(&backend)
        .extract_with_cancel(&inscricao_schema(), &documents, token)
        .await
        .unwrap();

    assert_eq!(reports.len(), 2);
    for report in &reports {
        assert_eq!(report.error.as_ref().unwrap().reason, DocumentFailure::Cancelled);
        assert_eq!(report.fields.len(), 1);
    }
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_cancel_mid_batch_keeps_finished_reports() {
    let backend = MockBackend::default();
    backend.add_delayed("SLOW-DOC", Duration::from_millis(800), "{}");
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101943", "confidence": "high"}}"#,
    );

    let orchestrator = orchestrator_with(&backend, |config| {
        config.orchestrator.max_concurrent_documents = 1;
        config.orchestrator.mode = ExtractionMode::Direct;
    });
    let documents = vec![
        DocumentText::new("fast", OAB_TEXT),
        DocumentText::new("slow", "SLOW-DOC"),
        DocumentText::new("never", OAB_TEXT),
    ];

    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        trigger.cancel();
    });

    let reports = orchestrator
        .extract_with_cancel(&inscricao_schema(), &documents, token)
        .await
        .unwrap();

    let ids: Vec<&str> = reports.iter().map(|r| r.document_id.as_str()).collect();
    assert_eq!(ids, vec!["fast", "slow", "never"]);
    assert!(reports[0].is_done());
    assert_eq!(reports[0].value("inscricao"), Some("101943"));
    for report in &reports[1..] {
        assert_eq!(report.error.as_ref().unwrap().reason, DocumentFailure::Cancelled);
    }
}

#[tokio::test]
async fn test_evaluate_batch() {
    let backend = MockBackend::default();
    backend.add_response(
        DIRECT_TASK_TAG,
        r#"{"inscricao": {"value": "101943", "confidence": "high"}}"#,
    );
    backend.add_response(
        PATTERN_TASK_TAG,
        r#"{"inscricao": {"pattern": "Inscri..o\\s+(\\d+)", "confidence": "high"}}"#,
    );

    let reports = orchestrator(&backend)
        .extract(&inscricao_schema(), &[DocumentText::new("oab_1", OAB_TEXT)])
        .await
        .unwrap();

    let mut ground_truth = GroundTruth::new();
    ground_truth.insert(
        "oab_1".to_string(),
        BTreeMap::from([("inscricao".to_string(), Some("101943".to_string()))]),
    );

    let evaluation = evaluate(&reports, &ground_truth);
    assert_eq!(evaluation.accuracy(), 1.0);
    assert_eq!(evaluation.metrics.total_calls(), 2);
}
