use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sectionizer_batch::{
    BatchConfig, BatchError, BatchEvent, BatchSummary, FailureKind, LEDGER_FILE, Ledger, run_batch,
};
use sectionizer_core::{LanguageDetector, Sectionizer};

struct LettersAreEnglish;

impl LanguageDetector for LettersAreEnglish {
    fn is_english(&self, text: &str) -> bool {
        text.chars().any(|c| c.is_alphabetic())
    }
}

struct SlowDetector;

impl LanguageDetector for SlowDetector {
    fn is_english(&self, _text: &str) -> bool {
        std::thread::sleep(Duration::from_millis(300));
        true
    }
}

const PAPER: &str = "Introduction\n\nSea levels rise along the coast.\n\n\nMethods\n\nGauges were read each hour.\n\n[1] Smith, J. 2020 Tides and storms along the coast, Journal of Seas";

fn write_inputs(source: &Path) {
    let envelope = serde_json::json!({
        "response": { "docs": [ { "text": [PAPER] } ] }
    });
    std::fs::write(source.join("good.json"), envelope.to_string()).unwrap();
    std::fs::write(source.join("empty.txt"), "Abstract\n\nOnly an abstract here.").unwrap();
    std::fs::write(source.join("broken.json"), r#"{"title": "no text"}"#).unwrap();
}

fn config(output: &Path) -> BatchConfig {
    BatchConfig {
        output_dir: Some(output.to_path_buf()),
        num_workers: 2,
        document_timeout: Duration::from_secs(30),
    }
}

fn sectionizer() -> Sectionizer {
    Sectionizer::new().with_detector(Arc::new(LettersAreEnglish))
}

fn no_progress() -> Arc<dyn Fn(BatchEvent) + Send + Sync> {
    Arc::new(|_: BatchEvent| {})
}

#[tokio::test]
async fn batch_writes_artifacts_and_ledger() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_inputs(source.path());

    let events = Arc::new(Mutex::new(Vec::<BatchEvent>::new()));
    let sink = events.clone();
    let progress: Arc<dyn Fn(BatchEvent) + Send + Sync> =
        Arc::new(move |e: BatchEvent| sink.lock().unwrap().push(e));

    let summary = run_batch(
        source.path(),
        &config(output.path()),
        sectionizer(),
        CancellationToken::new(),
        progress,
    )
    .await
    .unwrap();

    assert_eq!(
        summary,
        BatchSummary {
            total: 3,
            succeeded: 1,
            failed: 2,
            timed_out: 0,
            skipped: 0,
            with_references: 1,
            fallback: 0,
            interrupted: false,
        }
    );

    let processed = std::fs::read_to_string(output.path().join("good_processed.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&processed).unwrap();
    assert_eq!(value["Methods"], "Gauges were read each hour.");
    assert!(value["References"].as_str().unwrap().starts_with("[1] Smith"));
    assert!(output.path().join("good_rejected.json").exists());
    assert!(!output.path().join("empty_processed.json").exists());

    let ledger = Ledger::load(&output.path().join(LEDGER_FILE)).unwrap();
    assert_eq!(ledger.completed().collect::<Vec<_>>(), vec!["good"]);
    assert_eq!(
        ledger.failure("empty").unwrap().kind,
        FailureKind::NoValidSections
    );
    assert_eq!(ledger.failure("broken").unwrap().kind, FailureKind::Malformed);

    let events = events.lock().unwrap();
    assert!(matches!(events.first(), Some(BatchEvent::Started { total: 3, skipped: 0 })));
    assert!(matches!(events.last(), Some(BatchEvent::Finished(_))));
    let completed = events
        .iter()
        .filter(|e| matches!(e, BatchEvent::Completed { .. }))
        .count();
    assert_eq!(completed, 3);
}

#[tokio::test]
async fn headingless_document_counts_as_fallback() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    std::fs::write(
        source.path().join("plain.txt"),
        "Sea levels rise along the coast and storms follow them inland.",
    )
    .unwrap();

    let summary = run_batch(
        source.path(),
        &config(output.path()),
        sectionizer(),
        CancellationToken::new(),
        no_progress(),
    )
    .await
    .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.fallback, 1);
    let processed = std::fs::read_to_string(output.path().join("plain_processed.json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&processed).unwrap();
    assert!(value["text"].as_str().unwrap().starts_with("Sea levels rise"));
}

#[tokio::test]
async fn second_run_skips_known_documents() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_inputs(source.path());

    let cfg = config(output.path());
    run_batch(source.path(), &cfg, sectionizer(), CancellationToken::new(), no_progress())
        .await
        .unwrap();
    let before = std::fs::read_to_string(output.path().join("good_processed.json")).unwrap();

    let summary = run_batch(source.path(), &cfg, sectionizer(), CancellationToken::new(), no_progress())
        .await
        .unwrap();
    assert_eq!(summary.skipped, 3);
    assert_eq!(summary.succeeded + summary.failed + summary.timed_out, 0);

    let after = std::fs::read_to_string(output.path().join("good_processed.json")).unwrap();
    assert_eq!(before, after);
}

#[tokio::test]
async fn legacy_skip_list_is_honored() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_inputs(source.path());
    std::fs::write(output.path().join(LEDGER_FILE), r#"["good"]"#).unwrap();

    let summary = run_batch(
        source.path(),
        &config(output.path()),
        sectionizer(),
        CancellationToken::new(),
        no_progress(),
    )
    .await
    .unwrap();
    assert_eq!(summary.skipped, 1);
    assert!(!output.path().join("good_processed.json").exists());
}

#[tokio::test]
async fn slow_document_times_out_without_output() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    std::fs::write(source.path().join("slow.txt"), PAPER).unwrap();

    let cfg = BatchConfig {
        document_timeout: Duration::from_millis(50),
        ..config(output.path())
    };
    let slow = Sectionizer::new().with_detector(Arc::new(SlowDetector));
    let summary = run_batch(source.path(), &cfg, slow, CancellationToken::new(), no_progress())
        .await
        .unwrap();

    assert_eq!(summary.timed_out, 1);
    assert_eq!(summary.succeeded, 0);
    assert!(!output.path().join("slow_processed.json").exists());

    let ledger = Ledger::load(&output.path().join(LEDGER_FILE)).unwrap();
    assert_eq!(ledger.failure("slow").unwrap().kind, FailureKind::Timeout);
}

#[tokio::test]
async fn cancelled_run_still_saves_ledger() {
    let source = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    write_inputs(source.path());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let summary = run_batch(source.path(), &config(output.path()), sectionizer(), cancel, no_progress())
        .await
        .unwrap();

    assert!(summary.interrupted);
    assert_eq!(summary.succeeded, 0);
    assert!(output.path().join(LEDGER_FILE).exists());
}

#[tokio::test]
async fn missing_source_fails_whole_batch() {
    let output = tempfile::tempdir().unwrap();
    let result = run_batch(
        &output.path().join("does-not-exist"),
        &config(output.path()),
        sectionizer(),
        CancellationToken::new(),
        no_progress(),
    )
    .await;
    assert!(matches!(result, Err(BatchError::SourceUnreadable { .. })));
}
