//! End-to-end engine tests over a scripted in-process service.
//!
//! The remote service is the only effectful dependency, so these tests
//! inject a deterministic stub through `ExtractionConfig::service` and
//! assert on the full pipeline: routing, retry budgets, degradation, the
//! annotation pass, reassembly, and the batch driver. All retry delays are
//! zero so exhaustion paths run instantly.

use async_trait::async_trait;
use doc2md::{
    extract, extract_to_file, process_directory, DocumentType, ExtractError, ExtractionConfig,
    GenerationOptions, RemoteService, Route,
};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Scripted service stub ────────────────────────────────────────────────

/// Pops scripted results per operation; an empty queue yields a default
/// success so only the interesting calls need scripting.
#[derive(Default)]
struct ScriptedService {
    upload_script: Mutex<VecDeque<Result<String, ExtractError>>>,
    fetch_script: Mutex<VecDeque<Result<String, ExtractError>>>,
    generate_script: Mutex<VecDeque<Result<String, ExtractError>>>,
    upload_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    generate_calls: AtomicUsize,
    /// max_tokens of each generation call, in call order.
    budgets: Mutex<Vec<u32>>,
}

impl ScriptedService {
    fn new() -> Self {
        Self::default()
    }

    fn script_upload(self, results: Vec<Result<String, ExtractError>>) -> Self {
        *self.upload_script.lock().unwrap() = results.into();
        self
    }

    fn script_fetch(self, results: Vec<Result<String, ExtractError>>) -> Self {
        *self.fetch_script.lock().unwrap() = results.into();
        self
    }

    fn script_generate(self, results: Vec<Result<String, ExtractError>>) -> Self {
        *self.generate_script.lock().unwrap() = results.into();
        self
    }

    fn budgets(&self) -> Vec<u32> {
        self.budgets.lock().unwrap().clone()
    }
}

/// A retryable service-side failure.
fn transient() -> ExtractError {
    ExtractError::UnexpectedStatus {
        operation: "chat completion".into(),
        status: 503,
        body: "overloaded".into(),
    }
}

#[async_trait]
impl RemoteService for ScriptedService {
    async fn upload(&self, _path: &Path) -> Result<String, ExtractError> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        self.upload_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("file-stub".to_string()))
    }

    async fn fetch_raw_content(&self, _file_id: &str) -> Result<String, ExtractError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.fetch_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("raw extracted text".to_string()))
    }

    async fn generate(
        &self,
        _prompt: &str,
        opts: &GenerationOptions,
    ) -> Result<String, ExtractError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        self.budgets.lock().unwrap().push(opts.max_tokens);
        self.generate_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok("generated output".to_string()))
    }
}

fn test_config(service: &Arc<ScriptedService>) -> ExtractionConfig {
    ExtractionConfig::builder()
        .service(Arc::clone(service) as Arc<dyn RemoteService>)
        .transfer_retry_delay(Duration::ZERO)
        .generate_retry_delay(Duration::ZERO)
        .build()
        .unwrap()
}

fn write_doc(dir: &Path, name: &str, bytes: usize) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, vec![b'x'; bytes]).unwrap();
    path
}

// ── Normal path ──────────────────────────────────────────────────────────

#[tokio::test]
async fn small_document_takes_normal_path_with_base_token_budget() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "small.pdf", 1024);

    let service = Arc::new(ScriptedService::new());
    let config = test_config(&service);

    let output = extract(&doc, DocumentType::Pdf, &config).await.unwrap();

    assert_eq!(output.markdown, "generated output");
    assert_eq!(output.stats.route, Route::Normal);
    assert_eq!(output.stats.chunk_count, 1);
    assert_eq!(output.stats.degraded_chunks, 0);
    assert!(!output.stats.annotated);
    assert!(!output.stats.used_raw_fallback);

    assert_eq!(service.upload_calls.load(Ordering::SeqCst), 1);
    // No template configured: the synthetic instruction needs no raw content.
    assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.budgets(), vec![8_000]);
}

#[tokio::test]
async fn upload_exhaustion_fails_before_any_generation() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "doomed.pdf", 512);

    let service = Arc::new(
        ScriptedService::new().script_upload(vec![
            Err(transient()),
            Err(transient()),
            Err(transient()),
        ]),
    );
    let config = test_config(&service);

    let err = extract(&doc, DocumentType::Pdf, &config).await.unwrap_err();
    match err {
        ExtractError::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(service.upload_calls.load(Ordering::SeqCst), 3);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failed_generation_falls_back_to_raw_content() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "report.docx", 2048);

    let service = Arc::new(
        ScriptedService::new()
            .script_generate(vec![Err(transient()), Err(transient()), Err(transient())])
            .script_fetch(vec![Ok("the raw fallback body".to_string())]),
    );
    let config = test_config(&service);

    let output = extract(&doc, DocumentType::Docx, &config).await.unwrap();
    assert_eq!(output.markdown, "the raw fallback body");
    assert!(output.stats.used_raw_fallback);
    assert!(!output.stats.annotated);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 3);
    assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn generation_recovers_within_retry_budget() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "flaky.pdf", 100);

    let service = Arc::new(
        ScriptedService::new()
            .script_generate(vec![Err(transient()), Ok("second time lucky".to_string())]),
    );
    let config = test_config(&service);

    let output = extract(&doc, DocumentType::Pdf, &config).await.unwrap();
    assert_eq!(output.markdown, "second time lucky");
    assert!(!output.stats.used_raw_fallback);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 2);
}

// ── Annotation pass ──────────────────────────────────────────────────────

#[tokio::test]
async fn image_marker_triggers_annotation_and_appends_figures() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "figures.pdf", 1000);

    let service = Arc::new(ScriptedService::new().script_generate(vec![
        Ok("# Report\n\nsee ![figure 1](placeholder)".to_string()),
        Ok("![figure 1](a bar chart of quarterly revenue)".to_string()),
    ]));
    let config = test_config(&service);

    let output = extract(&doc, DocumentType::Pdf, &config).await.unwrap();
    assert!(output.stats.annotated);
    assert!(output.markdown.starts_with("# Report"));
    assert!(output.markdown.contains("## Figures"));
    assert!(output.markdown.ends_with("![figure 1](a bar chart of quarterly revenue)"));
    // Primary call + one annotation call, with the annotation token cap.
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 2);
    assert_eq!(service.budgets(), vec![8_000, 2_000]);
}

#[tokio::test]
async fn annotation_reply_without_image_syntax_is_discarded() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "figures.pdf", 1000);

    let primary = "The image below shows the architecture.";
    let service = Arc::new(ScriptedService::new().script_generate(vec![
        Ok(primary.to_string()),
        Ok("no figures could be identified".to_string()),
    ]));
    let config = test_config(&service);

    let output = extract(&doc, DocumentType::Pdf, &config).await.unwrap();
    assert!(!output.stats.annotated);
    assert_eq!(output.markdown, primary);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn annotation_failure_preserves_primary_output() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "figures.pdf", 1000);

    let primary = "# Report\n\nsee ![figure 1](placeholder)";
    // The annotation call exhausts both of its attempts.
    let service = Arc::new(ScriptedService::new().script_generate(vec![
        Ok(primary.to_string()),
        Err(transient()),
        Err(transient()),
    ]));
    let config = test_config(&service);

    let output = extract(&doc, DocumentType::Pdf, &config).await.unwrap();
    assert_eq!(output.markdown, primary);
    assert!(!output.stats.annotated);
    assert!(!output.stats.used_raw_fallback);
    // Primary call plus the two failed annotation attempts.
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn annotation_can_be_disabled() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "figures.pdf", 1000);

    let service = Arc::new(
        ScriptedService::new()
            .script_generate(vec![Ok("see ![figure 1](placeholder)".to_string())]),
    );
    let config = ExtractionConfig::builder()
        .service(Arc::clone(&service) as Arc<dyn RemoteService>)
        .transfer_retry_delay(Duration::ZERO)
        .generate_retry_delay(Duration::ZERO)
        .annotate_images(false)
        .build()
        .unwrap();

    let output = extract(&doc, DocumentType::Pdf, &config).await.unwrap();
    assert!(!output.stats.annotated);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 1);
}

// ── Chunked path ─────────────────────────────────────────────────────────

#[tokio::test]
async fn large_document_is_chunked_and_degrades_per_chunk() {
    let dir = tempfile::tempdir().unwrap();
    // One byte over the threshold routes to the chunked path.
    let doc = write_doc(dir.path(), "large.pdf", 10 * 1024 * 1024 + 1);

    // 60 000 chars → chunk size 15 000 → 4 chunks; each 15 000-char block
    // carries a distinct letter so degraded substitution is observable.
    let raw: String = ["a", "b", "c", "d"]
        .iter()
        .map(|s| s.repeat(15_000))
        .collect();

    // Chunk 3 fails both of its attempts; the rest generate normally.
    let service = Arc::new(
        ScriptedService::new()
            .script_fetch(vec![Ok(raw.clone())])
            .script_generate(vec![
                Ok("chunk one md".to_string()),
                Ok("chunk two md".to_string()),
                Err(transient()),
                Err(transient()),
                Ok("chunk four md".to_string()),
            ]),
    );
    let config = test_config(&service);

    let output = extract(&doc, DocumentType::Pdf, &config).await.unwrap();

    assert_eq!(output.stats.route, Route::Large);
    assert_eq!(output.stats.chunk_count, 4);
    assert_eq!(output.stats.degraded_chunks, 1);
    assert!(!output.stats.annotated);

    // Banner wrapping and separators.
    assert!(output.markdown.starts_with("# PDF document content"));
    assert!(output.markdown.ends_with("# End of document\n"));
    assert!(output.markdown.contains("chunk one md"));
    assert!(output.markdown.contains("chunk two md"));
    assert!(output.markdown.contains("chunk four md"));
    // The failed chunk kept its exact raw slice (chars 30 000..45 000).
    assert!(output.markdown.contains(&"c".repeat(15_000)));
    assert!(!output.markdown.contains(&"b".repeat(15_001)));

    // Raw content fetched once; 2 + 2(failed) + 1 generation calls, every
    // chunk at the half-length budget cap.
    assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 5);
    assert!(service.budgets().iter().all(|&b| b == 6_000));
}

#[tokio::test]
async fn chunked_path_fails_only_when_initial_fetch_fails() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "large.pdf", 10 * 1024 * 1024 + 1);

    let service = Arc::new(ScriptedService::new().script_fetch(vec![
        Err(transient()),
        Err(transient()),
        Err(transient()),
    ]));
    let config = test_config(&service);

    let err = extract(&doc, DocumentType::Pdf, &config).await.unwrap_err();
    assert!(matches!(err, ExtractError::RetriesExhausted { .. }));
    assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 3);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 0);
}

// ── Determinism ──────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_runs_produce_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "same.pdf", 10 * 1024 * 1024 + 1);
    let raw = "z".repeat(30_000);

    let mut outputs = Vec::new();
    for _ in 0..2 {
        let service = Arc::new(
            ScriptedService::new()
                .script_fetch(vec![Ok(raw.clone())])
                .script_generate(vec![
                    Ok("first md".to_string()),
                    Ok("second md".to_string()),
                    Ok("third md".to_string()),
                ]),
        );
        let config = test_config(&service);
        outputs.push(extract(&doc, DocumentType::Pdf, &config).await.unwrap().markdown);
    }
    assert_eq!(outputs[0], outputs[1]);
}

// ── File output and batch driver ─────────────────────────────────────────

#[tokio::test]
async fn extract_to_file_writes_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "note.pdf", 64);
    let out = dir.path().join("nested").join("note.md");

    let service = Arc::new(ScriptedService::new());
    let config = test_config(&service);

    let stats = extract_to_file(&doc, DocumentType::Pdf, &out, &config)
        .await
        .unwrap();
    assert_eq!(stats.chunk_count, 1);
    assert_eq!(std::fs::read_to_string(&out).unwrap(), "generated output");
    assert!(!out.with_extension("md.tmp").exists());
}

#[tokio::test]
async fn batch_run_skips_failures_and_names_outputs() {
    let in_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    // Sorted processing order: bad.pdf first, then good.docx.
    write_doc(in_dir.path(), "bad.pdf", 128);
    write_doc(in_dir.path(), "good.docx", 128);
    std::fs::write(in_dir.path().join("skip.txt"), b"not a document").unwrap();

    // First document exhausts its upload budget; second succeeds.
    let service = Arc::new(ScriptedService::new().script_upload(vec![
        Err(transient()),
        Err(transient()),
        Err(transient()),
        Ok("file-good".to_string()),
    ]));
    let config = test_config(&service);

    let summary = process_directory(in_dir.path(), out_dir.path(), &config)
        .await
        .unwrap();

    assert_eq!(summary.processed, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.outputs.len(), 1);
    let expected = out_dir.path().join("good_extracted_content.md");
    assert_eq!(summary.outputs[0], expected);
    assert_eq!(
        std::fs::read_to_string(&expected).unwrap(),
        "generated output"
    );
}

#[tokio::test]
async fn batch_on_empty_directory_is_a_no_op() {
    let in_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();

    let service = Arc::new(ScriptedService::new());
    let config = test_config(&service);

    let summary = process_directory(in_dir.path(), out_dir.path(), &config)
        .await
        .unwrap();
    assert_eq!(summary.processed, 0);
    assert_eq!(summary.failed, 0);
    assert_eq!(service.upload_calls.load(Ordering::SeqCst), 0);
}

// ── Template-driven prompts ──────────────────────────────────────────────

#[tokio::test]
async fn template_path_fetches_raw_content_for_the_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "templated.pdf", 256);

    let service = Arc::new(
        ScriptedService::new().script_fetch(vec![Ok("FETCHED BODY".to_string())]),
    );
    let config = ExtractionConfig::builder()
        .service(Arc::clone(&service) as Arc<dyn RemoteService>)
        .transfer_retry_delay(Duration::ZERO)
        .generate_retry_delay(Duration::ZERO)
        .template("Extract the following:\n{file_content}")
        .build()
        .unwrap();

    let output = extract(&doc, DocumentType::Pdf, &config).await.unwrap();
    assert_eq!(output.markdown, "generated output");
    // The template path interpolates fetched raw content into the prompt.
    assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 1);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn fetch_failure_degrades_the_templated_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let doc = write_doc(dir.path(), "templated.pdf", 256);

    // Every fetch attempt fails; the prompt degrades to the "unavailable"
    // placeholder and generation proceeds anyway.
    let service = Arc::new(ScriptedService::new().script_fetch(vec![
        Err(transient()),
        Err(transient()),
        Err(transient()),
    ]));
    let config = ExtractionConfig::builder()
        .service(Arc::clone(&service) as Arc<dyn RemoteService>)
        .transfer_retry_delay(Duration::ZERO)
        .generate_retry_delay(Duration::ZERO)
        .template("Extract the following:\n{file_content}")
        .build()
        .unwrap();

    let output = extract(&doc, DocumentType::Pdf, &config).await.unwrap();
    assert_eq!(output.markdown, "generated output");
    assert!(!output.stats.used_raw_fallback);
    assert_eq!(service.fetch_calls.load(Ordering::SeqCst), 3);
    assert_eq!(service.generate_calls.load(Ordering::SeqCst), 1);
}
