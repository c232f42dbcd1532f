//! Extraction entry points.
//!
//! [`extract`] is the engine's caller contract: one local document in, one
//! final Markdown string (plus run statistics) or an error out. Everything
//! within one document is sequential (each remote round-trip is awaited
//! before the next step begins), so a single extraction needs no locking and
//! failure isolation stays per document.

use crate::client::{with_retries, HttpRemoteClient, RemoteService};
use crate::config::ExtractionConfig;
use crate::document::{DocumentSource, DocumentType};
use crate::error::ExtractError;
use crate::output::{ExtractionOutput, ExtractionStats};
use crate::pipeline::{chunked, normal, route};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Extract a document to Markdown via the remote service.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `path`: local PDF or Word file
/// * `doc_type`: declared type tag (`pdf` | `docx` | `doc`)
/// * `config`: extraction configuration
///
/// # Errors
/// Returns `Err(ExtractError)` when the document cannot be extracted at all:
/// missing file, unresolvable credentials, upload failure, or a failed
/// generation whose raw-content fallback also failed. Degradations (a failed
/// chunk, a skipped annotation pass) are not errors; check
/// [`ExtractionStats`] for them.
pub async fn extract(
    path: impl AsRef<Path>,
    doc_type: DocumentType,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    let start = Instant::now();
    let path = path.as_ref();
    info!("starting {} extraction: {}", doc_type.display_name(), path.display());

    let doc = DocumentSource::open(path, doc_type).await?;
    let service = resolve_service(config)?;

    // Upload; failure here ends the pipeline.
    let file_id = with_retries(
        "upload",
        config.max_attempts,
        config.transfer_retry_delay,
        || service.upload(&doc.path),
    )
    .await?;

    let selected = route::classify(doc.byte_size);
    debug!("{} bytes → {:?} path", doc.byte_size, selected);

    let (markdown, stats) = match selected {
        route::Route::Normal => {
            let outcome = normal::process(&service, config, &doc, &file_id).await?;
            let stats = ExtractionStats {
                byte_size: doc.byte_size,
                route: selected,
                chunk_count: 1,
                degraded_chunks: 0,
                annotated: outcome.annotated,
                used_raw_fallback: outcome.used_raw_fallback,
                duration_ms: start.elapsed().as_millis() as u64,
            };
            (outcome.markdown, stats)
        }
        route::Route::Large => {
            // The chunked path has no per-chunk fallback if this initial
            // fetch itself fails, so its failure is fatal.
            let raw = with_retries(
                "content fetch",
                config.max_attempts,
                config.transfer_retry_delay,
                || service.fetch_raw_content(&file_id),
            )
            .await?;

            let results = chunked::process(&service, config, doc.doc_type, &raw).await;
            let degraded = results.iter().filter(|r| r.degraded).count();
            let markdown = chunked::reassemble(&results, doc.doc_type);
            let stats = ExtractionStats {
                byte_size: doc.byte_size,
                route: selected,
                chunk_count: results.len(),
                degraded_chunks: degraded,
                annotated: false,
                used_raw_fallback: false,
                duration_ms: start.elapsed().as_millis() as u64,
            };
            (markdown, stats)
        }
    };

    info!(
        "extraction complete: {} chars, {} chunk(s), {} degraded, {}ms",
        markdown.chars().count(),
        stats.chunk_count,
        stats.degraded_chunks,
        stats.duration_ms,
    );
    Ok(ExtractionOutput { markdown, stats })
}

/// Extract a document and write the Markdown directly to a file.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn extract_to_file(
    path: impl AsRef<Path>,
    doc_type: DocumentType,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<ExtractionStats, ExtractError> {
    let output = extract(path, doc_type, config).await?;
    let out = output_path.as_ref();

    if let Some(parent) = out.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| ExtractError::OutputWriteFailed {
                path: out.to_path_buf(),
                source: e,
            })?;
    }

    let tmp = out.with_extension("md.tmp");
    tokio::fs::write(&tmp, &output.markdown)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: out.to_path_buf(),
            source: e,
        })?;
    tokio::fs::rename(&tmp, out)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: out.to_path_buf(),
            source: e,
        })?;

    Ok(output.stats)
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    path: impl AsRef<Path>,
    doc_type: DocumentType,
    config: &ExtractionConfig,
) -> Result<ExtractionOutput, ExtractError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| ExtractError::Internal(format!("failed to create tokio runtime: {e}")))?
        .block_on(extract(path, doc_type, config))
}

/// Conventional output file name for an input document:
/// `{basename}_extracted_content.md`.
pub fn output_file_name(input: &Path) -> String {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    format!("{stem}_extracted_content.md")
}

/// Resolve the remote service, from most-specific to least-specific:
///
/// 1. **Pre-built service** (`config.service`): the caller constructed it
///    entirely; used as-is. This is the test seam and the middleware hook;
///    no credential resolution happens.
/// 2. **HTTP client**: credentials are resolved once (explicit key → env
///    var → YAML config field) and an [`HttpRemoteClient`] is built against
///    `config.base_url`.
fn resolve_service(config: &ExtractionConfig) -> Result<Arc<dyn RemoteService>, ExtractError> {
    if let Some(ref service) = config.service {
        return Ok(Arc::clone(service));
    }
    let api_key = config.resolve_api_key()?;
    Ok(Arc::new(HttpRemoteClient::new(config, api_key)))
}
