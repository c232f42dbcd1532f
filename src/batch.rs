//! Batch driver: extract every PDF and Word document in a directory.
//!
//! Documents are processed strictly sequentially; the configured batch size
//! only groups the log output so long runs stay readable. One document's
//! failure (even credential exhaustion after retries) never aborts the
//! run: the error is logged and the walk moves on.

use crate::config::ExtractionConfig;
use crate::document::DocumentType;
use crate::error::ExtractError;
use crate::extract::{extract_to_file, output_file_name};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of one directory run.
#[derive(Debug, Default)]
pub struct BatchSummary {
    /// Documents extracted and written successfully.
    pub processed: usize,
    /// Documents that failed (logged and skipped).
    pub failed: usize,
    /// Output files written, in processing order.
    pub outputs: Vec<PathBuf>,
}

/// Collect the extractable documents in a directory (non-recursive),
/// sorted by file name for deterministic processing order.
pub fn collect_documents(dir: &Path) -> Result<Vec<(PathBuf, DocumentType)>, ExtractError> {
    let entries = std::fs::read_dir(dir).map_err(|_| ExtractError::FileNotFound {
        path: dir.to_path_buf(),
    })?;

    let mut docs: Vec<(PathBuf, DocumentType)> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter_map(|p| DocumentType::from_path(&p).map(|t| (p, t)))
        .collect();
    docs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(docs)
}

/// Extract every document in `input_dir`, writing one
/// `{basename}_extracted_content.md` per document into `output_dir`.
pub async fn process_directory(
    input_dir: impl AsRef<Path>,
    output_dir: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<BatchSummary, ExtractError> {
    let input_dir = input_dir.as_ref();
    let output_dir = output_dir.as_ref();

    let docs = collect_documents(input_dir)?;
    info!(
        "scanning '{}': {} extractable document(s)",
        input_dir.display(),
        docs.len()
    );
    if docs.is_empty() {
        return Ok(BatchSummary::default());
    }

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|e| ExtractError::OutputWriteFailed {
            path: output_dir.to_path_buf(),
            source: e,
        })?;

    let batch_size = config.batch_size.max(1);
    let batch_total = docs.len().div_ceil(batch_size);

    let mut summary = BatchSummary::default();
    for (i, (path, doc_type)) in docs.iter().enumerate() {
        if i % batch_size == 0 {
            info!("batch {}/{}", i / batch_size + 1, batch_total);
        }

        let out = output_dir.join(output_file_name(path));
        match extract_to_file(path, *doc_type, &out, config).await {
            Ok(stats) => {
                info!(
                    "wrote '{}' ({} chunk(s), {} degraded)",
                    out.display(),
                    stats.chunk_count,
                    stats.degraded_chunks,
                );
                summary.processed += 1;
                summary.outputs.push(out);
            }
            Err(e) => {
                warn!("skipping '{}': {}", path.display(), e);
                summary.failed += 1;
            }
        }
    }

    info!(
        "batch complete: {} processed, {} failed",
        summary.processed, summary.failed
    );
    Ok(summary)
}
