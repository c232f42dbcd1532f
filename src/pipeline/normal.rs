//! Normal-path processor: the single-shot pipeline for documents at or
//! below the size threshold.
//!
//! Each step is gated on the previous step's success, with two deliberate
//! degradations instead of aborts: a failed raw-content fetch interpolates
//! an "unavailable" placeholder into the prompt, and a failed primary
//! generation falls back to returning the raw content verbatim. Only when
//! the fallback fetch also fails does the processor fail.

use crate::client::{attempt_with_fallback, with_retries, GenerationOptions, RemoteService};
use crate::config::ExtractionConfig;
use crate::document::DocumentSource;
use crate::error::ExtractError;
use crate::pipeline::{annotate, route};
use crate::prompts;
use std::sync::Arc;
use tracing::{debug, warn};

/// Outcome of the normal path.
#[derive(Debug)]
pub struct NormalOutcome {
    pub markdown: String,
    /// Whether the annotation pass appended a figures section.
    pub annotated: bool,
    /// Whether the primary generation failed and raw content was returned
    /// verbatim.
    pub used_raw_fallback: bool,
}

/// Run the single-shot pipeline over an already-uploaded document.
pub async fn process(
    service: &Arc<dyn RemoteService>,
    config: &ExtractionConfig,
    doc: &DocumentSource,
    file_id: &str,
) -> Result<NormalOutcome, ExtractError> {
    // Build the instruction. With a template, raw content is fetched and
    // interpolated; a fetch failure degrades the prompt rather than ending
    // the run. Without a template, a minimal synthetic instruction is used.
    let instruction = match config.template.as_deref() {
        Some(template) => {
            let (raw, degraded) = attempt_with_fallback(
                "prompt content fetch",
                || {
                    with_retries(
                        "content fetch",
                        config.max_attempts,
                        config.transfer_retry_delay,
                        || service.fetch_raw_content(file_id),
                    )
                },
                || prompts::RAW_CONTENT_UNAVAILABLE.to_string(),
            )
            .await;
            if degraded {
                warn!("proceeding with a degraded prompt (raw content unavailable)");
            }
            prompts::fill_template(template, &raw)
        }
        None => prompts::document_instruction(None, None, file_id, doc.doc_type),
    };

    let opts = GenerationOptions {
        max_tokens: route::completion_token_budget(doc.byte_size),
        timeout: config.generate_timeout,
    };
    debug!(
        "normal path: {} byte file, max_tokens {}",
        doc.byte_size, opts.max_tokens
    );

    let primary = with_retries(
        "chat completion",
        config.max_attempts,
        config.generate_retry_delay,
        || service.generate(&instruction, &opts),
    )
    .await;

    match primary {
        Ok(text) => {
            let (markdown, annotated) = annotate::maybe_annotate(service, config, text).await;
            Ok(NormalOutcome {
                markdown,
                annotated,
                used_raw_fallback: false,
            })
        }
        Err(e) => {
            // Degrade: return the service's raw extraction verbatim. Only a
            // failure of this second, independently retried fetch fails the
            // document.
            warn!("primary generation failed ({e}); falling back to raw content");
            let raw = with_retries(
                "fallback content fetch",
                config.max_attempts,
                config.transfer_retry_delay,
                || service.fetch_raw_content(file_id),
            )
            .await?;
            Ok(NormalOutcome {
                markdown: raw,
                annotated: false,
                used_raw_fallback: true,
            })
        }
    }
}
