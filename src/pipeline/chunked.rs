//! Chunked processor for large documents.
//!
//! A document routed Large is too big for one generation call. The raw
//! content is fetched once, partitioned into contiguous chunks, and each
//! chunk is driven through its own generation call with an independent retry
//! budget. A chunk whose call fails after retries is substituted with its own
//! raw text, so the output chunk count always
//! equals the input chunk count and one bad chunk never sacrifices the rest
//! of the document.
//!
//! Chunks are processed strictly in order, one awaited round-trip at a time,
//! because reassembly depends on chunk order.

use crate::client::{attempt_with_fallback, with_retries, GenerationOptions, RemoteService};
use crate::config::ExtractionConfig;
use crate::document::DocumentType;
use crate::prompts;
use std::sync::Arc;
use tracing::{debug, info};

/// Visual separator between chunk results in the assembled document.
pub const CHUNK_SEPARATOR: &str = "\n\n---\n\n";

/// A contiguous slice of the raw content. Offsets are in characters, not
/// bytes, so slicing can never split a UTF-8 sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub index: usize,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl Chunk {
    /// Chunk length in characters.
    pub fn char_len(&self) -> usize {
        self.end - self.start
    }
}

/// Outcome of one chunk's generation call.
#[derive(Debug, Clone)]
pub struct ChunkResult {
    pub index: usize,
    pub markdown: String,
    /// True when generation failed and the chunk's raw text was substituted.
    pub degraded: bool,
}

/// Chunk size tier for a given total content length (in characters).
/// Larger inputs use larger chunks to bound the number of remote round-trips.
pub fn chunk_size_for(total_chars: usize) -> usize {
    if total_chars > 50_000 {
        15_000
    } else if total_chars > 20_000 {
        10_000
    } else {
        8_000
    }
}

/// Max-output-token budget for one chunk: half the chunk's character count,
/// capped at 6 000.
pub fn chunk_token_budget(chunk_chars: usize) -> u32 {
    ((chunk_chars / 2).min(6_000)) as u32
}

/// Partition raw content into ordered, contiguous, non-overlapping chunks.
///
/// Concatenating the chunk texts in index order reproduces the input
/// exactly, with no gaps or overlaps.
pub fn partition(content: &str) -> Vec<Chunk> {
    let total_chars = content.chars().count();
    if total_chars == 0 {
        return Vec::new();
    }
    let chunk_size = chunk_size_for(total_chars);
    let mut chunks = Vec::with_capacity(total_chars.div_ceil(chunk_size));

    let mut rest = content;
    let mut char_pos = 0;
    let mut index = 0;
    while !rest.is_empty() {
        let take = chunk_size.min(total_chars - char_pos);
        let byte_len = rest
            .char_indices()
            .nth(take)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        chunks.push(Chunk {
            index,
            start: char_pos,
            end: char_pos + take,
            text: rest[..byte_len].to_string(),
        });
        rest = &rest[byte_len..];
        char_pos += take;
        index += 1;
    }
    chunks
}

/// Drive every chunk through the remote service.
///
/// Each chunk gets an independently retried generation call; failure
/// substitutes the chunk's raw text and processing continues.
pub async fn process(
    service: &Arc<dyn RemoteService>,
    config: &ExtractionConfig,
    doc_type: DocumentType,
    raw_content: &str,
) -> Vec<ChunkResult> {
    let chunks = partition(raw_content);
    info!(
        "chunked path: {} chars across {} chunks (chunk size {})",
        raw_content.chars().count(),
        chunks.len(),
        chunk_size_for(raw_content.chars().count()),
    );

    let mut results = Vec::with_capacity(chunks.len());
    for chunk in &chunks {
        let label = format!("chunk {}/{}", chunk.index + 1, chunks.len());
        debug!("{label}: chars {}..{}", chunk.start, chunk.end);

        let instruction =
            prompts::chunk_instruction(config.template.as_deref(), &chunk.text, doc_type);
        let opts = GenerationOptions {
            max_tokens: chunk_token_budget(chunk.char_len()),
            timeout: config.secondary_timeout,
        };

        let (markdown, degraded) = attempt_with_fallback(
            &label,
            || {
                with_retries(
                    &label,
                    config.secondary_attempts,
                    config.transfer_retry_delay,
                    || service.generate(&instruction, &opts),
                )
            },
            || chunk.text.clone(),
        )
        .await;

        results.push(ChunkResult {
            index: chunk.index,
            markdown,
            degraded,
        });
    }
    results
}

/// Reassemble chunk results into the final document.
///
/// A single chunk returns the bare result; more than one chunk joins the
/// results with [`CHUNK_SEPARATOR`] and wraps them in a header/footer banner.
pub fn reassemble(results: &[ChunkResult], doc_type: DocumentType) -> String {
    match results {
        [] => String::new(),
        [single] => single.markdown.clone(),
        many => {
            let body: Vec<&str> = many.iter().map(|r| r.markdown.as_str()).collect();
            format!(
                "# {} document content (processed in chunks)\n\n\
                 > **Note**: this document was too large for a single pass and was \
                 processed in chunks. Sections are separated by `---`.\n\n\
                 {}\n\n---\n\n# End of document\n",
                doc_type.display_name(),
                body.join(CHUNK_SEPARATOR),
            )
        }
    }
}
