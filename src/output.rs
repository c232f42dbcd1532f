//! Output types returned from the extraction entry points.

use crate::pipeline::route::Route;
use serde::{Deserialize, Serialize};

/// Result of a successful extraction: the final Markdown plus run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    /// The assembled Markdown document.
    pub markdown: String,
    /// Statistics about the run.
    pub stats: ExtractionStats,
}

/// Statistics about one extraction run.
///
/// Serialisable so CLI users can log or diff runs (`--json`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionStats {
    /// Input document size in bytes.
    pub byte_size: u64,
    /// Which processing path the size router selected.
    pub route: Route,
    /// Number of chunks produced (1 for the normal path).
    pub chunk_count: usize,
    /// Chunks whose generation failed and were substituted with raw text.
    pub degraded_chunks: usize,
    /// Whether the image annotation pass appended a figures section.
    pub annotated: bool,
    /// Whether the primary generation failed and raw content was returned
    /// verbatim instead (normal path only).
    pub used_raw_fallback: bool,
    /// Wall-clock duration of the whole extraction.
    pub duration_ms: u64,
}
