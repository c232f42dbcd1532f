//! Size routing and token budgeting: the pure sizing decisions.
//!
//! Both functions here are pure (no I/O, no retries), so the thresholds
//! that shape every extraction are trivially testable.

use serde::{Deserialize, Serialize};

/// Documents above this byte size take the chunked path.
pub const LARGE_FILE_THRESHOLD: u64 = 10 * 1024 * 1024;

/// Which processing strategy the size router selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Single-shot pipeline: one generation call over the whole document.
    Normal,
    /// Chunked pipeline: raw content is partitioned and processed per chunk.
    Large,
}

/// Classify a document by byte size. The boundary itself is Normal:
/// Large iff `byte_size > 10 MiB`.
pub fn classify(byte_size: u64) -> Route {
    if byte_size > LARGE_FILE_THRESHOLD {
        Route::Large
    } else {
        Route::Normal
    }
}

/// Max-output-token budget for a whole-document generation call, tiered on
/// file byte size. Larger inputs get longer completions; the tiers bound
/// remote cost instead of a fixed constant.
pub fn completion_token_budget(byte_size: u64) -> u32 {
    const MIB: u64 = 1024 * 1024;
    if byte_size > 5 * MIB {
        16_000
    } else if byte_size > 2 * MIB {
        12_000
    } else {
        8_000
    }
}
