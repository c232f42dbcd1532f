//! Pipeline stages for remote document extraction.
//!
//! Each submodule implements exactly one decision or transformation step.
//! Keeping stages separate makes each independently testable and keeps the
//! routing thresholds, the per-chunk drive, and the annotation heuristic
//! from entangling.
//!
//! ## Data Flow
//!
//! ```text
//! upload ──▶ route ──┬─▶ normal ──▶ annotate ──▶ Markdown
//!  (id)    (by size) │  (one call)  (conditional)
//!                    └─▶ chunked ─────────────▶ Markdown
//!                       (fetch, partition, per-chunk calls, reassemble)
//! ```
//!
//! 1. [`route`]: classify by byte size and pick the token budget; pure
//! 2. [`normal`]: single-shot pipeline with raw-content fallback
//! 3. [`chunked`]: partition, per-chunk generation, degraded substitution,
//!    reassembly
//! 4. [`annotate`]: conditional secondary call describing figures
//!    (normal path only, never fatal)

pub mod annotate;
pub mod chunked;
pub mod normal;
pub mod route;
