//! # doc2md
//!
//! Extract structured Markdown from PDF and Word documents by delegating the
//! understanding work to a remote multimodal model service (GLM-style HTTP
//! API).
//!
//! ## Why this crate?
//!
//! Local PDF/Word parsers struggle with scans, complex layouts, and embedded
//! figures. This crate does no local parsing at all: the document is uploaded
//! to a remote model service, which acts as the sole content-understanding
//! oracle. What lives here is the orchestration that makes that reliable:
//! size-based routing, chunk-wise processing of large documents, uniform
//! retry with graceful degradation, and reassembly into one coherent
//! Markdown document.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / Word file
//!  │
//!  ├─ 1. Upload     multipart POST, opaque file id back
//!  ├─ 2. Route      ≤ 10 MiB → normal path, else chunked path
//!  ├─ 3a. Normal    one generation call (template or synthetic prompt),
//!  │                conditional image-annotation pass,
//!  │                raw-content fallback on failure
//!  ├─ 3b. Chunked   fetch raw content once, partition into size-tiered
//!  │                chunks, one independently retried call per chunk,
//!  │                failed chunks degrade to their raw text
//!  └─ 4. Assemble   separator-joined, banner-wrapped Markdown
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use doc2md::{extract, DocumentType, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // API key read from ZHIPUAI_API_KEY (or a model config YAML file)
//!     let config = ExtractionConfig::default();
//!     let output = extract("report.pdf", DocumentType::Pdf, &config).await?;
//!     println!("{}", output.markdown);
//!     eprintln!(
//!         "{} chunk(s), {} degraded",
//!         output.stats.chunk_count, output.stats.degraded_chunks
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `doc2md` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! doc2md = { version = "0.2", default-features = false }
//! ```
//!
//! ## Failure policy
//!
//! Transport and protocol failures are retried with a fixed delay; retry
//! exhaustion, missing credentials, and missing files surface as
//! [`ExtractError`]. Partial failures degrade instead of aborting: a failed
//! chunk keeps its raw text, a failed annotation pass keeps the primary
//! output, a failed primary generation falls back to the raw content.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod client;
pub mod config;
pub mod document;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{process_directory, BatchSummary};
pub use client::{GenerationOptions, HttpRemoteClient, RemoteFileInfo, RemoteService};
pub use config::{ExtractionConfig, ExtractionConfigBuilder};
pub use document::{DocumentSource, DocumentType};
pub use error::ExtractError;
pub use extract::{extract, extract_sync, extract_to_file, output_file_name};
pub use output::{ExtractionOutput, ExtractionStats};
pub use pipeline::route::Route;
