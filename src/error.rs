//! Error types for the doc2md library.
//!
//! The variants group into four failure classes with different handling
//! policies (see [`ExtractError::is_retryable`]):
//!
//! * **Transport**: [`Timeout`](ExtractError::Timeout),
//!   [`ConnectionFailed`](ExtractError::ConnectionFailed),
//!   [`RequestFailed`](ExtractError::RequestFailed). Retried in place with a
//!   fixed delay.
//! * **Protocol**: [`UnexpectedStatus`](ExtractError::UnexpectedStatus).
//!   A non-2xx response; also retried.
//! * **Content**: [`EmptyResponse`](ExtractError::EmptyResponse). The call
//!   succeeded at the HTTP level but returned nothing usable. Not retried:
//!   a well-formed empty answer is unlikely to improve on a second try.
//!   Callers degrade instead (raw-content fallback, per-chunk substitution).
//! * **Config**: [`FileNotFound`](ExtractError::FileNotFound),
//!   [`CredentialsNotFound`](ExtractError::CredentialsNotFound),
//!   [`InvalidConfig`](ExtractError::InvalidConfig). Always fatal and
//!   immediate, never retried.
//!
//! Errors never escape the engine as panics: the top-level `extract*`
//! functions return `Err(ExtractError)` and the batch driver logs the error
//! and moves on to the next document.

use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the doc2md library.
#[derive(Debug, Error)]
pub enum ExtractError {
    // ── Transport errors ──────────────────────────────────────────────────
    /// The HTTP call exceeded its per-call timeout.
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: String, secs: u64 },

    /// Could not reach the remote service at all.
    #[error("{operation} failed: connection error: {detail}")]
    ConnectionFailed { operation: String, detail: String },

    /// Any other request-level failure (DNS, TLS, body read, bad JSON…).
    #[error("{operation} failed: {detail}")]
    RequestFailed { operation: String, detail: String },

    // ── Protocol errors ───────────────────────────────────────────────────
    /// The remote service answered with a non-success status code.
    #[error("{operation} returned HTTP {status}: {body}")]
    UnexpectedStatus {
        operation: String,
        status: u16,
        body: String,
    },

    // ── Content errors ────────────────────────────────────────────────────
    /// A 2xx response whose expected field was missing or empty.
    ///
    /// Distinct from transport failures because the service answered
    /// correctly at the wire level; it just had nothing to say.
    #[error("{operation} returned an empty '{field}' field")]
    EmptyResponse {
        operation: String,
        field: &'static str,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Input document was not found at the given path.
    #[error("document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// No API key could be resolved from any configured source.
    #[error(
        "no API key found.\nLooked in: explicit config value, the '{env_var}' \
         environment variable, and the model config file{config_hint}."
    )]
    CredentialsNotFound {
        env_var: String,
        config_hint: String,
    },

    /// Builder validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Retry exhaustion ──────────────────────────────────────────────────
    /// A retryable operation failed on every attempt.
    #[error("{operation} failed after {attempts} attempts: {last}")]
    RetriesExhausted {
        operation: String,
        attempts: u32,
        #[source]
        last: Box<ExtractError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
    #[error("failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ExtractError {
    /// Whether the retry loop should attempt this operation again.
    ///
    /// Transport and protocol errors are transient; config errors and empty
    /// 2xx responses are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ExtractError::Timeout { .. }
                | ExtractError::ConnectionFailed { .. }
                | ExtractError::RequestFailed { .. }
                | ExtractError::UnexpectedStatus { .. }
        )
    }
}
