//! Remote service client: typed HTTP operations and the shared retry
//! primitive.
//!
//! Higher pipeline stages never touch HTTP directly; they call through the
//! [`RemoteService`] trait, which keeps the seam mockable (tests inject a
//! deterministic stub via [`crate::config::ExtractionConfig::service`]) and
//! keeps every transport decision in one file.
//!
//! ## Retry strategy
//!
//! The same call-with-retry pattern recurs at five call sites (upload, fetch,
//! primary generate, chunk generate, annotation generate, plus the fallback
//! fetch). [`with_retries`] is the single parameterised implementation:
//! a fixed attempt budget and a fixed inter-attempt delay, no jitter, no
//! exponential backoff. Trait operations themselves are single-attempt; the
//! budget and delay are chosen per call site from the config.

use crate::error::ExtractError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Purpose tag sent with every upload, fixed by the service contract.
const UPLOAD_PURPOSE: &str = "file-extract";

/// Options for one generation call.
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Maximum tokens the service may generate.
    pub max_tokens: u32,
    /// Per-call timeout.
    pub timeout: Duration,
}

/// One round-trip to the remote content-understanding service.
///
/// Every operation is a single attempt; retry budgets live at the call sites
/// (see [`with_retries`]). Implementations must not panic; all failures
/// surface as [`ExtractError`].
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Upload a local file, returning the service's opaque file id.
    async fn upload(&self, path: &Path) -> Result<String, ExtractError>;

    /// Fetch the raw extracted text for an uploaded file.
    async fn fetch_raw_content(&self, file_id: &str) -> Result<String, ExtractError>;

    /// Run one chat-completion over the given prompt.
    async fn generate(
        &self,
        prompt: &str,
        opts: &GenerationOptions,
    ) -> Result<String, ExtractError>;
}

/// Run a fallible operation up to `attempts` times with a fixed delay
/// between attempts.
///
/// Non-retryable errors (config errors, empty 2xx responses) abort the loop
/// immediately. Exhaustion converts into
/// [`ExtractError::RetriesExhausted`] carrying the last cause.
pub async fn with_retries<T, F, Fut>(
    operation: &str,
    attempts: u32,
    delay: Duration,
    mut call: F,
) -> Result<T, ExtractError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ExtractError>>,
{
    let attempts = attempts.max(1);
    let mut last: Option<ExtractError> = None;

    for attempt in 1..=attempts {
        if attempt > 1 {
            debug!("{operation}: retrying in {}s", delay.as_secs());
            sleep(delay).await;
        }
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) => {
                warn!("{operation}: attempt {attempt}/{attempts} failed: {e}");
                last = Some(e);
            }
        }
    }

    Err(ExtractError::RetriesExhausted {
        operation: operation.to_string(),
        attempts,
        last: Box::new(
            last.unwrap_or_else(|| ExtractError::Internal("empty retry loop".into())),
        ),
    })
}

/// Run an operation and substitute a fallback value if it fails.
///
/// Both degradation sites (raw-content interpolation in the normal path,
/// per-chunk substitution in the chunked path) go through this one
/// combinator. Returns the value and whether the fallback was used.
pub async fn attempt_with_fallback<T, F, Fut, G>(label: &str, op: F, fallback: G) -> (T, bool)
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, ExtractError>>,
    G: FnOnce() -> T,
{
    match op().await {
        Ok(value) => (value, false),
        Err(e) => {
            warn!("{label} failed ({e}); substituting fallback value");
            (fallback(), true)
        }
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct UploadResponse {
    #[serde(default)]
    id: String,
}

#[derive(Deserialize)]
struct FileContentResponse {
    #[serde(default)]
    content: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: ChatChoiceMessage,
}

#[derive(Deserialize, Default)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct FileListResponse {
    #[serde(default)]
    data: Vec<RemoteFileInfo>,
}

/// Metadata for one file held by the remote service.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteFileInfo {
    pub id: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub bytes: u64,
    #[serde(default)]
    pub created_at: u64,
    #[serde(default)]
    pub purpose: String,
}

#[derive(Deserialize)]
struct DeleteResponse {
    #[serde(default)]
    deleted: bool,
}

// ── HTTP client ──────────────────────────────────────────────────────────

/// [`RemoteService`] implementation over HTTP (GLM-style wire contract).
pub struct HttpRemoteClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    upload_timeout: Duration,
    content_timeout: Duration,
}

impl HttpRemoteClient {
    /// Create a client from a resolved API key and config values.
    pub fn new(config: &crate::config::ExtractionConfig, api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            upload_timeout: config.upload_timeout,
            content_timeout: config.content_timeout,
        }
    }

    /// List files held by the remote service (file-manager utility, no retry).
    pub async fn list_files(
        &self,
        limit: usize,
        purpose: &str,
    ) -> Result<Vec<RemoteFileInfo>, ExtractError> {
        let op = "file list";
        let url = format!("{}/files", self.base_url);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .query(&[("limit", limit.to_string()), ("purpose", purpose.to_string())])
            .timeout(self.content_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(op, self.content_timeout, e))?;
        let resp = check_status(op, resp).await?;
        let body: FileListResponse = decode_json(op, resp).await?;
        Ok(body.data)
    }

    /// Delete a remote file by id (file-manager utility, no retry).
    pub async fn delete_file(&self, file_id: &str) -> Result<bool, ExtractError> {
        let op = "file delete";
        let url = format!("{}/files/{}", self.base_url, file_id);
        let resp = self
            .http
            .delete(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(op, self.upload_timeout, e))?;
        let resp = check_status(op, resp).await?;
        let body: DeleteResponse = decode_json(op, resp).await?;
        Ok(body.deleted)
    }
}

#[async_trait]
impl RemoteService for HttpRemoteClient {
    async fn upload(&self, path: &Path) -> Result<String, ExtractError> {
        let op = "upload";

        // Missing file is a config error: fatal, never retried.
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|_| ExtractError::FileNotFound {
                path: path.to_path_buf(),
            })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        debug!("{op}: {} ({} bytes)", file_name, bytes.len());

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(file_name),
            )
            .text("purpose", UPLOAD_PURPOSE);

        let url = format!("{}/files", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(op, self.upload_timeout, e))?;
        let resp = check_status(op, resp).await?;
        let body: UploadResponse = decode_json(op, resp).await?;

        if body.id.is_empty() {
            return Err(ExtractError::EmptyResponse {
                operation: op.to_string(),
                field: "id",
            });
        }
        debug!("{op}: file id {}", body.id);
        Ok(body.id)
    }

    async fn fetch_raw_content(&self, file_id: &str) -> Result<String, ExtractError> {
        let op = "content fetch";
        let url = format!("{}/files/{}/content", self.base_url, file_id);
        let resp = self
            .http
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(self.content_timeout)
            .send()
            .await
            .map_err(|e| classify_transport(op, self.content_timeout, e))?;
        let resp = check_status(op, resp).await?;
        let body: FileContentResponse = decode_json(op, resp).await?;

        if body.content.is_empty() {
            return Err(ExtractError::EmptyResponse {
                operation: op.to_string(),
                field: "content",
            });
        }
        debug!("{op}: {} chars", body.content.chars().count());
        Ok(body.content)
    }

    async fn generate(
        &self,
        prompt: &str,
        opts: &GenerationOptions,
    ) -> Result<String, ExtractError> {
        let op = "chat completion";
        let payload = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: opts.max_tokens,
            temperature: self.temperature,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .timeout(opts.timeout)
            .send()
            .await
            .map_err(|e| classify_transport(op, opts.timeout, e))?;
        let resp = check_status(op, resp).await?;
        let body: ChatResponse = decode_json(op, resp).await?;

        let content = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default();
        if content.is_empty() {
            // A well-formed but unhelpful response; logged apart from
            // transport failures so the two are distinguishable in traces.
            warn!("{op}: 2xx response with empty completion content");
            return Err(ExtractError::EmptyResponse {
                operation: op.to_string(),
                field: "content",
            });
        }
        debug!("{op}: {} chars generated", content.chars().count());
        Ok(content)
    }
}

// ── Error mapping helpers ────────────────────────────────────────────────

/// Map a reqwest transport failure onto the error taxonomy. Timeout,
/// connection-refused, and other request failures are distinct loggable
/// subkinds but all retryable.
fn classify_transport(operation: &str, timeout: Duration, err: reqwest::Error) -> ExtractError {
    if err.is_timeout() {
        ExtractError::Timeout {
            operation: operation.to_string(),
            secs: timeout.as_secs(),
        }
    } else if err.is_connect() {
        ExtractError::ConnectionFailed {
            operation: operation.to_string(),
            detail: err.to_string(),
        }
    } else {
        ExtractError::RequestFailed {
            operation: operation.to_string(),
            detail: err.to_string(),
        }
    }
}

/// Convert a non-2xx response into a protocol error, capturing the body.
async fn check_status(
    operation: &str,
    resp: reqwest::Response,
) -> Result<reqwest::Response, ExtractError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ExtractError::UnexpectedStatus {
        operation: operation.to_string(),
        status: status.as_u16(),
        body: truncate(&body, 300),
    })
}

async fn decode_json<T: serde::de::DeserializeOwned>(
    operation: &str,
    resp: reqwest::Response,
) -> Result<T, ExtractError> {
    resp.json::<T>().await.map_err(|e| ExtractError::RequestFailed {
        operation: operation.to_string(),
        detail: format!("invalid JSON body: {e}"),
    })
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}
