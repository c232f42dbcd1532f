//! Configuration for document extraction.
//!
//! All engine behaviour is controlled through [`ExtractionConfig`], built via
//! its [`ExtractionConfigBuilder`]. The config is constructed once at process
//! start and passed by reference into the engine; the pipeline never reads
//! ambient environment state mid-flight. Credential resolution happens once,
//! at the start of each extraction, through [`ExtractionConfig::resolve_api_key`].
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::client::RemoteService;
use crate::error::ExtractError;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default service endpoint (GLM open platform).
pub const DEFAULT_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "glm-4.5v";

/// Default environment variable consulted for the API key.
pub const DEFAULT_API_KEY_ENV: &str = "ZHIPUAI_API_KEY";

/// Configuration for an extraction run.
///
/// Built via [`ExtractionConfig::builder()`] or [`ExtractionConfig::default()`].
///
/// # Example
/// ```rust
/// use doc2md::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .model("glm-4.5v")
///     .max_attempts(3)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Base URL of the remote service. Default: [`DEFAULT_BASE_URL`].
    pub base_url: String,

    /// Model identifier sent with every chat-completion request.
    pub model: String,

    /// Explicit API key. Highest-precedence credential source.
    pub api_key: Option<String>,

    /// Environment variable consulted when no explicit key is set.
    /// Default: [`DEFAULT_API_KEY_ENV`].
    pub api_key_env: String,

    /// Optional YAML model-config file consulted last
    /// (`models.{model}.api_key`, which may itself be a `${ENV_VAR}`
    /// indirection).
    pub config_file: Option<PathBuf>,

    /// Extraction instruction template containing a `{file_content}`
    /// substitution point. `None` selects the synthetic built-in
    /// instructions. Load from a prompts file with
    /// [`crate::prompts::load_extraction_template`].
    pub template: Option<String>,

    /// Attempt budget for upload, content fetch, and primary generation.
    /// Default: 3.
    pub max_attempts: u32,

    /// Smaller attempt budget for per-chunk generation and the image
    /// annotation pass. Default: 2.
    pub secondary_attempts: u32,

    /// Fixed delay between attempts for upload/fetch/annotation calls.
    /// Default: 5 s. No jitter, no exponential backoff; retries within one
    /// document are sequential, so a fixed pause suffices.
    pub transfer_retry_delay: Duration,

    /// Fixed delay between primary generation attempts. Default: 10 s.
    /// Generation calls are the expensive ones; the longer pause gives an
    /// overloaded backend room to recover.
    pub generate_retry_delay: Duration,

    /// Per-call timeout for file upload. Default: 60 s.
    pub upload_timeout: Duration,

    /// Per-call timeout for raw-content fetches. Default: 300 s.
    pub content_timeout: Duration,

    /// Per-call timeout for primary generation. Default: 300 s.
    pub generate_timeout: Duration,

    /// Per-call timeout for chunk generation and image annotation.
    /// Default: 120 s.
    pub secondary_timeout: Duration,

    /// Sampling temperature for every generation call. Default: 0.3.
    /// Fixed by the wire contract; exposed for experimentation only.
    pub temperature: f32,

    /// Whether to run the image annotation pass on normal-path results.
    /// Default: true.
    pub annotate_images: bool,

    /// Batch size used by [`crate::batch::process_directory`] purely for log
    /// grouping; processing stays sequential. Default: 3.
    pub batch_size: usize,

    /// Pre-constructed remote service. Takes precedence over the HTTP client
    /// (no credential resolution happens when set). Useful in tests or when
    /// the caller needs custom middleware.
    pub service: Option<Arc<dyn RemoteService>>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            config_file: None,
            template: None,
            max_attempts: 3,
            secondary_attempts: 2,
            transfer_retry_delay: Duration::from_secs(5),
            generate_retry_delay: Duration::from_secs(10),
            upload_timeout: Duration::from_secs(60),
            content_timeout: Duration::from_secs(300),
            generate_timeout: Duration::from_secs(300),
            secondary_timeout: Duration::from_secs(120),
            temperature: 0.3,
            annotate_images: true,
            batch_size: 3,
            service: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("config_file", &self.config_file)
            .field("template", &self.template.as_ref().map(|t| t.len()))
            .field("max_attempts", &self.max_attempts)
            .field("secondary_attempts", &self.secondary_attempts)
            .field("annotate_images", &self.annotate_images)
            .field("batch_size", &self.batch_size)
            .field("service", &self.service.as_ref().map(|_| "<dyn RemoteService>"))
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve the API key, from most-specific to least-specific:
    ///
    /// 1. the explicit `api_key` field,
    /// 2. the `api_key_env` environment variable,
    /// 3. `models.{model}.api_key` in the YAML config file, where the value
    ///    may itself be a `${ENV_VAR}` indirection resolved against the
    ///    process environment.
    ///
    /// Absence at all levels is a fatal [`ExtractError::CredentialsNotFound`];
    /// there is no default key.
    pub fn resolve_api_key(&self) -> Result<String, ExtractError> {
        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                return Ok(key.clone());
            }
        }

        if let Ok(key) = std::env::var(&self.api_key_env) {
            if !key.is_empty() {
                debug!("API key resolved from ${}", self.api_key_env);
                return Ok(key);
            }
        }

        if let Some(ref path) = self.config_file {
            if let Some(key) = read_key_from_config(path, &self.model) {
                return Ok(key);
            }
        }

        Err(ExtractError::CredentialsNotFound {
            env_var: self.api_key_env.clone(),
            config_hint: match self.config_file {
                Some(ref p) => format!(" ('{}')", p.display()),
                None => " (none configured)".to_string(),
            },
        })
    }
}

/// Read `models.{model}.api_key` from a YAML config document, resolving
/// `${ENV_VAR}` indirections and stripping stray quotes.
fn read_key_from_config(path: &Path, model: &str) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let doc: serde_yaml::Value = serde_yaml::from_str(&text).ok()?;
    let raw = doc
        .get("models")?
        .get(model)?
        .get("api_key")?
        .as_str()?
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .to_string();

    if raw.is_empty() {
        return None;
    }

    if let Some(var) = raw.strip_prefix("${").and_then(|s| s.strip_suffix('}')) {
        debug!("config file indirects API key through ${var}");
        return std::env::var(var).ok().filter(|v| !v.is_empty());
    }

    debug!("API key resolved from config file '{}'", path.display());
    Some(raw)
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.config.api_key = Some(key.into());
        self
    }

    pub fn api_key_env(mut self, var: impl Into<String>) -> Self {
        self.config.api_key_env = var.into();
        self
    }

    pub fn config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.config_file = Some(path.into());
        self
    }

    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.config.template = Some(template.into());
        self
    }

    pub fn max_attempts(mut self, n: u32) -> Self {
        self.config.max_attempts = n.max(1);
        self
    }

    pub fn secondary_attempts(mut self, n: u32) -> Self {
        self.config.secondary_attempts = n.max(1);
        self
    }

    pub fn transfer_retry_delay(mut self, d: Duration) -> Self {
        self.config.transfer_retry_delay = d;
        self
    }

    pub fn generate_retry_delay(mut self, d: Duration) -> Self {
        self.config.generate_retry_delay = d;
        self
    }

    pub fn upload_timeout(mut self, d: Duration) -> Self {
        self.config.upload_timeout = d;
        self
    }

    pub fn content_timeout(mut self, d: Duration) -> Self {
        self.config.content_timeout = d;
        self
    }

    pub fn generate_timeout(mut self, d: Duration) -> Self {
        self.config.generate_timeout = d;
        self
    }

    pub fn secondary_timeout(mut self, d: Duration) -> Self {
        self.config.secondary_timeout = d;
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn annotate_images(mut self, v: bool) -> Self {
        self.config.annotate_images = v;
        self
    }

    pub fn batch_size(mut self, n: usize) -> Self {
        self.config.batch_size = n.max(1);
        self
    }

    pub fn service(mut self, service: Arc<dyn RemoteService>) -> Self {
        self.config.service = Some(service);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, ExtractError> {
        let c = &self.config;
        if c.base_url.is_empty() {
            return Err(ExtractError::InvalidConfig("base_url must not be empty".into()));
        }
        if c.model.is_empty() {
            return Err(ExtractError::InvalidConfig("model must not be empty".into()));
        }
        if c.max_attempts == 0 || c.secondary_attempts == 0 {
            return Err(ExtractError::InvalidConfig(
                "attempt budgets must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
