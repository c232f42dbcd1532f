//! CLI binary for doc2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ExtractionConfig`, drives single-file or directory extraction, and
//! exposes the remote file-manager utilities.

use anyhow::{Context, Result};
use clap::Parser;
use doc2md::{
    extract, extract_to_file, process_directory, DocumentType, ExtractionConfig, HttpRemoteClient,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract one document (stdout)
  doc2md report.pdf

  # Extract to a file
  doc2md report.pdf -o report.md

  # Extract every PDF/Word file in a directory
  doc2md ./input -o ./output

  # Use a model config file and a custom prompt template
  doc2md --config config/model_config.yaml --prompts prompts/document_extraction_prompts.yaml report.docx

  # JSON output with run statistics
  doc2md --json report.pdf > report.json

  # Remote file-manager utilities
  doc2md --list-files --limit 50 .
  doc2md --delete-file file-abc123 .

CREDENTIALS (first match wins):
  1. --api-key
  2. the environment variable named by --api-key-env (default ZHIPUAI_API_KEY)
  3. models.{model}.api_key in the --config YAML file; the value may be a
     ${ENV_VAR} indirection resolved against the process environment

ENVIRONMENT VARIABLES:
  ZHIPUAI_API_KEY     API key for the remote service
  DOC2MD_BASE_URL     Override the service endpoint
  DOC2MD_MODEL        Override the model ID
"#;

/// Extract Markdown from PDF and Word documents via a remote multimodal model service.
#[derive(Parser, Debug)]
#[command(
    name = "doc2md",
    version,
    about = "Extract Markdown from PDF and Word documents via a remote multimodal model service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// A PDF/Word file, or a directory to process in batch mode.
    input: PathBuf,

    /// Output file (single input) or output directory (batch mode).
    /// Defaults to stdout for a single file, `./output` for a directory.
    #[arg(short, long, env = "DOC2MD_OUTPUT")]
    output: Option<PathBuf>,

    /// Declared document type (pdf, docx, doc). Inferred from the file
    /// extension when omitted.
    #[arg(long = "type", value_name = "TYPE")]
    doc_type: Option<DocumentType>,

    /// YAML model config file (credential source of last resort).
    #[arg(long, env = "DOC2MD_CONFIG")]
    config: Option<PathBuf>,

    /// YAML prompts file with a `document_extraction_prompt` template.
    #[arg(long, env = "DOC2MD_PROMPTS")]
    prompts: Option<PathBuf>,

    /// Explicit API key (highest-precedence credential source).
    #[arg(long, env = "DOC2MD_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Environment variable consulted for the API key.
    #[arg(long, default_value = "ZHIPUAI_API_KEY")]
    api_key_env: String,

    /// Remote service base URL.
    #[arg(long, env = "DOC2MD_BASE_URL")]
    base_url: Option<String>,

    /// Model identifier sent with every generation request.
    #[arg(long, env = "DOC2MD_MODEL")]
    model: Option<String>,

    /// Batch size used to group log output in directory mode.
    #[arg(long, env = "DOC2MD_BATCH_SIZE", default_value_t = 3)]
    batch_size: usize,

    /// Attempt budget for upload/fetch/generation calls.
    #[arg(long, env = "DOC2MD_MAX_ATTEMPTS", default_value_t = 3)]
    max_attempts: u32,

    /// Skip the image annotation pass.
    #[arg(long, env = "DOC2MD_NO_ANNOTATE")]
    no_annotate: bool,

    /// Output structured JSON (markdown + stats) instead of bare Markdown.
    #[arg(long, env = "DOC2MD_JSON")]
    json: bool,

    /// List files held by the remote service, then exit.
    #[arg(long)]
    list_files: bool,

    /// Max entries for --list-files.
    #[arg(long, default_value_t = 20)]
    limit: usize,

    /// Delete a remote file by id, then exit.
    #[arg(long, value_name = "FILE_ID")]
    delete_file: Option<String>,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOC2MD_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOC2MD_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    // ── File-manager utilities ───────────────────────────────────────────
    if cli.list_files || cli.delete_file.is_some() {
        return run_file_manager(&cli, &config).await;
    }

    // ── Batch mode ───────────────────────────────────────────────────────
    if cli.input.is_dir() {
        let out_dir = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from("output"));
        let summary = process_directory(&cli.input, &out_dir, &config)
            .await
            .context("Batch extraction failed")?;

        if !cli.quiet {
            eprintln!(
                "{}  {} document(s) extracted, {} failed  →  {}",
                if summary.failed == 0 {
                    green("✔")
                } else {
                    cyan("⚠")
                },
                bold(&summary.processed.to_string()),
                if summary.failed == 0 {
                    summary.failed.to_string()
                } else {
                    red(&summary.failed.to_string())
                },
                bold(&out_dir.display().to_string()),
            );
        }
        return Ok(());
    }

    // ── Single-file mode ─────────────────────────────────────────────────
    let doc_type = match cli.doc_type {
        Some(t) => t,
        None => DocumentType::from_path(&cli.input).with_context(|| {
            format!(
                "cannot infer document type of '{}'; pass --type pdf|docx|doc",
                cli.input.display()
            )
        })?,
    };

    let spinner = if !cli.quiet && !cli.json {
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(format!("Extracting {}…", cli.input.display()));
        bar.enable_steady_tick(Duration::from_millis(80));
        Some(bar)
    } else {
        None
    };

    if let Some(ref output_path) = cli.output {
        let stats = extract_to_file(&cli.input, doc_type, output_path, &config)
            .await
            .context("Extraction failed")?;
        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }
        if !cli.quiet {
            eprintln!(
                "{}  {} chunk(s), {} degraded, {}ms  →  {}",
                green("✔"),
                stats.chunk_count,
                stats.degraded_chunks,
                stats.duration_ms,
                bold(&output_path.display().to_string()),
            );
        }
    } else {
        let output = extract(&cli.input, doc_type, &config)
            .await
            .context("Extraction failed")?;
        if let Some(bar) = spinner {
            bar.finish_and_clear();
        }

        if cli.json {
            let json =
                serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
            println!("{json}");
        } else {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            handle
                .write_all(output.markdown.as_bytes())
                .context("Failed to write to stdout")?;
            if !output.markdown.ends_with('\n') {
                handle.write_all(b"\n").ok();
            }
        }

        if !cli.quiet && !cli.json {
            eprintln!(
                "   {}  {}",
                dim(&format!(
                    "{} chunk(s), {} degraded",
                    output.stats.chunk_count, output.stats.degraded_chunks
                )),
                dim(&format!("{}ms total", output.stats.duration_ms)),
            );
        }
    }

    Ok(())
}

/// Map CLI args to `ExtractionConfig`.
fn build_config(cli: &Cli) -> Result<ExtractionConfig> {
    let mut builder = ExtractionConfig::builder()
        .api_key_env(&cli.api_key_env)
        .batch_size(cli.batch_size)
        .max_attempts(cli.max_attempts)
        .annotate_images(!cli.no_annotate);

    if let Some(ref url) = cli.base_url {
        builder = builder.base_url(url);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref path) = cli.config {
        builder = builder.config_file(path);
    }
    if let Some(ref path) = cli.prompts {
        if let Some(template) = doc2md::prompts::load_extraction_template(path) {
            builder = builder.template(template);
        }
    }

    builder.build().context("Invalid configuration")
}

/// Run `--list-files` / `--delete-file` against the remote service.
async fn run_file_manager(cli: &Cli, config: &ExtractionConfig) -> Result<()> {
    let api_key = config
        .resolve_api_key()
        .context("No API key for the remote service")?;
    let client = HttpRemoteClient::new(config, api_key);

    if let Some(ref file_id) = cli.delete_file {
        let deleted = client
            .delete_file(file_id)
            .await
            .with_context(|| format!("Failed to delete remote file '{file_id}'"))?;
        if deleted {
            eprintln!("{}  deleted {}", green("✔"), bold(file_id));
        } else {
            eprintln!("{}  service did not delete {}", red("✘"), bold(file_id));
        }
        return Ok(());
    }

    let files = client
        .list_files(cli.limit, "file-extract")
        .await
        .context("Failed to list remote files")?;
    if files.is_empty() {
        eprintln!("no remote files");
        return Ok(());
    }
    println!("{:<30}  {:>10}  {:>12}  FILENAME", "ID", "BYTES", "CREATED");
    for f in files {
        println!(
            "{:<30}  {:>10}  {:>12}  {}",
            f.id, f.bytes, f.created_at, f.filename
        );
    }
    Ok(())
}
