//! CLI binary for edgequake-flashcards.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `GenerationConfig` and prints the resulting cards.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_flashcards::output::MAX_SET_NAME_CHARS;
use edgequake_flashcards::prompts::DEFAULT_DIRECTIVE;
use edgequake_flashcards::{
    extract_text, generate_from_document, resolve_input, CardValuePolicy, FlashcardError,
    GenerationConfig, GenerationOutput, GenerationProgressCallback, PipelineStage,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner naming the running stage, plus one
/// log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_message(stage: PipelineStage) -> &'static str {
    match stage {
        PipelineStage::Extraction => "Reading document text…",
        PipelineStage::Prompting => "Building prompt…",
        PipelineStage::Generation => "Waiting for the model…",
        PipelineStage::Parsing => "Validating flashcards…",
    }
}

impl GenerationProgressCallback for CliProgressCallback {
    fn on_stage_start(&self, stage: PipelineStage) {
        self.bar.set_prefix(stage.to_string());
        self.bar.set_message(stage_message(stage));
    }

    fn on_stage_complete(&self, stage: PipelineStage, elapsed_ms: u64) {
        self.bar.println(format!(
            "  {} {:<10}  {}",
            green("✓"),
            stage.as_str(),
            dim(&format!("{:.1}s", elapsed_ms as f64 / 1000.0)),
        ));
    }

    fn on_stage_failed(&self, stage: PipelineStage, error: &str) {
        // Keep the line short; the full error is printed on exit.
        let first_line = error.lines().next().unwrap_or_default();
        self.bar.println(format!("  {} {:<10}  {}", red("✗"), stage.as_str(), red(first_line)));
        self.bar.finish_and_clear();
    }

    fn on_generation_complete(&self, card_count: usize) {
        self.bar.finish_and_clear();
        eprintln!("{} {} flashcards generated", green("✔"), bold(&card_count.to_string()));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate flashcards from a PDF (cards printed to stdout)
  flashcards lecture.pdf

  # Name the set and focus the questions
  flashcards notes.docx --name "Cell Biology" --directive "Only cover mitosis"

  # JSON output, written to a file
  flashcards --json lecture.pdf -o cards.json

  # Download from a URL
  flashcards https://example.com/handout.pdf

  # Show the text the model would see (no API key needed)
  flashcards --extract-only lecture.pdf

  # Use a specific model
  flashcards --provider anthropic --model claude-sonnet-4-20250514 lecture.pdf

SUPPORTED INPUTS:
  .pdf   application/pdf
  .docx  application/vnd.openxmlformats-officedocument.wordprocessingml.document
  At most 10 MiB; only the first 5000 characters of text are sent to the model.

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
"#;

/// Generate study flashcards from PDF and Word documents using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "flashcards",
    version,
    about = "Generate study flashcards from PDF and Word documents using LLMs",
    long_about = "Extract the text of a PDF or DOCX document (local file or URL), send an excerpt \
to a language model together with your instructions, and print the validated question/answer \
cards. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and any OpenAI-compatible \
endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local PDF/DOCX file path or HTTP/HTTPS URL.
    input: String,

    /// Flashcard set name (max 100 characters). Default: the file name.
    #[arg(short, long, env = "FLASHCARDS_NAME")]
    name: Option<String>,

    /// Instructions for the model, passed verbatim.
    #[arg(short, long, env = "FLASHCARDS_DIRECTIVE", default_value = DEFAULT_DIRECTIVE)]
    directive: String,

    /// Override the detected media type.
    #[arg(long, env = "FLASHCARDS_MEDIA_TYPE")]
    media_type: Option<String>,

    /// Write output to this file instead of stdout.
    #[arg(short, long, env = "FLASHCARDS_OUTPUT")]
    output: Option<PathBuf>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(
        long,
        env = "EDGEQUAKE_PROVIDER",
        long_help = "LLM provider. Auto-detected from API key env vars if not set.\n\
          Supported: openai, anthropic, gemini, azure, ollama, or any OpenAI-compatible URL."
    )]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "FLASHCARDS_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens.
    #[arg(long, env = "FLASHCARDS_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// Characters of document text sent to the model.
    #[arg(long, env = "FLASHCARDS_EXCERPT_LIMIT", default_value_t = 5000)]
    excerpt_limit: usize,

    /// Maximum input size in bytes.
    #[arg(long, env = "FLASHCARDS_MAX_UPLOAD_BYTES", default_value_t = 10 * 1024 * 1024)]
    max_upload_bytes: usize,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "FLASHCARDS_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Reject numeric or boolean card values instead of converting them to text.
    #[arg(long, env = "FLASHCARDS_STRICT_VALUES")]
    strict_values: bool,

    /// Output structured JSON (GenerationOutput) instead of plain text.
    #[arg(long, env = "FLASHCARDS_JSON")]
    json: bool,

    /// Print the extracted document text only, no generation.
    #[arg(long)]
    extract_only: bool,

    /// Disable progress spinner.
    #[arg(long, env = "FLASHCARDS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "FLASHCARDS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "FLASHCARDS_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "FLASHCARDS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner replaces INFO-level library logs while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn GenerationProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Resolve input ────────────────────────────────────────────────────
    let document = resolve_input(
        &cli.input,
        cli.media_type.as_deref(),
        cli.download_timeout,
        config.max_upload_bytes,
    )
    .await
    .context("Failed to read input")?;

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let extracted = extract_text(document).await.context("Text extraction failed")?;
        if cli.json {
            let value = serde_json::json!({
                "format": extracted.format,
                "chars": extracted.char_count(),
                "text": extracted.text,
            });
            let json = serde_json::to_string_pretty(&value).context("Failed to serialise output")?;
            emit(&cli, &json).await?;
        } else {
            emit(&cli, &extracted.text).await?;
        }
        return Ok(());
    }

    let set_name = cli
        .name
        .clone()
        .unwrap_or_else(|| default_set_name(&cli.input));

    // ── Run generation ───────────────────────────────────────────────────
    let output = match generate_from_document(document, &cli.directive, &set_name, &config).await {
        Ok(output) => output,
        Err(err) => {
            report_failure(&err);
            return Err(err).context("Flashcard generation failed");
        }
    };

    if output.excerpt_truncated && !cli.quiet {
        eprintln!(
            "{}",
            dim(&format!(
                "   note: document has {} characters; only the first {} were used",
                output.stats.extracted_chars, output.stats.excerpt_chars
            ))
        );
    }

    let rendered = if cli.json {
        serde_json::to_string_pretty(&output).context("Failed to serialise output")?
    } else {
        render_cards(&output)
    };
    emit(&cli, &rendered).await?;

    if !cli.quiet && !cli.json {
        eprintln!(
            "   {} tokens in  /  {} tokens out  —  {}ms total",
            dim(&output.stats.input_tokens.to_string()),
            dim(&output.stats.output_tokens.to_string()),
            output.stats.total_ms,
        );
    }

    Ok(())
}

/// Show the raw model reply when it could not be turned into cards.
fn report_failure(err: &FlashcardError) {
    if let Some(raw) = err.raw_output() {
        eprintln!("{}", bold("Raw model output:"));
        eprintln!("{}", dim(raw));
    }
}

/// Plain-text rendering: numbered Q/A pairs.
fn render_cards(output: &GenerationOutput) -> String {
    let mut s = format!("# {}\n", output.set_name);
    for (i, card) in output.cards.iter().enumerate() {
        s.push_str(&format!("\n{}. Q: {}\n   A: {}\n", i + 1, card.front, card.back));
    }
    s
}

/// Set name from the input's file stem, capped at the maximum length.
fn default_set_name(input: &str) -> String {
    let stem = input
        .rsplit('/')
        .next()
        .map(|last| {
            Path::new(last)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "Flashcards".to_string());
    stem.chars().take(MAX_SET_NAME_CHARS).collect()
}

/// Write to `--output` (atomically) or stdout.
async fn emit(cli: &Cli, content: &str) -> Result<()> {
    if let Some(ref path) = cli.output {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp_path = path.with_extension("tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        if !cli.quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
    } else {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        handle
            .write_all(content.as_bytes())
            .context("Failed to write to stdout")?;
        if !content.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }
    Ok(())
}

/// Map CLI args to `GenerationConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<GenerationConfig> {
    let mut builder = GenerationConfig::builder()
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .excerpt_limit(cli.excerpt_limit)
        .max_upload_bytes(cli.max_upload_bytes)
        .value_policy(if cli.strict_values {
            CardValuePolicy::Strict
        } else {
            CardValuePolicy::CoerceScalars
        });

    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
