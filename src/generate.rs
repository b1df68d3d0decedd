//! Orchestration: sequence the pipeline stages and map their failures.
//!
//! A run is a straight line, `Idle → Extracting → Prompting → Generating →
//! Parsing → Done`, where any stage can end it in `Failed(stage)`. Nothing
//! is retried and nothing is stored: the caller gets either a complete,
//! validated card sequence or a tagged error. On a parsing failure the error
//! carries the raw model text so it can be shown to an operator.
//!
//! Runs share no mutable state. Concurrent calls need no coordination
//! beyond what the model backend itself requires.

use crate::config::{GenerationConfig, DEFAULT_MODEL};
use crate::document::{DocumentFormat, UploadedDocument};
use crate::error::FlashcardError;
use crate::output::{validate_set_name, GenerationOutput, GenerationStats};
use crate::pipeline::llm::{LlmGenerator, TextGenerator};
use crate::pipeline::{extract, parse, prompt, PipelineStage, PipelineState};
use crate::progress::ProgressCallback;
use edgequake_llm::{LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Generate flashcards from already-extracted text.
///
/// # Arguments
/// * `text`      — source text; only the first `config.excerpt_limit`
///   characters reach the model
/// * `directive` — the caller's instructions, passed verbatim
/// * `set_name`  — name of the set being created (non-empty, ≤100 chars)
///
/// # Errors
/// - [`FlashcardError::MissingParameter`] before any stage runs when text,
///   directive or set name is empty; the model is never called
/// - [`FlashcardError::GenerationUnavailable`] when the model call fails
/// - [`FlashcardError::MalformedJson`] / [`FlashcardError::InvalidCardShape`]
///   when the output can't be turned into cards (raw text attached)
pub async fn generate_flashcards(
    text: &str,
    directive: &str,
    set_name: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FlashcardError> {
    let started = Instant::now();
    if text.trim().is_empty() {
        return Err(FlashcardError::MissingParameter { name: "text" });
    }
    check_request(directive, set_name)?;

    let generator = resolve_generator(config)?;
    info!("Generating flashcards for '{}' with {}", set_name, generator.name());

    let run = Run::new(config, generator, started);
    run.text_stages(text, directive, set_name).await
}

/// Generate flashcards from an uploaded PDF or DOCX document.
///
/// Parameters, the upload size cap (`config.max_upload_bytes`) and the media
/// type are checked before anything is decoded. A document with no visible
/// text fails with [`FlashcardError::MissingParameter`] (`"text"`) before the
/// model is called.
pub async fn generate_from_document(
    document: UploadedDocument,
    directive: &str,
    set_name: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FlashcardError> {
    let started = Instant::now();
    if document.is_empty() {
        return Err(FlashcardError::MissingParameter { name: "document" });
    }
    check_request(directive, set_name)?;
    document.check_size(config.max_upload_bytes)?;
    let format = document.format()?;

    let generator = resolve_generator(config)?;
    info!(
        "Generating flashcards for '{}' from {} document ({} bytes) with {}",
        set_name,
        format,
        document.len(),
        generator.name()
    );

    let mut run = Run::new(config, generator, started);
    run.source_format = Some(format);

    run.tracker.enter(PipelineStage::Extraction);
    let extracted = extract::extract(document)
        .await
        .map_err(|e| run.tracker.fail(e))?;
    run.extraction_ms = run.tracker.complete();

    run.text_stages(&extracted.text, directive, set_name).await
}

/// Synchronous wrapper around [`generate_from_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn generate_sync(
    document: UploadedDocument,
    directive: &str,
    set_name: &str,
    config: &GenerationConfig,
) -> Result<GenerationOutput, FlashcardError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| FlashcardError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(generate_from_document(document, directive, set_name, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn check_request(directive: &str, set_name: &str) -> Result<(), FlashcardError> {
    if directive.trim().is_empty() {
        return Err(FlashcardError::MissingParameter { name: "directive" });
    }
    validate_set_name(set_name)
}

/// State shared by the stages of one run.
struct Run<'a> {
    config: &'a GenerationConfig,
    generator: Arc<dyn TextGenerator>,
    tracker: StageTracker<'a>,
    started: Instant,
    source_format: Option<DocumentFormat>,
    extraction_ms: u64,
}

impl<'a> Run<'a> {
    fn new(config: &'a GenerationConfig, generator: Arc<dyn TextGenerator>, started: Instant) -> Self {
        Self {
            config,
            generator,
            tracker: StageTracker::new(config.progress_callback.as_ref()),
            started,
            source_format: None,
            extraction_ms: 0,
        }
    }

    /// Prompting → Generating → Parsing → Done.
    async fn text_stages(
        mut self,
        text: &str,
        directive: &str,
        set_name: &str,
    ) -> Result<GenerationOutput, FlashcardError> {
        let config = self.config;

        // ── Prompting ────────────────────────────────────────────────────
        self.tracker.enter(PipelineStage::Prompting);
        let request = prompt::build(
            text,
            directive,
            config.system_prompt.as_deref(),
            config.excerpt_limit,
        )
        .map_err(|e| self.tracker.fail(e))?;
        if request.is_truncated() {
            warn!(
                "Source text has {} characters; only the first {} are sent to the model",
                request.source_chars(),
                config.excerpt_limit
            );
        }
        self.tracker.complete();

        // ── Generating ───────────────────────────────────────────────────
        self.tracker.enter(PipelineStage::Generation);
        let raw = self
            .generator
            .generate(&request)
            .await
            .map_err(|e| self.tracker.fail(e))?;
        let generation_ms = self.tracker.complete();
        debug!("Model returned {} characters", raw.text.chars().count());

        // ── Parsing ──────────────────────────────────────────────────────
        self.tracker.enter(PipelineStage::Parsing);
        let cards = parse::parse_cards(&raw.text, config.value_policy)
            .map_err(|e| self.tracker.fail(FlashcardError::from_parse(e, &raw.text)))?;
        self.tracker.complete();

        let count = cards.len();
        self.tracker.finish(count);

        let stats = GenerationStats {
            extracted_chars: request.source_chars(),
            excerpt_chars: request.excerpt().chars().count(),
            input_tokens: raw.input_tokens,
            output_tokens: raw.output_tokens,
            extraction_ms: self.extraction_ms,
            generation_ms,
            total_ms: self.started.elapsed().as_millis() as u64,
        };

        info!(
            "Generated {} flashcards for '{}' in {}ms",
            count, set_name, stats.total_ms
        );

        Ok(GenerationOutput {
            set_name: set_name.to_string(),
            cards,
            count,
            excerpt_truncated: request.is_truncated(),
            source_format: self.source_format,
            stats,
        })
    }
}

/// Tracks the run's [`PipelineState`] and forwards stage events.
struct StageTracker<'a> {
    state: PipelineState,
    callback: Option<&'a ProgressCallback>,
    stage_started: Instant,
}

impl<'a> StageTracker<'a> {
    fn new(callback: Option<&'a ProgressCallback>) -> Self {
        Self {
            state: PipelineState::Idle,
            callback,
            stage_started: Instant::now(),
        }
    }

    fn enter(&mut self, stage: PipelineStage) {
        let next = PipelineState::running(stage);
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal transition {:?} → {:?}",
            self.state,
            next
        );
        debug!("Stage: {}", stage);
        self.state = next;
        self.stage_started = Instant::now();
        if let Some(cb) = self.callback {
            cb.on_stage_start(stage);
        }
    }

    /// Mark the running stage finished; returns its duration in ms.
    fn complete(&mut self) -> u64 {
        let elapsed_ms = self.stage_started.elapsed().as_millis() as u64;
        if let (Some(stage), Some(cb)) = (self.state.stage(), self.callback) {
            cb.on_stage_complete(stage, elapsed_ms);
        }
        elapsed_ms
    }

    /// Move to `Failed` and hand the error back for propagation.
    fn fail(&mut self, err: FlashcardError) -> FlashcardError {
        if let Some(stage) = self.state.stage() {
            warn!("Stage {} failed: {}", stage, err);
            if let Some(cb) = self.callback {
                cb.on_stage_failed(stage, &err.to_string());
            }
            self.state = PipelineState::Failed(stage);
        }
        err
    }

    fn finish(&mut self, card_count: usize) {
        self.state = PipelineState::Done;
        if let Some(cb) = self.callback {
            cb.on_generation_complete(card_count);
        }
    }
}

/// Wrap a named provider as a [`TextGenerator`].
fn create_generator(
    provider_name: &str,
    model: &str,
    config: &GenerationConfig,
) -> Result<Arc<dyn TextGenerator>, FlashcardError> {
    let provider = ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        FlashcardError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })?;
    Ok(wrap_provider(provider, format!("{provider_name}/{model}"), config))
}

fn wrap_provider(
    provider: Arc<dyn LLMProvider>,
    label: String,
    config: &GenerationConfig,
) -> Arc<dyn TextGenerator> {
    Arc::new(LlmGenerator::new(provider, label, config))
}

/// Resolve the text generator, from most-specific to least-specific.
///
/// 1. **Pre-built generator** (`config.generator`) — used as-is; this is how
///    tests and custom backends plug in.
/// 2. **Pre-built provider** (`config.provider`) — an edgequake-llm provider
///    the caller configured entirely.
/// 3. **Named provider + model** (`config.provider_name`) — resolved via
///    [`ProviderFactory::create_llm_provider`], which reads the matching API
///    key from the environment.
/// 4. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 5. **OpenAI key present** (`OPENAI_API_KEY`) — OpenAI with the configured
///    or default model.
/// 6. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_generator(config: &GenerationConfig) -> Result<Arc<dyn TextGenerator>, FlashcardError> {
    if let Some(ref generator) = config.generator {
        return Ok(Arc::clone(generator));
    }

    if let Some(ref provider) = config.provider {
        let label = format!(
            "{}/{}",
            config.provider_name.as_deref().unwrap_or("custom"),
            config.model_or_default()
        );
        return Ok(wrap_provider(Arc::clone(provider), label, config));
    }

    if let Some(ref name) = config.provider_name {
        return create_generator(name, config.model_or_default(), config);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_generator(&prov, &model, config);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_generator("openai", config.model_or_default(), config);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| FlashcardError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    let label = format!("auto/{}", config.model.as_deref().unwrap_or(DEFAULT_MODEL));
    Ok(wrap_provider(llm_provider, label, config))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::llm::RawModelOutput;
    use crate::pipeline::prompt::GenerationRequest;
    use async_trait::async_trait;

    struct Echo(&'static str);

    #[async_trait]
    impl TextGenerator for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        async fn generate(&self, _request: &GenerationRequest) -> Result<RawModelOutput, FlashcardError> {
            Ok(RawModelOutput::new(self.0))
        }
    }

    fn config_with(generator: Arc<dyn TextGenerator>) -> GenerationConfig {
        GenerationConfig::builder().generator(generator).build().unwrap()
    }

    #[test]
    fn explicit_generator_wins() {
        let config = config_with(Arc::new(Echo("[]")));
        let generator = resolve_generator(&config).unwrap();
        assert_eq!(generator.name(), "echo");
    }

    #[tokio::test]
    async fn empty_text_is_missing_parameter() {
        let config = config_with(Arc::new(Echo("[]")));
        let err = generate_flashcards("  \n", "Make flashcards", "Set", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FlashcardError::MissingParameter { name: "text" }));
    }

    #[tokio::test]
    async fn long_set_name_rejected() {
        let config = config_with(Arc::new(Echo("[]")));
        let name = "n".repeat(101);
        let err = generate_flashcards("text", "Make flashcards", &name, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FlashcardError::InvalidParameter { name: "set_name", .. }));
    }

    #[tokio::test]
    async fn empty_array_is_success_with_zero_cards() {
        let config = config_with(Arc::new(Echo("[]")));
        let out = generate_flashcards("text", "Make flashcards", "Set", &config)
            .await
            .unwrap();
        assert_eq!(out.count, 0);
        assert!(out.cards.is_empty());
    }

    #[tokio::test]
    async fn truncation_flag_and_stats() {
        let config = GenerationConfig::builder()
            .generator(Arc::new(Echo(r#"[{"front":"Q","back":"A"}]"#)))
            .excerpt_limit(10)
            .build()
            .unwrap();
        let out = generate_flashcards(&"x".repeat(25), "Make flashcards", "Set", &config)
            .await
            .unwrap();
        assert!(out.excerpt_truncated);
        assert_eq!(out.stats.extracted_chars, 25);
        assert_eq!(out.stats.excerpt_chars, 10);
        assert_eq!(out.source_format, None);
    }

    #[tokio::test]
    async fn unsupported_document_rejected_before_extraction() {
        let config = config_with(Arc::new(Echo("[]")));
        let doc = UploadedDocument::new(b"plain".to_vec(), "text/plain");
        let err = generate_from_document(doc, "Make flashcards", "Set", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FlashcardError::UnsupportedFormat { .. }));
    }

    #[tokio::test]
    async fn oversized_document_rejected_before_extraction() {
        let config = GenerationConfig::builder()
            .generator(Arc::new(Echo("[]")))
            .max_upload_bytes(16)
            .build()
            .unwrap();
        let doc = UploadedDocument::new(vec![b'x'; 17], crate::document::PDF_MEDIA_TYPE);
        let err = generate_from_document(doc, "Make flashcards", "Set", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FlashcardError::DocumentTooLarge { size: 17, limit: 16 }));
        assert_eq!(err.stage(), None);
    }

    #[test]
    fn tracker_records_failure_state() {
        let mut tracker = StageTracker::new(None);
        tracker.enter(PipelineStage::Generation);
        let err = tracker.fail(FlashcardError::GenerationUnavailable {
            provider: "p".into(),
            message: "down".into(),
        });
        assert_eq!(tracker.state, PipelineState::Failed(PipelineStage::Generation));
        assert_eq!(err.code(), "generation_unavailable");
    }
}
