//! Configuration for flashcard generation.
//!
//! All pipeline behaviour is controlled through [`GenerationConfig`], built
//! once (typically at process start) via [`GenerationConfigBuilder`] and
//! passed by reference into every call. There is no global client: the
//! model backend is resolved from this struct on each invocation.

use crate::document::DEFAULT_MAX_UPLOAD_BYTES;
use crate::error::FlashcardError;
use crate::pipeline::llm::TextGenerator;
use crate::pipeline::prompt::DEFAULT_EXCERPT_LIMIT;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

pub use crate::pipeline::parse::CardValuePolicy;

/// Model used when a provider is named without one.
pub const DEFAULT_MODEL: &str = "gpt-4.1-nano";

/// Configuration for a flashcard generation run.
///
/// # Example
/// ```rust
/// use edgequake_flashcards::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .model("gpt-4.1-mini")
///     .excerpt_limit(8000)
///     .build()
///     .unwrap();
/// assert_eq!(config.excerpt_limit, 8000);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// LLM model identifier, e.g. "gpt-4.1-nano". If None, [`DEFAULT_MODEL`].
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed edgequake-llm provider. Takes precedence over
    /// `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Pre-constructed text generator. Takes precedence over everything else.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Sampling temperature. Default: 0.2.
    ///
    /// Some variety in phrasing is welcome, but the output must stay valid
    /// JSON; high temperatures raise the malformed-output rate.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// A truncated completion is an unterminated JSON array, which fails
    /// parsing outright.
    pub max_tokens: usize,

    /// Excerpt cap in characters. Default: 5000.
    pub excerpt_limit: usize,

    /// Upload cap in bytes, enforced by boundary layers. Default: 10 MiB.
    pub max_upload_bytes: usize,

    /// Custom system instruction. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Treatment of non-string `front`/`back` values. Default: coerce scalars.
    pub value_policy: CardValuePolicy,

    /// Stage event sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            generator: None,
            temperature: 0.2,
            max_tokens: 4096,
            excerpt_limit: DEFAULT_EXCERPT_LIMIT,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            system_prompt: None,
            value_policy: CardValuePolicy::default(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("generator", &self.generator.as_ref().map(|g| g.name().to_string()))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("excerpt_limit", &self.excerpt_limit)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("system_prompt", &self.system_prompt.as_ref().map(|p| p.len()))
            .field("value_policy", &self.value_policy)
            .field("progress_callback", &self.progress_callback.is_some())
            .finish()
    }
}

impl GenerationConfig {
    /// Create a new builder for `GenerationConfig`.
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    /// The model to request, falling back to [`DEFAULT_MODEL`].
    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn excerpt_limit(mut self, chars: usize) -> Self {
        self.config.excerpt_limit = chars;
        self
    }

    pub fn max_upload_bytes(mut self, bytes: usize) -> Self {
        self.config.max_upload_bytes = bytes;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn value_policy(mut self, policy: CardValuePolicy) -> Self {
        self.config.value_policy = policy;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, FlashcardError> {
        let c = &self.config;
        if c.excerpt_limit == 0 {
            return Err(FlashcardError::InvalidConfig(
                "Excerpt limit must be ≥ 1 character".into(),
            ));
        }
        if c.max_tokens == 0 {
            return Err(FlashcardError::InvalidConfig("max_tokens must be ≥ 1".into()));
        }
        if c.max_upload_bytes == 0 {
            return Err(FlashcardError::InvalidConfig(
                "Upload limit must be ≥ 1 byte".into(),
            ));
        }
        if let Some(ref p) = c.system_prompt {
            if p.trim().is_empty() {
                return Err(FlashcardError::InvalidConfig(
                    "System prompt override is empty".into(),
                ));
            }
        }
        Ok(self.config)
    }
}
