//! Model interaction: send one generation request, return the raw text.
//!
//! [`TextGenerator`] is the seam between the orchestrator and whatever
//! produces text. The production implementation, [`LlmGenerator`], wraps an
//! edgequake-llm provider; tests plug in their own implementation through
//! [`crate::config::GenerationConfigBuilder::generator`].
//!
//! Exactly one outbound call per invocation: no retries, no streaming, no
//! response cache and no client-side timeout. A hung provider hangs only the
//! request that issued the call.

use crate::config::GenerationConfig;
use crate::error::FlashcardError;
use crate::pipeline::prompt::GenerationRequest;
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Free-form text returned by the model, plus token accounting.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawModelOutput {
    pub text: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl RawModelOutput {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Anything that turns a [`GenerationRequest`] into raw text.
///
/// Implementations must be safe for concurrent use; the orchestrator holds
/// them behind an `Arc` and never locks. Failures should be reported as
/// [`FlashcardError::GenerationUnavailable`].
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Label used in logs and error messages (e.g. `"openai/gpt-4.1-nano"`).
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<RawModelOutput, FlashcardError>;
}

/// [`TextGenerator`] backed by an edgequake-llm provider.
pub struct LlmGenerator {
    provider: Arc<dyn LLMProvider>,
    label: String,
    temperature: f32,
    max_tokens: usize,
}

impl LlmGenerator {
    pub fn new(provider: Arc<dyn LLMProvider>, label: impl Into<String>, config: &GenerationConfig) -> Self {
        Self {
            provider,
            label: label.into(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }
}

#[async_trait]
impl TextGenerator for LlmGenerator {
    fn name(&self) -> &str {
        &self.label
    }

    /// ## Message Layout
    ///
    /// 1. **System message** — the output-contract instruction
    /// 2. **User message** — the caller's directive, then the excerpt
    async fn generate(&self, request: &GenerationRequest) -> Result<RawModelOutput, FlashcardError> {
        let start = Instant::now();
        let messages = build_messages(request);
        let options = build_options(self.temperature, self.max_tokens);

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "{}: {} input tokens, {} output tokens, {:?}",
                    self.label,
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                Ok(RawModelOutput {
                    text: response.content,
                    input_tokens: response.prompt_tokens as usize,
                    output_tokens: response.completion_tokens as usize,
                })
            }
            Err(e) => {
                let message = format!("{}", e);
                warn!("{}: generation failed after {:?}: {}", self.label, start.elapsed(), message);
                Err(FlashcardError::GenerationUnavailable {
                    provider: self.label.clone(),
                    message,
                })
            }
        }
    }
}

fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(request.system_instructions()),
        ChatMessage::user(request.user_message()),
    ]
}

fn build_options(temperature: f32, max_tokens: usize) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(temperature),
        max_tokens: Some(max_tokens),
        ..Default::default()
    }
}
