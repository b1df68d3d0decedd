//! Prompt construction: instruction + directive + capped excerpt.
//!
//! The excerpt cap bounds request size and cost. Truncation counts Unicode
//! scalar values, never bytes, so a cut can't land inside a multi-byte
//! character. It makes no attempt to end on a sentence or word boundary.

use crate::error::FlashcardError;
use crate::prompts::{self, DEFAULT_SYSTEM_PROMPT};

/// Default excerpt cap, in characters.
pub const DEFAULT_EXCERPT_LIMIT: usize = 5000;

/// One immutable generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    system_instructions: String,
    directive: String,
    excerpt: String,
    source_chars: usize,
    truncated: bool,
}

impl GenerationRequest {
    pub fn system_instructions(&self) -> &str {
        &self.system_instructions
    }

    pub fn directive(&self) -> &str {
        &self.directive
    }

    pub fn excerpt(&self) -> &str {
        &self.excerpt
    }

    /// Whether the source text was longer than the excerpt cap.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Character count of the text before truncation.
    pub fn source_chars(&self) -> usize {
        self.source_chars
    }

    /// The user turn sent alongside the system instruction.
    pub fn user_message(&self) -> String {
        prompts::user_message(&self.directive, &self.excerpt)
    }
}

/// Build a request from extracted text and the caller's directive.
///
/// `system_prompt` replaces the built-in instruction when set. The directive
/// is used verbatim.
///
/// # Errors
/// [`FlashcardError::MissingParameter`] when `text` or `directive` is empty
/// or whitespace. The orchestrator checks this before any stage runs; the
/// check is repeated here so the builder is safe to call on its own.
pub fn build(
    text: &str,
    directive: &str,
    system_prompt: Option<&str>,
    excerpt_limit: usize,
) -> Result<GenerationRequest, FlashcardError> {
    if text.trim().is_empty() {
        return Err(FlashcardError::MissingParameter { name: "text" });
    }
    if directive.trim().is_empty() {
        return Err(FlashcardError::MissingParameter { name: "directive" });
    }

    let (excerpt, truncated) = truncate_excerpt(text, excerpt_limit);

    Ok(GenerationRequest {
        system_instructions: system_prompt.unwrap_or(DEFAULT_SYSTEM_PROMPT).to_string(),
        directive: directive.to_string(),
        excerpt: excerpt.to_string(),
        source_chars: text.chars().count(),
        truncated,
    })
}

/// Keep the first `limit` characters of `text`.
///
/// Returns the excerpt and whether anything was cut.
pub fn truncate_excerpt(text: &str, limit: usize) -> (&str, bool) {
    match text.char_indices().nth(limit) {
        Some((byte_idx, _)) => (&text[..byte_idx], true),
        None => (text, false),
    }
}
