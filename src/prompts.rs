//! Prompts for flashcard generation.
//!
//! Every prompt lives here so a wording change touches exactly one place and
//! unit tests can inspect the text without calling a model.
//!
//! Callers can override the instruction via
//! [`crate::config::GenerationConfig::system_prompt`]; the constants here are
//! used only when no override is provided.

/// Fixed instruction defining the output contract.
///
/// The parser tolerates fences and surrounding prose anyway, but asking for a
/// bare array keeps the common case on the cheapest parse path.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert teacher who writes study flashcards.

Read the document excerpt supplied by the user and follow their instructions.

OUTPUT FORMAT
- Produce ONLY a JSON array of objects with exactly two keys: "front" and "back"
- "front" holds a question or prompt, "back" holds its answer
- Both values are non-empty strings
- No other text, no explanations, no markdown, no code fences

Example:
[{"front": "What is the capital of France?", "back": "Paris"}]"#;

/// Directive used when the caller has no instructions of their own.
pub const DEFAULT_DIRECTIVE: &str = "Create flashcards with questions on one side and concise but comprehensive answers on the other";

/// Label introducing the document excerpt inside the user message.
pub const EXCERPT_HEADING: &str = "Document excerpt:";

/// Render the user turn: directive first, then the excerpt.
pub fn user_message(directive: &str, excerpt: &str) -> String {
    format!("{}\n\n{}\n{}", directive, EXCERPT_HEADING, excerpt)
}
