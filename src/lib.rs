//! # edgequake-flashcards
//!
//! Turn PDF and Word documents into study flashcards with an LLM.
//!
//! Text is pulled out of the document, a capped excerpt is sent to a model
//! together with the caller's directive, and the model's free-form reply is
//! searched for a JSON array of `{front, back}` objects. Only a fully valid
//! array is accepted: a run yields every card or none.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX
//!  │
//!  ├─ 1. Extract  decode bytes to plain text (CPU-bound, spawn_blocking)
//!  ├─ 2. Prompt   fixed instruction + directive + first 5000 characters
//!  ├─ 3. Generate one call to gpt-4.1-nano / claude / gemini / …
//!  ├─ 4. Parse    fenced block → bare array → whole text, then validate
//!  └─ 5. Output   ordered cards + stats, ready to persist
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_flashcards::{generate_from_document, GenerationConfig, UploadedDocument};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = GenerationConfig::default();
//!     let bytes = std::fs::read("lecture.pdf")?;
//!     let document = UploadedDocument::new(bytes, "application/pdf");
//!     let output = generate_from_document(
//!         document,
//!         "Create flashcards for the key terms",
//!         "Lecture 3",
//!         &config,
//!     )
//!     .await?;
//!     for card in &output.cards {
//!         println!("Q: {}\nA: {}\n", card.front, card.back);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `flashcards` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-flashcards = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod document;
pub mod error;
pub mod generate;
pub mod input;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod store;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{CardValuePolicy, GenerationConfig, GenerationConfigBuilder};
pub use document::{DocumentFormat, ExtractedText, UploadedDocument};
pub use error::{FlashcardError, ParseError, ShapeViolation};
pub use generate::{generate_flashcards, generate_from_document, generate_sync, resolve_generator};
pub use input::resolve_input;
pub use output::{Flashcard, FlashcardSet, GenerationOutput, GenerationStats};
pub use pipeline::extract::extract as extract_text;
pub use pipeline::llm::{LlmGenerator, RawModelOutput, TextGenerator};
pub use pipeline::parse::parse_cards;
pub use pipeline::prompt::GenerationRequest;
pub use pipeline::{PipelineStage, PipelineState};
pub use progress::{GenerationProgressCallback, NoopProgressCallback, ProgressCallback};
pub use store::{save_flashcard_set, CardRecord, FlashcardStore, MemoryStore, NewSet, SetId};
