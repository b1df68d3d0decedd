//! Error types for the edgequake-flashcards library.
//!
//! Two distinct error types reflect two distinct scopes:
//!
//! * [`FlashcardError`] — returned by every public entry point. Each variant
//!   belongs to at most one pipeline stage, so callers can tell "bad file"
//!   from "model unavailable" from "bad model output" via
//!   [`FlashcardError::stage`].
//!
//! * [`ParseError`] — returned by the response parser alone. It knows nothing
//!   about the raw text it was given; the orchestrator wraps it into
//!   [`FlashcardError::MalformedJson`] or [`FlashcardError::InvalidCardShape`]
//!   and attaches the raw model output so the operator can see what the model
//!   actually produced.
//!
//! Every error is terminal for the invocation that raised it. Nothing in the
//! pipeline retries.

use crate::pipeline::PipelineStage;
use std::path::PathBuf;
use thiserror::Error;

/// All errors returned by the edgequake-flashcards library.
#[derive(Debug, Error)]
pub enum FlashcardError {
    // ── Precondition errors ───────────────────────────────────────────────
    /// A required parameter (text, directive, set name, document) is empty.
    #[error("Missing required parameter '{name}'")]
    MissingParameter { name: &'static str },

    /// A parameter is present but violates a constraint.
    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    // ── Input errors ──────────────────────────────────────────────────────
    /// Media type is neither PDF nor DOCX.
    #[error("Unsupported document format '{media_type}'\nOnly PDF and DOCX files are accepted.")]
    UnsupportedFormat { media_type: String },

    /// Upload exceeds the configured size cap.
    #[error("Document is {size} bytes, larger than the {limit}-byte upload limit")]
    DocumentTooLarge { size: usize, limit: usize },

    /// Input file was not found or could not be read.
    #[error("Input file not readable: '{path}': {reason}")]
    InputNotFound { path: PathBuf, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    // ── Extraction errors ─────────────────────────────────────────────────
    /// The bytes do not decode as their declared format.
    #[error("Could not extract text from {format} document: {detail}")]
    ExtractionFailed { format: &'static str, detail: String },

    // ── Generation errors ─────────────────────────────────────────────────
    /// The configured provider could not be initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// Network, authentication or provider-side failure during generation.
    #[error("Generation unavailable from '{provider}': {message}")]
    GenerationUnavailable { provider: String, message: String },

    // ── Parsing errors ────────────────────────────────────────────────────
    /// The selected substring of the model output is not valid JSON.
    #[error("Model output is not valid JSON: {detail}")]
    MalformedJson { detail: String, raw_output: String },

    /// The JSON is valid but is not an array of `{front, back}` objects.
    #[error("Model output has the wrong shape: {violation}")]
    InvalidCardShape {
        violation: ShapeViolation,
        raw_output: String,
    },

    // ── Persistence errors ────────────────────────────────────────────────
    /// The persistence collaborator rejected a write.
    #[error("Failed to store flashcard set: {detail}")]
    StoreFailed { detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl FlashcardError {
    /// The pipeline stage that raised this error, if any.
    ///
    /// Precondition, input-boundary and configuration errors happen before
    /// any stage is entered and return `None`.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            FlashcardError::ExtractionFailed { .. } => Some(PipelineStage::Extraction),
            FlashcardError::GenerationUnavailable { .. } => Some(PipelineStage::Generation),
            FlashcardError::MalformedJson { .. } | FlashcardError::InvalidCardShape { .. } => {
                Some(PipelineStage::Parsing)
            }
            _ => None,
        }
    }

    /// Raw model text attached to a parsing failure.
    pub fn raw_output(&self) -> Option<&str> {
        match self {
            FlashcardError::MalformedJson { raw_output, .. }
            | FlashcardError::InvalidCardShape { raw_output, .. } => Some(raw_output),
            _ => None,
        }
    }

    /// Stable machine-readable kind, for HTTP or CLI boundaries.
    pub fn code(&self) -> &'static str {
        match self {
            FlashcardError::MissingParameter { .. } => "missing_parameter",
            FlashcardError::InvalidParameter { .. } => "invalid_parameter",
            FlashcardError::UnsupportedFormat { .. } => "unsupported_format",
            FlashcardError::DocumentTooLarge { .. } => "document_too_large",
            FlashcardError::InputNotFound { .. } => "input_not_found",
            FlashcardError::DownloadFailed { .. } => "download_failed",
            FlashcardError::ExtractionFailed { .. } => "extraction_failed",
            FlashcardError::ProviderNotConfigured { .. } => "provider_not_configured",
            FlashcardError::GenerationUnavailable { .. } => "generation_unavailable",
            FlashcardError::MalformedJson { .. } => "malformed_json",
            FlashcardError::InvalidCardShape { .. } => "invalid_card_shape",
            FlashcardError::StoreFailed { .. } => "store_failed",
            FlashcardError::InvalidConfig(_) => "invalid_config",
            FlashcardError::Internal(_) => "internal",
        }
    }

    /// Attach the raw model text to a parser failure.
    pub(crate) fn from_parse(err: ParseError, raw_output: &str) -> Self {
        match err {
            ParseError::MalformedJson { detail } => FlashcardError::MalformedJson {
                detail,
                raw_output: raw_output.to_string(),
            },
            ParseError::InvalidCardShape(violation) => FlashcardError::InvalidCardShape {
                violation,
                raw_output: raw_output.to_string(),
            },
        }
    }
}

/// Failure of the structured response parser.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    /// The selected candidate text did not parse as JSON.
    #[error("malformed JSON: {detail}")]
    MalformedJson { detail: String },

    /// The JSON parsed but failed card-shape validation.
    #[error("invalid card shape: {0}")]
    InvalidCardShape(ShapeViolation),
}

/// The first card-shape violation found while validating model output.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeViolation {
    /// The top-level JSON value is not an array.
    #[error("expected a JSON array, found {found}")]
    NotAnArray { found: &'static str },

    /// An array element is not an object.
    #[error("element {index} is {found}, not an object")]
    NotAnObject { index: usize, found: &'static str },

    /// An element lacks the `front` or `back` key.
    #[error("element {index} is missing the '{field}' key")]
    MissingField { index: usize, field: &'static str },

    /// A `front`/`back` value is not acceptable text under the value policy.
    #[error("element {index} has a non-text '{field}' value ({found})")]
    NonTextField {
        index: usize,
        field: &'static str,
        found: &'static str,
    },

    /// A `front`/`back` value is empty or whitespace.
    #[error("element {index} has an empty '{field}' value")]
    EmptyField { index: usize, field: &'static str },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_format_display() {
        let e = FlashcardError::UnsupportedFormat {
            media_type: "image/png".into(),
        };
        assert!(e.to_string().contains("image/png"));
        assert_eq!(e.code(), "unsupported_format");
        assert_eq!(e.stage(), None);
    }

    #[test]
    fn stage_tags() {
        let extraction = FlashcardError::ExtractionFailed {
            format: "PDF",
            detail: "bad xref".into(),
        };
        assert_eq!(extraction.stage(), Some(PipelineStage::Extraction));

        let generation = FlashcardError::GenerationUnavailable {
            provider: "openai".into(),
            message: "connection reset".into(),
        };
        assert_eq!(generation.stage(), Some(PipelineStage::Generation));
        assert!(generation.to_string().contains("connection reset"));

        let missing = FlashcardError::MissingParameter { name: "directive" };
        assert_eq!(missing.stage(), None);
    }

    #[test]
    fn provider_not_configured_has_no_stage() {
        // Raised while resolving the generator, before any stage is entered.
        let e = FlashcardError::ProviderNotConfigured {
            provider: "auto".into(),
            hint: "Set OPENAI_API_KEY".into(),
        };
        assert_eq!(e.stage(), None);
        assert_eq!(e.code(), "provider_not_configured");
    }

    #[test]
    fn parse_error_keeps_raw_output() {
        let e = FlashcardError::from_parse(
            ParseError::MalformedJson {
                detail: "expected value".into(),
            },
            "not json at all",
        );
        assert_eq!(e.stage(), Some(PipelineStage::Parsing));
        assert_eq!(e.raw_output(), Some("not json at all"));
        assert_eq!(e.code(), "malformed_json");
    }

    #[test]
    fn shape_violation_display() {
        let e = FlashcardError::from_parse(
            ParseError::InvalidCardShape(ShapeViolation::MissingField {
                index: 0,
                field: "back",
            }),
            r#"[{"front": "Q"}]"#,
        );
        let msg = e.to_string();
        assert!(msg.contains("element 0"), "got: {msg}");
        assert!(msg.contains("'back'"), "got: {msg}");
        assert_eq!(e.raw_output(), Some(r#"[{"front": "Q"}]"#));
    }

    #[test]
    fn raw_output_absent_for_other_errors() {
        let e = FlashcardError::Internal("boom".into());
        assert!(e.raw_output().is_none());
    }
}
