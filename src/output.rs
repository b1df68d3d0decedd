//! Flashcards, flashcard sets and the generation result envelope.

use crate::document::DocumentFormat;
use crate::error::FlashcardError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Maximum length of a set name, in characters.
pub const MAX_SET_NAME_CHARS: usize = 100;

/// Tag added to every set produced by the pipeline.
pub const AI_GENERATED_TAG: &str = "AI Generated";

/// One question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub front: String,
    pub back: String,
}

impl Flashcard {
    pub fn new(front: impl Into<String>, back: impl Into<String>) -> Self {
        Self {
            front: front.into(),
            back: back.into(),
        }
    }
}

/// A named, tagged, ordered collection of flashcards.
///
/// Card order is significant: it is the display order and becomes the
/// zero-based `position` of each card when the set is stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashcardSet {
    name: String,
    tags: BTreeSet<String>,
    cards: Vec<Flashcard>,
}

impl FlashcardSet {
    /// Create a set, validating the name.
    pub fn new(
        name: impl Into<String>,
        tags: impl IntoIterator<Item = impl Into<String>>,
        cards: Vec<Flashcard>,
    ) -> Result<Self, FlashcardError> {
        let name = name.into();
        validate_set_name(&name)?;
        Ok(Self {
            name,
            tags: tags.into_iter().map(Into::into).collect(),
            cards,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn cards(&self) -> &[Flashcard] {
        &self.cards
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

/// Check a set name: non-empty after trimming, at most
/// [`MAX_SET_NAME_CHARS`] characters.
pub fn validate_set_name(name: &str) -> Result<(), FlashcardError> {
    if name.trim().is_empty() {
        return Err(FlashcardError::MissingParameter { name: "set_name" });
    }
    let chars = name.chars().count();
    if chars > MAX_SET_NAME_CHARS {
        return Err(FlashcardError::InvalidParameter {
            name: "set_name",
            reason: format!("{} characters, maximum is {}", chars, MAX_SET_NAME_CHARS),
        });
    }
    Ok(())
}

/// Result of a successful generation run.
///
/// Nothing here has been stored. The caller inspects the cards and decides
/// whether to hand them to a [`crate::store::FlashcardStore`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub set_name: String,
    pub cards: Vec<Flashcard>,
    pub count: usize,
    /// True when the source text exceeded the excerpt cap and the model only
    /// saw its beginning.
    pub excerpt_truncated: bool,
    /// Format of the source document, when generation started from one.
    pub source_format: Option<DocumentFormat>,
    pub stats: GenerationStats,
}

impl GenerationOutput {
    /// Tags for a set built from this output: the source-format tag (if the
    /// run started from a document) plus [`AI_GENERATED_TAG`].
    pub fn default_tags(&self) -> Vec<&'static str> {
        let format_tag = self.source_format.map(|f| f.set_tag());
        format_tag.into_iter().chain([AI_GENERATED_TAG]).collect()
    }

    /// Package the cards as a [`FlashcardSet`] with the default tags.
    pub fn into_set(self) -> Result<FlashcardSet, FlashcardError> {
        let tags = self.default_tags();
        FlashcardSet::new(self.set_name, tags, self.cards)
    }
}

/// Timing and size statistics for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationStats {
    /// Characters of extracted (or supplied) text.
    pub extracted_chars: usize,
    /// Characters actually sent to the model.
    pub excerpt_chars: usize,
    pub input_tokens: usize,
    pub output_tokens: usize,
    /// Zero when generation started from text.
    pub extraction_ms: u64,
    pub generation_ms: u64,
    pub total_ms: u64,
}
