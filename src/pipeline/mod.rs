//! Pipeline stages for document-to-flashcard generation.
//!
//! Each submodule implements exactly one transformation step and can be
//! tested without the others.
//!
//! ## Data Flow
//!
//! ```text
//! extract ──▶ prompt ──▶ llm ──▶ parse
//! (PDF/DOCX)  (excerpt)  (model)  (cards)
//! ```
//!
//! 1. [`extract`] — decode PDF or DOCX bytes into plain text; runs in
//!    `spawn_blocking` because decoding is CPU-bound
//! 2. [`prompt`]  — combine the fixed instruction, the caller's directive and
//!    a character-capped excerpt into a [`prompt::GenerationRequest`]
//! 3. [`llm`]     — one model call per invocation; the only stage with
//!    network I/O
//! 4. [`parse`]   — locate, parse and validate the JSON card array inside
//!    free-form model output
//!
//! No stage holds state across invocations.

pub mod extract;
pub mod llm;
pub mod parse;
pub mod prompt;

use serde::{Deserialize, Serialize};
use std::fmt;

/// A stage tag attached to failures and progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Extraction,
    Prompting,
    Generation,
    Parsing,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineStage::Extraction => "extraction",
            PipelineStage::Prompting => "prompting",
            PipelineStage::Generation => "generation",
            PipelineStage::Parsing => "parsing",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Linear state machine of one pipeline invocation.
///
/// `Idle → Extracting → Prompting → Generating → Parsing → Done`, where any
/// running state may move to `Failed`. There are no back-edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Extracting,
    Prompting,
    Generating,
    Parsing,
    Done,
    Failed(PipelineStage),
}

impl PipelineState {
    /// The state entered when `stage` starts.
    pub fn running(stage: PipelineStage) -> Self {
        match stage {
            PipelineStage::Extraction => PipelineState::Extracting,
            PipelineStage::Prompting => PipelineState::Prompting,
            PipelineStage::Generation => PipelineState::Generating,
            PipelineStage::Parsing => PipelineState::Parsing,
        }
    }

    /// Stage currently running, if any.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineState::Extracting => Some(PipelineStage::Extraction),
            PipelineState::Prompting => Some(PipelineStage::Prompting),
            PipelineState::Generating => Some(PipelineStage::Generation),
            PipelineState::Parsing => Some(PipelineStage::Parsing),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed(_))
    }

    /// Whether moving from `self` to `next` follows the forward-only order.
    ///
    /// Stages may be skipped (text-only invocations never enter
    /// `Extracting`), but never revisited.
    pub fn can_advance_to(&self, next: PipelineState) -> bool {
        if self.is_terminal() {
            return false;
        }
        match next {
            PipelineState::Idle => false,
            PipelineState::Failed(_) => !matches!(self, PipelineState::Idle),
            _ => next.rank() > self.rank(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            PipelineState::Idle => 0,
            PipelineState::Extracting => 1,
            PipelineState::Prompting => 2,
            PipelineState::Generating => 3,
            PipelineState::Parsing => 4,
            PipelineState::Done => 5,
            PipelineState::Failed(_) => 6,
        }
    }
}
