//! Progress-callback trait for per-stage pipeline events.
//!
//! Inject an [`Arc<dyn GenerationProgressCallback>`] via
//! [`crate::config::GenerationConfigBuilder::progress_callback`] to follow a
//! run as it moves through extraction, prompting, generation and parsing.
//! Callers can forward events to a terminal spinner, a WebSocket or a job
//! record; the library knows nothing about how they are displayed.
//!
//! # Example
//!
//! ```rust
//! use edgequake_flashcards::{GenerationConfig, GenerationProgressCallback, PipelineStage};
//! use std::sync::Arc;
//!
//! struct StageLogger;
//!
//! impl GenerationProgressCallback for StageLogger {
//!     fn on_stage_start(&self, stage: PipelineStage) {
//!         eprintln!("→ {stage}");
//!     }
//! }
//!
//! let config = GenerationConfig::builder()
//!     .progress_callback(Arc::new(StageLogger))
//!     .build()
//!     .unwrap();
//! ```

use crate::pipeline::PipelineStage;
use std::sync::Arc;

/// Called by the orchestrator as a run moves between stages.
///
/// Implementations must be `Send + Sync`: concurrent runs may share one
/// callback. All methods have default no-op implementations.
pub trait GenerationProgressCallback: Send + Sync {
    /// Called when a stage is entered.
    fn on_stage_start(&self, stage: PipelineStage) {
        let _ = stage;
    }

    /// Called when a stage finishes successfully.
    ///
    /// # Arguments
    /// * `stage`      — the stage that finished
    /// * `elapsed_ms` — wall-clock time spent in it
    fn on_stage_complete(&self, stage: PipelineStage, elapsed_ms: u64) {
        let _ = (stage, elapsed_ms);
    }

    /// Called when a stage fails. The run ends immediately afterwards.
    fn on_stage_failed(&self, stage: PipelineStage, error: &str) {
        let _ = (stage, error);
    }

    /// Called once after parsing succeeds.
    fn on_generation_complete(&self, card_count: usize) {
        let _ = card_count;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl GenerationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::GenerationConfig`].
pub type ProgressCallback = Arc<dyn GenerationProgressCallback>;
