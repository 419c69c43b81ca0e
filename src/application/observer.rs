//! Observability hooks for the letter pipeline.
//!
//! The pipeline only talks to the [`LetterObserver`] trait; counters and
//! histograms live behind the `metrics` facade in [`MetricsObserver`], so the
//! pipeline itself owns no process-wide state.

use std::time::Duration;

use metrics::{counter, histogram};

use super::render::RenderStage;

pub const METRIC_LETTERS_REQUESTED: &str = "letter_generator_requested_total";
pub const METRIC_LETTERS_GENERATED: &str = "letter_generator_generated_total";
pub const METRIC_LETTERS_FAILED: &str = "letter_generator_failed_total";
pub const METRIC_RENDER_DURATION_MS: &str = "letter_generator_render_duration_ms";
pub const METRIC_ARTIFACT_BYTES: &str = "letter_generator_artifact_bytes";

/// Where in the pipeline a letter request was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Validation,
    Render(RenderStage),
}

impl FailureStage {
    pub fn as_str(self) -> &'static str {
        match self {
            FailureStage::Validation => "validation",
            FailureStage::Render(stage) => stage.as_str(),
        }
    }
}

pub trait LetterObserver: Send + Sync {
    fn letter_requested(&self);
    fn letter_generated(&self, artifact_bytes: usize, elapsed: Duration);
    fn letter_failed(&self, stage: FailureStage);
}

/// Records pipeline outcomes through the global `metrics` recorder.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsObserver;

impl LetterObserver for MetricsObserver {
    fn letter_requested(&self) {
        counter!(METRIC_LETTERS_REQUESTED).increment(1);
    }

    fn letter_generated(&self, artifact_bytes: usize, elapsed: Duration) {
        counter!(METRIC_LETTERS_GENERATED).increment(1);
        histogram!(METRIC_RENDER_DURATION_MS).record(elapsed.as_secs_f64() * 1000.0);
        histogram!(METRIC_ARTIFACT_BYTES).record(artifact_bytes as f64);
    }

    fn letter_failed(&self, stage: FailureStage) {
        counter!(METRIC_LETTERS_FAILED, "stage" => stage.as_str()).increment(1);
    }
}
