//! Letter rendering pipeline.
//!
//! A sanitised [`LetterContent`](crate::domain::letter::LetterContent) is
//! expanded into LaTeX, compiled by an external `pdflatex` in a per-request
//! workspace and returned as PDF bytes. The workspace never outlives the call.

mod service;
mod types;

pub use service::{COMPILER_PASSES, JOB_NAME, LatexRenderService, RenderPipelineConfig};
pub use types::{CompilerError, LetterRenderer, RenderError, RenderStage};
