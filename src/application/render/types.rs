use std::io;

use async_trait::async_trait;
use thiserror::Error;

use crate::{domain::letter::LetterContent, infra::templates::TemplateError};

pub use super::service::CompilerError;

/// Pipeline step a render failure originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    Workspace,
    Template,
    Compile,
    Artifact,
}

impl RenderStage {
    pub fn as_str(self) -> &'static str {
        match self {
            RenderStage::Workspace => "workspace",
            RenderStage::Template => "template",
            RenderStage::Compile => "compile",
            RenderStage::Artifact => "artifact",
        }
    }
}

/// Failures of the letter rendering pipeline. Display strings stay terse; the
/// compiler's captured streams live in the variant fields and in the logs.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to create workspace: {0}")]
    Workspace(#[source] io::Error),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error("failed to write LaTeX source: {0}")]
    WriteSource(#[source] io::Error),
    #[error(transparent)]
    Compiler(#[from] CompilerError),
    #[error("compiled document could not be read: {0}")]
    Artifact(#[source] io::Error),
}

impl RenderError {
    pub fn stage(&self) -> RenderStage {
        match self {
            RenderError::Workspace(_) => RenderStage::Workspace,
            RenderError::Template(_) | RenderError::WriteSource(_) => RenderStage::Template,
            RenderError::Compiler(_) => RenderStage::Compile,
            RenderError::Artifact(_) => RenderStage::Artifact,
        }
    }
}

/// Turns a sanitised letter into document bytes.
#[async_trait]
pub trait LetterRenderer: Send + Sync {
    async fn render(&self, letter: &LetterContent) -> Result<Vec<u8>, RenderError>;
}
